//! Client for the external text-to-image generation service.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::DalleConfig;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
	#[error("generation request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("generation service returned {status}: {message}")]
	Api { status: u16, message: String },
	#[error("generation service returned no image")]
	Empty,
	#[error("generation service returned invalid base64: {0}")]
	Encoding(#[from] base64::DecodeError),
}

/// Turns a prompt into image bytes.
#[axum::async_trait]
pub trait TextToImage: Send + Sync {
	async fn generate(&self, prompt: &str) -> Result<Bytes, GenerateError>;
}

/// OpenAI images-API client.
pub struct DalleClient {
	http: reqwest::Client,
	api_url: String,
	api_key: String,
}

impl DalleClient {
	pub fn new(config: &DalleConfig) -> Self {
		Self {
			http: reqwest::Client::new(),
			api_url: config.api_url.clone(),
			api_key: config.api_key.clone(),
		}
	}
}

#[derive(Serialize)]
struct GenerationRequest<'r> {
	prompt: &'r str,
	n: u8,
	size: &'r str,
	response_format: &'r str,
}

#[derive(Deserialize)]
struct GenerationResponse {
	data: Vec<GeneratedItem>,
}

#[derive(Deserialize)]
struct GeneratedItem {
	b64_json: String,
}

#[axum::async_trait]
impl TextToImage for DalleClient {
	async fn generate(&self, prompt: &str) -> Result<Bytes, GenerateError> {
		let response = self
			.http
			.post(&self.api_url)
			.bearer_auth(&self.api_key)
			.json(&GenerationRequest {
				prompt,
				n: 1,
				size: "1024x1024",
				response_format: "b64_json",
			})
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(GenerateError::Api {
				status: response.status().as_u16(),
				message: response.text().await.unwrap_or_default(),
			});
		}

		let body: GenerationResponse = response.json().await?;
		let image = body.data.into_iter().next().ok_or(GenerateError::Empty)?;

		Ok(BASE64.decode(image.b64_json)?.into())
	}
}
