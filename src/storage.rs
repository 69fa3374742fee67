use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;

/// Folder holding every full-resolution original.
pub const GALLERY_FOLDER: &str = "dalle";
/// Folder holding the blurred micro-thumbnails.
pub const THUMBNAILS_FOLDER: &str = "dalle/thumbnails";
/// Folder holding the medium-quality previews.
pub const LOWRES_FOLDER: &str = "dalle/lowres";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	#[error("storage request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("storage returned {status}: {message}")]
	Api { status: u16, message: String },
	#[error("resource not found: {0}")]
	NotFound(String),
}

/// Outcome of an idempotent folder provision. Asking for a folder that is
/// already there is success, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
	Created,
	AlreadyExists,
}

/// An image hosted by the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
	pub public_id: String,
	pub url: String,
	pub format: String,
}

impl StoredImage {
	/// Filename used for this resource inside the export archive:
	/// the last segment of the public id plus the format extension.
	pub fn archive_name(&self) -> String {
		let stem = self.public_id.rsplit('/').next().unwrap_or(&self.public_id);
		format!("{stem}.{}", self.format)
	}
}

/// The cloud image host. Hosts originals and derivatives; the gallery only
/// ever addresses images through the URIs this store hands back.
#[axum::async_trait]
pub trait ObjectStore: Send + Sync {
	/// Create `path` if absent. Idempotent.
	async fn ensure_folder(&self, path: &str) -> Result<Provisioned, StorageError>;

	/// Host `bytes` under `folder`, returning the stored location.
	async fn upload(
		&self,
		folder: &str,
		bytes: Bytes,
		format: &str,
	) -> Result<StoredImage, StorageError>;

	/// Fetch the byte contents of a hosted resource.
	async fn download(&self, url: &str) -> Result<Bytes, StorageError>;

	/// All resources directly inside `folder` (non-recursive).
	async fn list(&self, folder: &str) -> Result<Vec<StoredImage>, StorageError>;
}

/// Encode raw image bytes as a `data:image/...;base64,` URL.
pub fn encode_inline(format: &str, bytes: &[u8]) -> String {
	format!("data:image/{format};base64,{}", BASE64.encode(bytes))
}

/// Decode an inline-encoded image. Accepts a full data URL or bare base64.
pub fn decode_inline(encoded: &str) -> Option<Bytes> {
	let payload = encoded
		.split_once(',')
		.map_or(encoded, |(_, payload)| payload);

	BASE64.decode(payload.trim()).ok().map(Bytes::from)
}

/// Cloudinary-style HTTP [`ObjectStore`].
pub struct HttpObjectStore {
	http: reqwest::Client,
	base_url: String,
	api_key: String,
	api_secret: String,
}

impl HttpObjectStore {
	pub fn new(config: &StorageConfig) -> Self {
		Self {
			http: reqwest::Client::new(),
			base_url: format!("https://api.cloudinary.com/v1_1/{}", config.cloud_name),
			api_key: config.api_key.clone(),
			api_secret: config.api_secret.clone(),
		}
	}

	async fn api_error(response: reqwest::Response) -> StorageError {
		StorageError::Api {
			status: response.status().as_u16(),
			message: response.text().await.unwrap_or_default(),
		}
	}
}

#[derive(Serialize)]
struct UploadRequest<'r> {
	file: String,
	folder: &'r str,
	format: &'r str,
}

/// Resources returned per search page. Folders past this size are fetched
/// by following `next_cursor`.
const SEARCH_PAGE_SIZE: u32 = 500;

#[derive(Deserialize)]
struct SearchResponse {
	resources: Vec<StoredImage>,
	next_cursor: Option<String>,
}

fn search_body(folder: &str, cursor: Option<&str>) -> serde_json::Value {
	let mut body = serde_json::json!({
		"expression": format!("folder:{folder}"),
		"max_results": SEARCH_PAGE_SIZE,
	});

	if let Some(cursor) = cursor {
		body["next_cursor"] = cursor.into();
	}

	body
}

#[axum::async_trait]
impl ObjectStore for HttpObjectStore {
	async fn ensure_folder(&self, path: &str) -> Result<Provisioned, StorageError> {
		let response = self
			.http
			.post(format!("{}/folders/{path}", self.base_url))
			.basic_auth(&self.api_key, Some(&self.api_secret))
			.send()
			.await?;

		let status = response.status();

		// 409 means the folder already exists, which is fine.
		if status.is_success() {
			Ok(Provisioned::Created)
		} else if status.as_u16() == 409 {
			Ok(Provisioned::AlreadyExists)
		} else {
			Err(Self::api_error(response).await)
		}
	}

	async fn upload(
		&self,
		folder: &str,
		bytes: Bytes,
		format: &str,
	) -> Result<StoredImage, StorageError> {
		let response = self
			.http
			.post(format!("{}/image/upload", self.base_url))
			.basic_auth(&self.api_key, Some(&self.api_secret))
			.form(&UploadRequest {
				file: encode_inline(format, &bytes),
				folder,
				format,
			})
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(Self::api_error(response).await);
		}

		Ok(response.json().await?)
	}

	async fn download(&self, url: &str) -> Result<Bytes, StorageError> {
		let response = self.http.get(url).send().await?;

		if response.status().as_u16() == 404 {
			return Err(StorageError::NotFound(url.to_owned()));
		}

		if !response.status().is_success() {
			return Err(Self::api_error(response).await);
		}

		Ok(response.bytes().await?)
	}

	async fn list(&self, folder: &str) -> Result<Vec<StoredImage>, StorageError> {
		let mut resources = Vec::new();
		let mut cursor: Option<String> = None;

		loop {
			let response = self
				.http
				.post(format!("{}/resources/search", self.base_url))
				.basic_auth(&self.api_key, Some(&self.api_secret))
				.json(&search_body(folder, cursor.as_deref()))
				.send()
				.await?;

			if !response.status().is_success() {
				return Err(Self::api_error(response).await);
			}

			let search: SearchResponse = response.json().await?;
			resources.extend(search.resources);

			match search.next_cursor {
				Some(next) => cursor = Some(next),
				None => break,
			}
		}

		Ok(resources)
	}
}
