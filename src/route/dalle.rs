use aide::{
	axum::{routing::post_with, ApiRouter},
	transform::TransformOperation,
};
use axum::extract::State;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::AppError, extract::Json, openapi::tag, storage, AppState, Dalle};

pub fn routes() -> ApiRouter<AppState> {
	ApiRouter::new().api_route("/", post_with(generate_image, generate_image_docs))
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct GenerateInput {
	/// Description of the image to generate.
	#[validate(length(min = 1, max = 2000))]
	pub prompt: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GeneratedImage {
	/// Inline-encoded (`data:image/png;base64,`) image bytes.
	pub photo: String,
}

fn generate_image_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Generate an image")
		.description(
			"Proxies the prompt to the text-to-image service and returns the \
			 generated image inline-encoded, ready to preview or publish.",
		)
		.tag(tag::DALLE)
}

/// Proxies the prompt to the generation service.
async fn generate_image(
	State(dalle): State<Dalle>,
	Json(input): Json<GenerateInput>,
) -> Result<Json<GeneratedImage>, AppError> {
	let bytes = dalle.generate(&input.prompt).await?;

	Ok(Json(GeneratedImage {
		photo: storage::encode_inline("png", &bytes),
	}))
}
