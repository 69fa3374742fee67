use aide::{
	axum::{
		routing::{get_with, post_with},
		ApiRouter,
	},
	transform::TransformOperation,
};
use axum::{extract::State, http::StatusCode};
use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

use crate::{
	archive::{self, ZipAttachment},
	derivative::Pipeline,
	error::{self, ErrorShape, Message},
	extract::{Created, Json},
	model::Post,
	openapi::tag,
	storage::{self, GALLERY_FOLDER},
	store::NewPost,
	AppState, Images, Posts,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("photo is not a decodable inline image")]
	InvalidPhoto,
}

impl ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidPhoto => StatusCode::BAD_REQUEST,
		}
	}

	fn into_errors(self) -> Vec<Message<'static>> {
		match self {
			Self::InvalidPhoto => Message::new("invalid_photo")
				.field("photo")
				.detail("expected", "data:image/...;base64, payload")
				.into_vec(),
		}
	}
}

type RouteError = error::RouteError<Error>;

impl From<Error> for RouteError {
	fn from(error: Error) -> Self {
		Self::Route(error)
	}
}

pub fn routes() -> ApiRouter<AppState> {
	ApiRouter::new()
		.api_route(
			"/",
			get_with(get_posts, get_posts_docs).post_with(create_post, create_post_docs),
		)
		.api_route("/export", get_with(export_posts, export_posts_docs))
		.api_route("/backfill", get_with(backfill_posts, backfill_posts_docs))
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreatePostInput {
	/// Display name shown with the post.
	#[validate(length(min = 1, max = 128))]
	pub name: String,
	/// The prompt the image was generated from.
	#[validate(length(min = 1, max = 2000))]
	pub prompt: String,
	/// Inline-encoded (`data:image/...;base64,`) source image.
	#[validate(length(min = 1))]
	pub photo: String,
}

fn get_posts_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Get all posts")
		.description("Returns every published post, newest first. No pagination.")
		.tag(tag::POST)
}

/// Returns every published post, newest first.
async fn get_posts(State(posts): State<Posts>) -> Result<Json<Vec<Post>>, RouteError> {
	Ok(Json(posts.all().await?))
}

fn create_post_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Publish a post")
		.description(
			"Hosts the submitted image, derives its thumbnail and low-res \
			 preview, and persists the post. Nothing is persisted if any \
			 step fails.",
		)
		.tag(tag::POST)
		.response::<201, Json<Post>>()
}

/// Hosts the photo, derives both preview images and persists the post.
async fn create_post(
	State(posts): State<Posts>,
	State(images): State<Images>,
	Json(input): Json<CreatePostInput>,
) -> Result<Created<Post>, RouteError> {
	let source = storage::decode_inline(&input.photo).ok_or(Error::InvalidPhoto)?;
	let format = image::guess_format(&source).map_err(|_| Error::InvalidPhoto)?;
	let extension = format.extensions_str().first().copied().unwrap_or("png");

	let photo = images.upload(GALLERY_FOLDER, source, extension).await?;

	// The pipeline works from the hosted copy, the same bytes later
	// downloads will see.
	let derived = Pipeline::new(images).derive_from_url(&photo.url).await?;

	let post = posts
		.insert(NewPost {
			name: input.name,
			prompt: input.prompt,
			photo: photo.url,
			thumbnail: derived.thumbnail.url,
			low_res: derived.low_res.url,
		})
		.await?;

	Ok(Created(post))
}

fn backfill_posts_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Backfill missing derivatives")
		.description(
			"Recomputes thumbnail and low-res images for every post that \
			 lacks them and returns the updated subset. Posts that fail are \
			 skipped and retried on the next run. Safe to re-run.",
		)
		.tag(tag::POST)
}

/// Recomputes missing derivatives for all posts, skipping failures.
async fn backfill_posts(
	State(posts): State<Posts>,
	State(images): State<Images>,
) -> Result<Json<Vec<Post>>, RouteError> {
	let pipeline = Pipeline::new(images);
	let mut updated = Vec::new();

	for post in posts.missing_derivatives().await? {
		let derived = match pipeline.derive_from_url(&post.photo).await {
			Ok(derived) => derived,
			Err(error) => {
				tracing::warn!(post = %post.id, %error, "skipping post in backfill");
				continue;
			}
		};

		match posts
			.set_derivatives(post.id, &derived.thumbnail.url, &derived.low_res.url)
			.await
		{
			Ok(post) => updated.push(post),
			Err(error) => tracing::warn!(post = %post.id, %error, "backfill update failed"),
		}
	}

	Ok(Json(updated))
}

fn export_posts_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Export all images")
		.description(
			"Streams a zip archive of every hosted full-resolution image. \
			 Resources that cannot be fetched are skipped.",
		)
		.tag(tag::POST)
}

/// Streams a zip of every hosted original as a downloadable attachment.
async fn export_posts(State(images): State<Images>) -> Result<ZipAttachment, RouteError> {
	let resources = images.list(GALLERY_FOLDER).await?;

	Ok(archive::stream(images, resources))
}
