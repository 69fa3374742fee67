//! End-to-end route tests over the in-memory collaborators.

use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum_test::TestServer;
use serde_json::json;

use dalle_gallery::{
	model::Post,
	router,
	storage::{self, ObjectStore, GALLERY_FOLDER, LOWRES_FOLDER, THUMBNAILS_FOLDER},
	store::{NewPost, PostStore},
	test_support::{sample_image, MemoryObjectStore, MemoryPostStore, StubDalle},
	State,
};

struct Harness {
	server: TestServer,
	posts: Arc<MemoryPostStore>,
	images: Arc<MemoryObjectStore>,
}

fn harness() -> Harness {
	let posts = Arc::new(MemoryPostStore::new());
	let images = Arc::new(MemoryObjectStore::new());

	let state = State {
		posts: posts.clone(),
		images: images.clone(),
		dalle: Arc::new(StubDalle::new(sample_image(64, 64))),
	};

	Harness {
		server: TestServer::new(router(state)).unwrap(),
		posts,
		images,
	}
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
	haystack.windows(needle.len()).filter(|w| w == &needle).count()
}

#[tokio::test]
async fn get_posts_on_empty_store_returns_empty_array() {
	let harness = harness();

	let response = harness.server.get("/posts").await;

	assert_eq!(response.status_code(), StatusCode::OK);
	assert!(response.json::<Vec<Post>>().is_empty());
}

#[tokio::test]
async fn create_post_hosts_photo_and_derives_both_variants() {
	let harness = harness();

	let response = harness
		.server
		.post("/posts")
		.json(&json!({
			"name": "Ada",
			"prompt": "a red bicycle",
			"photo": storage::encode_inline("png", &sample_image(1200, 800)),
		}))
		.await;

	assert_eq!(response.status_code(), StatusCode::CREATED);

	let post: Post = response.json();
	assert_eq!(post.name, "Ada");
	assert_eq!(post.prompt, "a red bicycle");
	assert!(post.photo.contains(GALLERY_FOLDER));
	assert!(post.thumbnail.contains(THUMBNAILS_FOLDER));
	assert!(post.low_res.contains(LOWRES_FOLDER));

	// The thumbnail is a 150-longest-edge webp derived from the same photo.
	let thumbnail = harness.images.contents_of(&post.thumbnail).unwrap();
	assert_eq!(
		image::guess_format(&thumbnail).unwrap(),
		image::ImageFormat::WebP
	);
	let decoded = image::load_from_memory(&thumbnail).unwrap();
	assert_eq!((decoded.width(), decoded.height()), (150, 100));

	// The low-res preview fits within 300x300 as jpeg.
	let low_res = harness.images.contents_of(&post.low_res).unwrap();
	assert_eq!(
		image::guess_format(&low_res).unwrap(),
		image::ImageFormat::Jpeg
	);
	let decoded = image::load_from_memory(&low_res).unwrap();
	assert_eq!((decoded.width(), decoded.height()), (300, 200));

	// The hosted original is intact.
	assert!(!harness
		.images
		.contents_of(&post.photo)
		.unwrap()
		.is_empty());
}

#[tokio::test]
async fn create_post_rejects_empty_name_before_any_upload() {
	let harness = harness();

	let response = harness
		.server
		.post("/posts")
		.json(&json!({
			"name": "",
			"prompt": "a red bicycle",
			"photo": storage::encode_inline("png", &sample_image(64, 64)),
		}))
		.await;

	assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
	assert!(harness.images.list(GALLERY_FOLDER).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_post_rejects_undecodable_photo() {
	let harness = harness();

	let response = harness
		.server
		.post("/posts")
		.json(&json!({
			"name": "Ada",
			"prompt": "a red bicycle",
			"photo": "data:image/png;base64,@@not-base64@@",
		}))
		.await;

	assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_pipeline_persists_no_partial_post() {
	let harness = harness();
	harness.images.reject_uploads(THUMBNAILS_FOLDER);

	let response = harness
		.server
		.post("/posts")
		.json(&json!({
			"name": "Ada",
			"prompt": "a red bicycle",
			"photo": storage::encode_inline("png", &sample_image(640, 480)),
		}))
		.await;

	assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(harness.posts.all().await.unwrap().is_empty());
}

async fn seed_post_without_derivatives(harness: &Harness, width: u32, height: u32) -> Post {
	let photo = harness
		.images
		.upload(GALLERY_FOLDER, sample_image(width, height).into(), "png")
		.await
		.unwrap();

	harness
		.posts
		.insert(NewPost {
			name: "Ada".into(),
			prompt: "a red bicycle".into(),
			photo: photo.url,
			thumbnail: String::new(),
			low_res: String::new(),
		})
		.await
		.unwrap()
}

#[tokio::test]
async fn backfill_fills_missing_derivatives_and_is_idempotent() {
	let harness = harness();
	seed_post_without_derivatives(&harness, 1200, 800).await;
	seed_post_without_derivatives(&harness, 400, 400).await;

	let response = harness.server.get("/posts/backfill").await;
	assert_eq!(response.status_code(), StatusCode::OK);

	let updated: Vec<Post> = response.json();
	assert_eq!(updated.len(), 2);
	assert!(updated.iter().all(Post::has_derivatives));

	// Every stored post is now populated, so further runs change nothing.
	for _ in 0..2 {
		let response = harness.server.get("/posts/backfill").await;
		assert_eq!(response.status_code(), StatusCode::OK);
		assert!(response.json::<Vec<Post>>().is_empty());
	}
}

#[tokio::test]
async fn backfill_skips_posts_whose_photo_cannot_be_fetched() {
	let harness = harness();
	let good = seed_post_without_derivatives(&harness, 640, 480).await;
	let broken = seed_post_without_derivatives(&harness, 640, 480).await;
	harness.images.break_download(&broken.photo);

	let updated: Vec<Post> = harness.server.get("/posts/backfill").await.json();

	assert_eq!(updated.len(), 1);
	assert_eq!(updated[0].id, good.id);

	// The broken post is untouched and will be retried next run.
	let missing = harness.posts.missing_derivatives().await.unwrap();
	assert_eq!(missing.len(), 1);
	assert_eq!(missing[0].id, broken.id);
}

#[tokio::test]
async fn export_archives_every_fetchable_original() {
	let harness = harness();

	let mut hosted = Vec::new();
	for _ in 0..3 {
		hosted.push(
			harness
				.images
				.upload(GALLERY_FOLDER, sample_image(64, 64).into(), "png")
				.await
				.unwrap(),
		);
	}
	harness.images.break_download(&hosted[1].url);

	let response = harness.server.get("/posts/export").await;
	assert_eq!(response.status_code(), StatusCode::OK);
	assert!(response
		.header(header::CONTENT_DISPOSITION)
		.to_str()
		.unwrap()
		.contains("dalle-images.zip"));

	let body = response.into_bytes();

	// One central-directory entry per fetchable resource, none for the
	// broken one, and a finalized end-of-central-directory trailer.
	assert_eq!(count_occurrences(&body, b"PK\x01\x02"), 2);
	assert_eq!(count_occurrences(&body, b"PK\x05\x06"), 1);
	assert_eq!(
		count_occurrences(&body, hosted[0].archive_name().as_bytes()),
		2 // local header + central directory
	);
	assert_eq!(
		count_occurrences(&body, hosted[1].archive_name().as_bytes()),
		0
	);
}

#[tokio::test]
async fn export_deflates_entries_rather_than_storing_them() {
	let harness = harness();

	// Highly compressible payload; a stored (or lightly compressed) entry
	// would dominate the body size.
	harness
		.images
		.upload(GALLERY_FOLDER, vec![0u8; 64 * 1024].into(), "png")
		.await
		.unwrap();

	let body = harness.server.get("/posts/export").await.into_bytes();

	assert_eq!(count_occurrences(&body, b"PK\x01\x02"), 1);
	assert!(body.len() < 4 * 1024, "archive is {} bytes", body.len());
}

#[tokio::test]
async fn generate_returns_inline_encoded_image() {
	let harness = harness();

	let response = harness
		.server
		.post("/generate")
		.json(&json!({ "prompt": "a red bicycle" }))
		.await;

	assert_eq!(response.status_code(), StatusCode::OK);

	let body: serde_json::Value = response.json();
	let photo = body["photo"].as_str().unwrap();
	assert!(photo.starts_with("data:image/png;base64,"));

	let bytes = storage::decode_inline(photo).unwrap();
	let decoded = image::load_from_memory(&bytes).unwrap();
	assert_eq!((decoded.width(), decoded.height()), (64, 64));
}

#[tokio::test]
async fn generate_rejects_empty_prompt() {
	let harness = harness();

	let response = harness
		.server
		.post("/generate")
		.json(&json!({ "prompt": "" }))
		.await;

	assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
