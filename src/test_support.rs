//! In-memory collaborators for tests.
//!
//! These mirror the contracts of the real Postgres store, the cloud image
//! host and the generation service closely enough for end-to-end route
//! tests, plus hooks to inject the failures the bulk operations must
//! tolerate.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{
	atomic::{AtomicU64, Ordering},
	Mutex,
};

use bytes::Bytes;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use uuid::Uuid;

use crate::dalle::{GenerateError, TextToImage};
use crate::model::Post;
use crate::storage::{ObjectStore, Provisioned, StorageError, StoredImage};
use crate::store::{NewPost, PostStore, StoreError};

/// PNG-encoded gradient image of the given dimensions.
pub fn sample_image(width: u32, height: u32) -> Vec<u8> {
	let image = RgbImage::from_fn(width, height, |x, y| {
		Rgb([(x % 256) as u8, (y % 256) as u8, 120])
	});

	let mut buffer = Cursor::new(Vec::new());
	DynamicImage::ImageRgb8(image)
		.write_to(&mut buffer, ImageFormat::Png)
		.expect("sample image encodes");

	buffer.into_inner()
}

/// In-memory [`PostStore`].
#[derive(Default)]
pub struct MemoryPostStore {
	posts: Mutex<Vec<Post>>,
}

impl MemoryPostStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[axum::async_trait]
impl PostStore for MemoryPostStore {
	async fn all(&self) -> Result<Vec<Post>, StoreError> {
		let mut posts = self.posts.lock().unwrap().clone();
		posts.reverse(); // newest first
		Ok(posts)
	}

	async fn insert(&self, post: NewPost) -> Result<Post, StoreError> {
		let post = Post {
			id: Uuid::new_v4(),
			name: post.name,
			prompt: post.prompt,
			photo: post.photo,
			thumbnail: post.thumbnail,
			low_res: post.low_res,
			created_at: Utc::now(),
		};

		self.posts.lock().unwrap().push(post.clone());
		Ok(post)
	}

	async fn missing_derivatives(&self) -> Result<Vec<Post>, StoreError> {
		Ok(self
			.posts
			.lock()
			.unwrap()
			.iter()
			.filter(|post| !post.has_derivatives())
			.cloned()
			.collect())
	}

	async fn set_derivatives(
		&self,
		id: Uuid,
		thumbnail: &str,
		low_res: &str,
	) -> Result<Post, StoreError> {
		let mut posts = self.posts.lock().unwrap();
		let post = posts
			.iter_mut()
			.find(|post| post.id == id)
			.ok_or(StoreError::UnknownPost(id))?;

		post.thumbnail = thumbnail.to_owned();
		post.low_res = low_res.to_owned();
		Ok(post.clone())
	}
}

/// In-memory [`ObjectStore`] with failure injection.
#[derive(Default)]
pub struct MemoryObjectStore {
	folders: Mutex<HashSet<String>>,
	resources: Mutex<HashMap<String, Vec<StoredImage>>>,
	contents: Mutex<HashMap<String, Bytes>>,
	broken_urls: Mutex<HashSet<String>>,
	rejected_folders: Mutex<HashSet<String>>,
	next_id: AtomicU64,
}

impl MemoryObjectStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make every download of `url` fail from now on.
	pub fn break_download(&self, url: &str) {
		self.broken_urls.lock().unwrap().insert(url.to_owned());
	}

	/// Make every upload into `folder` fail from now on.
	pub fn reject_uploads(&self, folder: &str) {
		self.rejected_folders.lock().unwrap().insert(folder.to_owned());
	}

	/// The hosted bytes behind a URL, if any.
	pub fn contents_of(&self, url: &str) -> Option<Bytes> {
		self.contents.lock().unwrap().get(url).cloned()
	}
}

#[axum::async_trait]
impl ObjectStore for MemoryObjectStore {
	async fn ensure_folder(&self, path: &str) -> Result<Provisioned, StorageError> {
		if self.folders.lock().unwrap().insert(path.to_owned()) {
			Ok(Provisioned::Created)
		} else {
			Ok(Provisioned::AlreadyExists)
		}
	}

	async fn upload(
		&self,
		folder: &str,
		bytes: Bytes,
		format: &str,
	) -> Result<StoredImage, StorageError> {
		if self.rejected_folders.lock().unwrap().contains(folder) {
			return Err(StorageError::Api {
				status: 500,
				message: format!("uploads into {folder} are rejected"),
			});
		}

		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let public_id = format!("{folder}/img-{id}");
		let image = StoredImage {
			url: format!("memory://{public_id}.{format}"),
			public_id,
			format: format.to_owned(),
		};

		self.contents
			.lock()
			.unwrap()
			.insert(image.url.clone(), bytes);
		self.resources
			.lock()
			.unwrap()
			.entry(folder.to_owned())
			.or_default()
			.push(image.clone());

		Ok(image)
	}

	async fn download(&self, url: &str) -> Result<Bytes, StorageError> {
		if self.broken_urls.lock().unwrap().contains(url) {
			return Err(StorageError::Api {
				status: 502,
				message: format!("{url} is unreachable"),
			});
		}

		self.contents_of(url)
			.ok_or_else(|| StorageError::NotFound(url.to_owned()))
	}

	async fn list(&self, folder: &str) -> Result<Vec<StoredImage>, StorageError> {
		Ok(self
			.resources
			.lock()
			.unwrap()
			.get(folder)
			.cloned()
			.unwrap_or_default())
	}
}

/// [`TextToImage`] stub returning fixed bytes.
pub struct StubDalle {
	image: Bytes,
}

impl StubDalle {
	pub fn new(image: Vec<u8>) -> Self {
		Self {
			image: image.into(),
		}
	}
}

#[axum::async_trait]
impl TextToImage for StubDalle {
	async fn generate(&self, _prompt: &str) -> Result<Bytes, GenerateError> {
		Ok(self.image.clone())
	}
}
