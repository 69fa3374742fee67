//! The image-derivative pipeline.
//!
//! Given a full-resolution image already hosted at a stable URI, this module
//! produces exactly two derived images and hosts them under deterministic
//! folders:
//!
//! | Derivative | Size | Treatment | Encoding |
//! |---|---|---|---|
//! | micro-thumbnail | longer edge 150px | gaussian blur, sigma 10 | webp, quality 80 |
//! | low-res preview | fits within 300×300 | none | jpeg, quality 80 |
//!
//! The thumbnail is a cheap, content-obscuring placeholder; the preview is a
//! recognizable stand-in shown before the full image is needed.

use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use std::io::Cursor;

use crate::{
	storage::{StorageError, StoredImage, LOWRES_FOLDER, THUMBNAILS_FOLDER},
	Images,
};

/// Longer edge of the micro-thumbnail.
pub const THUMBNAIL_EDGE: u32 = 150;
/// Gaussian blur sigma applied to the micro-thumbnail.
pub const THUMBNAIL_BLUR_SIGMA: f32 = 10.0;
/// Bounding box of the low-res preview.
pub const PREVIEW_BOUNDS: u32 = 300;
/// Lossy encoding quality for both derivatives.
pub const ENCODE_QUALITY: u8 = 80;

#[derive(Debug, thiserror::Error)]
pub enum DerivativeError {
	#[error("image processing failed: {0}")]
	Image(#[from] image::ImageError),
	#[error("object storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("image task aborted: {0}")]
	Task(#[from] tokio::task::JoinError),
}

/// The hosted locations of both derivatives of one source image.
#[derive(Debug, Clone)]
pub struct Derived {
	pub thumbnail: StoredImage,
	pub low_res: StoredImage,
}

/// Resize so the longer edge is [`THUMBNAIL_EDGE`], blur heavily and encode
/// as lossy webp.
pub fn micro_thumbnail(source: &[u8]) -> Result<Vec<u8>, DerivativeError> {
	let image = image::load_from_memory(source)?;
	let small = image.resize(THUMBNAIL_EDGE, THUMBNAIL_EDGE, FilterType::Lanczos3);
	let blurred = small.blur(THUMBNAIL_BLUR_SIGMA).to_rgb8();

	let encoder = webp::Encoder::from_rgb(blurred.as_raw(), blurred.width(), blurred.height());
	Ok(encoder.encode(f32::from(ENCODE_QUALITY)).to_vec())
}

/// Resize to fit within [`PREVIEW_BOUNDS`] squared, preserving aspect ratio,
/// and encode as jpeg.
pub fn low_res_preview(source: &[u8]) -> Result<Vec<u8>, DerivativeError> {
	let image = image::load_from_memory(source)?;
	let resized = image.resize(PREVIEW_BOUNDS, PREVIEW_BOUNDS, FilterType::Lanczos3);

	let mut buffer = Cursor::new(Vec::new());
	let encoder = JpegEncoder::new_with_quality(&mut buffer, ENCODE_QUALITY);
	DynamicImage::ImageRgb8(resized.to_rgb8()).write_with_encoder(encoder)?;

	Ok(buffer.into_inner())
}

/// Orchestrates derivation and hosting for one source image.
pub struct Pipeline {
	images: Images,
}

impl Pipeline {
	pub fn new(images: Images) -> Self {
		Self { images }
	}

	/// Fetch the hosted source image and derive both variants from it.
	pub async fn derive_from_url(&self, photo_url: &str) -> Result<Derived, DerivativeError> {
		let source = self.images.download(photo_url).await?;
		self.derive(source).await
	}

	/// Derive both variants from source bytes and host them.
	///
	/// The destination folders are provisioned idempotently first, so any
	/// real provisioning failure aborts before encoding work starts.
	pub async fn derive(&self, source: Bytes) -> Result<Derived, DerivativeError> {
		self.images.ensure_folder(THUMBNAILS_FOLDER).await?;
		self.images.ensure_folder(LOWRES_FOLDER).await?;

		// Decode and encode are CPU-bound; keep them off the runtime threads.
		let (thumbnail, preview) = tokio::task::spawn_blocking(move || {
			Ok::<_, DerivativeError>((micro_thumbnail(&source)?, low_res_preview(&source)?))
		})
		.await??;

		let thumbnail = self
			.images
			.upload(THUMBNAILS_FOLDER, thumbnail.into(), "webp")
			.await?;
		let low_res = self
			.images
			.upload(LOWRES_FOLDER, preview.into(), "jpg")
			.await?;

		Ok(Derived { thumbnail, low_res })
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use super::*;
	use crate::storage::{ObjectStore, Provisioned};
	use crate::test_support::{sample_image, MemoryObjectStore};
	use image::ImageFormat;

	#[test]
	fn thumbnail_caps_longer_edge_and_blurs_to_webp() {
		let thumbnail = micro_thumbnail(&sample_image(1200, 800)).unwrap();

		assert_eq!(image::guess_format(&thumbnail).unwrap(), ImageFormat::WebP);

		let decoded = image::load_from_memory(&thumbnail).unwrap();
		assert_eq!((decoded.width(), decoded.height()), (150, 100));
	}

	#[test]
	fn thumbnail_handles_portrait_sources() {
		let thumbnail = micro_thumbnail(&sample_image(800, 1200)).unwrap();

		let decoded = image::load_from_memory(&thumbnail).unwrap();
		assert_eq!((decoded.width(), decoded.height()), (100, 150));
	}

	#[test]
	fn preview_fits_bounds_as_jpeg() {
		let preview = low_res_preview(&sample_image(1200, 800)).unwrap();

		assert_eq!(image::guess_format(&preview).unwrap(), ImageFormat::Jpeg);

		let decoded = image::load_from_memory(&preview).unwrap();
		assert_eq!((decoded.width(), decoded.height()), (300, 200));
	}

	#[test]
	fn undecodable_source_is_rejected() {
		assert!(matches!(
			micro_thumbnail(b"definitely not an image"),
			Err(DerivativeError::Image(..))
		));
	}

	#[tokio::test]
	async fn pipeline_hosts_both_derivatives_under_their_folders() {
		let images = Arc::new(MemoryObjectStore::new());
		let pipeline = Pipeline::new(images.clone());

		let derived = pipeline.derive(sample_image(640, 480).into()).await.unwrap();

		assert!(derived.thumbnail.public_id.starts_with(THUMBNAILS_FOLDER));
		assert!(derived.low_res.public_id.starts_with(LOWRES_FOLDER));

		// Folders already exist for the second run; that is not an error.
		assert_eq!(
			images.ensure_folder(THUMBNAILS_FOLDER).await.unwrap(),
			Provisioned::AlreadyExists
		);
		pipeline.derive(sample_image(640, 480).into()).await.unwrap();
	}
}
