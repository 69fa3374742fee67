//! Streamed zip export of every hosted original.
//!
//! The archive is written into one end of an in-process pipe while the
//! response body streams the other end, so memory stays bounded by one
//! in-flight image plus the pipe buffer regardless of how many images are
//! hosted. Entries are deflated at maximum compression; downloads trade
//! encoding time for size.

use async_zip::{
	error::ZipError, tokio::write::ZipFileWriter, Compression, DeflateOption, ZipEntryBuilder,
};
use axum::{
	body::Body,
	http::{header, HeaderValue, Response},
	response::IntoResponse,
};
use tokio::io::DuplexStream;
use tokio_util::io::ReaderStream;

use crate::{storage::StoredImage, Images};

/// Downloaded filename of the export archive.
pub const ARCHIVE_NAME: &str = "dalle-images.zip";

const PIPE_BUFFER: usize = 64 * 1024;

/// A streamed zip response served as a downloadable attachment.
pub struct ZipAttachment(pub Body);

impl IntoResponse for ZipAttachment {
	fn into_response(self) -> Response<Body> {
		(
			[
				(
					header::CONTENT_TYPE,
					HeaderValue::from_static("application/zip"),
				),
				(
					header::CONTENT_DISPOSITION,
					HeaderValue::from_static("attachment; filename=\"dalle-images.zip\""),
				),
			],
			self.0,
		)
			.into_response()
	}
}

impl aide::OperationOutput for ZipAttachment {
	type Inner = Vec<u8>;
}

/// Start archiving `resources` in the background and return the body that
/// streams the archive as it is built.
pub fn stream(images: Images, resources: Vec<StoredImage>) -> ZipAttachment {
	let (writer, reader) = tokio::io::duplex(PIPE_BUFFER);

	tokio::spawn(async move {
		// A write error here usually means the client went away; the
		// archive itself never aborts over a single bad resource.
		if let Err(error) = write_archive(&images, resources, writer).await {
			tracing::error!(%error, "zip export aborted");
		}
	});

	ZipAttachment(Body::from_stream(ReaderStream::new(reader)))
}

async fn write_archive(
	images: &Images,
	resources: Vec<StoredImage>,
	writer: DuplexStream,
) -> Result<(), ZipError> {
	let mut archive = ZipFileWriter::with_tokio(writer);

	for resource in resources {
		let bytes = match images.download(&resource.url).await {
			Ok(bytes) => bytes,
			Err(error) => {
				tracing::warn!(
					resource = %resource.public_id,
					%error,
					"skipping unfetchable resource in export"
				);
				continue;
			}
		};

		let entry = ZipEntryBuilder::new(resource.archive_name().into(), Compression::Deflate)
			.deflate_option(DeflateOption::Maximum);
		archive.write_entry_whole(entry, &bytes).await?;
	}

	// The trailer is only written once every resource has been attempted.
	archive.close().await?;
	Ok(())
}
