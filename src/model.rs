use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single published post.
///
/// Wire names are camelCase (`lowRes`, `createdAt`) to match the gallery
/// client's contract. An empty `thumbnail` or `low_res` means "not yet
/// derived"; the backfill operation fills them in.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
	/// The unique identifier of the post.
	pub id: Uuid,
	/// Display name of the person who published the post.
	pub name: String,
	/// The prompt the image was generated from.
	pub prompt: String,
	/// Hosted URI of the full-resolution image. Immutable once set.
	pub photo: String,
	/// Hosted URI of the blurred micro-thumbnail (webp), or `""`.
	pub thumbnail: String,
	/// Hosted URI of the medium-quality preview (jpeg), or `""`.
	pub low_res: String,
	/// The creation time of the post.
	pub created_at: DateTime<Utc>,
}

impl Post {
	/// Whether both derived images have been computed and hosted.
	pub fn has_derivatives(&self) -> bool {
		!self.thumbnail.is_empty() && !self.low_res.is_empty()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn post() -> Post {
		Post {
			id: Uuid::new_v4(),
			name: "Ada".into(),
			prompt: "a red bicycle".into(),
			photo: "https://img.example/dalle/one.png".into(),
			thumbnail: String::new(),
			low_res: String::new(),
			created_at: Utc::now(),
		}
	}

	#[test]
	fn derivatives_require_both_fields() {
		let mut post = post();
		assert!(!post.has_derivatives());

		post.thumbnail = "https://img.example/dalle/thumbnails/one.webp".into();
		assert!(!post.has_derivatives());

		post.low_res = "https://img.example/dalle/lowres/one.jpg".into();
		assert!(post.has_derivatives());
	}

	#[test]
	fn wire_names_are_camel_case() {
		let value = serde_json::to_value(post()).unwrap();

		assert!(value.get("lowRes").is_some());
		assert!(value.get("createdAt").is_some());
		assert!(value.get("low_res").is_none());
	}
}
