use aide::{openapi::Tag, transform::TransformOpenApi};

use crate::{
	error::{ErrorResponse, Message},
	extract::Json,
};

pub mod tag {
	pub const POST: &str = "Post";
	pub const DALLE: &str = "Dalle";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Dalle Gallery API")
		.summary("Community image-sharing gallery over a text-to-image service")
		.description(
			"Publish generated images with a display name, browse every \
			 published post, and bulk-download the hosted originals.",
		)
		.tag(Tag {
			name: tag::POST.into(),
			description: Some("Post publishing, listing, export and maintenance".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::DALLE.into(),
			description: Some("Image generation".into()),
			..Default::default()
		})
		.default_response_with::<Json<ErrorResponse>, _>(|res| {
			res.example(ErrorResponse {
				success: false,
				errors: Message::new("error message")
					.field("optional field")
					.into_vec(),
			})
		})
}
