#![warn(clippy::pedantic)]

pub mod archive;
pub mod config;
pub mod dalle;
pub mod derivative;
pub mod error;
pub mod extract;
pub mod model;
pub mod openapi;
pub mod reveal;
pub mod route;
pub mod storage;
pub mod store;
pub mod test_support;

use std::sync::Arc;

use aide::{
	axum::{routing::get, ApiRouter},
	openapi::OpenApi,
};
use axum::{Extension, Router};

pub use error::AppError;

pub type Posts = Arc<dyn store::PostStore>;
pub type Images = Arc<dyn storage::ObjectStore>;
pub type Dalle = Arc<dyn dalle::TextToImage>;

pub type AppState = State;

/// The shared application state.
///
/// Each collaborator is held behind its trait so routes stay independent of
/// the production backends (Postgres, the cloud image host, the generation
/// service) and tests can swap in the in-memory versions.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub posts: Posts,
	pub images: Images,
	pub dalle: Dalle,
}

/// Assemble the full application router.
///
/// The OpenAPI document is generated once here and shared immutably behind
/// an [`Arc`] for the lifetime of the process.
pub fn router(state: State) -> Router {
	let mut api = OpenApi::default();

	ApiRouter::new()
		.nest("/posts", route::posts::routes())
		.nest("/generate", route::dalle::routes())
		.nest("/docs", route::docs::routes())
		.route("/", get(running))
		.with_state(state)
		.finish_api_with(&mut api, openapi::docs)
		.layer(Extension(Arc::new(api)))
}

/// Liveness probe.
async fn running() -> &'static str {
	"dalle-gallery backend is running"
}
