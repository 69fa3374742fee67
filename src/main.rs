use std::sync::Arc;

use dalle_gallery::{
	config::Config, dalle::DalleClient, router, storage::HttpObjectStore, store::PgStore, State,
};
use tower_http::{
	cors::CorsLayer,
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(tracing_subscriber::fmt::layer().with_ansi(true))
		.init();

	let config = Config::from_env();

	let store = PgStore::connect(&config.database_url)
		.await
		.expect("failed to connect to database");

	let state = State {
		posts: Arc::new(store),
		images: Arc::new(HttpObjectStore::new(&config.storage)),
		dalle: Arc::new(DalleClient::new(&config.dalle)),
	};

	let cors = CorsLayer::new()
		.allow_origin(config.allowed_origins.clone())
		.allow_methods([axum::http::Method::GET, axum::http::Method::POST])
		.allow_headers([axum::http::header::CONTENT_TYPE]);

	let app = router(state)
		.layer(cors)
		.layer(TraceLayer::new_for_http());

	let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
		.await
		.expect("failed to bind to port");

	tracing::info!("listening on port {}", config.port);

	axum::serve(listener, app).await.unwrap();
}
