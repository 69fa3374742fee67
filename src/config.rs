use std::env;
use std::fmt::Display;
use std::str::FromStr;

use axum::http::HeaderValue;

/// Process configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
	pub port: u16,
	pub database_url: String,
	/// Origins allowed by CORS.
	pub allowed_origins: Vec<HeaderValue>,
	pub storage: StorageConfig,
	pub dalle: DalleConfig,
}

/// Credentials of the cloud image host.
#[derive(Debug, Clone)]
pub struct StorageConfig {
	pub cloud_name: String,
	pub api_key: String,
	pub api_secret: String,
}

/// Endpoint and key of the text-to-image service.
#[derive(Debug, Clone)]
pub struct DalleConfig {
	pub api_url: String,
	pub api_key: String,
}

impl Config {
	/// Read every setting. Panics on missing required values or malformed
	/// numbers; there is no sensible way to serve without them.
	pub fn from_env() -> Self {
		Self {
			port: parsed("PORT", 8080),
			database_url: required("DATABASE_URL"),
			allowed_origins: origins(&fallback("ALLOWED_ORIGINS", "http://localhost:5173")),
			storage: StorageConfig {
				cloud_name: required("CLOUDINARY_CLOUD_NAME"),
				api_key: required("CLOUDINARY_API_KEY"),
				api_secret: required("CLOUDINARY_API_SECRET"),
			},
			dalle: DalleConfig {
				api_url: fallback(
					"OPENAI_IMAGE_URL",
					"https://api.openai.com/v1/images/generations",
				),
				api_key: required("OPENAI_API_KEY"),
			},
		}
	}
}

fn required(key: &str) -> String {
	env::var(key).unwrap_or_else(|_| panic!("{key} must be set"))
}

fn fallback(key: &str, default: &str) -> String {
	env::var(key).unwrap_or_else(|_| {
		tracing::info!("{key} not set, using default: {default}");
		default.to_owned()
	})
}

fn parsed<T: FromStr>(key: &str, default: T) -> T
where
	T::Err: Display,
{
	match env::var(key) {
		Ok(value) => value
			.parse()
			.unwrap_or_else(|e| panic!("{key} is malformed: {e}")),
		Err(_) => default,
	}
}

fn origins(list: &str) -> Vec<HeaderValue> {
	list.split(',')
		.map(str::trim)
		.filter(|origin| !origin.is_empty())
		.map(|origin| {
			origin
				.parse()
				.unwrap_or_else(|_| panic!("ALLOWED_ORIGINS contains an invalid origin: {origin}"))
		})
		.collect()
}

#[cfg(test)]
mod test {
	use super::origins;

	#[test]
	fn origins_split_and_trim() {
		let parsed = origins("http://localhost:5173, https://dalle3.vercel.app,");

		assert_eq!(parsed.len(), 2);
		assert_eq!(parsed[0], "http://localhost:5173");
		assert_eq!(parsed[1], "https://dalle3.vercel.app");
	}
}
