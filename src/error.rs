use std::borrow::Cow;

use axum::{
	body::Body,
	extract::rejection::JsonRejection,
	http::{Response, StatusCode},
	response::IntoResponse,
	Json,
};
use schemars::JsonSchema;
use serde::Serialize;

pub type Map = serde_json::Map<String, serde_json::Value>;

/// Application-wide error type.
///
/// The Display output is logged, never sent to the client, so it can carry
/// detail about external dependencies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("json error: {0}")]
	Json(#[from] JsonRejection),
	#[error("store error: {0}")]
	Store(#[from] crate::store::StoreError),
	#[error("object storage error: {0}")]
	Storage(#[from] crate::storage::StorageError),
	#[error("derivative pipeline error: {0}")]
	Derivative(#[from] crate::derivative::DerivativeError),
	#[error("image generation error: {0}")]
	Generation(#[from] crate::dalle::GenerateError),
}

impl AppError {
	fn status(&self) -> StatusCode {
		match self {
			Self::Validation(..) | Self::Json(..) => StatusCode::BAD_REQUEST,
			Self::Store(..) | Self::Storage(..) | Self::Derivative(..) | Self::Generation(..) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	fn messages(&self) -> Vec<Message<'static>> {
		match self {
			Self::Validation(validation) => {
				let mut messages = Vec::new();

				for (field, errors) in validation.field_errors() {
					for error in errors {
						messages.push(Message::new(error.code.to_string()).field(field.to_string()));
					}
				}

				messages
			}
			Self::Json(rejection) => Message::new(rejection.to_string()).into_vec(),
			// Dependency failures are reported once, generically; the detail
			// stays in the logs.
			_ => Message::new("internal server error").into_vec(),
		}
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		let status = self.status();

		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		}

		(
			status,
			Json(ErrorResponse {
				success: false,
				errors: self.messages(),
			}),
		)
			.into_response()
	}
}

impl aide::OperationOutput for AppError {
	type Inner = ErrorResponse;
}

/// A single error message presented to the client.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Message<'m> {
	/// Human-readable (or machine-matchable) error content.
	pub content: Cow<'m, str>,
	/// The input field the error refers to, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'m, str>>,
	/// Additional structured context.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Map>,
}

impl<'m> Message<'m> {
	pub fn new(content: impl Into<Cow<'m, str>>) -> Self {
		Self {
			content: content.into(),
			field: None,
			details: None,
		}
	}

	pub fn field(mut self, field: impl Into<Cow<'m, str>>) -> Self {
		self.field = Some(field.into());
		self
	}

	pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.details
			.get_or_insert_with(Map::new)
			.insert(key.into(), value.into());
		self
	}

	pub fn into_vec(self) -> Vec<Self> {
		vec![self]
	}
}

/// The JSON body sent with every error response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse {
	pub success: bool,
	pub errors: Vec<Message<'static>>,
}

/// The response shape of a route-specific error.
///
/// Implemented by every per-route error enum so [`RouteError`] can turn it
/// into a response without knowing the route.
pub trait ErrorShape: Sized {
	fn status(&self) -> StatusCode;
	fn into_errors(self) -> Vec<Message<'static>>;
}

/// Either an application-wide error or a route-specific one.
///
/// Routes alias this with their own error type, e.g.
/// `type RouteError = error::RouteError<Error>;`, and convert with `?`.
#[derive(Debug)]
pub enum RouteError<E> {
	App(AppError),
	Route(E),
}

impl<E> From<AppError> for RouteError<E> {
	fn from(error: AppError) -> Self {
		Self::App(error)
	}
}

macro_rules! route_error_from {
	($($source:ty),+ $(,)?) => {$(
		impl<E> From<$source> for RouteError<E> {
			fn from(error: $source) -> Self {
				Self::App(AppError::from(error))
			}
		}
	)+};
}

route_error_from!(
	validator::ValidationErrors,
	JsonRejection,
	crate::store::StoreError,
	crate::storage::StorageError,
	crate::derivative::DerivativeError,
	crate::dalle::GenerateError,
);

impl<E: ErrorShape> IntoResponse for RouteError<E> {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::App(error) => error.into_response(),
			Self::Route(error) => (
				error.status(),
				Json(ErrorResponse {
					success: false,
					errors: error.into_errors(),
				}),
			)
				.into_response(),
		}
	}
}

impl<E> aide::OperationOutput for RouteError<E> {
	type Inner = ErrorResponse;
}
