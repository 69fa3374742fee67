use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::model::Post;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),
	#[error("unknown post {0}")]
	UnknownPost(Uuid),
}

/// Fields of a post that the caller provides; the store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone)]
pub struct NewPost {
	pub name: String,
	pub prompt: String,
	pub photo: String,
	pub thumbnail: String,
	pub low_res: String,
}

/// Durable record of posts. Everything depends on it; it depends on nothing.
#[axum::async_trait]
pub trait PostStore: Send + Sync {
	/// All posts, newest first.
	async fn all(&self) -> Result<Vec<Post>, StoreError>;

	/// Persist a new post, returning it with `id` and `created_at` assigned.
	async fn insert(&self, post: NewPost) -> Result<Post, StoreError>;

	/// Posts whose `thumbnail` or `low_res` has not been derived yet.
	async fn missing_derivatives(&self) -> Result<Vec<Post>, StoreError>;

	/// Overwrite the derived URIs of an existing post.
	async fn set_derivatives(
		&self,
		id: Uuid,
		thumbnail: &str,
		low_res: &str,
	) -> Result<Post, StoreError>;
}

const COLUMNS: &str = "id, name, prompt, photo, thumbnail, low_res, created_at";

/// Postgres-backed [`PostStore`].
pub struct PgStore {
	pool: sqlx::PgPool,
}

impl PgStore {
	/// Connect and run any pending migrations.
	pub async fn connect(url: &str) -> Result<Self, StoreError> {
		let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;

		sqlx::migrate!().run(&pool).await?;

		Ok(Self { pool })
	}
}

#[axum::async_trait]
impl PostStore for PgStore {
	async fn all(&self) -> Result<Vec<Post>, StoreError> {
		let posts = sqlx::query_as::<_, Post>(&format!(
			"SELECT {COLUMNS} FROM post ORDER BY created_at DESC"
		))
		.fetch_all(&self.pool)
		.await?;

		Ok(posts)
	}

	async fn insert(&self, post: NewPost) -> Result<Post, StoreError> {
		let post = sqlx::query_as::<_, Post>(&format!(
			"INSERT INTO post (name, prompt, photo, thumbnail, low_res)
			 VALUES ($1, $2, $3, $4, $5)
			 RETURNING {COLUMNS}"
		))
		.bind(&post.name)
		.bind(&post.prompt)
		.bind(&post.photo)
		.bind(&post.thumbnail)
		.bind(&post.low_res)
		.fetch_one(&self.pool)
		.await?;

		Ok(post)
	}

	async fn missing_derivatives(&self) -> Result<Vec<Post>, StoreError> {
		let posts = sqlx::query_as::<_, Post>(&format!(
			"SELECT {COLUMNS} FROM post
			 WHERE thumbnail = '' OR low_res = ''
			 ORDER BY created_at"
		))
		.fetch_all(&self.pool)
		.await?;

		Ok(posts)
	}

	async fn set_derivatives(
		&self,
		id: Uuid,
		thumbnail: &str,
		low_res: &str,
	) -> Result<Post, StoreError> {
		let post = sqlx::query_as::<_, Post>(&format!(
			"UPDATE post SET thumbnail = $2, low_res = $3
			 WHERE id = $1
			 RETURNING {COLUMNS}"
		))
		.bind(id)
		.bind(thumbnail)
		.bind(low_res)
		.fetch_optional(&self.pool)
		.await?;

		post.ok_or(StoreError::UnknownPost(id))
	}
}
