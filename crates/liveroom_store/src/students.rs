#![forbid(unsafe_code)]

use chrono::Utc;
use liveroom_domain::UserId;

use crate::{Conn, StoreError};

/// Role lookup used for permission checks.
#[async_trait::async_trait]
pub trait StudentsRepo: Send + Sync {
	async fn is_user_id_a_student(&self, conn: &mut Conn, user_id: &UserId) -> Result<bool, StoreError>;

	async fn add_student(&self, conn: &mut Conn, user_id: &UserId) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteStudentsRepo;

#[async_trait::async_trait]
impl StudentsRepo for SqliteStudentsRepo {
	async fn is_user_id_a_student(&self, conn: &mut Conn, user_id: &UserId) -> Result<bool, StoreError> {
		let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM students WHERE student_id = ? AND deleted_at IS NULL")
			.bind(user_id.as_str())
			.fetch_optional(&mut *conn)
			.await?;
		Ok(row.is_some())
	}

	async fn add_student(&self, conn: &mut Conn, user_id: &UserId) -> Result<(), StoreError> {
		sqlx::query(
			"INSERT INTO students (student_id, created_at) VALUES (?, ?) \
			ON CONFLICT(student_id) DO UPDATE SET deleted_at = NULL",
		)
		.bind(user_id.as_str())
		.bind(Utc::now())
		.execute(&mut *conn)
		.await?;
		Ok(())
	}
}
