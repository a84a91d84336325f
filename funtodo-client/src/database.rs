use funtodo_core::Task;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};

use crate::errors::ClientResult;
use crate::queries::{parse_task, Queries};

/// Durable client-side storage for the task list and the active user id.
///
/// This is best-effort storage from the store's point of view: the store
/// logs and swallows failures here, so methods report errors honestly and
/// leave the policy to the caller.
#[derive(Clone)]
pub struct ClientDatabase {
    pub(crate) pool: SqlitePool,
}

impl ClientDatabase {
    /// Open (or create) the local database. A single connection: this is one
    /// user's local copy, and it keeps `sqlite::memory:` databases coherent
    /// under test.
    pub async fn new(database_url: &str) -> ClientResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> ClientResult<()> {
        sqlx::query(Queries::SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Overwrite the stored task list with the given one, atomically.
    pub async fn save_tasks(&self, tasks: &[Task]) -> ClientResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(Queries::CLEAR_TASKS).execute(&mut *tx).await?;
        for task in tasks {
            sqlx::query(Queries::INSERT_TASK)
                .bind(task.id.as_str())
                .bind(&task.name)
                .bind(&task.description)
                .bind(task.date.map(|d| d.to_rfc3339()))
                .bind(task.is_done)
                .bind(task.group_index as i64)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// The stored task list; empty if nothing has been saved yet.
    pub async fn load_tasks(&self) -> ClientResult<Vec<Task>> {
        let rows = sqlx::query(Queries::LIST_TASKS)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(parse_task).collect()
    }

    pub async fn save_user_id(&self, user_id: &str) -> ClientResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(Queries::CLEAR_USER_ID).execute(&mut *tx).await?;
        sqlx::query(Queries::INSERT_USER_ID)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn load_user_id(&self) -> ClientResult<Option<String>> {
        let row = sqlx::query(Queries::GET_USER_ID)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("user_id")))
    }

    pub async fn clear_user_id(&self) -> ClientResult<()> {
        sqlx::query(Queries::CLEAR_USER_ID)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop the stored task list only; used after a successful merge into a
    /// server account.
    pub async fn clear_tasks(&self) -> ClientResult<()> {
        sqlx::query(Queries::CLEAR_TASKS).execute(&self.pool).await?;
        Ok(())
    }

    /// Remove both storage keys; the logout path.
    pub async fn clear_all(&self) -> ClientResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(Queries::CLEAR_TASKS).execute(&mut *tx).await?;
        sqlx::query(Queries::CLEAR_USER_ID).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
