use chrono::{DateTime, Utc};
use funtodo_core::{Task, TaskId};
use sqlx::{sqlite::SqliteRow, Row};

use crate::errors::ClientError;

/// SQL for the client's durable storage: the full task list and the active
/// user id. Both tables are overwritten wholesale rather than patched.
pub struct Queries;

impl Queries {
    pub const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS user_config (
            user_id TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            date TEXT,
            is_done INTEGER NOT NULL DEFAULT 0,
            group_index INTEGER NOT NULL DEFAULT 0
        );
    "#;

    pub const GET_USER_ID: &'static str = "SELECT user_id FROM user_config LIMIT 1";

    pub const INSERT_USER_ID: &'static str = "INSERT INTO user_config (user_id) VALUES (?1)";

    pub const CLEAR_USER_ID: &'static str = "DELETE FROM user_config";

    pub const LIST_TASKS: &'static str = r#"
        SELECT id, name, description, date, is_done, group_index
        FROM tasks
        ORDER BY rowid ASC
    "#;

    pub const INSERT_TASK: &'static str = r#"
        INSERT INTO tasks (id, name, description, date, is_done, group_index)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    "#;

    pub const CLEAR_TASKS: &'static str = "DELETE FROM tasks";
}

/// Parse a task from a storage row. Stored dates are RFC 3339 strings; a
/// corrupt one surfaces as a `DateParse` error so the caller can discard the
/// whole snapshot, which is the load-failure contract.
pub fn parse_task(row: &SqliteRow) -> Result<Task, ClientError> {
    let id: String = row.get("id");
    let name: String = row.get("name");
    let description: String = row.get("description");
    let date: Option<String> = row.get("date");
    let is_done: bool = row.get("is_done");
    let group_index: i64 = row.get("group_index");

    let date = date
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc))
        })
        .transpose()?;

    Ok(Task {
        id: TaskId::from(id),
        name,
        description,
        date,
        is_done,
        group_index: group_index as u32,
    })
}
