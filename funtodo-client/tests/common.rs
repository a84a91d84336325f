#![allow(dead_code)] // each test binary uses its own slice of these helpers

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use funtodo_client::{ClientDatabase, TaskGateway, TaskStore};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// A base URL nothing listens on; connections are refused immediately, which
/// is how tests simulate an unreachable server.
pub const UNREACHABLE: &str = "http://127.0.0.1:1";

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Creates a new in-memory test database with the schema applied.
pub async fn setup_test_db() -> ClientDatabase {
    let db = ClientDatabase::new("sqlite::memory:").await.unwrap();
    db.init_schema().await.unwrap();
    db
}

/// A store with no account and a server that cannot be reached.
pub async fn offline_store() -> TaskStore {
    let db = setup_test_db().await;
    let gateway = TaskGateway::new(UNREACHABLE).unwrap();
    let store = TaskStore::new(db, gateway);
    store.initialize().await;
    store
}

/// A store logged in as `user_id` against the given mock server.
pub async fn online_store(server: &MockServer, user_id: &str) -> TaskStore {
    let db = setup_test_db().await;
    let gateway = TaskGateway::new(server.base_url.clone()).unwrap();
    let store = TaskStore::new(db, gateway);
    store.initialize().await;
    store.set_user_id(Some(user_id.to_string())).await;
    store
}

#[derive(Default)]
struct ServerTasks {
    tasks: Vec<Value>,
    next_id: i64,
}

/// In-process stand-in for the task backend. Serves the five REST endpoints
/// the gateway speaks, assigns numeric row ids the way the real server does,
/// and lets tests inspect what reached it.
pub struct MockServer {
    pub base_url: String,
    state: Arc<Mutex<ServerTasks>>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(ServerTasks {
            tasks: Vec::new(),
            next_id: 1,
        }));

        let app = Router::new()
            .route("/tasks/create", post(create_task))
            .route("/tasks/getByUserId", get(list_tasks))
            .route("/tasks/update", put(update_task))
            .route("/tasks/delete", delete(remove_task))
            .route("/tasks/toggleIsDone", put(toggle_task))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    /// Pre-populate a task, returning its server id. `due_date` uses the
    /// server's `date` spelling and `isDone` completion flag so tests cover
    /// both wire dialects.
    pub fn seed_task(&self, title: &str, due_date: Option<&str>, is_done: bool) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.tasks.push(json!({
            "id": id,
            "title": title,
            "description": "",
            "date": due_date,
            "isDone": is_done,
        }));
        id
    }

    pub fn task_count(&self) -> usize {
        self.state.lock().unwrap().tasks.len()
    }

    /// Titles in the order the server received them.
    pub fn titles(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .iter()
            .map(|t| t["title"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn task_by_id(&self, id: i64) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .iter()
            .find(|t| t["id"] == json!(id))
            .cloned()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn create_task(
    State(state): State<Arc<Mutex<ServerTasks>>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if body.get("title").and_then(Value::as_str).is_none() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Title is required" })));
    }

    let mut state = state.lock().unwrap();
    let id = state.next_id;
    state.next_id += 1;

    let task = json!({
        "id": id,
        "title": body["title"],
        "description": body.get("description").cloned().unwrap_or(json!("")),
        "date": body.get("dueDate").cloned().unwrap_or(Value::Null),
        "completed": false,
    });
    state.tasks.push(task.clone());

    (StatusCode::CREATED, Json(json!({ "task": task })))
}

async fn list_tasks(
    State(state): State<Arc<Mutex<ServerTasks>>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !params.contains_key("userId") {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "userId is required" })));
    }
    let state = state.lock().unwrap();
    (StatusCode::OK, Json(json!({ "tasks": state.tasks })))
}

async fn update_task(
    State(state): State<Arc<Mutex<ServerTasks>>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let target = id_string(&body["taskId"]);
    let mut state = state.lock().unwrap();

    let Some(task) = state
        .tasks
        .iter_mut()
        .find(|t| id_string(&t["id"]) == target)
    else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Task not found" })));
    };

    if let Some(title) = body.get("title") {
        task["title"] = title.clone();
    }
    if let Some(description) = body.get("description") {
        task["description"] = description.clone();
    }
    if let Some(completed) = body.get("completed") {
        task["completed"] = completed.clone();
        task.as_object_mut().unwrap().remove("isDone");
    }
    if let Some(due_date) = body.get("dueDate") {
        task["date"] = due_date.clone();
    }

    (StatusCode::OK, Json(json!({ "task": task })))
}

async fn remove_task(
    State(state): State<Arc<Mutex<ServerTasks>>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let target = id_string(&body["taskId"]);
    let mut state = state.lock().unwrap();

    let before = state.tasks.len();
    state.tasks.retain(|t| id_string(&t["id"]) != target);
    if state.tasks.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Task not found" })));
    }

    (StatusCode::OK, Json(json!({ "message": "Task deleted successfully" })))
}

async fn toggle_task(
    State(state): State<Arc<Mutex<ServerTasks>>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let target = id_string(&body["taskId"]);
    let mut state = state.lock().unwrap();

    let Some(task) = state
        .tasks
        .iter_mut()
        .find(|t| id_string(&t["id"]) == target)
    else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Task not found" })));
    };

    let flag = task
        .get("completed")
        .or_else(|| task.get("isDone"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    task["completed"] = json!(!flag);
    task.as_object_mut().unwrap().remove("isDone");

    (StatusCode::OK, Json(json!({ "task": task })))
}
