pub mod applier;
pub mod database;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod queries;
pub mod store;

pub use applier::{apply_actions, ActionBatch, ApplyReport, CreateAction, DatePolicy, UpdateAction};
pub use database::ClientDatabase;
pub use errors::{ClientError, ClientResult};
pub use events::{EventDispatcher, EventType, StoreEvent};
pub use gateway::TaskGateway;
pub use store::{MergeReport, ReorderItem, StoreOutcome, TaskEdit, TaskStore};
