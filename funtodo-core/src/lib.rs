pub mod errors;
pub mod models;
pub mod remote;

pub use errors::SyncError;
pub use models::{group_key, GroupKey, Task, TaskId};
pub use remote::RemoteTask;
