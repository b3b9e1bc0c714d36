pub mod commands;
pub mod model;
pub mod store;

pub use model::{Task, TaskId};
pub use store::TaskStore;
