//! Task dispatch: the dispatcher, its configuration and its task table

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod store;

pub use builder::DispatcherBuilder;
pub use config::{DispatcherConfig, OrderingPolicy};
pub use dispatcher::{CancelOutcome, Dispatcher};
pub use store::TaskStore;
