//! Infrastructure layer: stores, cache, bus transport, background workers and
//! the application services that tie the job marketplace together.

pub mod cache;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod node;
pub mod notifications;
pub mod pagination;
pub mod publisher;
pub mod search;
pub mod services;
pub mod startup;
pub mod store;
pub mod tasks;
pub mod trending;
pub mod workers;


pub use config::AppConfig;
pub use error::{ServiceError, ServiceResult, StoreError};
pub use node::{Node, Workers};
