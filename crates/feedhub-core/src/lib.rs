pub mod aggregate;
pub mod config;
pub mod error;
pub mod ipc;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod scheduler;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use ipc::{DaemonClient, DaemonServer};
pub use provider::ProviderTag;
