//! Ambient infrastructure: configuration and logging (spec §10.2, §10.3).

pub mod config;
pub mod logging;

pub use config::{Config, ConfigLoader};
pub use logging::{LoggingConfig, Logger};
