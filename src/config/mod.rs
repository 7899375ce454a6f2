//! Connection configuration: descriptors, the project config file, and
//! the workspace-attach publish step.

pub mod connections;
pub mod resolver;

pub use connections::{ConfigError, ConnectionDescriptor, parse_connections};
pub use resolver::{ConfigPathMode, ConfigResolver, DEFAULT_SERVER_KEY};
