pub mod aggregator;
pub mod config;
pub mod error;
pub mod loader;
pub mod results;

pub use config::{load_config, ReportConfig};
pub use error::ReportError;
