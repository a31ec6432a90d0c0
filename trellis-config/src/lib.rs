// Configuration management for Trellis routers
//
// Loads router settings from JSON/TOML/dotenv files and TRELLIS_* environment
// variables, validates them and installs the matching middleware.

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{LogSettings, Settings};
pub use validation::{ConfigValidator, Validate};
