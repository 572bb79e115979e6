pub mod app_config;
pub mod concurrency;
pub mod env;
pub mod loader;
pub mod logging;

pub use app_config::BaseAppConfig;
pub use concurrency::ConcurrencyConfig;
pub use loader::{load_config, load_config_with_env};
