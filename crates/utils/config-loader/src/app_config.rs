use crate::{concurrency::ConcurrencyConfig, env::Env, logging::LoggerConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[non_exhaustive]
pub struct BaseAppConfig {
    pub name: String,
    pub version: Option<String>,
    pub env: Option<String>,
    /// Timezone offset in hours from UTC (e.g., 7 for UTC+7)
    pub timezone: Option<i8>,
}

impl BaseAppConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            env: None,
            timezone: None,
        }
    }

    /// Resolved deployment environment, [`Env::Unknown`] when unset.
    pub fn environment(&self) -> Env {
        self.env
            .clone()
            .map(Env::from)
            .unwrap_or_else(|| Env::Unknown(String::new()))
    }
}

/// Top-level application configuration handed to the composition root.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[non_exhaustive]
pub struct AppConfig {
    pub app: BaseAppConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

impl AppConfig {
    pub fn new(app: BaseAppConfig) -> Self {
        Self {
            app,
            logger: LoggerConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_resolution() {
        let mut app = BaseAppConfig::new("reader");
        assert_eq!(app.environment(), Env::Unknown(String::new()));

        app.env = Some("prod".to_string());
        assert_eq!(app.environment(), Env::Production);
    }
}
