use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[non_exhaustive]
pub struct LoggerConfig {
    pub max_level: String,
    pub file: Option<FileLoggerConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_level: "INFO".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[non_exhaustive]
pub struct FileLoggerConfig {
    pub path: String,
    pub enabled: bool,
    /// Number of rotated daily files kept on disk
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl FileLoggerConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            max_files: default_max_files(),
        }
    }
}

fn default_max_files() -> usize {
    7
}
