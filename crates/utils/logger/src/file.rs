use crate::LoggingError;
use config_loader::{app_config::BaseAppConfig, logging::FileLoggerConfig};
use std::path::PathBuf;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};

/// Daily rolling file appender writing `{app_name}.YYYY-MM-DD.log` into the
/// configured directory, keeping at most `max_files` files.
pub fn setup_file_appender(
    app_config: &BaseAppConfig,
    file_logger_config: &FileLoggerConfig,
) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let path = PathBuf::from(&file_logger_config.path);

    if !path.exists() {
        std::fs::create_dir_all(&path).map_err(|e| LoggingError::BuildLayerError {
            message: format!("Failed to create directory {}: {}", path.display(), e),
            context: "file_appender",
        })?;
    }

    if !path.is_dir() {
        return Err(LoggingError::BuildLayerError {
            message: format!("Path {} is not a directory", path.display()),
            context: "file_appender",
        });
    }

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(app_config.name.as_str())
        .filename_suffix("log")
        .max_log_files(file_logger_config.max_files.max(1))
        .build(&path)
        .map_err(|e| LoggingError::BuildLayerError {
            message: e.to_string(),
            context: "file_appender",
        })?;

    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("logs");
        let file_config = FileLoggerConfig::new(dir.to_string_lossy());

        let result = setup_file_appender(&BaseAppConfig::new("pool"), &file_config);

        assert!(result.is_ok());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_rejects_file_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let file_config = FileLoggerConfig::new(file.path().to_string_lossy());

        let result = setup_file_appender(&BaseAppConfig::new("pool"), &file_config);

        assert!(matches!(
            result,
            Err(LoggingError::BuildLayerError {
                context: "file_appender",
                ..
            })
        ));
    }
}
