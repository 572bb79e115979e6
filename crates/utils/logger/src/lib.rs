#[cfg(feature = "file")]
pub mod file;
pub mod util;
#[cfg(feature = "file")]
use crate::file::setup_file_appender;
pub use crate::util::{resolve_offset, utc_offset_hours};
use config_loader::{app_config::BaseAppConfig, logging::LoggerConfig};
pub use time::UtcOffset;
use time::{format_description::BorrowedFormatItem, macros::format_description};
pub use tracing::{
    Level, debug, debug_span, error, error_span, info, info_span, instrument, span, trace,
    trace_span, warn, warn_span,
};
use tracing_subscriber::{EnvFilter, Registry, fmt::time::OffsetTime, layer::SubscriberExt};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoggingError {
    #[error("Failed to build layer: {message}, context: {context}")]
    BuildLayerError {
        message: String,
        context: &'static str,
    },
    #[error("Invalid filter directive '{directive}': {message}")]
    InvalidDirective { directive: String, message: String },
}

pub struct LoggingGuard {
    #[cfg(feature = "file")]
    /// Need to keep the guard alive to keep the file appender open
    pub file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    #[cfg(feature = "stdout")]
    /// Keep stdout guard alive to ensure all logs are flushed
    pub stdout_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Build the env filter, `RUST_LOG` first, then the extra directives.
pub fn build_env_filter(extra: Option<Vec<&str>>) -> Result<EnvFilter, LoggingError> {
    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    for dir in extra.unwrap_or_default() {
        let directive = dir.parse().map_err(|e: tracing_subscriber::filter::ParseError| {
            LoggingError::InvalidDirective {
                directive: dir.to_string(),
                message: e.to_string(),
            }
        })?;
        env_filter = env_filter.add_directive(directive);
    }

    Ok(env_filter)
}

pub fn setup_logging(
    app_config: &BaseAppConfig,
    logger_config: &LoggerConfig,
    env_filter_override: Option<Vec<&str>>,
) -> Result<LoggingGuard, LoggingError> {
    let fmt: &[BorrowedFormatItem<'_>] = if cfg!(debug_assertions) {
        format_description!("[hour]:[minute]:[second].[subsecond digits:3]")
    } else {
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]")
    };

    let timer = OffsetTime::new(resolve_offset(app_config.timezone), fmt);

    let max_level = logger_config
        .max_level
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(max_level);

    let env_filter = build_env_filter(env_filter_override)?;

    let registry = Registry::default().with(env_filter).with(level_filter);

    #[cfg(feature = "file")]
    let (registry, file_guard) = {
        let (file_layer, guard) = match logger_config.file.as_ref().filter(|f| f.enabled) {
            Some(file_config) => {
                let (non_blocking, guard) = setup_file_appender(app_config, file_config)?;
                let layer = tracing_subscriber::fmt::Layer::default()
                    .with_writer(non_blocking)
                    .with_timer(timer.clone())
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };
        (registry.with(file_layer), guard)
    };

    #[cfg(feature = "stdout")]
    let (registry, stdout_guard) = {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());

        let console_layer = tracing_subscriber::fmt::Layer::default()
            .with_writer(non_blocking)
            .with_timer(timer)
            .with_ansi(!app_config.environment().is_production())
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);
        (registry.with(console_layer), guard)
    };

    #[cfg(not(feature = "stdout"))]
    let _ = timer;

    if tracing::dispatcher::has_been_set() {
        warn!("Global trace dispatcher already set, skipping re-init");
    } else {
        tracing::subscriber::set_global_default(registry).map_err(|e| {
            LoggingError::BuildLayerError {
                message: e.to_string(),
                context: "init",
            }
        })?;
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file")]
        file_guard,
        #[cfg(feature = "stdout")]
        stdout_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_directives_are_applied() {
        let filter = build_env_filter(Some(vec!["task_pool=debug", "config=warn"])).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("task_pool=debug"));
        assert!(rendered.contains("config=warn"));
    }

    #[test]
    fn test_setup_twice_does_not_fail() {
        let app = BaseAppConfig::new("logger-test");
        let config = LoggerConfig::default();

        let first = setup_logging(&app, &config, Some(vec!["task_pool=debug"]));
        assert!(first.is_ok());

        let second = setup_logging(&app, &config, None);
        assert!(second.is_ok());
    }
}
