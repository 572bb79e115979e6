use config_loader::{ConcurrencyConfig, app_config::AppConfig, load_config, load_config_with_env};
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_app_config() {
    let file = write_config(
        r#"
[app]
name = "reader"
env = "dev"
timezone = 7

[logger]
max_level = "DEBUG"

[concurrency]
max_core_size = 4
available_processors = 8
default_tag = "ImageLoader"
prewarm_default = true
"#,
    );

    let config: AppConfig = load_config(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.app.name, "reader");
    assert_eq!(config.app.timezone, Some(7));
    assert_eq!(config.logger.max_level, "DEBUG");
    assert_eq!(config.concurrency.max_core_size, 4);
    assert_eq!(config.concurrency.available_processors, Some(8));
    assert_eq!(config.concurrency.default_tag, "ImageLoader");
    assert!(config.concurrency.prewarm_default);
    // untouched keys keep their defaults
    assert_eq!(
        config.concurrency.bounded_queue_capacity,
        ConcurrencyConfig::BOUNDED_QUEUE_CAPACITY
    );
}

#[test]
fn test_missing_sections_use_defaults() {
    let file = write_config(
        r#"
[app]
name = "reader"
"#,
    );

    let config: AppConfig = load_config(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.concurrency, ConcurrencyConfig::default());
    assert_eq!(config.logger.max_level, "INFO");
    assert!(config.logger.file.is_none());
}

#[test]
fn test_env_overrides_file() {
    let file = write_config(
        r#"
[app]
name = "reader"

[concurrency]
max_core_size = 2
"#,
    );

    // SAFETY: this is the only test touching the TPTEST prefix.
    unsafe {
        std::env::set_var("TPTEST__CONCURRENCY__MAX_CORE_SIZE", "6");
    }
    let config: AppConfig = load_config_with_env(file.path().to_str().unwrap(), "TPTEST").unwrap();
    unsafe {
        std::env::remove_var("TPTEST__CONCURRENCY__MAX_CORE_SIZE");
    }

    assert_eq!(config.concurrency.max_core_size, 6);
}

#[test]
fn test_missing_file_is_an_error() {
    let result: Result<AppConfig, _> = load_config("/definitely/not/here.toml");
    assert!(result.is_err());
}
