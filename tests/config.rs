use clap::Parser;
use nplusone_batch::config::Config;
use tracing::Level;

#[test]
fn test_defaults() -> anyhow::Result<()> {
    let config = Config::try_parse_from(["nplusone-batch"])?;

    assert_eq!(config.database_url, "sqlite::memory:");
    assert_eq!(config.bind.to_string(), "127.0.0.1:8080");
    assert_eq!(config.seed_authors, 500);
    assert_eq!(config.lazy_batch_size, 100);
    assert!(!config.log_json);
    assert_eq!(config.log_level, Level::INFO);
    Ok(())
}

#[test]
fn test_flags() -> anyhow::Result<()> {
    let config = Config::try_parse_from([
        "nplusone-batch",
        "--database-url",
        "sqlite://library.db",
        "--bind",
        "0.0.0.0:9000",
        "--seed-authors",
        "50",
        "--lazy-batch-size",
        "25",
        "--log-json",
        "--log-level",
        "debug",
    ])?;

    assert_eq!(config.database_url, "sqlite://library.db");
    assert_eq!(config.bind.port(), 9000);
    assert_eq!(config.seed_authors, 50);
    assert_eq!(config.lazy_batch_size, 25);
    assert!(config.logging().json_format);
    assert_eq!(config.logging().default_level, Level::DEBUG);
    Ok(())
}

#[test]
fn test_rejects_zero_batch_size() {
    let result = Config::try_parse_from(["nplusone-batch", "--lazy-batch-size", "0"]);
    assert!(result.is_err());
}

#[test]
fn test_rejects_bad_bind_address() {
    let result = Config::try_parse_from(["nplusone-batch", "--bind", "not-an-address"]);
    assert!(result.is_err());
}
