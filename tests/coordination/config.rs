//! Configuration Loading Tests
//!
//! TOML files applied through the builder.

use crate::*;
use ratchet::config::{self, ConfigError};
use std::io::Write;

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_builder_applies_config_file() {
    init_tracing();
    let file = write_config(
        r#"
        [counters]
        precisions = [1, 60]
        sample_count = 10

        [stats]
        slowest_retained = 5
        "#,
    );

    let ratchet = Ratchet::builder()
        .config_file(file.path())
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(ratchet.config().counters.precisions, vec![1, 60]);
    assert_eq!(ratchet.config().counters.sample_count, 10);
    assert_eq!(ratchet.config().stats.slowest_retained, 5);

    ratchet.counters.update_counter("hits", 1).unwrap();
    assert_eq!(ratchet.counters.known_counters().unwrap().len(), 2);
}

#[test]
fn test_invalid_file_is_rejected() {
    let file = write_config("[counters]\nprecisions = [60, 5]\n");
    let err = Ratchet::builder().config_file(file.path()).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Invalid(_))));
}

#[test]
fn test_written_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ratchet.toml");
    let mut original = RatchetConfig::default();
    original.market.purchase_timeout_ms = 1_500;

    std::fs::write(&path, config::to_toml_string(&original).unwrap()).unwrap();
    assert_eq!(config::load(&path).unwrap(), original);
}
