//! Tests for `config` module

use super::config::*;

#[test]
fn test_default_config_is_valid() {
    let cfg = Config::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.cache.capacity_bytes, 1 << 30);
    assert_eq!(cfg.cache.shard_count, 16);
    assert!(cfg.io.prefer_direct);
    assert_eq!(cfg.io.block_size, 4096);
}

#[test]
fn test_from_toml_overrides_defaults() {
    let toml_str = r#"
        [cache]
        capacity_bytes = 2097152
        shard_count = 4

        [io]
        prefer_direct = false
    "#;
    let cfg = Config::from_toml(toml_str).unwrap();
    assert_eq!(cfg.cache.capacity_bytes, 2_097_152);
    assert_eq!(cfg.cache.shard_count, 4);
    assert!(!cfg.io.prefer_direct);
    assert_eq!(cfg.parallelism.scan_mode, 0);
}

#[test]
fn test_rejects_non_power_of_two_shard_count() {
    let toml_str = "[cache]\nshard_count = 3\n";
    let err = Config::from_toml(toml_str).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn test_rejects_unaligned_block_size() {
    let toml_str = "[io]\nblock_size = 100\n";
    let err = Config::from_toml(toml_str).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn test_rejects_out_of_range_scan_mode() {
    let toml_str = "[parallelism]\nscan_mode = 9\n";
    let err = Config::from_toml(toml_str).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn test_round_trip_toml() {
    let cfg = Config::default();
    let s = cfg.to_toml().unwrap();
    let cfg2 = Config::from_toml(&s).unwrap();
    assert_eq!(cfg.cache.capacity_bytes, cfg2.cache.capacity_bytes);
    assert_eq!(cfg.io.block_size, cfg2.io.block_size);
}
