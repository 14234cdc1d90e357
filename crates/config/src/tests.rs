use camino::Utf8PathBuf;
use tempfile::TempDir;

use super::*;
use crate::hints::{hint_for, CONFIG_HINTS};

fn temp_dir() -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

fn write_config(dir: &Utf8Path, content: &str) {
    std::fs::write(dir.join(CONFIG_FILE), content).unwrap();
}

#[test]
fn test_save_then_load() {
    let (_guard, dir) = temp_dir();
    assert!(!ConfigFile::exists(&dir));

    let mut config = ConfigFile::default();
    config.anti_entropy.rendezvous_timeout = Duration::from_millis(1_500);
    config.anti_entropy.tree_max_size = 1 << 10;
    config.read.replication_factor = 5;
    config.save(&dir).unwrap();

    assert!(ConfigFile::exists(&dir));

    let loaded = ConfigFile::load(&dir).unwrap();
    assert_eq!(loaded.anti_entropy.rendezvous_timeout, Duration::from_millis(1_500));
    assert_eq!(loaded.anti_entropy.tree_max_size, 1 << 10);
    assert_eq!(loaded.read.replication_factor, 5);
}

#[test]
fn test_durations_are_written_in_millis() {
    let (_guard, dir) = temp_dir();

    ConfigFile::default().save(&dir).unwrap();

    let content = std::fs::read_to_string(dir.join(CONFIG_FILE)).unwrap();
    assert!(content.contains("rendezvous_timeout_ms = 172800000"), "{content}");
}

#[test]
fn test_missing_fields_take_defaults() {
    let (_guard, dir) = temp_dir();
    write_config(&dir, "[anti_entropy]\nhash_depth = 20\n");

    let config = ConfigFile::load(&dir).unwrap();

    assert_eq!(config.anti_entropy.hash_depth, 20);
    assert_eq!(config.anti_entropy.tree_max_size, DEFAULT_TREE_MAX_SIZE);
    assert_eq!(
        config.anti_entropy.rendezvous_timeout,
        Duration::from_secs(48 * 60 * 60)
    );
    assert_eq!(config.read.replication_factor, DEFAULT_REPLICATION_FACTOR);
}

#[test]
fn test_invalid_values_are_rejected() {
    let (_guard, dir) = temp_dir();

    write_config(&dir, "[anti_entropy]\nhash_depth = 128\n");
    let err = ConfigFile::load(&dir).unwrap_err();
    assert!(err.to_string().contains("hash_depth"), "{err}");

    write_config(&dir, "[anti_entropy]\nstream_concurrency = 0\n");
    assert!(ConfigFile::load(&dir).is_err());

    write_config(&dir, "[read]\nreplication_factor = 0\n");
    assert!(ConfigFile::load(&dir).is_err());
}

#[test]
fn test_load_errors_name_the_file() {
    let (_guard, dir) = temp_dir();

    let err = ConfigFile::load(&dir).unwrap_err();
    assert!(err.to_string().contains(CONFIG_FILE), "{err}");

    write_config(&dir, "anti_entropy = 3");
    let err = ConfigFile::load(&dir).unwrap_err();
    assert!(err.to_string().starts_with("failed to parse"), "{err}");
}

#[test]
fn test_save_if_changed() {
    let (_guard, dir) = temp_dir();
    let mut config = ConfigFile::default();

    assert!(config.save_if_changed(&dir).unwrap());
    assert!(!config.save_if_changed(&dir).unwrap());

    config.anti_entropy.channel_capacity = 16;
    assert!(config.save_if_changed(&dir).unwrap());
}

#[test]
fn test_section_converts_to_runtime_config() {
    let section = AntiEntropySection {
        rendezvous_timeout: Duration::from_secs(60),
        validation_concurrency: 7,
        ..AntiEntropySection::default()
    };

    let config = AntiEntropyConfig::from(section);

    assert_eq!(config.rendezvous_timeout, Duration::from_secs(60));
    assert_eq!(config.validation_concurrency, 7);
    assert_eq!(config.hash_depth, DEFAULT_HASH_DEPTH);
}

#[test]
fn test_every_hinted_key_has_a_value() {
    let config = ConfigFile::default();

    for hint in CONFIG_HINTS {
        assert!(config.get_value(hint.key).is_some(), "no value for {}", hint.key);
    }

    assert_eq!(config.get_value("read.replication_factor").as_deref(), Some("3"));
    assert_eq!(config.get_value("no.such.key"), None);
    assert!(hint_for("anti_entropy.hash_depth").is_some());
    assert!(hint_for("no.such.key").is_none());
}
