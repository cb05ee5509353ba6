mod support;

use std::path::PathBuf;
use std::sync::Arc;

use gearbox_core::error::GearboxError;
use gearbox_core::manifest::{CURRENT_SCHEMA_VERSION, InstallationRecord, Manifest, ManifestStore};
use gearbox_core::types::InstallMethod;

use support::setup_store;

fn record(version: &str) -> InstallationRecord {
    InstallationRecord::new(InstallMethod::SourceBuild, version)
        .with_binary_paths(vec![PathBuf::from("/home/u/.local/bin/rg")])
        .with_build_type("standard")
}

// =============================================================================
// Load / save
// =============================================================================

#[test]
fn load_missing_returns_empty_manifest() {
    let (_temp, store) = setup_store();

    let manifest = store.load().unwrap();

    assert!(manifest.is_empty());
    assert_eq!(manifest.schema_version, CURRENT_SCHEMA_VERSION);
    assert!(!store.exists());
}

#[test]
fn save_then_load_roundtrip() {
    let (_temp, store) = setup_store();
    let mut manifest = Manifest::new();
    manifest.add("ripgrep", record("14.1.0"));
    manifest.add("fd", record("9.0.0").with_explicit(false));

    store.save(&manifest).unwrap();
    let loaded = store.load().unwrap();

    assert!(store.exists());
    assert_eq!(loaded, manifest);
    assert!(!loaded.get("fd").unwrap().explicit);
}

#[test]
fn older_records_without_optional_fields_load() {
    let (_temp, store) = setup_store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(
        store.path(),
        r#"{
  "schema_version": 1,
  "installations": {
    "bat": {
      "method": "source_build",
      "version": "0.24.0",
      "installed_at": "2024-05-01T10:00:00Z",
      "binary_paths": ["/usr/local/bin/bat"]
    }
  }
}"#,
    )
    .unwrap();

    let manifest = store.load().unwrap();
    let bat = manifest.get("bat").unwrap();
    assert!(bat.explicit);
    assert!(bat.dependencies.is_empty());
    assert_eq!(bat.build_type, None);
}

#[test]
fn corrupt_manifest_is_an_error() {
    let (_temp, store) = setup_store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "{ \"schema_version\": 1, ").unwrap();

    let err = store.load().unwrap_err();

    assert!(matches!(err, GearboxError::ManifestCorrupt { .. }));
    // The corrupt file is left for inspection
    assert!(store.exists());
}

#[test]
fn newer_schema_is_rejected() {
    let (_temp, store) = setup_store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(
        store.path(),
        format!(
            "{{\"schema_version\": {}, \"installations\": {{}}}}",
            CURRENT_SCHEMA_VERSION + 1
        ),
    )
    .unwrap();

    assert!(matches!(
        store.load(),
        Err(GearboxError::UnsupportedSchema { .. })
    ));
}

#[test]
fn save_leaves_no_temp_files() {
    let (_temp, store) = setup_store();
    let mut manifest = Manifest::new();
    manifest.add("ripgrep", record("14.1.0"));
    store.save(&manifest).unwrap();
    store.save(&manifest).unwrap();

    let dir = store.path().parent().unwrap();
    let names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["manifest.json"]);
}

#[test]
fn concurrent_saves_leave_a_valid_manifest() {
    let (_temp, store) = setup_store();
    store.save(&Manifest::new()).unwrap();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for j in 0..10 {
                    let mut manifest = Manifest::new();
                    manifest.add(format!("tool-{}", i), record(&format!("{}.{}.0", i, j)));
                    store.save(&manifest).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let manifest = store.load().unwrap();
    assert_eq!(manifest.len(), 1);
}

// =============================================================================
// Backups
// =============================================================================

#[test]
fn backup_without_manifest_is_a_noop() {
    let (_temp, store) = setup_store();

    assert_eq!(store.backup(None).unwrap(), None);
    assert!(store.list_backups().unwrap().is_empty());
}

#[test]
fn list_backups_on_absent_directory_is_empty() {
    let (_temp, store) = setup_store();
    assert!(!store.backups_dir().exists());
    assert!(store.list_backups().unwrap().is_empty());
}

#[test]
fn backup_names_carry_suffix_and_are_unique() {
    let (_temp, store) = setup_store();
    store.save(&Manifest::new()).unwrap();

    let first = store.backup(Some("pre-sync")).unwrap().unwrap();
    let second = store.backup(Some("pre-sync")).unwrap().unwrap();

    assert!(first.starts_with("manifest-"));
    assert!(first.ends_with("-pre-sync.json"));
    assert_ne!(first, second);
    assert_eq!(store.list_backups().unwrap().len(), 2);
}

#[test]
fn list_backups_ignores_other_files() {
    let (_temp, store) = setup_store();
    store.save(&Manifest::new()).unwrap();
    store.backup(None).unwrap();
    std::fs::write(store.backups_dir().join("notes.txt"), "hi").unwrap();

    let backups = store.list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].ends_with(".json"));
}

#[test]
fn restore_takes_pre_restore_backup() {
    let (_temp, store) = setup_store();
    let mut original = Manifest::new();
    original.add("ripgrep", record("14.1.0"));
    store.save(&original).unwrap();
    let snapshot = store.backup(None).unwrap().unwrap();

    let mut changed = original.clone();
    changed.add("fd", record("9.0.0"));
    store.save(&changed).unwrap();
    let before = store.list_backups().unwrap().len();

    store.restore_backup(&snapshot).unwrap();

    assert_eq!(store.load().unwrap(), original);
    let backups = store.list_backups().unwrap();
    assert_eq!(backups.len(), before + 1);
    assert!(backups.iter().any(|name| name.contains("pre-restore")));
}

#[test]
fn restore_unknown_backup_is_not_found() {
    let (_temp, store) = setup_store();
    store.save(&Manifest::new()).unwrap();

    assert!(matches!(
        store.restore_backup("manifest-19700101-000000-000.json"),
        Err(GearboxError::BackupNotFound(_))
    ));
    assert!(matches!(
        store.restore_backup("../manifest.json"),
        Err(GearboxError::BackupNotFound(_))
    ));
}

#[test]
fn restore_rejects_corrupt_backup_without_touching_live_manifest() {
    let (_temp, store) = setup_store();
    let mut live = Manifest::new();
    live.add("bat", record("0.24.0"));
    store.save(&live).unwrap();
    std::fs::create_dir_all(store.backups_dir()).unwrap();
    std::fs::write(store.backups_dir().join("manifest-broken.json"), "not json").unwrap();

    let err = store.restore_backup("manifest-broken.json").unwrap_err();

    assert!(matches!(err, GearboxError::ManifestCorrupt { .. }));
    assert_eq!(store.load().unwrap(), live);
}

#[test]
fn from_paths_uses_data_layout() {
    let (_temp, ctx) = support::setup_context();
    let store = ManifestStore::from_paths(ctx.paths());
    assert!(store.path().ends_with("data/manifest.json"));
    assert!(store.backups_dir().ends_with("data/backups"));
}
