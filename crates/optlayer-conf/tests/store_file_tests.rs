//! File-backed tests for ConfigStore load/save

use optlayer_conf::{ConfigStore, Error};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

#[test]
fn test_load_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let store = ConfigStore::load(&dir.path().join("missing.conf")).unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_save_then_load_preserves_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("project.conf");

    let mut store = ConfigStore::new();
    store.set("render.enable", &true);
    store.set("render.scale", &0.75f32);
    store.set_str("render.hashes", "0x0000000000000001, -0x0000000000000002");
    store.save(&path, None).unwrap();

    let loaded = ConfigStore::load(&path).unwrap();
    assert_eq!(loaded, store);
    assert_eq!(loaded.get::<bool>("render.enable"), Some(true));
    assert_eq!(loaded.get::<f32>("render.scale"), Some(0.75));
}

#[test]
fn test_save_with_filter_drops_other_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("filtered.conf");

    let store = ConfigStore::parse("engine.hud = fps\nrender.a = 1\n");
    store.save(&path, Some("render.")).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "render.a = 1\n");
}

#[test]
fn test_load_directory_is_io_error() {
    let dir = tempdir().unwrap();
    let result = ConfigStore::load(dir.path());
    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn test_concurrent_saves_never_interleave() {
    let dir = tempdir().unwrap();
    let path = Arc::new(dir.path().join("shared.conf"));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|thread_id| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..10 {
                    let mut store = ConfigStore::new();
                    store.set_str("render.writer", format!("{thread_id}-{i}"));
                    let _ = store.save(&path, None);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    let loaded = ConfigStore::load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded.get_str("render.writer").is_some());
}

#[test]
fn test_store_serializes_as_flat_map() {
    let mut store = ConfigStore::new();
    store.set_str("render.bounces", "4");
    store.set_str("ui.scale", "1.5");

    let json = serde_json::to_value(&store).unwrap();
    assert_eq!(json, serde_json::json!({ "render.bounces": "4", "ui.scale": "1.5" }));

    let back: ConfigStore = serde_json::from_value(json).unwrap();
    assert_eq!(back, store);
}
