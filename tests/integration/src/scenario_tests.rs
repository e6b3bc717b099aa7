//! Scenario tests
//!
//! Each section plays through a situation an application runs into at
//! runtime, using only the public API.

use optlayer_conf::ConfigStore;
use optlayer_core::{
    ConfigOption, DeviceHandle, LayerDescriptor, LayerKey, OptionBuilder, OptionFlags, OptionManager,
    SystemLayer,
};
use optlayer_test_utils::{TestConfDir, frame, initialized_manager, recording_callback};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;

// =============================================================================
// Scenario 1: Fading a runtime preset in and out
// =============================================================================

#[test]
fn scenario_fade_in_preset() {
    let manager = initialized_manager();
    let fog = OptionBuilder::new("volumetrics", "density", 0.0f32)
        .register(&manager)
        .unwrap();
    let steps = OptionBuilder::new("volumetrics", "steps", 16).register(&manager).unwrap();

    let mut config = ConfigStore::new();
    config.set_str("volumetrics.density", "1.0");
    config.set_str("volumetrics.steps", "64");
    let preset = manager
        .acquire_layer(
            LayerDescriptor::new(LayerKey::dynamic("cave"))
                .config(config)
                .blend(0.0, 0.5),
        )
        .unwrap();

    let mut densities = Vec::new();
    let mut step_counts = Vec::new();
    for strength in [0.0, 0.25, 0.5, 0.75, 1.0] {
        preset.request_blend_strength(strength);
        frame(&manager);
        densities.push(fog.get());
        step_counts.push(steps.get());
    }

    assert_eq!(densities, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    // Discrete values switch once the threshold is met
    assert_eq!(step_counts, vec![16, 16, 64, 64, 64]);

    manager.release_layer(&preset);
    frame(&manager);
    assert_eq!((fog.get(), steps.get()), (0.0, 16));
}

// =============================================================================
// Scenario 2: Several systems sharing one layer
// =============================================================================

#[test]
fn scenario_shared_layer_requests() {
    let manager = initialized_manager();
    let quality = OptionBuilder::new("shadows", "quality", 1).register(&manager).unwrap();
    let key = LayerKey::new(20_000, "cutscene");

    let mut config = ConfigStore::new();
    config.set_str("shadows.quality", "3");
    let director = manager
        .acquire_layer(LayerDescriptor::new(key.clone()).config(config))
        .unwrap();
    let camera = manager.acquire_layer(LayerDescriptor::new(key.clone())).unwrap();
    assert_eq!(director.ref_count(), 2);

    // One system wants it off, another on: enabled wins
    director.request_enabled(false);
    camera.request_enabled(true);
    frame(&manager);
    assert_eq!(quality.get(), 3);

    // The first owner leaving keeps the layer alive for the other
    manager.release_layer(&director);
    frame(&manager);
    assert_eq!(quality.get(), 3);

    manager.release_layer(&camera);
    frame(&manager);
    assert_eq!(quality.get(), 1);
    assert!(manager.layer(&key).is_none());
}

// =============================================================================
// Scenario 3: Dependent settings updated by callbacks
// =============================================================================

#[test]
fn scenario_dependent_settings() {
    let manager = initialized_manager();
    let preset = OptionBuilder::new("quality", "preset", 0).register(&manager).unwrap();
    let samples = OptionBuilder::new("quality", "samples", 1).register(&manager).unwrap();
    let (count, callback) = recording_callback();
    let denoise = OptionBuilder::new("quality", "denoise", false)
        .on_change(callback)
        .register(&manager)
        .unwrap();

    {
        let samples = samples.clone();
        let reader = preset.clone();
        preset.set_on_change(move |_| samples.set_deferred(1 << reader.get(), None));
    }
    {
        let denoise = denoise.clone();
        let reader = samples.clone();
        samples.set_on_change(move |_| denoise.set_deferred(reader.get() < 8, None));
    }

    let quality = manager
        .acquire_layer(LayerDescriptor::system(SystemLayer::User))
        .unwrap();
    preset.set_deferred(2, Some(&quality));
    let summary = frame(&manager);

    assert_eq!(preset.get(), 2);
    assert_eq!(samples.get(), 4);
    assert!(denoise.get());
    assert_eq!(summary.passes, 3);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Scenario 4: Renaming an option between releases
// =============================================================================

#[test]
fn scenario_option_rename_migration() {
    let dir = TestConfDir::new();
    let path = dir.write("project.conf", "legacy.fov = 75\n");
    let manager = initialized_manager();
    let legacy: ConfigOption<i32> = OptionBuilder::new("legacy", "fov", 60)
        .flags(OptionFlags::NO_SAVE)
        .register(&manager)
        .unwrap();
    let fov: ConfigOption<f32> = OptionBuilder::new("camera", "fov", 60.0)
        .register(&manager)
        .unwrap();
    let project = manager
        .acquire_layer(LayerDescriptor::system(SystemLayer::ProjectConfig).file(path))
        .unwrap();

    let migrated = legacy.migrate_values_to(&fov, |degrees| degrees as f32);
    assert_eq!(migrated, 1);
    assert!(!legacy.has_value_in_layer(&project));
    frame(&manager);
    assert_eq!(fov.get(), 75.0);

    project.save().unwrap();
    dir.assert_contains("project.conf", "camera.fov = 75");
    assert!(!dir.read("project.conf").contains("legacy.fov"));
}

// =============================================================================
// Scenario 5: Exporting a session's edits for review
// =============================================================================

#[test]
fn scenario_export_session_edits() {
    let dir = TestConfDir::new();
    let path = dir.write("project.conf", "render.bounces = 4\n");
    let manager = initialized_manager();
    let bounces = OptionBuilder::new("render", "bounces", 2).register(&manager).unwrap();
    let exposure = OptionBuilder::new("render", "exposure", 1.0f32)
        .register(&manager)
        .unwrap();
    let project = manager
        .acquire_layer(LayerDescriptor::system(SystemLayer::ProjectConfig).file(path))
        .unwrap();

    bounces.set_deferred(6, Some(&project));
    exposure.set_deferred(2.5, Some(&project));
    assert!(project.export_unsaved_changes(&dir.path("review.conf")).unwrap());

    let review = dir.load("review.conf");
    assert_eq!(review.get_str("render.bounces"), Some("6"));
    assert_eq!(review.get_str("render.exposure"), Some("2.5"));

    // Exporting leaves the layer's own file alone
    dir.assert_contains("project.conf", "render.bounces = 4");
    assert!(project.has_unsaved_changes());
}

// =============================================================================
// Scenario 6: Reads and writes from several threads
// =============================================================================

#[test]
fn scenario_threads_write_while_main_resolves() {
    let manager = initialized_manager();
    let options: Vec<ConfigOption<i32>> = (0..4)
        .map(|i| {
            OptionBuilder::new("threads", format!("value{i}"), 0)
                .register(&manager)
                .unwrap()
        })
        .collect();
    let barrier = Arc::new(Barrier::new(options.len() + 1));

    let workers: Vec<_> = options
        .iter()
        .cloned()
        .map(|option| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let layer = manager
                    .acquire_layer(LayerDescriptor::new(LayerKey::dynamic(format!("worker {}", option.full_name()))))
                    .unwrap();
                barrier.wait();
                for value in 1..=100 {
                    option.set_deferred(value, Some(&layer));
                    let _ = option.get();
                }
                layer
            })
        })
        .collect();

    barrier.wait();
    for _ in 0..50 {
        manager.apply_pending_values(&DeviceHandle::none(), false);
    }
    let layers: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().expect("Thread should not panic"))
        .collect();
    frame(&manager);

    let values: Vec<i32> = options.iter().map(ConfigOption::get).collect();
    assert_eq!(values, vec![100; 4]);
    for layer in &layers {
        manager.release_layer(layer);
    }
    frame(&manager);
    assert!(options.iter().all(|option| option.get() == 0));
}

// =============================================================================
// Scenario 7: The process-wide manager
// =============================================================================

#[test]
fn scenario_global_manager_is_shared() {
    let manager = OptionManager::global();
    let option = OptionBuilder::new("scenario_global", "value", 5)
        .register(&manager)
        .unwrap();

    assert!(Arc::ptr_eq(&manager, &OptionManager::global()));
    assert_eq!(
        OptionManager::global()
            .option_handle::<i32>("scenario_global.value")
            .map(|handle| handle.full_name()),
        Some(option.full_name())
    );
}
