//! End-to-end integration test for an application session
//!
//! This test exercises the complete flow: startup layers -> user edits ->
//! save -> restart -> the saved values resolve again.

use optlayer_core::{
    EditTarget, EditTargetGuard, HashSetLayer, OptionBuilder, OptionFlags, OptionManager, SystemLayer,
    SystemLayerSources,
};
use optlayer_test_utils::{TestConfDir, env_of, frame};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Options an application would declare at startup.
struct AppOptions {
    bounces: optlayer_core::ConfigOption<i32>,
    exposure: optlayer_core::ConfigOption<f32>,
    scale: optlayer_core::ConfigOption<f32>,
    hidden: optlayer_core::ConfigOption<HashSetLayer>,
}

fn declare(manager: &Arc<OptionManager>) -> AppOptions {
    AppOptions {
        bounces: OptionBuilder::new("render", "bounces", 2)
            .min(0)
            .max(16)
            .description("Indirect bounce count")
            .register(manager)
            .unwrap(),
        exposure: OptionBuilder::new("render", "exposure", 1.0f32)
            .environment("APP_EXPOSURE")
            .register(manager)
            .unwrap(),
        scale: OptionBuilder::new("ui", "scale", 1.0f32)
            .flags(OptionFlags::USER_SETTING)
            .register(manager)
            .unwrap(),
        hidden: OptionBuilder::new("scene", "hidden", HashSetLayer::new())
            .register(manager)
            .unwrap(),
    }
}

/// Set up a config directory the way an installed application ships it
fn setup_config_dir() -> TestConfDir {
    let dir = TestConfDir::new();
    dir.write("base.conf", "render.bounces = 4\nscene.hidden = 0x00000000000000AA\n");
    dir.write("project.conf", "render.exposure = 1.5\n");
    dir
}

fn start(dir: &TestConfDir, env: &[(&str, &str)]) -> (Arc<OptionManager>, AppOptions) {
    let manager = OptionManager::new();
    let options = declare(&manager);
    let sources = SystemLayerSources {
        exe_path: Some("/usr/bin/app".to_string()),
        ..SystemLayerSources::in_dir(dir.root())
    };
    manager.initialize_system_layers(&sources, &env_of(env)).unwrap();
    manager.set_initialized(true);
    frame(&manager);
    (manager, options)
}

#[test]
fn test_startup_resolves_shipped_config() {
    let dir = setup_config_dir();
    let (_manager, options) = start(&dir, &[]);

    assert_eq!(options.bounces.get(), 4);
    assert_eq!(options.exposure.get(), 1.5);
    assert_eq!(options.scale.get(), 1.0);
    assert!(options.hidden.contains_hash(0xAA));
}

#[test]
fn test_environment_beats_files() {
    let dir = setup_config_dir();
    let (_manager, options) = start(&dir, &[("APP_EXPOSURE", "3.0")]);
    assert_eq!(options.exposure.get(), 3.0);
}

#[test]
fn test_full_session_round_trip() {
    let dir = setup_config_dir();
    {
        let (manager, options) = start(&dir, &[]);

        // A settings menu writes on behalf of the user
        {
            let _guard = EditTargetGuard::new(EditTarget::User);
            options.bounces.set_deferred(8, None);
            options.scale.set_deferred(1.5, None);
            options.hidden.remove_hash(0xAA, None);
            options.hidden.add_hash(0xBB, None);
        }
        frame(&manager);
        assert_eq!(options.bounces.get(), 8);
        assert!(!options.hidden.contains_hash(0xAA));

        let project = manager.project_layer().unwrap();
        let user = manager.system_layer(SystemLayer::User).unwrap();
        assert!(project.has_unsaved_changes());
        assert!(user.has_unsaved_changes());
        project.save().unwrap();
        user.save().unwrap();
        assert!(!project.has_unsaved_changes());
    }

    dir.assert_contains("project.conf", "render.bounces = 8");
    dir.assert_contains("project.conf", "render.exposure = 1.5");
    dir.assert_contains("user.conf", "ui.scale = 1.5");

    // Restart: the saved files are the new starting point
    let (_manager, options) = start(&dir, &[]);
    assert_eq!(options.bounces.get(), 8);
    assert_eq!(options.scale.get(), 1.5);
    assert!(!options.hidden.contains_hash(0xAA));
    assert!(options.hidden.contains_hash(0xBB));
}

#[test]
fn test_documentation_lists_declared_options() {
    let dir = setup_config_dir();
    let (manager, _options) = start(&dir, &[]);

    let markdown = manager.render_markdown_documentation();
    assert!(markdown.contains("|render.bounces|int|2|0|16|Indirect bounce count|"));
    assert!(markdown.contains("|scene.hidden|hash set||||"));

    let effective: Vec<String> = manager.effective_values().into_iter().map(|v| v.name).collect();
    assert_eq!(effective, vec!["render.bounces", "render.exposure", "scene.hidden"]);
}
