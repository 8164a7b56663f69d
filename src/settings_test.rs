use super::*;

#[test]
fn empty_store_yields_defaults() {
    let settings = ShellSettings::load(&MapSettings::new());
    assert_eq!(settings, ShellSettings::default());
    assert_eq!(settings.runtime(), Duration::from_millis(8000));
    assert_eq!(settings.hop_range(), HopRange::new(350, 350));
    assert!(settings.force_zoom);
    assert!(!settings.lift_tokens);
}

#[test]
fn inverted_hop_bounds_are_normalized() {
    let store = MapSettings::new().with(KEY_MIN_MOVE_MS, 500).with(KEY_MAX_MOVE_MS, 300);
    let range = ShellSettings::load(&store).hop_range();
    assert_eq!(range.min_ms(), 300);
    assert_eq!(range.max_ms(), 500);
}

#[test]
fn runtime_is_clamped_to_floor_and_ceiling() {
    let low = ShellSettings::load(&MapSettings::new().with(KEY_RUNTIME_MS, 200));
    assert_eq!(low.runtime_ms, 1000);
    let high = ShellSettings::load(&MapSettings::new().with(KEY_RUNTIME_MS, 600_000));
    assert_eq!(high.runtime_ms, 60_000);
}

#[test]
fn runtime_floor_holds_for_hand_built_settings() {
    let settings = ShellSettings { runtime_ms: 10, ..ShellSettings::default() };
    assert_eq!(settings.runtime(), Duration::from_millis(1000));
}

#[test]
fn non_numeric_values_fall_back_to_defaults() {
    let store = MapSettings::new()
        .with(KEY_RUNTIME_MS, "soon")
        .with(KEY_MIN_MOVE_MS, serde_json::json!([1, 2]))
        .with(KEY_MAX_MOVE_MS, -40);
    let settings = ShellSettings::load(&store);
    assert_eq!(settings.runtime_ms, 8000);
    assert_eq!(settings.min_move_ms, 350);
    assert_eq!(settings.max_move_ms, 350);
}

#[test]
fn numeric_strings_are_accepted() {
    let store = MapSettings::new().with(KEY_RUNTIME_MS, " 12000 ").with(KEY_MAX_MOVE_MS, "400.4");
    let settings = ShellSettings::load(&store);
    assert_eq!(settings.runtime_ms, 12_000);
    assert_eq!(settings.max_move_ms, 400);
}

#[test]
fn hop_values_are_clamped() {
    let store = MapSettings::new().with(KEY_MIN_MOVE_MS, 1).with(KEY_MAX_MOVE_MS, 10_000);
    let settings = ShellSettings::load(&store);
    assert_eq!(settings.hop_range(), HopRange::new(50, 2500));
}

#[test]
fn flags_and_name_match_parse() {
    let store = MapSettings::new()
        .with(KEY_FORCE_ZOOM, "off")
        .with(KEY_LIFT_TOKENS, true)
        .with(KEY_NAME_MATCH, "relaxed");
    let settings = ShellSettings::load(&store);
    assert!(!settings.force_zoom);
    assert!(settings.lift_tokens);
    assert_eq!(settings.name_match, NameMatch::Relaxed);
}

#[test]
fn unparseable_flag_keeps_default() {
    let settings = ShellSettings::load(&MapSettings::new().with(KEY_FORCE_ZOOM, "maybe"));
    assert!(settings.force_zoom);
}

#[test]
fn map_settings_from_json() {
    let store = MapSettings::from_json(r#"{"runtimeMs": 2000, "forceZoom": false}"#).unwrap();
    let settings = ShellSettings::load(&store);
    assert_eq!(settings.runtime_ms, 2000);
    assert!(!settings.force_zoom);
    assert!(MapSettings::from_json("[1,2]").is_err());
}

#[test]
fn env_settings_maps_known_keys_only() {
    assert_eq!(EnvSettings::var_for(KEY_RUNTIME_MS), Some("SHELL_RUNTIME_MS"));
    assert_eq!(EnvSettings::var_for("colour"), None);
    assert!(EnvSettings.value("colour").is_none());
}
