use haptics_config::{EffectCfg, ErrorPolicyCfg, load_file, load_toml};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

#[test]
fn parses_full_config() {
    let toml = r#"
[device]
name = "falcon"
app_workspace = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]
preserve_aspect = false
error_policy = "abort"

[servo]
rate_hz = 2000
rt_priority = 80

[sim]
present = true
workspace = [-0.06, -0.06, -0.06, 0.06, 0.06, 0.06]
mass = 0.2
damping = 1.5
centering_stiffness = 10.0
max_force = 8.0
hand_force = [0.0, 0.0, -1.0]

[runner]
loop_hz = 500
duration_ms = 2000

[effect]
kind = "wall"
wall_z = -0.01
stiffness = 800.0

[logging]
file = "haptics.log"
rotation = "daily"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.device.name.as_deref(), Some("falcon"));
    assert_eq!(cfg.device.error_policy, ErrorPolicyCfg::Abort);
    assert!(!cfg.device.preserve_aspect);
    assert_eq!(cfg.servo.rt_priority, Some(80));
    assert_eq!(cfg.sim.hand_force, [0.0, 0.0, -1.0]);
    assert_eq!(
        cfg.effect,
        EffectCfg::Wall {
            wall_z: -0.01,
            stiffness: 800.0
        }
    );
}

#[test]
fn effect_fields_fall_back_to_defaults() {
    let cfg = load_toml("[effect]\nkind = \"sphere\"\n").expect("parse TOML");
    cfg.validate().unwrap();
    assert_eq!(cfg.effect, EffectCfg::by_name("sphere").unwrap());

    let cfg = load_toml("[effect]\nkind = \"tracking\"\nradius = 0.03\n").expect("parse TOML");
    match cfg.effect {
        EffectCfg::Tracking { radius, stiffness, .. } => {
            assert_eq!(radius, 0.03);
            assert_eq!(stiffness, 100.0);
        }
        other => panic!("expected tracking, got {other:?}"),
    }
}

#[test]
fn unknown_effect_kind_fails_to_parse() {
    assert!(load_toml("[effect]\nkind = \"magnet\"\n").is_err());
}

#[rstest]
#[case("[device]\napp_workspace = [2.0, -2.0, -2.0, -2.0, 2.0, 3.0]\n", "min_x must be < max_x")]
#[case("[device]\nname = \"  \"\n", "device.name")]
#[case("[servo]\nrate_hz = 0\n", "servo.rate_hz must be > 0")]
#[case("[servo]\nrt_priority = 120\n", "rt_priority")]
#[case("[sim]\nworkspace = [-1.0, -1.0, 1.0, 1.0, 1.0, 1.0]\n", "min_z must be < max_z")]
#[case("[sim]\nmass = 0.0\n", "sim.mass must be > 0")]
#[case("[sim]\ndamping = -1.0\n", "sim.damping must be >= 0")]
#[case("[runner]\nloop_hz = 0\n", "runner.loop_hz must be > 0")]
#[case("[effect]\nkind = \"sphere\"\nradius = 0.0\n", "effect.radius must be > 0")]
#[case(
    "[effect]\nkind = \"tracking\"\ninner_range = 0.03\nouter_range = 0.02\n",
    "outer_range"
)]
#[case("[effect]\nkind = \"tracking\"\nlog_base = 1.0\n", "log_base")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error {err} should mention {needle}"
    );
}

#[test]
fn load_file_reads_and_validates() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.toml");
    fs::write(&good, "[runner]\nloop_hz = 250\n").unwrap();
    assert_eq!(load_file(&good).unwrap().runner.loop_hz, 250);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[runner]\nloop_hz = 0\n").unwrap();
    assert!(load_file(&bad).is_err());

    let missing = dir.path().join("missing.toml");
    let err = load_file(&missing).unwrap_err();
    assert!(format!("{err}").contains("read config"));
}

#[test]
fn shipped_sample_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../etc/haptics.toml");
    let cfg = haptics_config::load_file(&path).unwrap();
    assert_eq!(cfg.effect.name(), "tracking");
    assert!(cfg.device.preserve_aspect);
}
