#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = haptics_config::load_toml(data) {
        if cfg.validate().is_ok() {
            let settings = haptics_core::DeviceSettings::from(&cfg.device);
            let _ = haptics_core::Transform::compute(
                &haptics_traits::WorkspaceBox::from_extents(cfg.sim.workspace),
                &settings.app_workspace,
                settings.preserve_aspect,
            );
            let _effect: Box<dyn haptics_core::ForceEffect> = (&cfg.effect).into();
        }
    }
});
