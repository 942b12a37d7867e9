//! `From` implementations bridging `haptics_config` types to `haptics_core` types.

use crate::check::ErrorPolicy;
use crate::device::DeviceSettings;
use crate::effects::{ForceEffect, NoEffect, TrackingCircle, VirtualSphere, VirtualWall};
use crate::runner::LoopParams;
use haptics_traits::WorkspaceBox;
use std::time::Duration;

// ── ErrorPolicy ──────────────────────────────────────────────────────────────

impl From<haptics_config::ErrorPolicyCfg> for ErrorPolicy {
    fn from(c: haptics_config::ErrorPolicyCfg) -> Self {
        match c {
            haptics_config::ErrorPolicyCfg::Propagate => Self::Propagate,
            haptics_config::ErrorPolicyCfg::Abort => Self::Abort,
        }
    }
}

// ── DeviceSettings ───────────────────────────────────────────────────────────

impl From<&haptics_config::DeviceCfg> for DeviceSettings {
    fn from(c: &haptics_config::DeviceCfg) -> Self {
        Self {
            name: c.name.clone(),
            app_workspace: WorkspaceBox::from_extents(c.app_workspace),
            preserve_aspect: c.preserve_aspect,
            error_policy: c.error_policy.into(),
        }
    }
}

// ── LoopParams ───────────────────────────────────────────────────────────────

impl From<&haptics_config::RunnerCfg> for LoopParams {
    fn from(c: &haptics_config::RunnerCfg) -> Self {
        Self {
            loop_hz: c.loop_hz,
            duration: (c.duration_ms > 0).then(|| Duration::from_millis(c.duration_ms)),
        }
    }
}

// ── Effects ──────────────────────────────────────────────────────────────────

impl From<&haptics_config::EffectCfg> for Box<dyn ForceEffect> {
    fn from(c: &haptics_config::EffectCfg) -> Self {
        use haptics_config::EffectCfg;
        match *c {
            EffectCfg::None => Box::new(NoEffect),
            EffectCfg::Wall { wall_z, stiffness } => Box::new(VirtualWall { wall_z, stiffness }),
            EffectCfg::Sphere { radius, stiffness } => Box::new(VirtualSphere { radius, stiffness }),
            EffectCfg::Tracking {
                radius,
                stiffness,
                angular_step,
                inner_range,
                outer_range,
                log_base,
                slope,
            } => {
                let mut t = TrackingCircle::new(radius, stiffness, angular_step);
                t.inner_range = inner_range;
                t.outer_range = outer_range;
                t.log_base = log_base;
                t.slope = slope;
                Box::new(t)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haptics_config::{Config, EffectCfg};

    #[test]
    fn default_config_maps_to_default_settings() {
        let cfg = Config::default();
        assert_eq!(DeviceSettings::from(&cfg.device), DeviceSettings::default());
        let lp = LoopParams::from(&cfg.runner);
        assert_eq!(lp, LoopParams::default());
    }

    #[test]
    fn duration_ms_zero_means_unbounded() {
        let mut cfg = Config::default();
        cfg.runner.duration_ms = 250;
        assert_eq!(
            LoopParams::from(&cfg.runner).duration,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn effect_kind_selects_implementation() {
        for name in ["none", "wall", "sphere", "tracking"] {
            let cfg = EffectCfg::by_name(name).unwrap();
            let effect: Box<dyn ForceEffect> = (&cfg).into();
            assert_eq!(effect.name(), name);
        }
    }
}
