#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the haptics workspace.
//!
//! `Config` and its sections are deserialized from TOML and validated. Every
//! section has defaults, so an empty file describes the stock setup: the
//! default device, a 4-unit application workspace and a 1 kHz simulated servo.
use serde::Deserialize;
use std::path::Path;

/// Application workspace used when none is configured: a 4" cube with the
/// origin biased toward the device base along Z.
pub const DEFAULT_APP_WORKSPACE: [f64; 6] = [-2.0, -2.0, -2.0, 2.0, 2.0, 3.0];

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicyCfg {
    /// Return driver errors to the caller.
    #[default]
    Propagate,
    /// Log and abort the process on the first driver error.
    Abort,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceCfg {
    /// Named device to open; the driver's default device when absent.
    pub name: Option<String>,
    /// `[min_x, min_y, min_z, max_x, max_y, max_z]` in application units.
    pub app_workspace: [f64; 6],
    /// Scale all axes uniformly when mapping device space to app space.
    pub preserve_aspect: bool,
    pub error_policy: ErrorPolicyCfg,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            name: None,
            app_workspace: DEFAULT_APP_WORKSPACE,
            preserve_aspect: true,
            error_policy: ErrorPolicyCfg::Propagate,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServoCfg {
    /// Servo rate of the simulated driver (Hz).
    pub rate_hz: u32,
    /// Optional SCHED_FIFO priority for the servo thread.
    pub rt_priority: Option<i32>,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            rate_hz: 1000,
            rt_priority: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    pub present: bool,
    /// Device workspace reported by the simulator (meters).
    pub workspace: [f64; 6],
    pub mass: f64,
    pub damping: f64,
    pub centering_stiffness: f64,
    pub max_force: f64,
    /// Constant push of the simulated hand (N).
    pub hand_force: [f64; 3],
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            present: true,
            workspace: [-0.05, -0.05, -0.05, 0.05, 0.05, 0.05],
            mass: 0.15,
            damping: 2.0,
            centering_stiffness: 0.0,
            max_force: 9.0,
            hand_force: [0.0; 3],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunnerCfg {
    /// Application haptic loop rate (Hz).
    pub loop_hz: u32,
    /// Stop after this many ms; 0 runs until interrupted.
    pub duration_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            loop_hz: 1000,
            duration_ms: 0,
        }
    }
}

fn default_stiffness() -> f64 {
    1000.0
}
fn default_radius() -> f64 {
    0.04
}
fn default_tracking_stiffness() -> f64 {
    100.0
}
fn default_angular_step() -> f64 {
    0.005
}
fn default_inner_range() -> f64 {
    0.01
}
fn default_outer_range() -> f64 {
    0.02
}
fn default_log_base() -> f64 {
    1.05
}
fn default_slope() -> f64 {
    -1.0
}

/// Force effect computed by the application loop.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EffectCfg {
    #[default]
    None,
    Wall {
        #[serde(default)]
        wall_z: f64,
        #[serde(default = "default_stiffness")]
        stiffness: f64,
    },
    Sphere {
        #[serde(default = "default_radius")]
        radius: f64,
        #[serde(default = "default_stiffness")]
        stiffness: f64,
    },
    Tracking {
        #[serde(default = "default_radius")]
        radius: f64,
        #[serde(default = "default_tracking_stiffness")]
        stiffness: f64,
        #[serde(default = "default_angular_step")]
        angular_step: f64,
        #[serde(default = "default_inner_range")]
        inner_range: f64,
        #[serde(default = "default_outer_range")]
        outer_range: f64,
        #[serde(default = "default_log_base")]
        log_base: f64,
        #[serde(default = "default_slope")]
        slope: f64,
    },
}

impl EffectCfg {
    /// Stock parameters for an effect selected by name (`none|wall|sphere|tracking`).
    pub fn by_name(name: &str) -> Option<Self> {
        Some(match name {
            "none" => Self::None,
            "wall" => Self::Wall {
                wall_z: 0.0,
                stiffness: default_stiffness(),
            },
            "sphere" => Self::Sphere {
                radius: default_radius(),
                stiffness: default_stiffness(),
            },
            "tracking" => Self::Tracking {
                radius: default_radius(),
                stiffness: default_tracking_stiffness(),
                angular_step: default_angular_step(),
                inner_range: default_inner_range(),
                outer_range: default_outer_range(),
                log_base: default_log_base(),
                slope: default_slope(),
            },
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Wall { .. } => "wall",
            Self::Sphere { .. } => "sphere",
            Self::Tracking { .. } => "tracking",
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub device: DeviceCfg,
    pub servo: ServoCfg,
    pub sim: SimCfg,
    pub runner: RunnerCfg,
    pub effect: EffectCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn check_workspace(key: &str, e: &[f64; 6]) -> eyre::Result<()> {
    if e.iter().any(|v| !v.is_finite()) {
        eyre::bail!("{key} must contain only finite values");
    }
    for (axis, (lo, hi)) in ["x", "y", "z"].iter().zip([(e[0], e[3]), (e[1], e[4]), (e[2], e[5])]) {
        if lo >= hi {
            eyre::bail!("{key}: min_{axis} must be < max_{axis} (got {lo} >= {hi})");
        }
    }
    Ok(())
}

fn check_positive(key: &str, v: f64) -> eyre::Result<()> {
    if !(v.is_finite() && v > 0.0) {
        eyre::bail!("{key} must be > 0");
    }
    Ok(())
}

fn check_non_negative(key: &str, v: f64) -> eyre::Result<()> {
    if !(v.is_finite() && v >= 0.0) {
        eyre::bail!("{key} must be >= 0");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        check_workspace("device.app_workspace", &self.device.app_workspace)?;
        if let Some(name) = &self.device.name
            && name.trim().is_empty()
        {
            eyre::bail!("device.name must not be empty when set");
        }

        // Servo
        if self.servo.rate_hz == 0 {
            eyre::bail!("servo.rate_hz must be > 0");
        }
        if self.servo.rate_hz > 20_000 {
            eyre::bail!("servo.rate_hz is unreasonably large (>20 kHz)");
        }
        if let Some(p) = self.servo.rt_priority
            && !(1..=99).contains(&p)
        {
            eyre::bail!("servo.rt_priority must be in 1..=99");
        }

        // Simulator
        check_workspace("sim.workspace", &self.sim.workspace)?;
        check_positive("sim.mass", self.sim.mass)?;
        check_non_negative("sim.damping", self.sim.damping)?;
        check_non_negative("sim.centering_stiffness", self.sim.centering_stiffness)?;
        check_positive("sim.max_force", self.sim.max_force)?;
        if self.sim.hand_force.iter().any(|v| !v.is_finite()) {
            eyre::bail!("sim.hand_force must contain only finite values");
        }

        // Runner
        if self.runner.loop_hz == 0 {
            eyre::bail!("runner.loop_hz must be > 0");
        }
        if self.runner.duration_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("runner.duration_ms is unreasonably large (>24h)");
        }

        // Effect
        match &self.effect {
            EffectCfg::None => {}
            EffectCfg::Wall { wall_z, stiffness } => {
                if !wall_z.is_finite() {
                    eyre::bail!("effect.wall_z must be finite");
                }
                check_non_negative("effect.stiffness", *stiffness)?;
            }
            EffectCfg::Sphere { radius, stiffness } => {
                check_positive("effect.radius", *radius)?;
                check_non_negative("effect.stiffness", *stiffness)?;
            }
            EffectCfg::Tracking {
                radius,
                stiffness,
                angular_step,
                inner_range,
                outer_range,
                log_base,
                slope,
            } => {
                check_positive("effect.radius", *radius)?;
                check_non_negative("effect.stiffness", *stiffness)?;
                if !angular_step.is_finite() {
                    eyre::bail!("effect.angular_step must be finite");
                }
                check_positive("effect.inner_range", *inner_range)?;
                if !(outer_range.is_finite() && outer_range > inner_range) {
                    eyre::bail!("effect.outer_range must be > effect.inner_range");
                }
                if !(log_base.is_finite() && *log_base > 1.0) {
                    eyre::bail!("effect.log_base must be > 1");
                }
                if !slope.is_finite() {
                    eyre::bail!("effect.slope must be finite");
                }
            }
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
