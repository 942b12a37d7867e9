//! Device assembly from config and the three CLI sessions: run, probe, self-check.

use crate::cli::EffectKind;
use eyre::WrapErr;
use haptics_config::{Config, EffectCfg};
use haptics_core::{
    DeviceSettings, ForceEffect, HapticsDevice, LoopParams, LoopStats, SyncTicket, run_effect,
};
use haptics_hardware::{SimParams, SimulatedDriver};
use haptics_traits::clock::MonotonicClock;
use haptics_traits::{Vector3, WorkspaceBox};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

/// How long `probe` waits for its synchronize request to be served.
const PROBE_SYNC_TIMEOUT: Duration = Duration::from_secs(1);

pub fn sim_params(cfg: &Config) -> SimParams {
    SimParams {
        name: cfg
            .device
            .name
            .clone()
            .unwrap_or_else(|| SimParams::default().name),
        present: cfg.sim.present,
        workspace: WorkspaceBox::from_extents(cfg.sim.workspace),
        rate_hz: cfg.servo.rate_hz,
        mass: cfg.sim.mass,
        damping: cfg.sim.damping,
        centering_stiffness: cfg.sim.centering_stiffness,
        max_force: cfg.sim.max_force,
        hand_force: Vector3::from(cfg.sim.hand_force),
        rt_priority: cfg.servo.rt_priority,
    }
}

pub fn build_device(cfg: &Config) -> eyre::Result<HapticsDevice<SimulatedDriver>> {
    let driver = SimulatedDriver::new(sim_params(cfg)).wrap_err("create simulated driver")?;
    Ok(HapticsDevice::with_settings(
        driver,
        DeviceSettings::from(&cfg.device),
    ))
}

/// Effect parameters: the config's own when the kind matches, stock ones otherwise.
pub fn select_effect(cfg: &Config, kind: Option<EffectKind>) -> EffectCfg {
    match kind {
        None => cfg.effect.clone(),
        Some(k) if k.as_str() == cfg.effect.name() => cfg.effect.clone(),
        Some(k) => EffectCfg::by_name(k.as_str()).unwrap_or_default(),
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub effect: &'static str,
    pub stats: LoopStats,
    pub servo_cycles: u64,
}

pub fn run(
    cfg: &Config,
    kind: Option<EffectKind>,
    duration_ms: Option<u64>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<RunSummary> {
    let effect_cfg = select_effect(cfg, kind);
    let mut effect: Box<dyn ForceEffect> = (&effect_cfg).into();
    let mut params = LoopParams::from(&cfg.runner);
    if let Some(ms) = duration_ms {
        params.duration = (ms > 0).then(|| Duration::from_millis(ms));
    }

    let mut device = build_device(cfg)?;
    device.start_device().wrap_err("start device")?;
    let outcome = run_effect(
        &mut device,
        effect.as_mut(),
        &params,
        &MonotonicClock::new(),
        &shutdown,
    );
    let servo_cycles = device.servo_state().cycles();
    let stopped = device.stop_device();
    let stats = outcome.wrap_err("haptic loop")?;
    stopped.wrap_err("stop device")?;
    Ok(RunSummary {
        effect: effect.name(),
        stats,
        servo_cycles,
    })
}

#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub position: Vector3,
    pub app_position: Option<Vector3>,
    pub button_down: bool,
    pub synced: bool,
    pub device_workspace: WorkspaceBox,
    pub transform: Option<[f64; 16]>,
}

fn wait_for(device: &HapticsDevice<SimulatedDriver>, ticket: SyncTicket, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if device.sync_completed(ticket) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    device.sync_completed(ticket)
}

pub fn probe(cfg: &Config) -> eyre::Result<ProbeReport> {
    let mut device = build_device(cfg)?;
    device.start_device().wrap_err("start device")?;
    let ticket = device.synchronize().wrap_err("synchronize")?;
    let synced = wait_for(&device, ticket, PROBE_SYNC_TIMEOUT);
    if !synced {
        tracing::warn!("synchronize not served within {PROBE_SYNC_TIMEOUT:?}");
    }
    let report = ProbeReport {
        position: device.get_position(),
        app_position: device.position_in_app_space(),
        button_down: device.is_button_down(),
        synced,
        device_workspace: device.driver().params().workspace,
        transform: device.transform().map(|t| *t.matrix()),
    };
    device.stop_device().wrap_err("stop device")?;
    Ok(report)
}

pub fn self_check(cfg: &Config) -> eyre::Result<()> {
    let mut device = build_device(cfg)?;
    device.start_device().wrap_err("start device")?;
    if !device.is_initialized() {
        eyre::bail!("device did not reach the running state");
    }
    device.stop_device().wrap_err("stop device")?;
    Ok(())
}
