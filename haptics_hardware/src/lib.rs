#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Haptic driver backends.
//!
//! `SimulatedDriver` is a software haptic device: a damped point mass inside
//! a workspace box, driven by the forces that servo ops write. It owns a real
//! servo thread so the lock-free handoff in `haptics_core` is exercised under
//! genuine concurrency.
pub mod error;
#[cfg(feature = "rt")]
pub mod rt;

use crossbeam_channel as xch;
use haptics_traits::clock::period_for_hz;
use haptics_traits::{
    CallbackHandle, Clock, DeviceHandle, DriverErrorCode, HapticDriver, MonotonicClock,
    Scheduling, ServoOp, ServoOpExit, ToolIo, Vector3, WorkspaceBox,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::thread::JoinHandle;

use crate::error::{HwError, Result};

/// Pending registration commands the servo thread can fall behind on.
const COMMAND_QUEUE_DEPTH: usize = 256;

/// Physical and timing parameters of the simulated device.
#[derive(Debug, Clone)]
pub struct SimParams {
    /// Name accepted by `open(Some(name))`.
    pub name: String,
    /// When false, every `open` fails with `DeviceNotFound`.
    pub present: bool,
    /// Reported device workspace (meters).
    pub workspace: WorkspaceBox,
    /// Servo rate in Hz.
    pub rate_hz: u32,
    /// Effective moving mass (kg).
    pub mass: f64,
    /// Viscous damping (N·s/m).
    pub damping: f64,
    /// Spring pulling the tool back to the workspace center (N/m). 0 disables.
    pub centering_stiffness: f64,
    /// Output force saturation (N).
    pub max_force: f64,
    /// Constant force the simulated user's hand applies to the tool (N).
    pub hand_force: Vector3,
    /// SCHED_FIFO priority for the servo thread (`rt` feature).
    pub rt_priority: Option<i32>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            name: "simulated".to_string(),
            present: true,
            // Roughly a 4" cube, like common desktop 3-DOF devices.
            workspace: WorkspaceBox::from_extents([-0.05, -0.05, -0.05, 0.05, 0.05, 0.05]),
            rate_hz: 1000,
            mass: 0.15,
            damping: 2.0,
            centering_stiffness: 0.0,
            max_force: 9.0,
            hand_force: Vector3::ZERO,
            rt_priority: None,
        }
    }
}

impl SimParams {
    pub fn validate(&self) -> Result<()> {
        if !self.workspace.is_valid() {
            return Err(HwError::InvalidParams(format!(
                "workspace {:?} must be finite with min < max on every axis",
                self.workspace.extents()
            )));
        }
        if self.rate_hz == 0 {
            return Err(HwError::InvalidParams("rate_hz must be > 0".into()));
        }
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(HwError::InvalidParams("mass must be > 0".into()));
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err(HwError::InvalidParams("damping must be >= 0".into()));
        }
        if !(self.centering_stiffness.is_finite() && self.centering_stiffness >= 0.0) {
            return Err(HwError::InvalidParams(
                "centering_stiffness must be >= 0".into(),
            ));
        }
        if !(self.max_force.is_finite() && self.max_force > 0.0) {
            return Err(HwError::InvalidParams("max_force must be > 0".into()));
        }
        if !self.hand_force.is_finite() {
            return Err(HwError::InvalidParams("hand_force must be finite".into()));
        }
        Ok(())
    }
}

/// Handle for pressing the simulated tool button from any thread.
#[derive(Debug, Clone, Default)]
pub struct SimButton(Arc<AtomicBool>);

impl SimButton {
    pub fn press(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_pressed(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// State shared between the driver (application thread) and its servo thread.
///
/// `error` belongs to driver calls and is what `last_error()` reports.
/// Faults raised inside a servo cycle go to `servo_fault` so they are never
/// attributed to whichever driver call happens to be checked next.
#[derive(Debug, Default)]
struct SimShared {
    // 0 = no error, otherwise DriverErrorCode::code()
    error: AtomicI32,
    servo_fault: AtomicI32,
    servo_faults: AtomicU64,
    ticks: AtomicU64,
}

impl SimShared {
    fn fail(&self, code: DriverErrorCode) {
        tracing::debug!(%code, "simulated driver error");
        self.error.store(code.code(), Ordering::Release);
    }

    // Servo thread only; no logging on this path.
    fn fault(&self, code: DriverErrorCode) {
        self.servo_fault.store(code.code(), Ordering::Release);
        self.servo_faults.fetch_add(1, Ordering::Relaxed);
    }
}

enum Command {
    Register(CallbackHandle, Scheduling, ServoOp),
    Unregister(CallbackHandle),
}

struct ServoThread {
    tx: xch::Sender<Command>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

/// Software haptic device with its own servo thread.
pub struct SimulatedDriver<C: Clock + Clone + Send + 'static = MonotonicClock> {
    params: SimParams,
    clock: C,
    shared: Arc<SimShared>,
    button: SimButton,
    opened: DeviceHandle,
    current: DeviceHandle,
    next_op: u32,
    servo: Option<ServoThread>,
}

impl SimulatedDriver<MonotonicClock> {
    pub fn new(params: SimParams) -> Result<Self> {
        Self::with_clock(params, MonotonicClock::new())
    }
}

impl<C: Clock + Clone + Send + 'static> SimulatedDriver<C> {
    pub fn with_clock(params: SimParams, clock: C) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            clock,
            shared: Arc::new(SimShared::default()),
            button: SimButton::default(),
            opened: DeviceHandle::INVALID,
            current: DeviceHandle::INVALID,
            next_op: 0,
            servo: None,
        })
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Button of the simulated tool.
    pub fn button(&self) -> SimButton {
        self.button.clone()
    }

    /// Completed servo cycles since construction.
    pub fn servo_ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.servo.is_some()
    }

    /// Latest fault raised inside a servo cycle, cleared on read. Not reported
    /// through `last_error()`.
    pub fn take_servo_fault(&self) -> Option<DriverErrorCode> {
        DriverErrorCode::from_code(self.shared.servo_fault.swap(0, Ordering::AcqRel))
    }

    /// Servo-cycle faults since construction.
    pub fn servo_fault_count(&self) -> u64 {
        self.shared.servo_faults.load(Ordering::Relaxed)
    }

    pub fn is_open(&self) -> bool {
        self.opened.is_valid()
    }

    fn allocate_op_handle(&mut self) -> CallbackHandle {
        let mut h = CallbackHandle(self.next_op);
        if !h.is_valid() {
            h = CallbackHandle(0);
        }
        self.next_op = h.0.wrapping_add(1);
        h
    }

    fn send(&self, cmd: Command) -> bool {
        let Some(servo) = self.servo.as_ref() else {
            self.shared.fail(DriverErrorCode::NotStarted);
            return false;
        };
        match servo.tx.try_send(cmd) {
            Ok(()) => true,
            Err(xch::TrySendError::Full(_)) => {
                self.shared.fail(DriverErrorCode::DeviceBusy);
                false
            }
            Err(xch::TrySendError::Disconnected(_)) => {
                self.shared.fail(DriverErrorCode::CommunicationLost);
                false
            }
        }
    }

    fn join_servo(&mut self) {
        let Some(mut servo) = self.servo.take() else {
            return;
        };
        servo.shutdown.store(true, Ordering::Release);
        drop(servo.tx);
        if let Some(handle) = servo.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("servo thread joined"),
                Err(e) => {
                    let err = HwError::ServoThread(format!("panicked: {e:?}"));
                    tracing::warn!(error = %err, "servo thread ended abnormally");
                    self.shared.fail(DriverErrorCode::ServoThread);
                }
            }
        }
    }
}

impl<C: Clock + Clone + Send + 'static> HapticDriver for SimulatedDriver<C> {
    fn open(&mut self, name: Option<&str>) -> DeviceHandle {
        if !self.params.present || name.is_some_and(|n| n != self.params.name) {
            self.shared.fail(DriverErrorCode::DeviceNotFound);
            return DeviceHandle::INVALID;
        }
        if self.opened.is_valid() {
            self.shared.fail(DriverErrorCode::DeviceBusy);
            return DeviceHandle::INVALID;
        }
        self.opened = DeviceHandle(1);
        tracing::debug!(name = %self.params.name, "simulated device opened");
        self.opened
    }

    fn start(&mut self) {
        if self.servo.is_some() {
            return;
        }
        if !self.opened.is_valid() {
            self.shared.fail(DriverErrorCode::InvalidHandle);
            return;
        }
        let (tx, rx) = xch::bounded(COMMAND_QUEUE_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));
        let ctx = ServoContext {
            rx,
            shutdown: shutdown.clone(),
            shared: self.shared.clone(),
            tool: SimTool::new(&self.params, self.button.clone(), self.shared.clone()),
            rate_hz: self.params.rate_hz,
            rt_priority: self.params.rt_priority,
            clock: self.clock.clone(),
        };
        let spawned = std::thread::Builder::new()
            .name("haptics-servo".into())
            .spawn(move || ctx.run());
        match spawned {
            Ok(join_handle) => {
                self.servo = Some(ServoThread {
                    tx,
                    shutdown,
                    join_handle: Some(join_handle),
                });
                tracing::debug!(rate_hz = self.params.rate_hz, "servo thread started");
            }
            Err(e) => {
                let err = HwError::from(e);
                tracing::error!(error = %err, "failed to spawn servo thread");
                self.shared.fail(DriverErrorCode::ServoThread);
            }
        }
    }

    fn stop(&mut self) {
        self.join_servo();
    }

    fn close(&mut self, handle: DeviceHandle) {
        if !handle.is_valid() || handle != self.opened {
            self.shared.fail(DriverErrorCode::InvalidHandle);
            return;
        }
        if self.servo.is_some() {
            tracing::warn!("closing simulated device while servo thread runs; stopping it");
            self.join_servo();
        }
        if self.current == handle {
            self.current = DeviceHandle::INVALID;
        }
        self.opened = DeviceHandle::INVALID;
        tracing::debug!("simulated device closed");
    }

    fn register_servo_op(&mut self, op: ServoOp, scheduling: Scheduling) -> CallbackHandle {
        if self.servo.is_none() {
            self.shared.fail(DriverErrorCode::NotStarted);
            return CallbackHandle::INVALID;
        }
        let handle = self.allocate_op_handle();
        if self.send(Command::Register(handle, scheduling, op)) {
            handle
        } else {
            CallbackHandle::INVALID
        }
    }

    fn unregister_servo_op(&mut self, handle: CallbackHandle) {
        if !handle.is_valid() {
            self.shared.fail(DriverErrorCode::InvalidHandle);
            return;
        }
        // Stopped servo already discarded every op.
        if self.servo.is_some() {
            self.send(Command::Unregister(handle));
        }
    }

    fn make_current(&mut self, handle: DeviceHandle) {
        if handle.is_valid() && handle == self.opened {
            self.current = handle;
        } else {
            self.shared.fail(DriverErrorCode::InvalidHandle);
        }
    }

    fn workspace(&mut self) -> WorkspaceBox {
        if !self.current.is_valid() {
            self.shared.fail(DriverErrorCode::InvalidHandle);
            return WorkspaceBox::from_extents([0.0; 6]);
        }
        self.params.workspace
    }

    fn last_error(&mut self) -> Option<DriverErrorCode> {
        DriverErrorCode::from_code(self.shared.error.swap(0, Ordering::AcqRel))
    }
}

impl<C: Clock + Clone + Send + 'static> Drop for SimulatedDriver<C> {
    fn drop(&mut self) {
        self.join_servo();
    }
}

struct OpSlot {
    handle: CallbackHandle,
    scheduling: Scheduling,
    op: ServoOp,
}

struct ServoContext<C: Clock> {
    rx: xch::Receiver<Command>,
    shutdown: Arc<AtomicBool>,
    shared: Arc<SimShared>,
    tool: SimTool,
    rate_hz: u32,
    rt_priority: Option<i32>,
    clock: C,
}

impl<C: Clock> ServoContext<C> {
    fn run(mut self) {
        self.apply_rt_priority();
        let period = period_for_hz(self.rate_hz);
        let dt = period.as_secs_f64();
        let mut ops: Vec<OpSlot> = Vec::with_capacity(8);
        let mut next = self.clock.now();
        tracing::trace!("servo thread running");
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            for cmd in self.rx.try_iter() {
                match cmd {
                    Command::Register(handle, scheduling, op) => ops.push(OpSlot {
                        handle,
                        scheduling,
                        op,
                    }),
                    Command::Unregister(handle) => ops.retain(|s| s.handle != handle),
                }
            }
            let tool = &mut self.tool;
            ops.retain_mut(|slot| {
                let exit = (slot.op)(&mut *tool);
                exit == ServoOpExit::Continue && slot.scheduling == Scheduling::Continuous
            });
            self.tool.integrate(dt);
            self.shared.ticks.fetch_add(1, Ordering::Relaxed);

            next += period;
            let now = self.clock.now();
            if next < now {
                // Overran; resync instead of bursting to catch up.
                next = now;
            }
            self.clock.sleep_until(next);
        }
        tracing::trace!(pending_ops = ops.len(), "servo thread exiting");
    }

    #[cfg(feature = "rt")]
    fn apply_rt_priority(&self) {
        if let Some(prio) = self.rt_priority {
            match crate::rt::promote_current_thread(prio) {
                Ok(applied) => tracing::info!(priority = applied, "servo thread promoted to SCHED_FIFO"),
                Err(e) => tracing::warn!(error = %e, "servo thread stays at normal priority"),
            }
        }
    }

    #[cfg(not(feature = "rt"))]
    fn apply_rt_priority(&self) {
        if let Some(prio) = self.rt_priority {
            tracing::warn!(priority = prio, "rt_priority ignored; built without the `rt` feature");
        }
    }
}

/// Point-mass model of the tool, owned by the servo thread.
struct SimTool {
    workspace: WorkspaceBox,
    position: Vector3,
    velocity: Vector3,
    force: Vector3,
    mass: f64,
    damping: f64,
    centering_stiffness: f64,
    max_force: f64,
    hand_force: Vector3,
    button: SimButton,
    shared: Arc<SimShared>,
}

impl SimTool {
    fn new(params: &SimParams, button: SimButton, shared: Arc<SimShared>) -> Self {
        Self {
            workspace: params.workspace,
            position: params.workspace.center(),
            velocity: Vector3::ZERO,
            force: Vector3::ZERO,
            mass: params.mass,
            damping: params.damping,
            centering_stiffness: params.centering_stiffness,
            max_force: params.max_force,
            hand_force: params.hand_force,
            button,
            shared,
        }
    }

    /// Semi-implicit Euler step; contact with a workspace wall kills the normal velocity.
    fn integrate(&mut self, dt: f64) {
        let offset = self.position - self.workspace.center();
        let total = self.force + self.hand_force
            - self.velocity * self.damping
            - offset * self.centering_stiffness;
        self.velocity = self.velocity + total * (dt / self.mass);
        let unclamped = self.position + self.velocity * dt;
        let clamped = self.workspace.clamp(unclamped);
        if clamped.x != unclamped.x {
            self.velocity.x = 0.0;
        }
        if clamped.y != unclamped.y {
            self.velocity.y = 0.0;
        }
        if clamped.z != unclamped.z {
            self.velocity.z = 0.0;
        }
        self.position = clamped;
    }
}

impl ToolIo for SimTool {
    fn tool_position(&mut self) -> Vector3 {
        self.position
    }

    fn tool_button(&mut self) -> bool {
        self.button.is_pressed()
    }

    fn set_tool_force(&mut self, force: Vector3) {
        if force.is_finite() {
            self.force = force.clamp_norm(self.max_force);
        } else {
            self.force = Vector3::ZERO;
            self.shared.fault(DriverErrorCode::ForceOutOfRange);
        }
    }
}
