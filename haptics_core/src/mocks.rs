//! Deterministic driver double for tests and benches.
//!
//! `ManualDriver` has no servo thread: the test plays the servo thread by
//! calling `run_servo_cycle()`. Tool position and button are scripted, the
//! last force written by a servo op is recorded, and any driver operation can
//! be made to report an error code, either instead of its effect or after it.

use haptics_traits::{
    CallbackHandle, DeviceHandle, DriverErrorCode, HapticDriver, Scheduling, ServoOp, ServoOpExit,
    ToolIo, Vector3, WorkspaceBox,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Driver operations that can be observed or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Open,
    Start,
    Stop,
    Close,
    Register,
    Unregister,
    MakeCurrent,
    Workspace,
}

/// Driver call log that can be kept after the driver itself is dropped.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<DriverOp>>>);

impl CallLog {
    fn push(&self, op: DriverOp) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(op);
    }

    pub fn snapshot(&self) -> Vec<DriverOp> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[derive(Debug, Default)]
struct ManualTool {
    position: Vector3,
    button: bool,
    last_force: Option<Vector3>,
}

impl ToolIo for ManualTool {
    fn tool_position(&mut self) -> Vector3 {
        self.position
    }

    fn tool_button(&mut self) -> bool {
        self.button
    }

    fn set_tool_force(&mut self, force: Vector3) {
        self.last_force = Some(force);
    }
}

struct Registered {
    handle: CallbackHandle,
    scheduling: Scheduling,
    op: ServoOp,
}

pub struct ManualDriver {
    tool: ManualTool,
    ops: Vec<Registered>,
    next_op: u32,
    opened: DeviceHandle,
    current: DeviceHandle,
    started: bool,
    workspace: WorkspaceBox,
    failures: HashMap<DriverOp, DriverErrorCode>,
    late_failures: HashMap<DriverOp, DriverErrorCode>,
    open_returns_invalid: bool,
    error: Option<DriverErrorCode>,
    calls: CallLog,
    cycles: u64,
}

impl Default for ManualDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualDriver {
    pub fn new() -> Self {
        Self::with_workspace(WorkspaceBox::from_extents([-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]))
    }

    pub fn with_workspace(workspace: WorkspaceBox) -> Self {
        Self {
            tool: ManualTool::default(),
            ops: Vec::new(),
            next_op: 0,
            opened: DeviceHandle::INVALID,
            current: DeviceHandle::INVALID,
            started: false,
            workspace,
            failures: HashMap::new(),
            late_failures: HashMap::new(),
            open_returns_invalid: false,
            error: None,
            calls: CallLog::default(),
            cycles: 0,
        }
    }

    pub fn set_position(&mut self, position: Vector3) {
        self.tool.position = position;
    }

    pub fn set_button(&mut self, down: bool) {
        self.tool.button = down;
    }

    /// Make every later call of `op` fail with `code` (and have no effect).
    pub fn fail_on(&mut self, op: DriverOp, code: DriverErrorCode) {
        self.failures.insert(op, code);
    }

    /// Let every later call of `op` take effect, then report `code` anyway.
    pub fn fail_after(&mut self, op: DriverOp, code: DriverErrorCode) {
        self.late_failures.insert(op, code);
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
        self.late_failures.clear();
        self.open_returns_invalid = false;
    }

    /// `open` returns an invalid handle without reporting an error code.
    pub fn open_returns_invalid(&mut self, yes: bool) {
        self.open_returns_invalid = yes;
    }

    /// Simulate one servo cycle: invoke every registered op once, in order.
    /// Returns how many ops ran.
    pub fn run_servo_cycle(&mut self) -> usize {
        if !self.started {
            return 0;
        }
        let ran = self.ops.len();
        let tool = &mut self.tool;
        self.ops.retain_mut(|r| {
            let exit = (r.op)(&mut *tool);
            exit == ServoOpExit::Continue && r.scheduling == Scheduling::Continuous
        });
        self.cycles += 1;
        ran
    }

    /// Last force written by a servo op.
    pub fn last_force(&self) -> Option<Vector3> {
        self.tool.last_force
    }

    pub fn registered_ops(&self) -> usize {
        self.ops.len()
    }

    /// Device handles currently held open (0 or 1).
    pub fn open_handles(&self) -> usize {
        usize::from(self.opened.is_valid())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn current(&self) -> DeviceHandle {
        self.current
    }

    /// Every driver call in order, including failed ones.
    pub fn calls(&self) -> Vec<DriverOp> {
        self.calls.snapshot()
    }

    /// Shared handle to the call log; it stays readable after the driver is gone.
    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    // Report a late failure for a call that already took effect.
    fn leave(&mut self, op: DriverOp) {
        if let Some(code) = self.late_failures.get(&op) {
            self.error = Some(*code);
        }
    }

    // Record the call; true when it should fail.
    fn enter(&mut self, op: DriverOp) -> bool {
        self.calls.push(op);
        match self.failures.get(&op) {
            Some(code) => {
                self.error = Some(*code);
                true
            }
            None => false,
        }
    }
}

impl HapticDriver for ManualDriver {
    fn open(&mut self, _name: Option<&str>) -> DeviceHandle {
        if self.enter(DriverOp::Open) || self.open_returns_invalid {
            return DeviceHandle::INVALID;
        }
        if self.opened.is_valid() {
            self.error = Some(DriverErrorCode::DeviceBusy);
            return DeviceHandle::INVALID;
        }
        self.opened = DeviceHandle(7);
        self.leave(DriverOp::Open);
        self.opened
    }

    fn start(&mut self) {
        if self.enter(DriverOp::Start) {
            return;
        }
        self.started = true;
        self.leave(DriverOp::Start);
    }

    fn stop(&mut self) {
        if self.enter(DriverOp::Stop) {
            return;
        }
        self.started = false;
        self.ops.clear();
        self.leave(DriverOp::Stop);
    }

    fn close(&mut self, handle: DeviceHandle) {
        if self.enter(DriverOp::Close) {
            return;
        }
        if !handle.is_valid() || handle != self.opened {
            self.error = Some(DriverErrorCode::InvalidHandle);
            return;
        }
        self.opened = DeviceHandle::INVALID;
        self.current = DeviceHandle::INVALID;
        self.leave(DriverOp::Close);
    }

    fn register_servo_op(&mut self, op: ServoOp, scheduling: Scheduling) -> CallbackHandle {
        if self.enter(DriverOp::Register) {
            return CallbackHandle::INVALID;
        }
        if !self.started {
            self.error = Some(DriverErrorCode::NotStarted);
            return CallbackHandle::INVALID;
        }
        let handle = CallbackHandle(self.next_op);
        self.next_op += 1;
        self.ops.push(Registered {
            handle,
            scheduling,
            op,
        });
        self.leave(DriverOp::Register);
        handle
    }

    fn unregister_servo_op(&mut self, handle: CallbackHandle) {
        if self.enter(DriverOp::Unregister) {
            return;
        }
        if !handle.is_valid() {
            self.error = Some(DriverErrorCode::InvalidHandle);
            return;
        }
        self.ops.retain(|r| r.handle != handle);
        self.leave(DriverOp::Unregister);
    }

    fn make_current(&mut self, handle: DeviceHandle) {
        if self.enter(DriverOp::MakeCurrent) {
            return;
        }
        if handle.is_valid() && handle == self.opened {
            self.current = handle;
        } else {
            self.error = Some(DriverErrorCode::InvalidHandle);
        }
    }

    fn workspace(&mut self) -> WorkspaceBox {
        if self.enter(DriverOp::Workspace) {
            return WorkspaceBox::from_extents([0.0; 6]);
        }
        if !self.current.is_valid() {
            self.error = Some(DriverErrorCode::InvalidHandle);
        }
        self.workspace
    }

    fn last_error(&mut self) -> Option<DriverErrorCode> {
        self.error.take()
    }
}
