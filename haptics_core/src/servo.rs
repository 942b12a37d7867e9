//! Servo-thread callbacks and the buffers they share with the application.
//!
//! Three mailboxes carry state across threads:
//! - servo-side snapshot: written every cycle by the contact op,
//! - force command: written by the application, consumed every cycle,
//! - application-side snapshot: written only by the one-shot state op.
//!
//! The servo thread never waits on the application: if the force command is
//! mid-write when a cycle runs, the cycle re-applies the last force it read.
//!
//! The application never reads the servo-side snapshot directly; it sees
//! servo data only after a synchronize request has been served.
use crate::mailbox::SnapshotMailbox;
use haptics_traits::{ServoOp, ServoOpExit, ToolIo, Vector3};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tool kinematics as seen by one side of the handoff.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServoSnapshot {
    pub position: Vector3,
    pub button_down: bool,
}

#[derive(Debug, Default)]
pub struct ServoState {
    servo: SnapshotMailbox<ServoSnapshot>,
    force: SnapshotMailbox<Vector3>,
    // Force the servo thread last applied; its only writer is the servo thread.
    applied: SnapshotMailbox<Vector3>,
    app: SnapshotMailbox<ServoSnapshot>,
    cycles: AtomicU64,
    stale_force_cycles: AtomicU64,
    // Last generation handed out by a synchronize request.
    sync_requested: AtomicU64,
    // Highest generation whose copy has landed in `app`.
    sync_completed: AtomicU64,
}

impl ServoState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Periodic callback body: sample the tool, then apply the pending force.
    pub fn on_contact(&self, tool: &mut dyn ToolIo) -> ServoOpExit {
        let snapshot = ServoSnapshot {
            position: tool.tool_position(),
            button_down: tool.tool_button(),
        };
        self.servo.write(snapshot);
        let force = if let Some(f) = self.force.try_read() {
            self.applied.write(f);
            f
        } else {
            self.stale_force_cycles.fetch_add(1, Ordering::Relaxed);
            self.applied.read()
        };
        tool.set_tool_force(force);
        self.cycles.fetch_add(1, Ordering::Relaxed);
        ServoOpExit::Continue
    }

    /// One-shot callback body: publish the servo-side snapshot to the application side.
    pub fn on_state(&self, generation: u64) -> ServoOpExit {
        self.app.write(self.servo.read());
        self.sync_completed.fetch_max(generation, Ordering::AcqRel);
        ServoOpExit::Exit
    }

    /// Continuous servo op bound to `state`.
    pub fn contact_op(state: Arc<Self>) -> ServoOp {
        Box::new(move |tool| state.on_contact(tool))
    }

    /// One-shot servo op completing synchronize request `generation`.
    pub fn state_op(state: Arc<Self>, generation: u64) -> ServoOp {
        Box::new(move |_tool| state.on_state(generation))
    }

    /// Overwrite the pending force command.
    pub fn set_force(&self, force: Vector3) {
        self.force.write(force);
    }

    /// Force the next servo cycle will apply.
    pub fn pending_force(&self) -> Vector3 {
        self.force.read()
    }

    /// Zero both the pending command and the applied force. Only while no
    /// contact op is registered.
    pub(crate) fn reset_force(&self) {
        self.force.write(Vector3::ZERO);
        self.applied.write(Vector3::ZERO);
    }

    /// Force applied by the most recent servo cycle.
    pub fn applied_force(&self) -> Vector3 {
        self.applied.read()
    }

    /// Cycles that re-applied the previous force because a command was mid-write.
    pub fn stale_force_cycles(&self) -> u64 {
        self.stale_force_cycles.load(Ordering::Relaxed)
    }

    /// Latest synchronized snapshot (application side).
    pub fn app_snapshot(&self) -> ServoSnapshot {
        self.app.read()
    }

    /// Latest snapshot written by the servo thread.
    pub fn servo_snapshot(&self) -> ServoSnapshot {
        self.servo.read()
    }

    /// Contact-op invocations since construction.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub(crate) fn next_sync_generation(&self) -> u64 {
        self.sync_requested.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Highest completed synchronize generation; 0 before the first copy.
    pub fn last_synced(&self) -> u64 {
        self.sync_completed.load(Ordering::Acquire)
    }
}
