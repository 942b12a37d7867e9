//! Real-time promotion for the servo thread (Linux SCHED_FIFO).

use crate::error::{HwError, Result};

/// Put the calling thread under SCHED_FIFO at `priority`, clamped to the
/// system range. Returns the priority actually applied.
///
/// Needs CAP_SYS_NICE (or root) and a sufficient `ulimit -r`.
#[cfg(target_os = "linux")]
pub fn promote_current_thread(priority: i32) -> Result<i32> {
    use libc::{
        SCHED_FIFO, pthread_self, pthread_setschedparam, sched_get_priority_max,
        sched_get_priority_min, sched_param,
    };

    let (min, max) = unsafe {
        let min = sched_get_priority_min(SCHED_FIFO);
        let max = sched_get_priority_max(SCHED_FIFO);
        if min < 0 || max < 0 { (1, 99) } else { (min, max) }
    };
    let applied = priority.clamp(min, max);
    let param = sched_param {
        sched_priority: applied,
    };
    // pthread_setschedparam returns the error number instead of setting errno.
    let rc = unsafe { pthread_setschedparam(pthread_self(), SCHED_FIFO, &param) };
    if rc != 0 {
        let err = std::io::Error::from_raw_os_error(rc);
        return Err(HwError::Rt(format!(
            "pthread_setschedparam(SCHED_FIFO, {applied}) failed: {err}; hint: needs CAP_SYS_NICE or root"
        )));
    }
    Ok(applied)
}

#[cfg(not(target_os = "linux"))]
pub fn promote_current_thread(priority: i32) -> Result<i32> {
    Err(HwError::Rt(format!(
        "SCHED_FIFO priority {priority} requested but unsupported on this OS"
    )))
}
