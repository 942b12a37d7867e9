//! Human-readable error descriptions and structured JSON error formatting.

use haptics_core::HapticsError;
use haptics_traits::DriverErrorCode;

fn find_haptics_error(err: &eyre::Report) -> Option<&HapticsError> {
    err.chain().find_map(|e| e.downcast_ref::<HapticsError>())
}

fn driver_hint(code: DriverErrorCode) -> &'static str {
    match code {
        DriverErrorCode::DeviceNotFound => {
            "Check that the device is connected and that [device] name matches it (or leave name unset)."
        }
        DriverErrorCode::DeviceBusy => {
            "Another session holds the device. Stop it, or wait for it to exit."
        }
        DriverErrorCode::InvalidHandle => "The driver lost track of the device; restart the session.",
        DriverErrorCode::NotStarted => "The servo loop was not running; restart the session.",
        DriverErrorCode::ServoThread => {
            "The servo thread failed; check logs and servo.rt_priority permissions."
        }
        DriverErrorCode::CommunicationLost => "Check the cable and power, then restart.",
        DriverErrorCode::ForceOutOfRange => "A non-finite force was commanded; check the effect parameters.",
        DriverErrorCode::Vendor(_) => "See the driver documentation for this code.",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(he) = find_haptics_error(err) {
        return match he {
            HapticsError::DriverOpen { code, .. } => format!(
                "What happened: {he}.\nLikely causes: Device missing, unpowered or in use.\nHow to fix: {}",
                code.map_or("Check the device connection and [device] name.", driver_hint)
            ),
            HapticsError::DriverOperation { code, .. } => format!(
                "What happened: {he}.\nLikely causes: Hardware or link failure during a driver call.\nHow to fix: {}",
                driver_hint(*code)
            ),
            HapticsError::InvalidWorkspace(_) => format!(
                "What happened: {he}.\nLikely causes: A workspace with min >= max on some axis.\nHow to fix: Fix device.app_workspace or sim.workspace in the config."
            ),
            HapticsError::InvalidArgument(_) => format!(
                "What happened: {he}.\nLikely causes: An effect produced a non-finite force.\nHow to fix: Check the [effect] parameters."
            ),
            HapticsError::NotInitialized | HapticsError::State(_) => format!(
                "What happened: {he}.\nLikely causes: The device stopped or never started.\nHow to fix: Re-run with --log-level=debug for details."
            ),
        };
    }

    let msg = err.to_string();
    let chain = format!("{err:#}");
    let lower = chain.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Check the path. Original: {chain}"
        );
    }
    if lower.contains("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this tool.\nLikely causes: Typo in a key, wrong value type or unknown effect kind.\nHow to fix: Compare with etc/haptics.toml. Original: {chain}"
        );
    }
    if lower.contains(" must ") || lower.contains("unreasonably large") {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 open failure, 4 driver failure, 5 bad workspace/argument,
/// 6 lifecycle state, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match find_haptics_error(err) {
        Some(HapticsError::DriverOpen { .. }) => 3,
        Some(HapticsError::DriverOperation { .. }) => 4,
        Some(HapticsError::InvalidWorkspace(_) | HapticsError::InvalidArgument(_)) => 5,
        Some(HapticsError::NotInitialized | HapticsError::State(_)) => 6,
        None => 1,
    }
}

fn reason_name(err: &HapticsError) -> &'static str {
    match err {
        HapticsError::DriverOpen { .. } => "DriverOpen",
        HapticsError::DriverOperation { .. } => "DriverOperation",
        HapticsError::InvalidArgument(_) => "InvalidArgument",
        HapticsError::InvalidWorkspace(_) => "InvalidWorkspace",
        HapticsError::NotInitialized => "NotInitialized",
        HapticsError::State(_) => "State",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(he) = find_haptics_error(err) {
        let mut obj = json!({ "reason": reason_name(he), "message": humanize(err) });
        if let Some(code) = he.driver_code() {
            obj["driver_code"] = json!(code.code());
            obj["driver_error"] = json!(code.to_string());
        }
        if let HapticsError::DriverOperation { op, .. } = he {
            obj["op"] = json!(op);
        }
        return obj.to_string();
    }

    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
