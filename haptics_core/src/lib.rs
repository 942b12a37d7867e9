#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core haptic device control (driver-agnostic).
//!
//! All hardware interaction goes through `haptics_traits::HapticDriver`.
//!
//! ## Architecture
//!
//! - **Lifecycle**: `HapticsDevice` opens, starts and hooks the driver, and tears it down (`device`)
//! - **Servo handoff**: servo-side, force and application-side buffers in seqlock mailboxes (`servo`, `mailbox`)
//! - **Error checks**: every driver call is followed by `last_error()` through `DriverCheck` (`check`)
//! - **Transform**: device workspace to application workspace mapping (`transform`)
//! - **Loop**: force effects and the paced application loop (`effects`, `runner`)
//! - **Boundary**: boolean facade for embedding layers (`service`)
//!
//! ## Threading
//!
//! The servo thread belongs to the driver. It only ever touches `ServoState`
//! through the `Arc` captured by the registered ops, and never takes a lock.

pub mod check;
pub mod conversions;
pub mod device;
pub mod effects;
pub mod error;
pub mod mailbox;
pub mod mocks;
pub mod runner;
pub mod servo;
pub mod service;
pub mod transform;

pub use check::{DriverCheck, ErrorPolicy};
pub use device::{DEFAULT_APP_WORKSPACE, DeviceSettings, HapticsDevice, LifecycleState, SyncTicket};
pub use effects::{ForceEffect, NoEffect, TrackingCircle, VirtualSphere, VirtualWall};
pub use error::{HapticsError, Result};
pub use runner::{LoopParams, LoopStats, run_effect};
pub use servo::{ServoSnapshot, ServoState};
pub use service::HapticsService;
pub use transform::Transform;
