//! # netcam - Control-plane client for network-attached depth cameras
//!
//! Drives a request/response streaming-media engine to control a depth
//! camera and decodes the proprietary capability metadata the camera embeds
//! in its session description. Provides:
//! - Stream discovery with typed profiles, intrinsics, and extrinsics
//! - Blocking session control (setup, play, pause, teardown) over the
//!   engine's asynchronous completion callbacks
//! - Per-sensor option get/set and control-range queries
//!
//! The transport engine itself (connection, framing, authentication, event
//! loop, media delivery) is an external collaborator behind the
//! [`ControlEngine`] trait.
//!
//! ## Quick Start
//! ```no_run
//! use netcam::{CalibrationRegistry, ControlEngine, ControlKind, Session};
//! use std::sync::Arc;
//!
//! fn run(engine: impl ControlEngine) -> netcam::Result<()> {
//!     let url = url::Url::parse("rtsp://192.168.1.10/depthcam").unwrap();
//!     let registry = Arc::new(CalibrationRegistry::new());
//!     let mut session = Session::new(engine, url, registry);
//!
//!     let profiles = session.discover()?;
//!     println!("camera: {}", session.identity().name);
//!     println!("{} profiles", profiles.len());
//!     session.set_option("Stereo Module", ControlKind::LaserPower, 150.0)?;
//!     session.close()?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod engine;
pub mod error;
pub mod registry;
pub mod sdp;
pub mod session;
pub mod types;

pub use bridge::{CommandBridge, CompletionSlot, DEFAULT_COMMAND_TIMEOUT};
pub use engine::{ControlEngine, StreamEnd, StreamSink, SubsessionHandle};
pub use error::NetcamError;
pub use registry::CalibrationRegistry;
pub use sdp::{DecodedDescription, ExtrinsicsUpdate};
pub use session::Session;
pub use types::*;

/// Result type alias for netcam operations.
pub type Result<T> = std::result::Result<T, NetcamError>;
