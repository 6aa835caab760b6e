//! # airtrack - orientation tracker for Air AR glasses
//!
//! Cross-platform driver using hidapi. Decodes the glasses' proprietary
//! 64-byte IMU reports on a dedicated reader thread, runs an orientation
//! estimator (gyro integration or gyro+accel fusion), and publishes the
//! result as a unit quaternion that any number of consumers can poll.
//!
//! ## Quick Start
//! ```no_run
//! use airtrack::{Tracker, TrackerConfig};
//!
//! let tracker = Tracker::start(TrackerConfig::default()).unwrap();
//! loop {
//!     let q = tracker.orientation();
//!     println!("w={:+.3} x={:+.3} y={:+.3} z={:+.3}", q.w, q.i, q.j, q.k);
//! }
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod estimator;
pub mod protocol;
pub mod state;
pub mod tracker;

pub use config::{EstimatorKind, FusionParams, TrackerConfig};
pub use convert::PhysicalSample;
pub use error::TrackerError;
pub use protocol::{ReportLayout, Sample};
pub use state::SharedOrientation;
pub use tracker::Tracker;

/// Result type alias for airtrack operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
