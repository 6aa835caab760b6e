//! Tracker configuration, resolved once at [`Tracker::start`] and immutable
//! for the duration of a session.
//!
//! [`Tracker::start`]: crate::Tracker::start

use crate::protocol::ReportLayout;

/// Orientation estimation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorKind {
    /// Angular-velocity integration only. Drifts with gyro bias over time;
    /// fine for short sessions and the only option on Gen1 firmware, which
    /// reports no accelerometer.
    Integration,
    /// Gyro integration with adaptive bias removal and gravity correction
    /// from the accelerometer.
    Fusion,
}

/// Tuning constants for the fusion strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    /// Weight of the gravity-error feedback, in rad/s per radian of error.
    pub gain: f32,
    /// Acceleration magnitude error (|‖a‖ - 1| in g) beyond which the
    /// reading is considered disturbed by linear acceleration.
    pub accel_rejection: f32,
    /// Sustained disturbance time (s) before gravity correction is suspended.
    pub rejection_timeout: f32,
    /// Confirmed-stable time (s) before a suspended correction resumes.
    pub recovery_period: f32,
    /// Bias-corrected angular velocity norm (rad/s) below which the device
    /// may be judged stationary.
    pub still_gyro_threshold: f32,
    /// Acceleration magnitude error (g) below which the device may be judged
    /// stationary.
    pub still_accel_tolerance: f32,
    /// Per-sample low-pass coefficient for the gyro bias estimate.
    pub bias_alpha: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            gain: 0.5,
            accel_rejection: 0.2,
            rejection_timeout: 0.5,
            recovery_period: 0.25,
            still_gyro_threshold: 0.05,
            still_accel_tolerance: 0.02,
            bias_alpha: 0.02,
        }
    }
}

/// Complete configuration for one tracking session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Report layout of the target firmware generation. Never auto-detected.
    pub layout: ReportLayout,
    pub estimator: EstimatorKind,
    pub fusion: FusionParams,
    /// Capacity of the optional physical-sample tap. Samples are dropped,
    /// not blocked on, when a consumer falls behind.
    pub sample_tap_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            layout: ReportLayout::Gen1,
            estimator: EstimatorKind::Integration,
            fusion: FusionParams::default(),
            sample_tap_capacity: 256,
        }
    }
}

impl TrackerConfig {
    /// Fusion configuration for Gen2 firmware.
    pub fn gen2_fusion() -> Self {
        Self {
            layout: ReportLayout::Gen2,
            estimator: EstimatorKind::Fusion,
            ..Self::default()
        }
    }
}
