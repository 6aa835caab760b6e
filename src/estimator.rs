//! Orientation estimation from physical-unit IMU samples.
//!
//! Two interchangeable strategies behind one trait, selected by
//! [`TrackerConfig`](crate::TrackerConfig):
//!
//! - [`GyroIntegrator`] integrates angular velocity only. Cheap and smooth,
//!   but gyro bias accumulates over time with no correction; acceptable for
//!   short sessions.
//! - [`FusionFilter`] additionally learns the gyro bias while the device is
//!   still and nudges the orientation toward the measured gravity direction,
//!   suspending that correction while linear acceleration makes the reading
//!   unreliable.
//!
//! Estimator state is owned exclusively by the acquisition thread.

use crate::config::{EstimatorKind, FusionParams};
use crate::convert::PhysicalSample;
use crate::protocol::ReportLayout;
use nalgebra::{Unit, UnitQuaternion, Vector3};

/// Angular velocities below this norm are treated as zero to avoid axis
/// singularities when normalizing.
pub const OMEGA_EPSILON: f32 = 1.0e-4;

/// Gravity direction in the reference frame the converter produces
/// (x right, y up, z toward the viewer): an at-rest, level device
/// measures acceleration along +y.
fn world_up() -> Unit<Vector3<f32>> {
    Vector3::y_axis()
}

/// Consumes physical samples and maintains the current orientation.
pub trait Estimator: Send {
    /// Advance the orientation by one sample over `dt` seconds.
    fn update(&mut self, sample: &PhysicalSample, dt: f32);

    /// Current orientation, unit norm.
    fn orientation(&self) -> UnitQuaternion<f32>;

    /// Restart estimation from the given reference orientation.
    fn reset(&mut self, orientation: UnitQuaternion<f32>);
}

/// Build the estimator selected by the configuration.
pub fn build(kind: EstimatorKind, params: FusionParams) -> Box<dyn Estimator> {
    match kind {
        EstimatorKind::Integration => Box::new(GyroIntegrator::new()),
        EstimatorKind::Fusion => Box::new(FusionFilter::new(params)),
    }
}

/// Derives elapsed time between samples from the device's own tick counter,
/// keeping the estimator synchronized with sensor timing rather than
/// host wall-clock time.
#[derive(Debug)]
pub struct SampleClock {
    layout: ReportLayout,
    last_tick: Option<u64>,
}

impl SampleClock {
    pub fn new(layout: ReportLayout) -> Self {
        Self {
            layout,
            last_tick: None,
        }
    }

    /// Seconds elapsed since the previous sample. The first call assumes
    /// the nominal tick spacing; later calls subtract tick counters with
    /// wraparound-safe unsigned arithmetic.
    pub fn dt(&mut self, tick: u64) -> f32 {
        let ticks = match self.last_tick {
            Some(prev) => self.layout.tick_delta(prev, tick),
            None => self.layout.nominal_tick_delta(),
        };
        self.last_tick = Some(tick);
        ticks as f32 * self.layout.tick_period()
    }
}

/// Apply a body-frame rotation rate over `dt` to `q` and renormalize.
///
/// Rotation axis is the normalized angular velocity, rotation angle is
/// `|omega| * dt`. Near-zero rates leave the orientation untouched apart
/// from the renormalization.
fn integrate(q: &mut UnitQuaternion<f32>, omega: Vector3<f32>, dt: f32) {
    let rate = omega.norm();
    if rate > OMEGA_EPSILON {
        let axis = Unit::new_unchecked(omega / rate);
        let delta = UnitQuaternion::from_axis_angle(&axis, rate * dt);
        *q *= delta;
    }
    // Counter floating-point drift at every observation point.
    q.renormalize();
}

/// Pure angular-velocity integration.
pub struct GyroIntegrator {
    orientation: UnitQuaternion<f32>,
}

impl GyroIntegrator {
    pub fn new() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl Default for GyroIntegrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for GyroIntegrator {
    fn update(&mut self, sample: &PhysicalSample, dt: f32) {
        integrate(&mut self.orientation, sample.gyro, dt);
    }

    fn orientation(&self) -> UnitQuaternion<f32> {
        self.orientation
    }

    fn reset(&mut self, orientation: UnitQuaternion<f32>) {
        self.orientation = orientation;
    }
}

/// Accelerometer correction channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correction {
    /// Gravity correction active.
    Normal,
    /// Correction suspended: acceleration magnitude has been away from 1 g
    /// for longer than the rejection timeout.
    Rejected,
    /// Magnitude is back near 1 g; correction resumes once stability has
    /// been confirmed for the recovery period.
    Recovering,
}

/// Gyro + accelerometer complementary filter with adaptive bias removal
/// and accelerometer rejection.
pub struct FusionFilter {
    params: FusionParams,
    orientation: UnitQuaternion<f32>,
    /// Low-pass estimate of the at-rest angular velocity, updated only
    /// while the device is judged stationary.
    bias: Vector3<f32>,
    correction: Correction,
    /// Time spent with the acceleration magnitude outside the rejection
    /// threshold (Normal) or back inside it (Recovering).
    state_timer: f32,
}

impl FusionFilter {
    pub fn new(params: FusionParams) -> Self {
        Self {
            params,
            orientation: UnitQuaternion::identity(),
            bias: Vector3::zeros(),
            correction: Correction::Normal,
            state_timer: 0.0,
        }
    }

    /// Update the bias low-pass while the device is judged stationary:
    /// recent angular velocity and acceleration both within stillness
    /// thresholds.
    fn learn_bias(&mut self, gyro: Vector3<f32>, accel_error: f32) {
        let residual = gyro - self.bias;
        if residual.norm() < self.params.still_gyro_threshold
            && accel_error < self.params.still_accel_tolerance
        {
            self.bias += residual * self.params.bias_alpha;
        }
    }

    /// Advance the rejection state machine by `dt` given the current
    /// acceleration magnitude error, and report whether gravity correction
    /// applies this cycle.
    fn correction_active(&mut self, accel_error: f32, dt: f32) -> bool {
        match self.correction {
            Correction::Normal => {
                if accel_error > self.params.accel_rejection {
                    self.state_timer += dt;
                    if self.state_timer > self.params.rejection_timeout {
                        self.correction = Correction::Rejected;
                        self.state_timer = 0.0;
                        log::debug!("accelerometer correction suspended");
                        return false;
                    }
                } else {
                    self.state_timer = 0.0;
                }
                true
            }
            Correction::Rejected => {
                if accel_error <= self.params.accel_rejection {
                    self.correction = Correction::Recovering;
                    self.state_timer = 0.0;
                }
                false
            }
            Correction::Recovering => {
                if accel_error > self.params.accel_rejection {
                    self.correction = Correction::Rejected;
                    self.state_timer = 0.0;
                    return false;
                }
                self.state_timer += dt;
                if self.state_timer >= self.params.recovery_period {
                    self.correction = Correction::Normal;
                    self.state_timer = 0.0;
                    log::debug!("accelerometer correction resumed");
                    return true;
                }
                false
            }
        }
    }
}

impl Estimator for FusionFilter {
    fn update(&mut self, sample: &PhysicalSample, dt: f32) {
        let Some(accel) = sample.accel else {
            // No accelerometer in this layout: integration only.
            integrate(&mut self.orientation, sample.gyro - self.bias, dt);
            return;
        };

        let accel_error = (accel.norm() - 1.0).abs();
        self.learn_bias(sample.gyro, accel_error);
        let mut rate = sample.gyro - self.bias;

        if self.correction_active(accel_error, dt) {
            if let Some(measured_up) = accel.try_normalize(f32::EPSILON) {
                // Error between the orientation's predicted "up" direction
                // and the measured gravity, fed back as a rotation rate.
                let predicted_up = self
                    .orientation
                    .inverse_transform_vector(&world_up());
                let error = measured_up.cross(&predicted_up);
                rate += error * self.params.gain;
            }
        }

        integrate(&mut self.orientation, rate, dt);
    }

    fn orientation(&self) -> UnitQuaternion<f32> {
        self.orientation
    }

    fn reset(&mut self, orientation: UnitQuaternion<f32>) {
        self.orientation = orientation;
        self.correction = Correction::Normal;
        self.state_timer = 0.0;
    }
}
