//! Conversion from raw sensor counts to physical units.
//!
//! Scale factors are fixed per layout and documented as named constants.
//! Conversion also remaps the sensor's native axis order into the reference
//! frame the estimator works in (x right, y up, z toward the viewer):
//! `x = -gyro[0]`, `y = gyro[2]`, `z = gyro[1]`.

use crate::protocol::{ReportLayout, Sample};
use nalgebra::Vector3;

// -- Gen1 scale --
// Counts-to-rad/s factor and offsets determined empirically for this
// firmware; the device does not expose full-scale calibration data.
// Offsets are indexed by reference axis after remap.
pub const GEN1_GYRO_RAD_PER_COUNT: f32 = 1.0e-3;
pub const GEN1_GYRO_OFFSET_COUNTS: [i32; 3] = [15, -6, 15];

// -- Gen2 scale --
// Full-scale range over signed 24-bit counts.
pub const GEN2_GYRO_FULL_SCALE_DPS: f32 = 2000.0;
pub const GEN2_ACCEL_FULL_SCALE_G: f32 = 16.0;
const I24_HALF_RANGE: f32 = 8_388_608.0; // 2^23

pub const GEN2_GYRO_RAD_PER_COUNT: f32 =
    GEN2_GYRO_FULL_SCALE_DPS * (core::f32::consts::PI / 180.0) / I24_HALF_RANGE;
pub const GEN2_ACCEL_G_PER_COUNT: f32 = GEN2_ACCEL_FULL_SCALE_G / I24_HALF_RANGE;

/// One decoded reading in physical units, reference frame axis order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalSample {
    /// Angular velocity in rad/s.
    pub gyro: Vector3<f32>,
    /// Linear acceleration in g (Gen2 only).
    pub accel: Option<Vector3<f32>>,
}

/// Scale a raw [`Sample`] into physical units. Pure, no failure modes.
pub fn physical(sample: &Sample, layout: ReportLayout) -> PhysicalSample {
    match layout {
        ReportLayout::Gen1 => PhysicalSample {
            gyro: gen1_angular_velocity(sample.gyro),
            accel: None,
        },
        ReportLayout::Gen2 => PhysicalSample {
            gyro: remap(sample.gyro, GEN2_GYRO_RAD_PER_COUNT),
            accel: sample.accel.map(|a| remap(a, GEN2_ACCEL_G_PER_COUNT)),
        },
    }
}

/// Gen1 counts to rad/s with per-axis offset correction and remap.
fn gen1_angular_velocity(raw: [i32; 3]) -> Vector3<f32> {
    let o = GEN1_GYRO_OFFSET_COUNTS;
    Vector3::new(
        (raw[0] + o[0]) as f32 * -GEN1_GYRO_RAD_PER_COUNT,
        (raw[2] + o[1]) as f32 * GEN1_GYRO_RAD_PER_COUNT,
        (raw[1] + o[2]) as f32 * GEN1_GYRO_RAD_PER_COUNT,
    )
}

/// Sensor axes to reference frame: (s0, s1, s2) -> (-s0, s2, s1).
fn remap(raw: [i32; 3], scale: f32) -> Vector3<f32> {
    Vector3::new(
        raw[0] as f32 * -scale,
        raw[2] as f32 * scale,
        raw[1] as f32 * scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gen1_applies_offsets_and_remap() {
        let sample = Sample {
            tick: 0,
            gyro: [85, -115, 106],
            accel: None,
            mag: None,
        };
        let phys = physical(&sample, ReportLayout::Gen1);
        // x from sensor axis 0: -(85 + 15) * 1e-3
        assert_relative_eq!(phys.gyro.x, -0.1);
        // y from sensor axis 2: (106 - 6) * 1e-3
        assert_relative_eq!(phys.gyro.y, 0.1);
        // z from sensor axis 1: (-115 + 15) * 1e-3
        assert_relative_eq!(phys.gyro.z, -0.1);
        assert!(phys.accel.is_none());
    }

    #[test]
    fn gen2_full_scale_counts_map_to_full_scale_units() {
        let max = 8_388_607; // 2^23 - 1
        let sample = Sample {
            tick: 0,
            gyro: [0, 0, max],
            accel: Some([0, max, 0]),
            mag: None,
        };
        let phys = physical(&sample, ReportLayout::Gen2);
        // Sensor axis 2 lands on reference y.
        assert_relative_eq!(
            phys.gyro.y,
            GEN2_GYRO_FULL_SCALE_DPS.to_radians(),
            epsilon = 1e-3
        );
        // Sensor axis 1 lands on reference z.
        let accel = phys.accel.unwrap();
        assert_relative_eq!(accel.z, GEN2_ACCEL_FULL_SCALE_G, epsilon = 1e-3);
        assert_relative_eq!(accel.x, 0.0);
    }
}
