//! Wire protocol for the Air glasses IMU stream.
//!
//! The glasses deliver fixed 64-byte HID reports. Bytes `[0]=0x01 [1]=0x02`
//! mark the IMU streaming report; every other report type is skipped. Field
//! offsets differ between firmware generations, so the layout is selected
//! once at configuration time and never auto-detected.

use thiserror::Error;

// -- USB identifiers --
pub const VID: u16 = 0x3318;
pub const PID: u16 = 0x0424;
pub const HID_INTERFACE: i32 = 3;

// -- Packet geometry --
pub const REPORT_SIZE: usize = 64;

/// First two bytes of an IMU streaming report.
pub const REPORT_TYPE: [u8; 2] = [0x01, 0x02];

/// Fixed payload written once after open to start the IMU stream.
/// Firmware-specific and opaque.
pub const ACTIVATION_PAYLOAD: [u8; 10] =
    [0x00, 0xaa, 0xc5, 0xd1, 0x21, 0x42, 0x04, 0x00, 0x19, 0x01];

// -- Gen1 tick clock --
// ~3906000 ticks per second; reports arrive every ~3906 ticks (~1 kHz).
pub const GEN1_TICK_RATE_HZ: f32 = 3_906_000.0;
pub const GEN1_NOMINAL_TICK_DELTA: u64 = 3906;

// -- Gen2 timestamp clock --
// Nanosecond timestamps, nominally 1 ms apart.
pub const GEN2_NOMINAL_TICK_DELTA: u64 = 1_000_000;

/// Report field layout, fixed per firmware generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    /// Original firmware: u32 tick counter + 16-bit angular velocity only.
    Gen1,
    /// Revised firmware: u64 nanosecond timestamp, 24-bit angular velocity
    /// and acceleration, 16-bit magnetic field.
    Gen2,
}

impl ReportLayout {
    /// Seconds per tick of this layout's counter.
    pub fn tick_period(self) -> f32 {
        match self {
            ReportLayout::Gen1 => 1.0 / GEN1_TICK_RATE_HZ,
            ReportLayout::Gen2 => 1.0e-9,
        }
    }

    /// Expected tick spacing between consecutive reports.
    pub fn nominal_tick_delta(self) -> u64 {
        match self {
            ReportLayout::Gen1 => GEN1_NOMINAL_TICK_DELTA,
            ReportLayout::Gen2 => GEN2_NOMINAL_TICK_DELTA,
        }
    }

    /// Elapsed ticks from `prev` to `current`, wraparound-safe at the
    /// counter's native width.
    pub fn tick_delta(self, prev: u64, current: u64) -> u64 {
        match self {
            ReportLayout::Gen1 => (current as u32).wrapping_sub(prev as u32) as u64,
            ReportLayout::Gen2 => current.wrapping_sub(prev),
        }
    }
}

/// Decoded IMU report in raw sensor counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Device tick counter (Gen1) or nanosecond timestamp (Gen2).
    pub tick: u64,
    /// Angular velocity in raw counts, sensor axis order.
    pub gyro: [i32; 3],
    /// Linear acceleration in raw counts (Gen2 only).
    pub accel: Option<[i32; 3]>,
    /// Magnetic field in raw counts (Gen2 only).
    pub mag: Option<[i16; 3]>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    /// Wrong buffer size. Logged by the caller, cycle skipped.
    #[error("unexpected report length {0}, expected {REPORT_SIZE}")]
    InvalidLength(usize),
    /// Recognized transport, unrecognized report type. Not an error,
    /// just "skip this cycle".
    #[error("not an IMU streaming report")]
    Ignored,
}

/// Decode one raw HID report into a [`Sample`].
///
/// Steady-state path is allocation-free; called at the full device rate.
pub fn decode(buf: &[u8], layout: ReportLayout) -> Result<Sample, DecodeError> {
    if buf.len() != REPORT_SIZE {
        return Err(DecodeError::InvalidLength(buf.len()));
    }
    if buf[0] != REPORT_TYPE[0] || buf[1] != REPORT_TYPE[1] {
        return Err(DecodeError::Ignored);
    }

    match layout {
        ReportLayout::Gen1 => Ok(Sample {
            tick: read_u32(buf, 5) as u64,
            gyro: [
                read_i16(buf, 19) as i32,
                read_i16(buf, 22) as i32,
                read_i16(buf, 25) as i32,
            ],
            accel: None,
            mag: None,
        }),
        ReportLayout::Gen2 => Ok(Sample {
            tick: read_u64(buf, 4),
            gyro: [read_i24(buf, 18), read_i24(buf, 21), read_i24(buf, 24)],
            accel: Some([read_i24(buf, 33), read_i24(buf, 36), read_i24(buf, 39)]),
            mag: Some([read_i16(buf, 48), read_i16(buf, 50), read_i16(buf, 52)]),
        }),
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(bytes)
}

fn read_i16(buf: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([buf[off], buf[off + 1]])
}

/// Little-endian 24-bit signed field, sign-extended to 32 bits by testing
/// the top bit of the on-wire width.
fn read_i24(buf: &[u8], off: usize) -> i32 {
    let raw = u32::from(buf[off]) | u32::from(buf[off + 1]) << 8 | u32::from(buf[off + 2]) << 16;
    if raw & 0x80_0000 != 0 {
        (raw | 0xFF00_0000) as i32
    } else {
        raw as i32
    }
}
