//! The single cross-thread-visible copy of the current orientation.

use nalgebra::UnitQuaternion;
use std::sync::Mutex;

/// Mutex-guarded orientation cell shared between the acquisition thread
/// (sole writer during tracking) and any number of readers.
///
/// The lock is held only for the duration of the copy, never across
/// estimation math, so a slow reader cannot stall the writer and vice
/// versa. Each `get`/`set` is independently atomic; readers can never
/// observe a torn quaternion.
#[derive(Debug)]
pub struct SharedOrientation {
    inner: Mutex<UnitQuaternion<f32>>,
}

impl SharedOrientation {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(UnitQuaternion::identity()),
        }
    }

    /// Consistent snapshot of the current orientation.
    pub fn get(&self) -> UnitQuaternion<f32> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Atomically replace the stored orientation.
    pub fn set(&self, orientation: UnitQuaternion<f32>) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = orientation;
    }
}

impl Default for SharedOrientation {
    fn default() -> Self {
        Self::new()
    }
}
