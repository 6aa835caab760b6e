/// Errors that can occur when interacting with the Air glasses.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("Air glasses not found (VID=3318 PID=0424, interface 3)")]
    DeviceNotFound,

    #[error("activation handshake failed: {0}")]
    Handshake(String),

    #[error("device read failed: {0}")]
    Read(String),

    #[error("failed to spawn tracking thread: {0}")]
    Spawn(String),
}
