use super::frame_source::FrameSource;

/// A capture device as presented to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: u32,
    pub name: String,
}

/// Enumerates cameras and opens them by index.
pub trait DeviceCatalog: Send {
    /// Devices ordered by index.
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, Box<dyn std::error::Error>>;

    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>>;
}
