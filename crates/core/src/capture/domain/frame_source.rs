use crate::shared::frame::Frame;
use crate::shared::resolution::Resolution;

/// An opened camera handle that yields RGB24 frames on demand.
///
/// Implementations own the device exclusively; dropping or releasing the
/// handle gives the device back to the system.
pub trait FrameSource: Send {
    /// Asks the device for a capture size. Devices may pick the closest
    /// mode they support, so callers must read back [`resolution`].
    ///
    /// [`resolution`]: FrameSource::resolution
    fn request_resolution(
        &mut self,
        resolution: Resolution,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// The size frames are actually delivered at.
    fn resolution(&self) -> Resolution;

    /// Blocks until the device delivers a frame. `Ok(None)` means the
    /// device answered but had no picture.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Stops streaming and releases the device. Safe to call twice.
    fn release(&mut self);
}
