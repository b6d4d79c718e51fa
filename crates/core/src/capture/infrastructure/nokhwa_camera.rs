use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution as DeviceResolution,
};
use nokhwa::Camera;

use crate::capture::domain::device_catalog::{DeviceCatalog, DeviceInfo};
use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;
use crate::shared::resolution::Resolution;

/// Enumerates and opens local cameras through nokhwa's native backend
/// (V4L2, AVFoundation or Media Foundation).
pub struct NokhwaCatalog;

impl NokhwaCatalog {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        nokhwa::nokhwa_initialize(|granted| {
            if !granted {
                log::warn!("Camera access was not granted");
            }
        });
        Self
    }
}

impl Default for NokhwaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCatalog for NokhwaCatalog {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>, Box<dyn std::error::Error>> {
        let mut devices: Vec<DeviceInfo> = nokhwa::query(ApiBackend::Auto)?
            .into_iter()
            .filter_map(|info| match info.index() {
                CameraIndex::Index(i) => Some(DeviceInfo {
                    index: *i,
                    name: info.human_name(),
                }),
                CameraIndex::String(_) => None,
            })
            .collect();
        devices.sort_by_key(|d| d.index);
        Ok(devices)
    }

    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
        Ok(Box::new(NokhwaCamera::open(index)?))
    }
}

/// One opened camera. The stream is started lazily on the first read so a
/// resolution request made right after connecting takes effect first.
pub struct NokhwaCamera {
    camera: Option<Camera>,
    index: u32,
    frames_read: usize,
}

// Safety: NokhwaCamera is only used from a single thread at a time; it
// moves to the capture thread and never shares the backend handle.
unsafe impl Send for NokhwaCamera {}

impl NokhwaCamera {
    pub fn open(index: u32) -> Result<Self, nokhwa::NokhwaError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let camera = Camera::new(CameraIndex::Index(index), requested)?;
        log::info!(
            "Opened camera {index} ({}) at {}",
            camera.info().human_name(),
            camera.resolution()
        );
        Ok(Self {
            camera: Some(camera),
            index,
            frames_read: 0,
        })
    }

    fn camera_mut(&mut self) -> Result<&mut Camera, Box<dyn std::error::Error>> {
        self.camera
            .as_mut()
            .ok_or_else(|| format!("camera {} already released", self.index).into())
    }
}

impl FrameSource for NokhwaCamera {
    fn request_resolution(
        &mut self,
        resolution: Resolution,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let camera = self.camera_mut()?;
        camera.set_resolution(DeviceResolution::new(resolution.width, resolution.height))?;
        Ok(())
    }

    fn resolution(&self) -> Resolution {
        self.camera
            .as_ref()
            .map(|c| {
                let res = c.resolution();
                Resolution::new(res.width(), res.height())
            })
            .unwrap_or(Resolution::new(0, 0))
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let index = self.frames_read;
        let camera = self.camera_mut()?;
        if !camera.is_stream_open() {
            camera.open_stream()?;
        }

        let buffer = camera.frame()?;
        if buffer.buffer().is_empty() {
            return Ok(None);
        }
        let image = buffer.decode_image::<RgbFormat>()?;
        let (width, height) = (image.width(), image.height());

        self.frames_read += 1;
        Ok(Some(Frame::new(image.into_raw(), width, height, 3, index)))
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if camera.is_stream_open() {
                if let Err(e) = camera.stop_stream() {
                    log::warn!("Failed to stop camera {} stream: {e}", self.index);
                }
            }
            log::info!("Released camera {}", self.index);
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.release();
    }
}
