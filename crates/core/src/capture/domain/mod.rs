pub mod device_catalog;
pub mod frame_source;
