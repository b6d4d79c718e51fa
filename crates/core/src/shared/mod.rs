pub mod constants;
pub mod font_resolver;
pub mod frame;
pub mod resolution;
pub mod video_metadata;
