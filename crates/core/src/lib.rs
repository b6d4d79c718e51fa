pub mod capture;
pub mod overlay;
pub mod recording;
pub mod shared;
pub mod video;
