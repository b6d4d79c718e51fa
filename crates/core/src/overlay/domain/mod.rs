pub mod frame_annotator;
pub mod timestamp_format;
