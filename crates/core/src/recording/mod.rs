pub mod capture_loop;
pub mod capture_session;
pub mod clock;
pub mod frame_pacer;
pub mod recording_config;
pub mod recording_error;
pub mod segment_catalog;
pub mod segment_naming;
pub mod segment_writer;
pub mod session_event;
pub mod session_logger;
pub mod session_state;
