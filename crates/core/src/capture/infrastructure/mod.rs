pub mod nokhwa_camera;
