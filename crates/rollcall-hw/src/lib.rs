//! rollcall-hw: Webcam capture for enrollment snapshots and live attendance.
//!
//! Provides V4L2-based camera access and conversion of YUYV/MJPG buffers
//! into RGB frames for the recognizer.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameStream, PixelFormat};
pub use frame::{Frame, FrameError};
