//! # hdmi-video: FFmpeg frame source
//!
//! Decodes a video file into the tightly-packed YUV420P layout the HDMI
//! peripheral scans out. The input must be 640x480 with a single video
//! stream; anything else is rejected at open time.

mod video;

pub use video::*;
