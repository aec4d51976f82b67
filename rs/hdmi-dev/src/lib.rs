//! # hdmi-dev: native backend for the HDMI scanout peripheral
//!
//! Implements the `scanout` trait seams against real hardware:
//! - [HdmiDev]: the register block, mapped from `/dev/mem`.
//! - [FbPool]/[FbHandle]: DMA-visible framebuffers carved out of a
//!   [u-dma-buf](https://github.com/ikwzm/udmabuf) region, with the cache
//!   flush the peripheral's DMA needs.
//! - [shutdown]: signal-driven emergency stop, restricted to the stop
//!   registers so it is safe at any point of the playback loop.
//!
//! Everything here requires root: both `/dev/mem` and the u-dma-buf
//! character device are privileged.

mod dev;
mod error;
mod fb;

pub mod regs;
pub mod shutdown;

pub use dev::*;
pub use error::*;
pub use fb::*;
