//! # scanout: double-buffered frame presentation
//!
//! `scanout` schedules decoded video frames onto a scanout-driven display
//! peripheral at a sub-multiple of its native refresh rate.
//! The peripheral reports its scan position as a wrapping (frame id, row)
//! [Coordinate]; everything else is derived from that single clock.
//!
//! ## API
//!
//! The crate is built around three trait seams:
//! - [ScanoutDevice]: the peripheral's registers (scan position, buffer swap, start/stop).
//! - [Framebuffer]: one DMA-visible image buffer with a cache flush primitive.
//! - [FrameSource]: produces one decoded frame at a time into a caller-supplied buffer.
//!
//! [Presenter] drives all three in a busy-polling loop, alternating two
//! [Framebuffer]s so the next frame decodes while the previous one is on
//! screen. The handover protocol guarantees the peripheral never scans a
//! buffer the decoder is still writing; see [Presenter::run] for details.

mod coordinate;
mod present;
mod traits;

pub use coordinate::*;
pub use present::*;
pub use traits::*;
