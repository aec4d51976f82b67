use crate::Coordinate;

/// A physical address handed to the peripheral's DMA engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhysAddr(pub u64);

/// The display peripheral's control surface.
///
/// Implementations are register pokes; none of these calls may block except
/// [ScanoutDevice::stop], which waits for the hardware to acknowledge.
pub trait ScanoutDevice {
	/// The current scan position. Cheap and safe to call arbitrarily often;
	/// the presenter spins on it for sub-refresh timing.
	fn coordinate(&mut self) -> Coordinate;

	/// Register the buffer to scan out next.
	///
	/// The peripheral latches the new address at the start of its next
	/// refresh, not immediately.
	fn set_framebuffer(&mut self, addr: PhysAddr);

	/// Start output.
	fn start(&mut self);

	/// Stop output at the next frame boundary, waiting for the peripheral
	/// to acknowledge completion.
	fn stop(&mut self);

	/// Stop output immediately, without waiting.
	fn stop_now(&mut self);
}

/// One DMA-visible frame buffer.
pub trait Framebuffer {
	/// The writable image region.
	fn data(&mut self) -> &mut [u8];

	/// Clean the buffer out of any write-back cache so the peripheral
	/// observes every written byte. Skipping this risks scanning out stale
	/// or partially-written pixel data.
	fn flush(&mut self);

	/// The physical address the peripheral scans from.
	fn address(&self) -> PhysAddr;
}

/// The outcome of a successful [FrameSource::fill].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
	/// One decoded frame was written to the destination.
	Frame,

	/// End of stream; the destination was not written.
	End,
}

/// Supplies decoded frames one at a time.
pub trait FrameSource {
	type Error: std::error::Error;

	/// Decode the next frame into `dest`.
	///
	/// A recoverable decode error returns `Err` but still leaves `dest` in
	/// a usable, if corrupted, state; the presenter shows it as-is rather
	/// than skipping or retrying.
	fn fill(&mut self, dest: &mut [u8]) -> Result<Fill, Self::Error>;
}
