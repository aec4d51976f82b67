/// Frame width in pixels.
pub const WIDTH: usize = 640;

/// Frame height in visible scanlines.
pub const HEIGHT: usize = 480;

/// Scanlines per refresh, visible plus blanking (640x480@60 timing).
pub const TOTAL_ROWS: u16 = 525;

/// Rows at or past this threshold leave under ~31us before the frame ends,
/// too little margin to safely register a buffer for the next refresh.
pub const DEADLINE_ROW: u16 = 524;

/// Bytes in one decoded frame: YUV420P planes, tightly packed.
pub const FRAME_BYTES: usize = WIDTH * HEIGHT + 2 * (WIDTH / 2) * (HEIGHT / 2);

/// The peripheral's wrapping frame counter.
///
/// The raw value increments once per hardware refresh and wraps at 2^16.
/// Never compare two ids with raw subtraction or ordering; use [FrameId::delta],
/// which accounts for the wrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameId(pub u16);

impl FrameId {
	/// The signed number of refreshes since `earlier`, of minimal magnitude.
	///
	/// Correct as long as the true distance is under half the counter's
	/// modulus, which a poll loop re-sampling every few microseconds
	/// trivially satisfies. While polled against a fixed `earlier` the
	/// result is monotonically non-decreasing as real time advances.
	pub fn delta(self, earlier: FrameId) -> i32 {
		self.0.wrapping_sub(earlier.0) as i16 as i32
	}
}

/// A scan position reported by the peripheral.
///
/// `row` ranges over `0..TOTAL_ROWS` and resets each refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Coordinate {
	pub fid: FrameId,
	pub row: u16,
}
