use std::path::Path;

use ffmpeg_next as ffmpeg;
use scanout::{Fill, FrameSource, FRAME_BYTES, HEIGHT, WIDTH};

/// Errors from opening or decoding the input video.
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
	#[error("failed to open input: {0}")]
	Open(ffmpeg::Error),

	#[error("input must contain exactly one video stream")]
	StreamLayout,

	#[error("input must be 640x480 YUV420P, got {got}")]
	Format { got: String },

	#[error("destination buffer too small")]
	WrongSize,

	#[error("decode error: {0}")]
	Decode(ffmpeg::Error),
}

pub type Result<T> = std::result::Result<T, VideoError>;

/// A video file decoded one frame per [FrameSource::fill] call.
///
/// Frames are written as tightly-packed planar YUV420P (Y, then U, then V),
/// the layout the peripheral's scanout engine expects.
pub struct Video {
	input: ffmpeg::format::context::Input,
	decoder: ffmpeg::decoder::Video,
	stream: usize,
	eof_sent: bool,
}

impl Video {
	/// Open and validate the input.
	///
	/// The container must hold a single 640x480 YUV420P video stream with
	/// no audio.
	pub fn open(path: &Path) -> Result<Self> {
		ffmpeg::init().map_err(VideoError::Open)?;

		let input = ffmpeg::format::input(&path).map_err(VideoError::Open)?;
		if input.streams().count() != 1 {
			return Err(VideoError::StreamLayout);
		}
		let stream = input
			.streams()
			.best(ffmpeg::media::Type::Video)
			.ok_or(VideoError::StreamLayout)?;
		let index = stream.index();

		let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
			.map_err(VideoError::Open)?;
		let decoder = context.decoder().video().map_err(VideoError::Open)?;

		if decoder.width() != WIDTH as u32
			|| decoder.height() != HEIGHT as u32
			|| decoder.format() != ffmpeg::format::Pixel::YUV420P
		{
			return Err(VideoError::Format {
				got: format!(
					"{}x{} {:?}",
					decoder.width(),
					decoder.height(),
					decoder.format()
				),
			});
		}

		tracing::debug!(path = %path.display(), codec = ?decoder.id(), "opened video");

		Ok(Self {
			input,
			decoder,
			stream: index,
			eof_sent: false,
		})
	}

	/// Feed the decoder the next packet, or the EOF marker once the
	/// container runs dry.
	fn feed(&mut self) -> Result<()> {
		let mut packet = ffmpeg::Packet::empty();
		loop {
			match packet.read(&mut self.input) {
				Ok(()) => {
					if packet.stream() != self.stream {
						continue;
					}
					return self.decoder.send_packet(&packet).map_err(VideoError::Decode);
				}
				Err(ffmpeg::Error::Eof) => {
					if !self.eof_sent {
						self.eof_sent = true;
						self.decoder.send_eof().map_err(VideoError::Decode)?;
					}
					return Ok(());
				}
				Err(err) => return Err(VideoError::Decode(err)),
			}
		}
	}

	/// Copy the decoded planes into the packed destination layout,
	/// dropping any FFmpeg row padding.
	fn pack(&self, frame: &ffmpeg::frame::Video, dest: &mut [u8]) -> Result<()> {
		if frame.format() != ffmpeg::format::Pixel::YUV420P
			|| frame.width() != WIDTH as u32
			|| frame.height() != HEIGHT as u32
		{
			return Err(VideoError::Format {
				got: format!("{}x{} {:?}", frame.width(), frame.height(), frame.format()),
			});
		}
		if dest.len() < FRAME_BYTES {
			return Err(VideoError::WrongSize);
		}

		let mut offset = 0;
		for plane in 0..3 {
			let (width, height) = plane_size(plane);
			let stride = frame.stride(plane);
			let data = frame.data(plane);
			for row in 0..height {
				let src = &data[row * stride..row * stride + width];
				dest[offset..offset + width].copy_from_slice(src);
				offset += width;
			}
		}
		Ok(())
	}
}

impl FrameSource for Video {
	type Error = VideoError;

	fn fill(&mut self, dest: &mut [u8]) -> Result<Fill> {
		loop {
			// Drain a frame already buffered in the decoder, if any.
			let mut frame = ffmpeg::frame::Video::empty();
			match self.decoder.receive_frame(&mut frame) {
				Ok(()) => {
					self.pack(&frame, dest)?;
					return Ok(Fill::Frame);
				}
				Err(ffmpeg::Error::Eof) => return Ok(Fill::End),
				Err(ffmpeg::Error::Other { errno: libc::EAGAIN }) => {}
				Err(err) => return Err(VideoError::Decode(err)),
			}

			self.feed()?;
		}
	}
}

/// Plane geometry for 640x480 YUV420P: full-size luma, quarter-size chroma.
fn plane_size(plane: usize) -> (usize, usize) {
	match plane {
		0 => (WIDTH, HEIGHT),
		_ => (WIDTH / 2, HEIGHT / 2),
	}
}
