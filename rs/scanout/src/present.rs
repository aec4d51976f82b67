use std::mem;
use std::num::NonZeroU16;

use crate::{Fill, Framebuffer, FrameSource, ScanoutDevice, DEADLINE_ROW};

/// Playback totals reported when the stream ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
	/// Frames handed to the peripheral.
	pub frames: u64,

	/// Frames that missed their presentation deadline.
	pub late: u64,
}

/// The double-buffered presentation scheduler.
///
/// One frame is shown every `fdiv` hardware refreshes. While the peripheral
/// scans out one buffer the source decodes into the other; the two swap
/// ownership once per presented frame.
pub struct Presenter {
	fdiv: NonZeroU16,
	stats: Stats,
}

impl Presenter {
	pub fn new(fdiv: NonZeroU16) -> Self {
		Self {
			fdiv,
			stats: Stats::default(),
		}
	}

	/// Run playback to completion, returning when the source reports end of
	/// stream. The caller still owns the device and is responsible for
	/// stopping output afterwards.
	///
	/// Every presented frame goes through a two-window handover:
	///
	/// 1. *Swap window*: spin until exactly one refresh remains before the
	///    frame is due, so the peripheral has finished scanning the buffer
	///    being replaced, then register the new buffer.
	/// 2. *Effect window*: the peripheral only latches the new address at
	///    the next refresh start, so spin until that refresh has begun
	///    before letting the source overwrite the old buffer.
	///
	/// Skipping the first wait could land the handover mid-scan of the
	/// outgoing buffer; skipping the second would let the decoder clobber a
	/// buffer still on screen.
	///
	/// A missed deadline is diagnostic only: the frame is presented anyway
	/// and playback degrades to a lower effective rate. Recoverable decode
	/// errors are logged and the buffer is presented as-is.
	pub fn run<D, S, B>(&mut self, device: &mut D, source: &mut S, front: B, back: B) -> Stats
	where
		D: ScanoutDevice,
		S: FrameSource,
		B: Framebuffer,
	{
		let fdiv = i32::from(self.fdiv.get());

		// The first frame is presented immediately: there is no earlier
		// frame to time against, so no deadline checks and no waits.
		let mut decode = front;
		match source.fill(decode.data()) {
			Ok(Fill::Frame) => {}
			Ok(Fill::End) => {
				tracing::debug!("end of stream before the first frame");
				return self.stats;
			}
			Err(err) => tracing::error!(%err, "decode error, presenting buffer as-is"),
		}
		decode.flush();
		device.set_framebuffer(decode.address());
		device.start();
		let mut last = device.coordinate();
		self.stats.frames += 1;

		// From here on exactly one buffer is on screen and the other belongs
		// to the source. Ownership moves between the two bindings at the
		// single swap below, never earlier.
		let mut scanout = decode;
		let mut decode = back;

		loop {
			match source.fill(decode.data()) {
				Ok(Fill::Frame) => {}
				Ok(Fill::End) => {
					tracing::debug!(frames = self.stats.frames, "end of stream");
					break;
				}
				Err(err) => tracing::error!(%err, "decode error, presenting buffer as-is"),
			}
			decode.flush();

			let mut cur = device.coordinate();
			let mut fid_delta = cur.fid.delta(last.fid);

			// The frame is late if it is already due, or due next refresh
			// with the beam too close to the bottom of the frame.
			let overshoot_frame = fid_delta >= fdiv;
			let overshoot_row = fid_delta == fdiv - 1 && cur.row >= DEADLINE_ROW;
			if overshoot_frame || overshoot_row {
				self.stats.late += 1;
				tracing::warn!(fid_delta, row = cur.row, "missed presentation deadline");
			}

			// Swap window.
			while fid_delta < fdiv - 1 {
				std::hint::spin_loop();
				cur = device.coordinate();
				fid_delta = cur.fid.delta(last.fid);
			}
			device.set_framebuffer(decode.address());

			// Effect window.
			while fid_delta < fdiv {
				std::hint::spin_loop();
				cur = device.coordinate();
				fid_delta = cur.fid.delta(last.fid);
			}

			last = cur;
			self.stats.frames += 1;
			mem::swap(&mut decode, &mut scanout);
		}

		self.stats
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Coordinate, FrameId, PhysAddr, TOTAL_ROWS};
	use std::cell::RefCell;
	use std::collections::VecDeque;
	use std::rc::Rc;

	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	enum Event {
		/// One coordinate read, i.e. one spin of a wait loop.
		Poll,
		/// The source began writing the buffer at this address.
		Data(u64),
		Flush(u64),
		SetFb(u64),
		Start,
	}

	type Log = Rc<RefCell<Vec<Event>>>;

	/// A device whose scan position advances a fixed number of rows per poll.
	struct FreeRun {
		fid: u16,
		row: u16,
		rows_per_poll: u16,
		log: Log,
	}

	impl FreeRun {
		fn new(rows_per_poll: u16, log: Log) -> Self {
			Self {
				fid: 0,
				row: 0,
				rows_per_poll,
				log,
			}
		}
	}

	impl ScanoutDevice for FreeRun {
		fn coordinate(&mut self) -> Coordinate {
			self.log.borrow_mut().push(Event::Poll);
			let cur = Coordinate {
				fid: FrameId(self.fid),
				row: self.row,
			};
			let mut row = u32::from(self.row) + u32::from(self.rows_per_poll);
			while row >= u32::from(TOTAL_ROWS) {
				row -= u32::from(TOTAL_ROWS);
				self.fid = self.fid.wrapping_add(1);
			}
			self.row = row as u16;
			cur
		}

		fn set_framebuffer(&mut self, addr: PhysAddr) {
			self.log.borrow_mut().push(Event::SetFb(addr.0));
		}

		fn start(&mut self) {
			self.log.borrow_mut().push(Event::Start);
		}

		fn stop(&mut self) {}

		fn stop_now(&mut self) {}
	}

	/// A device that replays an exact sequence of coordinates.
	struct Scripted {
		coords: VecDeque<Coordinate>,
		log: Log,
	}

	impl Scripted {
		fn new(coords: &[(u16, u16)], log: Log) -> Self {
			Self {
				coords: coords
					.iter()
					.map(|&(fid, row)| Coordinate {
						fid: FrameId(fid),
						row,
					})
					.collect(),
				log,
			}
		}
	}

	impl ScanoutDevice for Scripted {
		fn coordinate(&mut self) -> Coordinate {
			self.log.borrow_mut().push(Event::Poll);
			self.coords.pop_front().expect("coordinate script exhausted")
		}

		fn set_framebuffer(&mut self, addr: PhysAddr) {
			self.log.borrow_mut().push(Event::SetFb(addr.0));
		}

		fn start(&mut self) {
			self.log.borrow_mut().push(Event::Start);
		}

		fn stop(&mut self) {}

		fn stop_now(&mut self) {}
	}

	struct TestFb {
		addr: u64,
		bytes: Vec<u8>,
		log: Log,
	}

	impl TestFb {
		fn new(addr: u64, log: Log) -> Self {
			Self {
				addr,
				bytes: vec![0; 16],
				log,
			}
		}
	}

	impl Framebuffer for TestFb {
		fn data(&mut self) -> &mut [u8] {
			self.log.borrow_mut().push(Event::Data(self.addr));
			&mut self.bytes
		}

		fn flush(&mut self) {
			self.log.borrow_mut().push(Event::Flush(self.addr));
		}

		fn address(&self) -> PhysAddr {
			PhysAddr(self.addr)
		}
	}

	#[derive(Debug, PartialEq, Eq)]
	struct TestError;

	impl std::fmt::Display for TestError {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			write!(f, "scripted decode error")
		}
	}

	impl std::error::Error for TestError {}

	/// Yields the scripted results, then end-of-stream forever.
	struct TestSource {
		script: VecDeque<Result<Fill, TestError>>,
	}

	impl TestSource {
		fn frames(n: usize) -> Self {
			Self {
				script: (0..n).map(|_| Ok(Fill::Frame)).collect(),
			}
		}

		fn script(script: Vec<Result<Fill, TestError>>) -> Self {
			Self {
				script: script.into(),
			}
		}
	}

	impl FrameSource for TestSource {
		type Error = TestError;

		fn fill(&mut self, _dest: &mut [u8]) -> Result<Fill, TestError> {
			self.script.pop_front().unwrap_or(Ok(Fill::End))
		}
	}

	fn setup() -> (Log, TestFb, TestFb) {
		let log: Log = Rc::default();
		let front = TestFb::new(0, log.clone());
		let back = TestFb::new(1, log.clone());
		(log, front, back)
	}

	fn fdiv(n: u16) -> NonZeroU16 {
		NonZeroU16::new(n).unwrap()
	}

	#[test]
	fn eof_on_first_frame_presents_nothing() {
		let (log, front, back) = setup();
		let mut device = Scripted::new(&[], log.clone());
		let mut source = TestSource::frames(0);

		let stats = Presenter::new(fdiv(3)).run(&mut device, &mut source, front, back);

		assert_eq!(stats, Stats { frames: 0, late: 0 });
		let events = log.borrow();
		assert!(!events.iter().any(|e| matches!(e, Event::SetFb(_) | Event::Start)));
	}

	#[test]
	fn bootstrap_presents_without_waiting() {
		let (log, front, back) = setup();
		// Exactly one read: the start coordinate. Any wait would exhaust the script.
		let mut device = Scripted::new(&[(10, 0)], log.clone());
		let mut source = TestSource::frames(1);

		let stats = Presenter::new(fdiv(5)).run(&mut device, &mut source, front, back);

		assert_eq!(stats, Stats { frames: 1, late: 0 });
		assert_eq!(
			log.borrow().as_slice(),
			&[
				Event::Data(0),
				Event::Flush(0),
				Event::SetFb(0),
				Event::Start,
				Event::Poll,
				// The EOF probe of the second slot.
				Event::Data(1),
			]
		);
	}

	#[test]
	fn slots_alternate_and_never_collide() {
		let (log, front, back) = setup();
		let mut device = FreeRun::new(100, log.clone());
		let mut source = TestSource::frames(6);

		let stats = Presenter::new(fdiv(1)).run(&mut device, &mut source, front, back);
		assert_eq!(stats.frames, 6);
		assert_eq!(stats.late, 0);

		let events = log.borrow();

		let data: Vec<u64> = events
			.iter()
			.filter_map(|e| match e {
				Event::Data(a) => Some(*a),
				_ => None,
			})
			.collect();
		let setfb: Vec<u64> = events
			.iter()
			.filter_map(|e| match e {
				Event::SetFb(a) => Some(*a),
				_ => None,
			})
			.collect();
		assert_eq!(data, &[0, 1, 0, 1, 0, 1, 0]); // last is the EOF probe
		assert_eq!(setfb, &[0, 1, 0, 1, 0, 1]);

		// The source must never write the buffer most recently registered
		// with the peripheral, and the effect window must have spun at
		// least once before the next decode begins.
		let mut registered = None;
		let mut polls_since_setfb = 0;
		for event in events.iter() {
			match event {
				Event::SetFb(a) => {
					registered = Some(*a);
					polls_since_setfb = 0;
				}
				Event::Poll => polls_since_setfb += 1,
				Event::Data(a) => {
					if let Some(registered) = registered {
						assert_ne!(*a, registered, "decoder wrote the buffer on screen");
						assert!(polls_since_setfb > 0, "decode began before the swap took effect");
					}
				}
				_ => {}
			}
		}
	}

	#[test]
	fn divider_blocks_two_refreshes_per_frame() {
		let (log, front, back) = setup();
		// One full refresh elapses per poll, so every poll is one refresh.
		let mut device = FreeRun::new(TOTAL_ROWS, log.clone());
		let mut source = TestSource::frames(4);

		let stats = Presenter::new(fdiv(3)).run(&mut device, &mut source, front, back);
		assert_eq!(stats, Stats { frames: 4, late: 0 });

		// Steady-state iterations are delimited by Data events. Each must
		// poll exactly three times (the deadline sample, then FDIV-1 = 2
		// refreshes of waiting split around the buffer registration), with
		// the registration after the second poll.
		let events = log.borrow();
		let starts: Vec<usize> = events
			.iter()
			.enumerate()
			.filter_map(|(i, e)| matches!(e, Event::Data(_)).then_some(i))
			.collect();

		// Skip the bootstrap iteration and the trailing EOF probe.
		for window in starts[1..].windows(2) {
			let slice = &events[window[0]..window[1]];
			let polls = slice.iter().filter(|e| matches!(e, Event::Poll)).count();
			assert_eq!(polls, 3);
			let setfb = slice.iter().position(|e| matches!(e, Event::SetFb(_))).unwrap();
			let polls_before = slice[..setfb].iter().filter(|e| matches!(e, Event::Poll)).count();
			assert_eq!(polls_before, 2);
		}
	}

	#[test]
	fn deadline_missed_when_frame_overdue() {
		let (log, front, back) = setup();
		// Bootstrap at fid 5; by the next decode the beam is already at
		// fid 7, two refreshes later, so the FDIV=2 deadline has passed.
		let mut device = Scripted::new(&[(5, 0), (7, 0)], log.clone());
		let mut source = TestSource::frames(2);

		let stats = Presenter::new(fdiv(2)).run(&mut device, &mut source, front, back);
		assert_eq!(stats, Stats { frames: 2, late: 1 });
	}

	#[test]
	fn deadline_missed_on_last_row() {
		let (log, front, back) = setup();
		// One refresh remains but the beam is on the final scanline: under
		// the ~31us margin, so the frame counts as late.
		let mut device = Scripted::new(&[(5, 0), (6, DEADLINE_ROW), (7, 0)], log.clone());
		let mut source = TestSource::frames(2);

		let stats = Presenter::new(fdiv(2)).run(&mut device, &mut source, front, back);
		assert_eq!(stats, Stats { frames: 2, late: 1 });
	}

	#[test]
	fn deadline_met_just_inside_margin() {
		let (log, front, back) = setup();
		let mut device = Scripted::new(&[(5, 0), (6, DEADLINE_ROW - 1), (7, 0)], log.clone());
		let mut source = TestSource::frames(2);

		let stats = Presenter::new(fdiv(2)).run(&mut device, &mut source, front, back);
		assert_eq!(stats, Stats { frames: 2, late: 0 });
	}

	#[test]
	fn decode_error_presents_buffer_as_is() {
		let (log, front, back) = setup();
		let mut device = Scripted::new(&[(0, 0)], log.clone());
		let mut source = TestSource::script(vec![Err(TestError)]);

		let stats = Presenter::new(fdiv(2)).run(&mut device, &mut source, front, back);

		// The corrupted first frame still starts playback.
		assert_eq!(stats.frames, 1);
		assert!(log.borrow().contains(&Event::Start));
	}
}
