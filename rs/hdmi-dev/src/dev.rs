use std::fs::OpenOptions;
use std::ptr;

use memmap2::{MmapMut, MmapOptions};
use scanout::{Coordinate, PhysAddr, ScanoutDevice};

use crate::regs;
use crate::Result;

/// The memory-mapped HDMI scanout peripheral.
pub struct HdmiDev {
	regs: MmapMut,
}

impl HdmiDev {
	/// Map the register block from `/dev/mem`. Fails without root.
	pub fn open() -> Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open("/dev/mem")?;
		let regs = unsafe {
			MmapOptions::new()
				.offset(regs::BASE)
				.len(regs::LEN)
				.map_mut(&file)?
		};
		tracing::debug!(base = %format_args!("{:#x}", regs::BASE), "mapped HDMI registers");
		Ok(Self { regs })
	}

	fn read(&self, reg: usize) -> u32 {
		unsafe { ptr::read_volatile(self.regs.as_ptr().add(reg) as *const u32) }
	}

	fn write(&mut self, reg: usize, value: u32) {
		unsafe { ptr::write_volatile(self.regs.as_mut_ptr().add(reg) as *mut u32, value) }
	}

	/// Raw register base, consumed only by [crate::shutdown::arm].
	pub(crate) fn regs_ptr(&self) -> *mut u32 {
		self.regs.as_ptr() as *mut u32
	}
}

impl ScanoutDevice for HdmiDev {
	fn coordinate(&mut self) -> Coordinate {
		regs::unpack_scan(self.read(regs::SCAN))
	}

	fn set_framebuffer(&mut self, addr: PhysAddr) {
		self.write(regs::FBADDR, addr.0 as u32);
	}

	fn start(&mut self) {
		tracing::debug!("starting output");
		self.write(regs::CTRL, regs::CTRL_RUN);
	}

	fn stop(&mut self) {
		tracing::debug!("stopping output");
		self.write(regs::CTRL, 0);
		// The stop takes effect at the next frame boundary.
		while self.read(regs::STAT) & regs::STAT_ACTIVE != 0 {
			std::hint::spin_loop();
		}
	}

	fn stop_now(&mut self) {
		self.write(regs::CTRL, regs::CTRL_FORCE);
	}
}
