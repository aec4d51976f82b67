//! Signal-driven emergency stop.
//!
//! The handler runs asynchronously with respect to the playback loop, which
//! may be suspended between any two instructions. It is therefore limited to
//! the peripheral's stop registers and `_exit`: no allocation, no
//! framebuffer access, no decoder access, no normal teardown.

use std::io;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::regs;
use crate::HdmiDev;

static REGS: AtomicPtr<u32> = AtomicPtr::new(ptr::null_mut());

/// How a signal stops the peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
	/// The normal stop sequence, waiting for the hardware to acknowledge.
	Graceful,

	/// Immediate stop, no wait.
	Immediate,
}

/// SIGINT gets the graceful sequence; anything else stops immediately.
pub fn severity(signum: libc::c_int) -> Severity {
	if signum == libc::SIGINT {
		Severity::Graceful
	} else {
		Severity::Immediate
	}
}

/// Install handlers for SIGINT and SIGTERM.
pub fn install() -> io::Result<()> {
	unsafe {
		let mut action: libc::sigaction = std::mem::zeroed();
		action.sa_sigaction = handler as libc::sighandler_t;
		for signum in [libc::SIGINT, libc::SIGTERM] {
			if libc::sigaction(signum, &action, ptr::null_mut()) != 0 {
				return Err(io::Error::last_os_error());
			}
		}
	}
	Ok(())
}

/// Point the handler at the device's register block. Until this is called a
/// signal terminates the process without touching the hardware.
pub fn arm(dev: &HdmiDev) {
	REGS.store(dev.regs_ptr(), Ordering::Release);
}

extern "C" fn handler(signum: libc::c_int) {
	let base = REGS.load(Ordering::Acquire);
	if !base.is_null() {
		unsafe {
			match severity(signum) {
				Severity::Graceful => {
					ptr::write_volatile(base.add(regs::CTRL / 4), 0);
					while ptr::read_volatile(base.add(regs::STAT / 4) as *const u32)
						& regs::STAT_ACTIVE != 0
					{
						std::hint::spin_loop();
					}
				}
				Severity::Immediate => {
					ptr::write_volatile(base.add(regs::CTRL / 4), regs::CTRL_FORCE);
				}
			}
		}
	}
	// Bypasses atexit and the loop's own cleanup; the process exit reclaims
	// the buffers and the decoder.
	unsafe { libc::_exit(2) }
}
