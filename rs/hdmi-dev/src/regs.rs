//! Register map of the HDMI scanout peripheral.

use scanout::{Coordinate, FrameId};

/// Physical base of the register block.
pub const BASE: u64 = 0x4300_0000;

/// One page covers the whole block.
pub const LEN: usize = 0x1000;

/// Control register. Writing [CTRL_RUN] starts output; clearing it requests
/// a stop at the next frame boundary; [CTRL_FORCE] kills output immediately.
pub const CTRL: usize = 0x00;

/// Status register. [STAT_ACTIVE] stays set until a requested stop has
/// taken effect.
pub const STAT: usize = 0x04;

/// Scan position register, latched per pixel clock: frame id in bits 31:16,
/// row in bits 9:0.
pub const SCAN: usize = 0x08;

/// Physical address of the framebuffer to scan out next, latched by the
/// hardware at the start of each refresh.
pub const FBADDR: usize = 0x0c;

pub const CTRL_RUN: u32 = 1 << 0;
pub const CTRL_FORCE: u32 = 1 << 1;
pub const STAT_ACTIVE: u32 = 1 << 0;

const ROW_MASK: u32 = 0x3ff;

/// Decode one read of the [SCAN] register.
pub fn unpack_scan(word: u32) -> Coordinate {
	Coordinate {
		fid: FrameId((word >> 16) as u16),
		row: (word & ROW_MASK) as u16,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use scanout::TOTAL_ROWS;

	fn pack_scan(fid: u16, row: u16) -> u32 {
		(u32::from(fid) << 16) | (u32::from(row) & ROW_MASK)
	}

	#[test]
	fn scan_round_trips() {
		for (fid, row) in [(0, 0), (1, 524), (65535, 100), (0x1234, TOTAL_ROWS - 1)] {
			let coord = unpack_scan(pack_scan(fid, row));
			assert_eq!(coord.fid, FrameId(fid));
			assert_eq!(coord.row, row);
		}
	}

	#[test]
	fn scan_ignores_reserved_bits() {
		// Bits 15:10 are reserved and must not leak into the row.
		let coord = unpack_scan(0x0001_fc05);
		assert_eq!(coord.fid, FrameId(1));
		assert_eq!(coord.row, 5);
	}
}
