use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use scanout::{Framebuffer, PhysAddr, FRAME_BYTES};

use crate::{DevError, Result};

const UDMABUF_DEV: &str = "/dev/udmabuf0";
const UDMABUF_SYS: &str = "/sys/class/u-dma-buf/udmabuf0";

const PAGE: usize = 4096;

/// Each framebuffer occupies a page-aligned slot of the u-dma-buf region.
const SLOT_BYTES: usize = (FRAME_BYTES + PAGE - 1) / PAGE * PAGE;

/// Allocator for DMA-visible framebuffers, backed by a u-dma-buf region of
/// physically contiguous memory.
pub struct FbPool {
	file: File,
	phys: u64,
	size: usize,
	next: usize,
}

impl FbPool {
	pub fn open() -> Result<Self> {
		let phys = read_sysfs_u64("phys_addr")?;
		let size = read_sysfs_u64("size")? as usize;
		// The FBADDR register is 32 bits wide; every buffer in the region
		// must be addressable through it.
		if !fits_dma(phys, size) {
			return Err(DevError::DmaRange);
		}
		let file = OpenOptions::new().read(true).write(true).open(UDMABUF_DEV)?;
		tracing::debug!(phys = %format_args!("{phys:#x}"), size, "opened framebuffer pool");
		Ok(Self {
			file,
			phys,
			size,
			next: 0,
		})
	}

	/// Carve the next framebuffer out of the region.
	pub fn allocate(&mut self) -> Result<FbHandle> {
		let offset = self.next;
		if offset + SLOT_BYTES > self.size {
			return Err(DevError::PoolExhausted);
		}
		self.next += SLOT_BYTES;

		let map = unsafe {
			MmapOptions::new()
				.offset(offset as u64)
				.len(SLOT_BYTES)
				.map_mut(&self.file)?
		};
		Ok(FbHandle {
			map,
			phys: PhysAddr(self.phys + offset as u64),
			offset,
			sync: PathBuf::from(UDMABUF_SYS),
		})
	}
}

/// One framebuffer. Unmapped on drop; the backing region belongs to the
/// u-dma-buf driver for the lifetime of the process.
pub struct FbHandle {
	map: MmapMut,
	phys: PhysAddr,
	offset: usize,
	sync: PathBuf,
}

impl FbHandle {
	/// Clean this buffer's range out of the CPU cache so the peripheral's
	/// DMA reads what was written.
	fn sync_for_device(&self) -> std::io::Result<()> {
		fs::write(self.sync.join("sync_offset"), self.offset.to_string())?;
		fs::write(self.sync.join("sync_size"), FRAME_BYTES.to_string())?;
		fs::write(self.sync.join("sync_for_device"), "1")
	}
}

impl Framebuffer for FbHandle {
	fn data(&mut self) -> &mut [u8] {
		&mut self.map[..FRAME_BYTES]
	}

	fn flush(&mut self) {
		// Not fatal: the worst case is one stale frame on screen.
		if let Err(err) = self.sync_for_device() {
			tracing::warn!(%err, "framebuffer cache flush failed");
		}
	}

	fn address(&self) -> PhysAddr {
		self.phys
	}
}

/// Whether the whole region lies within the peripheral's 32-bit DMA reach.
fn fits_dma(phys: u64, size: usize) -> bool {
	phys.checked_add(size as u64)
		.is_some_and(|end| end <= 1 << 32)
}

fn read_sysfs_u64(attr: &'static str) -> Result<u64> {
	let text = fs::read_to_string(Path::new(UDMABUF_SYS).join(attr))?;
	let text = text.trim();
	let parsed = match text.strip_prefix("0x") {
		Some(hex) => u64::from_str_radix(hex, 16),
		None => text.parse(),
	};
	parsed.map_err(|_| DevError::Sysfs { attr })
}
