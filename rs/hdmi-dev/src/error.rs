/// Errors from the device and framebuffer backends.
#[derive(Debug, thiserror::Error)]
pub enum DevError {
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),

	#[error("framebuffer pool exhausted")]
	PoolExhausted,

	#[error("u-dma-buf region beyond the peripheral's 32-bit DMA range")]
	DmaRange,

	#[error("malformed sysfs attribute {attr}")]
	Sysfs { attr: &'static str },
}

pub type Result<T> = std::result::Result<T, DevError>;
