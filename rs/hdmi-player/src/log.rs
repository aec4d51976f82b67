use clap::Parser;

/// The log configuration.
#[derive(Parser, Clone, Debug)]
pub struct Log {
	/// The log level.
	#[arg(long = "log", default_value = "info")]
	pub level: tracing::Level,
}

impl Log {
	pub fn init(&self) {
		tracing_subscriber::fmt()
			.with_max_level(self.level)
			.with_writer(std::io::stderr)
			.init();
	}
}
