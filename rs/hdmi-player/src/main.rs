mod log;

use std::num::NonZeroU16;
use std::path::PathBuf;
use std::process::exit;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use hdmi_dev::{shutdown, FbHandle, FbPool, HdmiDev};
use hdmi_video::Video;
use scanout::{Presenter, ScanoutDevice};

/// Play a video file on the HDMI peripheral.
///
/// The input must be 640x480 with frames encoded as YUV420P, and it must be
/// a single video stream with no audio.
///
/// The frame-rate divider is applied to the 60Hz refresh rate, so the output
/// frame rate is (60Hz / FDIV). Setting the divider too low causes frames to
/// miss their deadline and the video to play back slower. A stable value is
/// FDIV = 3.
///
/// Must be run as root to reach the peripheral.
#[derive(Parser, Clone)]
#[command(name = "hdmi-player")]
struct Cli {
	#[command(flatten)]
	log: log::Log,

	/// The video file to play.
	video: PathBuf,

	/// The frame-rate divider.
	fdiv: NonZeroU16,
}

fn main() {
	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(err) => {
			// Anything unusual, help included, prints usage and exits 1.
			let _ = err.print();
			exit(1);
		}
	};
	cli.log.init();

	if unsafe { libc::geteuid() } != 0 {
		tracing::error!("must be run as root");
		usage();
	}

	let mut video = match Video::open(&cli.video) {
		Ok(video) => video,
		Err(err) => {
			tracing::error!(%err, path = %cli.video.display(), "failed to open video");
			usage();
		}
	};

	let (pool, front, back, mut dev) = match setup() {
		Ok(resources) => resources,
		Err(err) => {
			tracing::error!(err = %format_args!("{err:#}"), "setup failed");
			exit(127);
		}
	};
	shutdown::arm(&dev);
	tracing::info!(fdiv = cli.fdiv.get(), "setup complete, starting playback");

	let stats = Presenter::new(cli.fdiv).run(&mut dev, &mut video, front, back);
	tracing::info!(frames = stats.frames, late = stats.late, "end of stream, stopping");

	dev.stop();
	drop(dev);
	drop(pool);
}

/// Print the usage and exit with status 1.
fn usage() -> ! {
	let _ = Cli::command().print_help();
	exit(1);
}

/// Everything after argument validation. A failure here exits 127.
fn setup() -> anyhow::Result<(FbPool, FbHandle, FbHandle, HdmiDev)> {
	let mut pool = FbPool::open().context("failed to open framebuffer allocator")?;
	let front = pool.allocate().context("failed to allocate framebuffer")?;
	let back = pool.allocate().context("failed to allocate framebuffer")?;
	shutdown::install().context("couldn't set up signal handlers")?;
	let dev = HdmiDev::open().context("failed to open HDMI peripheral")?;
	Ok((pool, front, back, dev))
}
