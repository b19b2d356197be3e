mod cli;

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use fobos::{
	Backend, Direction, FORMAT_CF32, FobosDevice, Kwargs, Sample, StreamConfig,
	frontend::{CLOCK_SOURCE_KEY, DIRECT_SAMPLING_KEY, LNA, RF, VGA},
	registry,
};
use tracing::{info, info_span, warn};

use crate::cli::Cli;

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_EMPTY_READS: usize = 20;

fn main() -> Result<()> {
	let cli = Cli::parse();
	trace::setup(cli.verbose);

	#[cfg(feature = "libfobos")]
	let backend = fobos::ffi::Libfobos;
	#[cfg(not(feature = "libfobos"))]
	let backend = fobos::sim::SimBackend::single(fobos::sim::SimConfig::default());

	if cli.list {
		for found in registry::find(&backend, &Kwargs::new())? {
			println!("{} {} ({})", found["label"], found["serial"], found["manufacturer"]);
		}

		return Ok(());
	}

	receive(&backend, &cli)
}

fn receive<B: Backend>(backend: &B, cli: &Cli) -> Result<()> {
	let mut args = Kwargs::new();
	if let Some(serial) = &cli.serial {
		args.insert("serial".into(), serial.clone());
	}
	if let Some(index) = cli.index {
		args.insert("index".into(), index.to_string());
	}

	let device = FobosDevice::open(backend, &args).context("failed to open device")?;
	let serial = device.hardware_info()["serial"].clone();
	let span = info_span!("rx", %serial);
	let mut device = device.with_stream_config(StreamConfig { span, ..StreamConfig::default() });

	device.set_frequency(Direction::Rx, 0, RF, cli.frequency, &Kwargs::new())?;
	device.set_sample_rate(Direction::Rx, 0, cli.sample_rate)?;
	device.set_gain_element(Direction::Rx, 0, LNA, cli.lna)?;
	device.set_gain_element(Direction::Rx, 0, VGA, cli.vga)?;
	device.write_setting(DIRECT_SAMPLING_KEY, if cli.direct_sampling { "1" } else { "0" })?;
	device.write_setting(CLOCK_SOURCE_KEY, &cli.clock_source)?;

	let frequency = device.frequency(Direction::Rx, 0, RF)?;
	let frontend = device.frontend();
	info!(
		frequency,
		sample_rate = device.sample_rate(Direction::Rx, 0),
		gain = device.gain(Direction::Rx, 0),
		direct_sampling = frontend.direct_sampling(),
		clock_source = %frontend.clock_source(),
		"Device configured"
	);

	let stream_args = Kwargs::from([("buf_count".to_owned(), cli.buf_count.to_string())]);
	device.setup_stream(Direction::Rx, FORMAT_CF32, &[0], &stream_args)?;
	device.activate_stream(0)?;

	let mut buf = vec![Sample::default(); device.stream_mtu()?];
	let mut received = 0;
	let mut energy = 0.0;
	let mut empty_reads = 0;

	let inst = Instant::now();

	while received < cli.frames {
		let n = device.read_stream(&mut buf, READ_TIMEOUT)?;

		if n == 0 {
			empty_reads += 1;
			warn!(empty_reads, "No samples within timeout");

			if empty_reads == MAX_EMPTY_READS {
				device.close_stream()?;
				bail!("stream stalled after {received} frames");
			}

			continue;
		}

		empty_reads = 0;
		received += n;
		energy += buf[..n].iter().map(|sample| f64::from(sample.norm_sqr())).sum::<f64>();
	}

	let elapsed = inst.elapsed();
	let stats = device.stream_stats()?;

	device.deactivate_stream(0)?;
	device.close_stream()?;

	println!(
		"{received} frames received in {}ms, mean power {:.3e}, {} blocks, {} overruns",
		elapsed.as_millis(),
		energy / received.max(1) as f64,
		stats.blocks,
		stats.overruns
	);

	Ok(())
}

mod trace {
	use tracing::Subscriber;
	use tracing_subscriber::{
		EnvFilter, Layer,
		filter::LevelFilter,
		fmt::format::FmtSpan,
		layer::SubscriberExt,
		util::SubscriberInitExt,
	};

	fn level(verbose: u8) -> LevelFilter {
		match verbose {
			0 => LevelFilter::INFO,
			1 => LevelFilter::DEBUG,
			_ => LevelFilter::TRACE,
		}
	}

	fn new_fmt<S>(verbose: u8) -> Box<dyn Layer<S> + Send + Sync>
	where
		S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
	{
		let filter = EnvFilter::builder().with_default_directive(level(verbose).into()).from_env_lossy();

		tracing_subscriber::fmt::layer()
			.compact()
			.with_ansi(true)
			.with_span_events(FmtSpan::NONE)
			.with_writer(std::io::stderr)
			.with_filter(filter)
			.boxed()
	}

	pub(crate) fn setup(verbose: u8) {
		tracing_subscriber::registry().with(new_fmt(verbose)).init();
	}
}
