use std::{
	thread,
	time::{Duration, Instant},
};

use anyhow::{Context, Result};
use fobos::{
	Direction, FORMAT_CF32, FobosDevice, Kwargs, Sample,
	sim::{SimBackend, SimConfig},
};

/// Stop once the stream stays silent for this many timeouts in a row
const MAX_EMPTY_READS: usize = 20;

fn main() -> Result<()> {
	let backend = SimBackend::single(SimConfig::default());
	let mut device = FobosDevice::open(&backend, &Kwargs::new()).context("device not connected")?;

	device.set_frequency(Direction::Rx, 0, "RF", 2412e6, &Kwargs::new())?;
	device.set_sample_rate(Direction::Rx, 0, 20e6)?;
	device.set_gain(Direction::Rx, 0, 40.0)?;
	device.setup_stream(Direction::Rx, FORMAT_CF32, &[0], &Kwargs::new())?;
	device.activate_stream(0)?;

	// Read on a separate thread, the way a host application would
	let reader = device.stream_reader()?;
	let consumer = thread::spawn(move || {
		let mut buf = vec![Sample::default(); 16 * 1024];
		let mut samples_received = 0;
		let mut empty_reads = 0;

		while samples_received < 20_000_000 && empty_reads < MAX_EMPTY_READS {
			match reader.read(&mut buf, Duration::from_millis(100)) {
				0 => empty_reads += 1,
				n => {
					empty_reads = 0;
					samples_received += n;
					// Do something with samples
				}
			}
		}

		samples_received
	});

	let inst = Instant::now();
	let samples_received = consumer.join().map_err(|_| anyhow::anyhow!("reader panicked"))?;
	let elapsed = inst.elapsed();

	println!("{} samples received in {}ms, {:?}", samples_received, elapsed.as_millis(), device.stream_stats()?);

	device.deactivate_stream(0)?;
	device.close_stream()?;

	Ok(())
}
