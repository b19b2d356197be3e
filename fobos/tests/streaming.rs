use std::{
	thread,
	time::{Duration, Instant},
};

use fobos::{
	Direction, FORMAT_CF32, FobosDevice, Kwargs, Sample, StreamConfig, StreamState,
	sim::{SimBackend, SimConfig, SimDriver},
};

const WAIT: Duration = Duration::from_secs(2);

fn open(sim: SimConfig, buf_count: usize, buf_len: usize) -> FobosDevice<SimDriver> {
	FobosDevice::open(&SimBackend::single(sim), &Kwargs::new())
		.unwrap()
		.with_stream_config(StreamConfig { buf_count, buf_len, ..StreamConfig::default() })
}

fn setup(device: &mut FobosDevice<SimDriver>) {
	device.setup_stream(Direction::Rx, FORMAT_CF32, &[0], &Kwargs::new()).unwrap();
}

#[test]
fn buffered_block_is_not_read_after_deactivate() {
	let sim = SimConfig { block_limit: Some(1), period: Duration::ZERO, ..SimConfig::default() };
	let mut device = open(sim, 4, 8);
	setup(&mut device);

	device.activate_stream(0).unwrap();

	let started = Instant::now();
	while device.stream_stats().unwrap().filled < 1 {
		assert!(started.elapsed() < WAIT);
		thread::sleep(Duration::from_millis(1));
	}

	device.deactivate_stream(0).unwrap();
	assert_eq!(device.stream_state(), Some(StreamState::Deactivated));

	let mut buf = vec![Sample::default(); 8];
	assert_eq!(device.read_stream(&mut buf, Duration::from_millis(20)).unwrap(), 0);

	device.close_stream().unwrap();
	assert_eq!(device.stream_state(), None);
}

#[test]
fn consumer_sees_frames_in_order() {
	let sim = SimConfig { period: Duration::from_micros(200), ..SimConfig::default() };
	let mut device = open(sim, 8, 64);
	setup(&mut device);
	device.activate_stream(0).unwrap();

	let reader = device.stream_reader().unwrap();
	let consumer = thread::spawn(move || {
		let mut buf = vec![Sample::default(); 48];
		let mut last = -1.0f32;
		let mut frames = 0;

		while frames < 64 * 40 {
			let n = reader.read(&mut buf, WAIT);
			assert!(n > 0, "stream stalled");

			for sample in &buf[..n] {
				// Dropped blocks leave gaps, never reorderings
				assert!(sample.re > last, "{} after {last}", sample.re);
				assert_eq!(sample.im, -sample.re);
				last = sample.re;
			}

			frames += n;
		}

		frames
	});

	assert!(consumer.join().unwrap() >= 64 * 40);
	device.deactivate_stream(0).unwrap();
}

#[test]
fn reads_never_cross_a_block() {
	let sim = SimConfig { block_limit: Some(2), period: Duration::ZERO, ..SimConfig::default() };
	let mut device = open(sim, 4, 10);
	setup(&mut device);
	device.activate_stream(0).unwrap();

	let mut buf = vec![Sample::default(); 4];
	let sizes: Vec<usize> = (0..6).map(|_| device.read_stream(&mut buf, WAIT).unwrap()).collect();

	assert_eq!(sizes, [4, 4, 2, 4, 4, 2]);
	assert_eq!(buf[1], Sample::new(19.0, -19.0));
}

#[test]
fn stream_args_size_the_pool() {
	let sim = SimConfig { block_limit: Some(5), period: Duration::ZERO, ..SimConfig::default() };
	let mut device = open(sim, 16, 4);

	let args = Kwargs::from([("buf_count".to_owned(), "2".to_owned())]);
	device.setup_stream(Direction::Rx, FORMAT_CF32, &[0], &args).unwrap();
	device.activate_stream(0).unwrap();

	let started = Instant::now();
	while device.stream_stats().unwrap().blocks < 5 {
		assert!(started.elapsed() < WAIT);
		thread::sleep(Duration::from_millis(1));
	}

	let stats = device.stream_stats().unwrap();
	assert_eq!((stats.filled, stats.overruns), (2, 3));
}

#[test]
fn dropping_the_device_stops_streaming() {
	let sim = SimConfig { period: Duration::ZERO, ..SimConfig::default() };
	let mut device = open(sim, 2, 16);
	setup(&mut device);
	device.activate_stream(0).unwrap();

	let reader = device.stream_reader().unwrap();
	drop(device);

	let mut buf = vec![Sample::default(); 16];
	assert_eq!(reader.read(&mut buf, Duration::from_millis(20)), 0);
}

#[test]
fn lifecycle_can_repeat() {
	let sim = SimConfig { period: Duration::from_micros(100), ..SimConfig::default() };
	let mut device = open(sim, 4, 32);
	let mut buf = vec![Sample::default(); 32];

	for _ in 0..3 {
		setup(&mut device);

		for _ in 0..3 {
			device.activate_stream(0).unwrap();
			assert_eq!(device.read_stream(&mut buf, WAIT).unwrap(), 32);
			assert_eq!(buf[0], Sample::new(0.0, 0.0));
			device.deactivate_stream(0).unwrap();
		}

		device.close_stream().unwrap();
	}
}
