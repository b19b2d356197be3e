use std::{
	fmt::{Debug, Formatter},
	sync::Arc,
	time::Duration,
};

use tracing::{debug, error, info};

use crate::{
	ApiInfo, ArgInfo, ArgType, Backend, BoardInfo, DEFAULT_BUF_COUNT, Direction, Driver, Error, FORMAT_CF32, Kwargs, Range,
	Result, RxStream, Sample, StreamConfig, StreamReader, StreamState, StreamStats,
	frontend::{self, Frontend},
	registry,
};

pub const ANTENNA: &str = "RX";

/// Host-facing receiver device.
///
/// Composes the cached [`Frontend`] configuration with at most one
/// [`RxStream`]. Only direction [`Direction::Rx`] channel `0` exists:
/// capability queries for anything else come back empty and setters fail
/// with [`Error::NotSupported`].
pub struct FobosDevice<D: Driver> {
	driver: Arc<D>,
	index: usize,
	api: ApiInfo,
	board: BoardInfo,
	frontend: Frontend,
	stream: Option<RxStream<D>>,
	stream_config: StreamConfig,
}

impl<D: Driver> Debug for FobosDevice<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FobosDevice")
			.field("index", &self.index)
			.field("board", &self.board)
			.field("frontend", &self.frontend)
			.field("stream", &self.stream.as_ref().map(RxStream::state))
			.finish_non_exhaustive()
	}
}

fn is_rx(direction: Direction, channel: usize) -> bool {
	direction == Direction::Rx && channel == 0
}

fn require_rx(direction: Direction, channel: usize) -> Result<()> {
	if is_rx(direction, channel) { Ok(()) } else { Err(Error::NotSupported("only RX channel 0")) }
}

impl<D: Driver> FobosDevice<D> {
	/// Opens the board selected by the `serial` or `index` argument
	pub fn open<B: Backend<Driver = D>>(backend: &B, args: &Kwargs) -> Result<Self> {
		let api = backend.api_info();
		info!(lib = %api.lib_version, drv = %api.drv_version, "API info");

		if let Some(label) = args.get("label") {
			info!(%label, "Opening device");
		}

		let index = registry::resolve_index(backend, args)?;
		debug!(index, "Opening device");

		Self::from_driver(backend.open(index)?, index, api)
	}

	pub fn from_driver(driver: D, index: usize, api: ApiInfo) -> Result<Self> {
		let board = driver.board_info()?;

		Ok(Self {
			driver: Arc::new(driver),
			index,
			api,
			board,
			frontend: Frontend::default(),
			stream: None,
			stream_config: StreamConfig::default(),
		})
	}

	/// Defaults for streams set up from now on, stream arguments still apply
	/// on top
	pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
		self.stream_config = config;
		self
	}

	pub fn driver(&self) -> &D {
		&self.driver
	}

	pub fn frontend(&self) -> &Frontend {
		&self.frontend
	}

	// Identification

	pub fn driver_key(&self) -> &'static str {
		registry::DRIVER_KEY
	}

	pub fn hardware_key(&self) -> &str {
		&self.board.hw_revision
	}

	pub fn hardware_info(&self) -> Kwargs {
		[
			("lib_version", self.api.lib_version.clone()),
			("drv_version", self.api.drv_version.clone()),
			("hw_revision", self.board.hw_revision.clone()),
			("fw_version", self.board.fw_version.clone()),
			("manufacturer", self.board.manufacturer.clone()),
			("product", self.board.product.clone()),
			("serial", self.board.serial.clone()),
			("index", self.index.to_string()),
		]
		.into_iter()
		.map(|(key, value)| (key.to_owned(), value))
		.collect()
	}

	// Channels

	pub fn num_channels(&self, direction: Direction) -> usize {
		usize::from(direction == Direction::Rx)
	}

	pub fn full_duplex(&self, _direction: Direction, _channel: usize) -> bool {
		false
	}

	// Antennas

	pub fn list_antennas(&self, direction: Direction, channel: usize) -> Vec<&'static str> {
		if is_rx(direction, channel) { vec![ANTENNA] } else { Vec::new() }
	}

	pub fn set_antenna(&mut self, direction: Direction, channel: usize, name: &str) -> Result<()> {
		if is_rx(direction, channel) && name == ANTENNA { Ok(()) } else { Err(Error::NotSupported("antenna")) }
	}

	pub fn antenna(&self, direction: Direction, channel: usize) -> Option<&'static str> {
		is_rx(direction, channel).then_some(ANTENNA)
	}

	// Frontend corrections

	pub fn has_dc_offset_mode(&self, _direction: Direction, _channel: usize) -> bool {
		false
	}

	pub fn has_frequency_correction(&self, _direction: Direction, _channel: usize) -> bool {
		false
	}

	// Gain

	pub fn list_gains(&self, direction: Direction, channel: usize) -> Vec<&'static str> {
		if is_rx(direction, channel) { frontend::GAINS.to_vec() } else { Vec::new() }
	}

	pub fn has_gain_mode(&self, _direction: Direction, _channel: usize) -> bool {
		false
	}

	pub fn set_gain(&mut self, direction: Direction, channel: usize, db: f64) -> Result<()> {
		require_rx(direction, channel)?;
		self.frontend.set_gain(&*self.driver, db)
	}

	pub fn set_gain_element(&mut self, direction: Direction, channel: usize, name: &str, db: f64) -> Result<()> {
		require_rx(direction, channel)?;
		self.frontend.set_gain_element(&*self.driver, name, db)
	}

	pub fn gain(&self, direction: Direction, channel: usize) -> f64 {
		if is_rx(direction, channel) { self.frontend.overall_gain() } else { 0.0 }
	}

	pub fn gain_element(&self, direction: Direction, channel: usize, name: &str) -> Result<f64> {
		require_rx(direction, channel)?;
		self.frontend.gain(name)
	}

	pub fn gain_range(&self, direction: Direction, channel: usize) -> Range {
		if is_rx(direction, channel) { frontend::overall_gain_range() } else { Range::new(0.0, 0.0) }
	}

	pub fn gain_element_range(&self, direction: Direction, channel: usize, name: &str) -> Result<Range> {
		require_rx(direction, channel)?;
		frontend::gain_range(name)
	}

	// Frequency

	pub fn set_frequency(&mut self, direction: Direction, channel: usize, name: &str, hz: f64, _args: &Kwargs) -> Result<()> {
		require_rx(direction, channel)?;
		self.frontend.set_frequency(&*self.driver, name, hz)
	}

	pub fn frequency(&self, direction: Direction, channel: usize, name: &str) -> Result<f64> {
		require_rx(direction, channel)?;
		self.frontend.frequency(name)
	}

	pub fn list_frequencies(&self, direction: Direction, channel: usize) -> Vec<&'static str> {
		if is_rx(direction, channel) { vec![frontend::RF] } else { Vec::new() }
	}

	pub fn frequency_range(&self, direction: Direction, channel: usize, name: &str) -> Vec<Range> {
		match frontend::frequency_range(name) {
			Ok(range) if is_rx(direction, channel) => vec![range],
			_ => Vec::new(),
		}
	}

	pub fn frequency_args_info(&self, _direction: Direction, _channel: usize) -> Vec<ArgInfo> {
		Vec::new()
	}

	// Sample rate

	pub fn set_sample_rate(&mut self, direction: Direction, channel: usize, hz: f64) -> Result<()> {
		require_rx(direction, channel)?;
		self.frontend.set_sample_rate(&*self.driver, hz)
	}

	pub fn sample_rate(&self, direction: Direction, channel: usize) -> f64 {
		if is_rx(direction, channel) { self.frontend.sample_rate() } else { 0.0 }
	}

	/// Supported rates, ascending
	pub fn list_sample_rates(&self, direction: Direction, channel: usize) -> Result<Vec<f64>> {
		if !is_rx(direction, channel) {
			return Ok(Vec::new());
		}

		let mut rates = self.driver.sample_rates()?;
		rates.sort_by(f64::total_cmp);
		Ok(rates)
	}

	pub fn sample_rate_range(&self, direction: Direction, channel: usize) -> Result<Vec<Range>> {
		let rates = self.list_sample_rates(direction, channel)?;

		Ok(match (rates.first(), rates.last()) {
			(Some(&min), Some(&max)) => vec![Range::new(min, max)],
			_ => Vec::new(),
		})
	}

	// Settings

	pub fn setting_info(&self) -> Vec<ArgInfo> {
		self.frontend.setting_info()
	}

	pub fn write_setting(&mut self, key: &str, value: &str) -> Result<()> {
		self.frontend.write_setting(&*self.driver, key, value)
	}

	pub fn read_setting(&self, key: &str) -> String {
		self.frontend.read_setting(key)
	}

	// Stream

	pub fn stream_formats(&self, direction: Direction, channel: usize) -> Result<Vec<&'static str>> {
		require_rx(direction, channel)?;
		Ok(vec![FORMAT_CF32])
	}

	/// Native format and its full scale value
	pub fn native_stream_format(&self, direction: Direction, channel: usize) -> Result<(&'static str, f64)> {
		require_rx(direction, channel)?;
		Ok((FORMAT_CF32, 1.0))
	}

	pub fn stream_args_info(&self, direction: Direction, channel: usize) -> Vec<ArgInfo> {
		if !is_rx(direction, channel) {
			return Vec::new();
		}

		vec![ArgInfo {
			key: "buf_count",
			value: DEFAULT_BUF_COUNT.to_string(),
			name: "Buffers count in queue",
			description: "Buffers count in queue",
			units: "",
			ty: ArgType::Int,
			options: Vec::new(),
		}]
	}

	/// Validates the request and allocates the stream buffers. The device
	/// carries a single stream, close it before setting up another.
	pub fn setup_stream(&mut self, direction: Direction, format: &str, channels: &[usize], args: &Kwargs) -> Result<()> {
		if self.stream.is_some() {
			return Err(Error::Stream("already set up"));
		}

		let config = self.stream_config.clone().with_args(args);
		self.stream = Some(RxStream::setup(Arc::clone(&self.driver), direction, format, channels, config)?);

		Ok(())
	}

	/// Closing without a stream is a no-op
	pub fn close_stream(&mut self) -> Result<()> {
		match self.stream.take() {
			Some(stream) => stream.close(),
			None => Ok(()),
		}
	}

	pub fn stream_mtu(&self) -> Result<usize> {
		Ok(self.stream()?.mtu())
	}

	pub fn activate_stream(&mut self, flags: i32) -> Result<()> {
		self.stream_mut()?.activate(flags)
	}

	pub fn deactivate_stream(&mut self, flags: i32) -> Result<()> {
		self.stream_mut()?.deactivate(flags)
	}

	/// Returns the number of frames written to `dst`, `0` while inactive
	pub fn read_stream(&self, dst: &mut [Sample], timeout: Duration) -> Result<usize> {
		Ok(self.stream()?.read(dst, timeout))
	}

	pub fn stream_reader(&self) -> Result<StreamReader> {
		Ok(self.stream()?.reader())
	}

	pub fn stream_stats(&self) -> Result<StreamStats> {
		Ok(self.stream()?.stats())
	}

	pub fn stream_state(&self) -> Option<StreamState> {
		self.stream.as_ref().map(RxStream::state)
	}

	fn stream(&self) -> Result<&RxStream<D>> {
		self.stream.as_ref().ok_or(Error::Stream("not set up"))
	}

	fn stream_mut(&mut self) -> Result<&mut RxStream<D>> {
		self.stream.as_mut().ok_or(Error::Stream("not set up"))
	}
}

impl<D: Driver> Drop for FobosDevice<D> {
	fn drop(&mut self) {
		if let Err(err) = self.close_stream() {
			error!(%err, "Failed to close stream");
		}
	}
}

#[cfg(all(test, feature = "sim"))]
mod tests {
	use super::*;
	use crate::sim::{SimBackend, SimConfig};

	fn device() -> FobosDevice<crate::sim::SimDriver> {
		FobosDevice::open(&SimBackend::single(SimConfig::default()), &Kwargs::new()).unwrap()
	}

	#[test]
	fn identification() {
		let device = device();
		let info = device.hardware_info();

		assert_eq!(device.driver_key(), "FobosSDR");
		assert_eq!(device.hardware_key(), "sim");
		assert_eq!(info["serial"], SimConfig::default().serial);
		assert_eq!(info["index"], "0");
		assert_eq!(info["lib_version"], "sim");
	}

	#[test]
	fn receive_only_capabilities() {
		let mut device = device();

		assert_eq!(device.num_channels(Direction::Rx), 1);
		assert_eq!(device.num_channels(Direction::Tx), 0);
		assert_eq!(device.list_antennas(Direction::Rx, 0), ["RX"]);
		assert!(device.list_antennas(Direction::Tx, 0).is_empty());
		assert_eq!(device.antenna(Direction::Rx, 0), Some("RX"));
		assert!(device.set_antenna(Direction::Rx, 0, "RX").is_ok());
		assert!(device.set_antenna(Direction::Rx, 0, "TX").is_err());
		assert_eq!(device.list_gains(Direction::Rx, 0), ["LNA", "VGA"]);
		assert_eq!(device.list_frequencies(Direction::Rx, 0), ["RF"]);
		assert_eq!(device.frequency_range(Direction::Rx, 0, "RF"), [Range::new(50e6, 6000e6)]);
		assert!(device.frequency_range(Direction::Rx, 0, "IF").is_empty());
		assert!(matches!(device.stream_formats(Direction::Tx, 0), Err(Error::NotSupported(_))));
		assert_eq!(device.native_stream_format(Direction::Rx, 0).unwrap(), ("CF32", 1.0));
		assert_eq!(device.stream_args_info(Direction::Rx, 0)[0].value, "16");
		assert!(matches!(device.set_gain(Direction::Tx, 0, 10.0), Err(Error::NotSupported(_))));
	}

	#[test]
	fn sample_rates_are_sorted_ascending() {
		let device = device();
		let rates = device.list_sample_rates(Direction::Rx, 0).unwrap();

		assert_eq!(rates.first(), Some(&8e6));
		assert_eq!(rates.last(), Some(&80e6));
		assert_eq!(device.sample_rate_range(Direction::Rx, 0).unwrap(), [Range::new(8e6, 80e6)]);
	}

	#[test]
	fn configuration_reaches_the_driver() {
		let mut device = device();

		device.set_frequency(Direction::Rx, 0, "RF", 145e6, &Kwargs::new()).unwrap();
		device.set_sample_rate(Direction::Rx, 0, 20e6).unwrap();
		device.set_gain_element(Direction::Rx, 0, "VGA", 10.0).unwrap();
		device.write_setting("clock_source", "external").unwrap();

		let regs = device.driver().registers();
		assert_eq!(regs.frequency, 145e6);
		assert_eq!(regs.sample_rate, 20e6);
		assert_eq!(regs.vga_index, 5);
		assert_eq!(device.frequency(Direction::Rx, 0, "RF").unwrap(), 145e6);
		assert_eq!(device.read_setting("clock_source"), "1");
	}

	#[test]
	fn single_stream_per_device() {
		let mut device = device();
		assert!(matches!(device.activate_stream(0), Err(Error::Stream(_))));

		device.setup_stream(Direction::Rx, FORMAT_CF32, &[0], &Kwargs::new()).unwrap();
		assert!(matches!(device.setup_stream(Direction::Rx, FORMAT_CF32, &[0], &Kwargs::new()), Err(Error::Stream(_))));
		assert_eq!(device.stream_mtu().unwrap(), crate::DEFAULT_BUF_LEN);
		assert_eq!(device.stream_state(), Some(StreamState::Configured));

		device.close_stream().unwrap();
		assert_eq!(device.stream_state(), None);
		device.close_stream().unwrap();
	}

	#[test]
	fn rejected_setup_leaves_no_stream() {
		let mut device = device();

		assert!(device.setup_stream(Direction::Tx, FORMAT_CF32, &[0], &Kwargs::new()).is_err());
		assert_eq!(device.stream_state(), None);
		assert!(device.setup_stream(Direction::Rx, FORMAT_CF32, &[0], &Kwargs::new()).is_ok());
	}
}
