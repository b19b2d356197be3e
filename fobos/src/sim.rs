//! In-process stand-in for the vendor library.
//!
//! Blocks carry a running frame counter, frame `n` of the stream being
//! `(n, -n)`, which lets readers check ordering and gaps.

use std::{
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration,
};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::{ApiInfo, Backend, BoardInfo, ClockSource, Driver, Error, Result, Sample};

/// Rates in the descending order the vendor library reports them
pub const SAMPLE_RATES: [f64; 10] = [80e6, 50e6, 40e6, 32e6, 25e6, 20e6, 16e6, 12.5e6, 10e6, 8e6];

#[derive(Debug, Clone)]
pub struct SimConfig {
	pub serial: String,
	/// Stop producing after this many blocks and wait for cancellation
	pub block_limit: Option<u64>,
	/// Deliver blocks of this length instead of the requested one
	pub block_len: Option<usize>,
	/// Pause between blocks, zero produces as fast as possible
	pub period: Duration,
	/// Every tuning call fails with a driver error
	pub fail_tuning: bool,
}

impl Default for SimConfig {
	fn default() -> Self {
		Self {
			serial: "0000000000000001".into(),
			block_limit: None,
			block_len: None,
			period: Duration::from_millis(1),
			fail_tuning: false,
		}
	}
}

/// Last values written to the simulated hardware
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registers {
	pub frequency: f64,
	pub sample_rate: f64,
	pub lna_index: u32,
	pub vga_index: u32,
	pub direct_sampling: bool,
	pub clock_source: ClockSource,
}

#[derive(Debug, Default)]
pub struct SimBackend {
	boards: Vec<SimConfig>,
}

impl SimBackend {
	pub fn new(boards: Vec<SimConfig>) -> Self {
		Self { boards }
	}

	pub fn single(config: SimConfig) -> Self {
		Self::new(vec![config])
	}
}

impl Backend for SimBackend {
	type Driver = SimDriver;

	fn api_info(&self) -> ApiInfo {
		ApiInfo { lib_version: "sim".into(), drv_version: "sim".into() }
	}

	fn list_devices(&self) -> Result<Vec<String>> {
		Ok(self.boards.iter().map(|board| board.serial.clone()).collect())
	}

	fn open(&self, index: usize) -> Result<SimDriver> {
		let config = self.boards.get(index).ok_or_else(|| Error::NotFound(format!("no board at index {index}")))?;
		Ok(SimDriver::new(config.clone()))
	}
}

#[derive(Debug)]
pub struct SimDriver {
	config: SimConfig,
	registers: Mutex<Registers>,
	cancelled: Mutex<bool>,
	wake: Condvar,
	cancels: AtomicUsize,
}

impl SimDriver {
	pub fn new(config: SimConfig) -> Self {
		Self {
			config,
			registers: Mutex::new(Registers::default()),
			cancelled: Mutex::new(false),
			wake: Condvar::new(),
			cancels: AtomicUsize::new(0),
		}
	}

	pub fn registers(&self) -> Registers {
		self.registers.lock().clone()
	}

	/// Number of `cancel_async` calls seen so far
	pub fn cancels(&self) -> usize {
		self.cancels.load(Ordering::Relaxed)
	}

	fn tuning(&self, op: &'static str) -> Result<()> {
		if self.config.fail_tuning { Err(Error::Driver { op, code: -1 }) } else { Ok(()) }
	}
}

impl Driver for SimDriver {
	fn board_info(&self) -> Result<BoardInfo> {
		Ok(BoardInfo {
			hw_revision: "sim".into(),
			fw_version: "0.0".into(),
			manufacturer: "RigExpert".into(),
			product: "Fobos SDR".into(),
			serial: self.config.serial.clone(),
		})
	}

	fn set_frequency(&self, hz: f64) -> Result<f64> {
		self.tuning("fobos_rx_set_frequency")?;
		let actual = hz.round();
		self.registers.lock().frequency = actual;
		Ok(actual)
	}

	fn set_sample_rate(&self, hz: f64) -> Result<f64> {
		self.tuning("fobos_rx_set_samplerate")?;
		let actual = SAMPLE_RATES.iter().copied().min_by(|a, b| (a - hz).abs().total_cmp(&(b - hz).abs())).unwrap_or(hz);
		self.registers.lock().sample_rate = actual;
		Ok(actual)
	}

	fn sample_rates(&self) -> Result<Vec<f64>> {
		Ok(SAMPLE_RATES.to_vec())
	}

	fn set_lna_gain(&self, index: u32) -> Result<()> {
		self.registers.lock().lna_index = index;
		Ok(())
	}

	fn set_vga_gain(&self, index: u32) -> Result<()> {
		self.registers.lock().vga_index = index;
		Ok(())
	}

	fn set_direct_sampling(&self, enabled: bool) -> Result<()> {
		self.registers.lock().direct_sampling = enabled;
		Ok(())
	}

	fn set_clock_source(&self, source: ClockSource) -> Result<()> {
		self.registers.lock().clock_source = source;
		Ok(())
	}

	fn read_async(&self, buf_count: usize, buf_len: usize, on_block: &mut dyn FnMut(&[Sample])) -> Result<()> {
		let len = self.config.block_len.unwrap_or(buf_len);
		let mut block = vec![Sample::default(); len];
		let mut produced = 0u64;

		*self.cancelled.lock() = false;
		debug!(buf_count, len, "Simulated receive started");

		loop {
			{
				let mut cancelled = self.cancelled.lock();
				let exhausted = self.config.block_limit.is_some_and(|limit| produced >= limit);

				if exhausted {
					self.wake.wait_while(&mut cancelled, |cancelled| !*cancelled);
				} else if !self.config.period.is_zero() {
					self.wake.wait_while_for(&mut cancelled, |cancelled| !*cancelled, self.config.period);
				}

				if *cancelled {
					break;
				}
			}

			let first = produced as usize * len;
			for (n, sample) in block.iter_mut().enumerate() {
				let value = (first + n) as f32;
				*sample = Sample::new(value, -value);
			}

			on_block(&block);
			produced += 1;
		}

		debug!(produced, "Simulated receive cancelled");
		Ok(())
	}

	fn cancel_async(&self) -> Result<()> {
		self.cancels.fetch_add(1, Ordering::Relaxed);
		*self.cancelled.lock() = true;
		self.wake.notify_all();
		Ok(())
	}
}
