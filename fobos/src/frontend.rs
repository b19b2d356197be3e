//! Cached receiver configuration: gains, tuning, sample rate and the
//! key-value settings. Values change only after the driver accepted them.

use tracing::{debug, error, info, warn};

use crate::{ArgInfo, ArgType, ClockSource, Driver, Error, Range, Result};

pub const LNA: &str = "LNA";
pub const VGA: &str = "VGA";
pub const RF: &str = "RF";

pub const GAINS: [&str; 2] = [LNA, VGA];

pub const LNA_RANGE: Range = Range::new(0.0, 33.0);
pub const VGA_RANGE: Range = Range::new(0.0, 30.0);
pub const FREQUENCY_RANGE: Range = Range::new(50e6, 6000e6);

pub const DIRECT_SAMPLING_KEY: &str = "direct_samp";
pub const CLOCK_SOURCE_KEY: &str = "clock_source";

// dB per hardware gain step
const LNA_STEP: f64 = 16.0;
const VGA_STEP: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Frontend {
	sample_rate: f64,
	center_frequency: f64,
	direct_sampling: bool,
	clock_source: ClockSource,
	lna_gain: f64,
	vga_gain: f64,
}

impl Default for Frontend {
	fn default() -> Self {
		Self {
			sample_rate: 25e6,
			center_frequency: 100e6,
			direct_sampling: false,
			clock_source: ClockSource::Internal,
			lna_gain: 0.0,
			vga_gain: 0.0,
		}
	}
}

pub fn gain_range(name: &str) -> Result<Range> {
	match name {
		LNA => Ok(LNA_RANGE),
		VGA => Ok(VGA_RANGE),
		_ => Err(Error::NotSupported("gain element")),
	}
}

/// Combined range of all gain elements
pub fn overall_gain_range() -> Range {
	GAINS.iter().filter_map(|name| gain_range(name).ok()).fold(Range::new(0.0, 0.0), |acc, range| {
		Range::new(acc.min + range.min, acc.max + range.max)
	})
}

pub fn frequency_range(name: &str) -> Result<Range> {
	if name == RF { Ok(FREQUENCY_RANGE) } else { Err(Error::NotSupported("frequency element")) }
}

impl Frontend {
	pub fn gain(&self, name: &str) -> Result<f64> {
		match name {
			LNA => Ok(self.lna_gain),
			VGA => Ok(self.vga_gain),
			_ => Err(Error::NotSupported("gain element")),
		}
	}

	pub fn overall_gain(&self) -> f64 {
		self.lna_gain + self.vga_gain
	}

	/// Sets a single gain element, the value is clamped to its range
	pub fn set_gain_element(&mut self, driver: &impl Driver, name: &str, db: f64) -> Result<()> {
		let db = gain_range(name)?.clamp(db);

		match name {
			LNA => {
				let index = (db / LNA_STEP).round() as u32 + 1;
				driver.set_lna_gain(index)?;
				self.lna_gain = db;
				debug!(db, index, "LNA gain set");
			}
			_ => {
				let index = (db / VGA_STEP).round() as u32;
				driver.set_vga_gain(index)?;
				self.vga_gain = db;
				debug!(db, index, "VGA gain set");
			}
		}

		Ok(())
	}

	/// Distributes `db` over the elements, filling the LNA before the VGA
	pub fn set_gain(&mut self, driver: &impl Driver, db: f64) -> Result<()> {
		let overall = overall_gain_range();
		let mut remaining = overall.clamp(db) - overall.min;

		for name in GAINS {
			let range = gain_range(name)?;
			let share = remaining.min(range.span());
			self.set_gain_element(driver, name, range.min + share)?;
			remaining -= share;
		}

		Ok(())
	}

	pub fn frequency(&self, name: &str) -> Result<f64> {
		frequency_range(name)?;
		Ok(self.center_frequency)
	}

	pub fn set_frequency(&mut self, driver: &impl Driver, name: &str, hz: f64) -> Result<()> {
		frequency_range(name)?;
		debug!(hz, "Setting center frequency");

		self.center_frequency = driver.set_frequency(hz)?;
		Ok(())
	}

	pub fn sample_rate(&self) -> f64 {
		self.sample_rate
	}

	pub fn set_sample_rate(&mut self, driver: &impl Driver, hz: f64) -> Result<()> {
		debug!(hz, "Setting sample rate");

		match driver.set_sample_rate(hz) {
			Ok(actual) => {
				debug!(actual, "Sample rate set");
				self.sample_rate = actual;
				Ok(())
			}
			Err(err) => {
				debug!(%err, "Sample rate rejected");
				Err(err)
			}
		}
	}

	pub fn direct_sampling(&self) -> bool {
		self.direct_sampling
	}

	pub fn clock_source(&self) -> ClockSource {
		self.clock_source
	}

	pub fn setting_info(&self) -> Vec<ArgInfo> {
		vec![
			ArgInfo {
				key: DIRECT_SAMPLING_KEY,
				value: "0".into(),
				name: "Direct Sampling",
				description: "HF1/HF2 Direct Sampling Mode",
				units: "",
				ty: ArgType::String,
				options: vec![("0", "Off"), ("1", "On")],
			},
			ArgInfo {
				key: CLOCK_SOURCE_KEY,
				value: "0".into(),
				name: "Clock Source",
				description: "Clock source: 0=internal (default), 1=external",
				units: "",
				ty: ArgType::String,
				options: vec![("0", "Internal"), ("1", "External")],
			},
		]
	}

	/// Malformed values never fail the call: direct sampling falls back to
	/// off, an unknown clock source leaves the current one in place. Driver
	/// failures are returned.
	pub fn write_setting(&mut self, driver: &impl Driver, key: &str, value: &str) -> Result<()> {
		match key {
			DIRECT_SAMPLING_KEY => {
				let enabled = match value.trim().parse::<u8>() {
					Ok(0) => false,
					Ok(1) => true,
					_ => {
						error!(value, "Invalid direct sampling mode, expected 0 (off) or 1 (on)");
						false
					}
				};

				driver.set_direct_sampling(enabled)?;
				self.direct_sampling = enabled;
				debug!(enabled, "Direct sampling mode set");
			}
			CLOCK_SOURCE_KEY => {
				let Some(source) = ClockSource::parse(value.trim()) else {
					error!(value, "Invalid clock source, use 0/internal/master or 1/external/slave");
					return Ok(());
				};

				info!(%source, "Setting clock source");
				driver.set_clock_source(source)?;
				self.clock_source = source;
			}
			_ => warn!(key, "Unknown setting ignored"),
		}

		Ok(())
	}

	/// Empty for unknown keys
	pub fn read_setting(&self, key: &str) -> String {
		match key {
			DIRECT_SAMPLING_KEY => u8::from(self.direct_sampling).to_string(),
			CLOCK_SOURCE_KEY => i32::from(self.clock_source).to_string(),
			_ => String::new(),
		}
	}
}
