//! Seam between the plugin and the vendor receiver library.
//!
//! A [`Backend`] enumerates and opens boards, an opened board is a [`Driver`].
//! The driver is shared between the thread that configures it and the
//! producer thread blocked in [`Driver::read_async`], so every method takes
//! `&self` and implementations must tolerate [`Driver::cancel_async`] being
//! called from any thread, including from inside the block callback.

use crate::{ApiInfo, BoardInfo, ClockSource, Result, Sample};

pub trait Backend {
	type Driver: Driver;

	fn api_info(&self) -> ApiInfo;

	/// Serial numbers of attached boards, position is the open index
	fn list_devices(&self) -> Result<Vec<String>>;

	fn open(&self, index: usize) -> Result<Self::Driver>;
}

/// An opened board. Dropping it closes the device.
pub trait Driver: Send + Sync + 'static {
	fn board_info(&self) -> Result<BoardInfo>;

	/// Tunes the RF frontend and returns the frequency actually set
	fn set_frequency(&self, hz: f64) -> Result<f64>;

	/// Returns the sample rate actually set
	fn set_sample_rate(&self, hz: f64) -> Result<f64>;

	/// Supported sample rates in the order the library reports them
	fn sample_rates(&self) -> Result<Vec<f64>>;

	fn set_lna_gain(&self, index: u32) -> Result<()>;

	fn set_vga_gain(&self, index: u32) -> Result<()>;

	fn set_direct_sampling(&self, enabled: bool) -> Result<()>;

	fn set_clock_source(&self, source: ClockSource) -> Result<()>;

	/// Streams blocks of `buf_len` frames into `on_block` until
	/// [`Driver::cancel_async`] is called. `buf_count` is the number of
	/// transfers the library keeps in flight.
	fn read_async(&self, buf_count: usize, buf_len: usize, on_block: &mut dyn FnMut(&[Sample])) -> Result<()>;

	fn cancel_async(&self) -> Result<()>;
}
