//! Receive stream lifecycle.
//!
//! Slots are allocated once in [`RxStream::setup`] and released when the
//! stream is closed or dropped, so activation only resets cursors and spawns
//! the producer thread. The producer thread sits inside
//! [`Driver::read_async`] and forwards every block to the [`RingPool`].

use std::{
	sync::Arc,
	thread::{self, JoinHandle},
	time::Duration,
};

use tracing::{Span, debug, error, trace, warn};

use crate::{
	DEFAULT_BUF_COUNT, DEFAULT_BUF_LEN, Direction, Driver, Error, FORMAT_CF32, Kwargs, Result, RingPool, Sample,
	ring::{StreamStats, Submit},
};

const CANCEL_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct StreamConfig {
	pub buf_count: usize,
	/// Frames per block, fixed for the lifetime of the stream
	pub buf_len: usize,
	/// Span entered by the producer thread, events it emits are recorded
	/// under it
	pub span: Span,
}

impl Default for StreamConfig {
	fn default() -> Self {
		Self { buf_count: DEFAULT_BUF_COUNT, buf_len: DEFAULT_BUF_LEN, span: Span::none() }
	}
}

impl StreamConfig {
	/// Applies host stream arguments on top of `self`. Malformed values are
	/// logged and the current value is kept.
	pub fn with_args(mut self, args: &Kwargs) -> Self {
		if let Some(value) = args.get("buf_count") {
			match value.trim().parse::<usize>() {
				Ok(count) if count > 0 => self.buf_count = count,
				_ => warn!(value = %value, buf_count = self.buf_count, "Invalid buf_count, keeping current"),
			}
		}

		self
	}
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamState {
	Configured,
	Activated,
	Deactivated,
}

/// The single receive stream of a device. Closing consumes it.
pub struct RxStream<D: Driver> {
	driver: Arc<D>,
	pool: Arc<RingPool>,
	config: StreamConfig,
	worker: Option<JoinHandle<()>>,
	state: StreamState,
}

/// Reading half of a stream, usable from the consumer thread while the
/// owner activates and deactivates the stream
#[derive(Clone)]
pub struct StreamReader {
	pool: Arc<RingPool>,
}

impl StreamReader {
	/// See [`RxStream::read`]
	pub fn read(&self, dst: &mut [Sample], timeout: Duration) -> usize {
		self.pool.drain(dst, timeout)
	}

	pub fn stats(&self) -> StreamStats {
		self.pool.stats()
	}
}

impl<D: Driver> RxStream<D> {
	pub fn setup(driver: Arc<D>, direction: Direction, format: &str, channels: &[usize], config: StreamConfig) -> Result<Self> {
		if direction != Direction::Rx {
			return Err(Error::Config("direction: only RX"));
		}

		if channels.len() > 1 || channels.first().is_some_and(|&channel| channel != 0) {
			return Err(Error::Config("channels: only channel 0"));
		}

		if format != FORMAT_CF32 {
			return Err(Error::Config("format: only CF32"));
		}

		if config.buf_count == 0 || config.buf_len == 0 {
			return Err(Error::Config("buffers: count and length must be non-zero"));
		}

		debug!(buf_count = config.buf_count, buf_len = config.buf_len, "Allocating stream buffers");

		Ok(Self {
			pool: Arc::new(RingPool::new(config.buf_count, config.buf_len)),
			driver,
			config,
			worker: None,
			state: StreamState::Configured,
		})
	}

	pub fn state(&self) -> StreamState {
		self.state
	}

	/// Largest number of frames a single read can return
	pub fn mtu(&self) -> usize {
		self.pool.buf_len()
	}

	pub fn reader(&self) -> StreamReader {
		StreamReader { pool: Arc::clone(&self.pool) }
	}

	pub fn stats(&self) -> StreamStats {
		self.pool.stats()
	}

	/// Starts the producer thread. Returns immediately and does nothing if a
	/// producer is already running.
	pub fn activate(&mut self, flags: i32) -> Result<()> {
		if flags != 0 {
			return Err(Error::NotSupported("activation flags"));
		}

		if let Some(worker) = &self.worker {
			if !worker.is_finished() {
				return Ok(());
			}

			// The producer gave up on its own, reap it before starting over
			debug!("Restarting finished receive thread");
			self.stop_worker()?;
		}

		self.pool.reset();
		self.pool.start();

		match self.spawn_worker() {
			Ok(worker) => self.worker = Some(worker),
			Err(err) => {
				self.pool.stop();
				return Err(err);
			}
		}

		self.state = StreamState::Activated;
		debug!("Stream activated");

		Ok(())
	}

	/// Cancels the driver transfer and waits for the producer thread to exit.
	/// No block reaches the pool once this returns.
	pub fn deactivate(&mut self, flags: i32) -> Result<()> {
		if flags != 0 {
			return Err(Error::NotSupported("deactivation flags"));
		}

		if self.worker.is_none() {
			return Ok(());
		}

		self.stop_worker()?;
		self.state = StreamState::Deactivated;
		debug!(stats = ?self.pool.stats(), "Stream deactivated");

		Ok(())
	}

	/// Reads at most one block worth of frames into `dst`, waiting up to
	/// `timeout` for data. An inactive stream reads `0` frames.
	pub fn read(&self, dst: &mut [Sample], timeout: Duration) -> usize {
		self.pool.drain(dst, timeout)
	}

	/// Deactivates if needed and frees the buffers
	pub fn close(mut self) -> Result<()> {
		self.stop_worker()?;
		debug!("Stream closed");
		Ok(())
	}

	fn spawn_worker(&self) -> Result<JoinHandle<()>> {
		let driver = Arc::clone(&self.driver);
		let pool = Arc::clone(&self.pool);
		let (buf_count, buf_len) = (self.config.buf_count, self.config.buf_len);
		let span = self.config.span.clone();

		thread::Builder::new()
			.name("fobos-rx".into())
			.spawn(move || {
				let _entered = span.enter();
				debug!(buf_count, buf_len, "Receive thread started");

				let result = driver.read_async(buf_count, buf_len, &mut |block: &[Sample]| match pool.submit(block) {
					Ok(Submit::Stored) => trace!("Block stored"),
					Ok(Submit::Overrun) => trace!("Pool full, block dropped"),
					Err(err) => {
						error!(%err, "Cancelling receive");

						if let Err(err) = driver.cancel_async() {
							error!(%err, "Failed to cancel receive");
						}
					}
				});

				pool.stop();

				match result {
					Ok(()) => debug!("Receive thread finished"),
					Err(err) => error!(%err, "Receive failed"),
				}
			})
			.map_err(Error::Spawn)
	}

	fn stop_worker(&mut self) -> Result<()> {
		let Some(worker) = self.worker.take() else {
			return Ok(());
		};

		// A cancel issued before the thread enters the driver is lost or
		// rejected, repeat it until the thread is gone
		while !worker.is_finished() {
			if let Err(err) = self.driver.cancel_async() {
				debug!(%err, "Cancel not accepted, retrying");
			}

			thread::sleep(CANCEL_POLL);
		}

		self.pool.stop();
		worker.join().map_err(|_| Error::Worker)
	}
}

impl<D: Driver> Drop for RxStream<D> {
	fn drop(&mut self) {
		if let Err(err) = self.stop_worker() {
			error!(%err, "Failed to stop receive thread");
		}
	}
}
