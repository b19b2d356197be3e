//! Fixed pool of sample blocks between the driver callback and the reader.
//!
//! The producer never waits: when every slot holds unread data the incoming
//! block is dropped and counted as an overrun. The reader drains one slot at
//! a time and may take it in several smaller pieces.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::{Error, Result, Sample};

pub struct RingPool {
	buf_len: usize,
	ring: Mutex<Ring>,
	ready: Condvar,
}

struct Ring {
	slots: Box<[Box<[Sample]>]>,
	write_idx: usize,
	read_idx: usize,
	read_pos: usize,
	filled: usize,
	overruns: u64,
	blocks: u64,
	running: bool,
}

/// What happened to a submitted block
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Submit {
	Stored,
	Overrun,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
	/// Blocks delivered by the driver since activation, dropped ones included
	pub blocks: u64,
	pub overruns: u64,
	/// Slots currently holding unread data
	pub filled: usize,
}

impl RingPool {
	/// Allocates `buf_count` slots of `buf_len` frames each. This is the only
	/// allocation the pool ever makes.
	///
	/// # Panics
	/// In case either dimension is zero
	pub fn new(buf_count: usize, buf_len: usize) -> Self {
		assert!(buf_count > 0 && buf_len > 0, "Pool dimensions must be non-zero");

		let slots = (0..buf_count).map(|_| vec![Sample::default(); buf_len].into_boxed_slice()).collect();

		Self {
			buf_len,
			ring: Mutex::new(Ring {
				slots,
				write_idx: 0,
				read_idx: 0,
				read_pos: 0,
				filled: 0,
				overruns: 0,
				blocks: 0,
				running: false,
			}),
			ready: Condvar::new(),
		}
	}

	pub fn capacity(&self) -> usize {
		self.ring.lock().slots.len()
	}

	pub fn buf_len(&self) -> usize {
		self.buf_len
	}

	/// Copies a whole block into the next free slot, or drops it when the pool
	/// is full. Wakes one waiting reader either way.
	pub fn submit(&self, block: &[Sample]) -> Result<Submit> {
		if block.len() != self.buf_len {
			return Err(Error::BlockLength { expected: self.buf_len, got: block.len() });
		}

		let mut guard = self.ring.lock();
		let ring = &mut *guard;
		ring.blocks += 1;

		let outcome = if ring.filled < ring.slots.len() {
			ring.slots[ring.write_idx].copy_from_slice(block);
			ring.write_idx = (ring.write_idx + 1) % ring.slots.len();
			ring.filled += 1;
			Submit::Stored
		} else {
			ring.overruns += 1;
			Submit::Overrun
		};

		drop(guard);
		self.ready.notify_one();

		Ok(outcome)
	}

	/// Copies up to `dst.len()` frames out of the oldest filled slot.
	///
	/// Waits at most `timeout` for a block to arrive. Returns `0` when the
	/// pool is stopped, on timeout, or when `dst` is empty. A single call
	/// never crosses into the next slot.
	pub fn drain(&self, dst: &mut [Sample], timeout: Duration) -> usize {
		if dst.is_empty() {
			return 0;
		}

		let deadline = Instant::now().checked_add(timeout);
		let mut guard = self.ring.lock();

		while guard.running && guard.filled == 0 {
			match deadline {
				Some(deadline) => {
					if self.ready.wait_until(&mut guard, deadline).timed_out() {
						break;
					}
				}
				None => self.ready.wait(&mut guard),
			}
		}

		if !guard.running || guard.filled == 0 {
			return 0;
		}

		let ring = &mut *guard;
		let count = (self.buf_len - ring.read_pos).min(dst.len());
		let slot = &ring.slots[ring.read_idx];
		dst[..count].copy_from_slice(&slot[ring.read_pos..ring.read_pos + count]);

		ring.read_pos += count;

		if ring.read_pos == self.buf_len {
			ring.read_pos = 0;
			ring.read_idx = (ring.read_idx + 1) % ring.slots.len();
			ring.filled -= 1;
		}

		count
	}

	/// Forgets all buffered data and counters, keeping the slots
	pub fn reset(&self) {
		let mut ring = self.ring.lock();
		ring.write_idx = 0;
		ring.read_idx = 0;
		ring.read_pos = 0;
		ring.filled = 0;
		ring.overruns = 0;
		ring.blocks = 0;
	}

	pub fn start(&self) {
		self.ring.lock().running = true;
	}

	/// Marks the pool stopped and releases every waiting reader
	pub fn stop(&self) {
		self.ring.lock().running = false;
		self.ready.notify_all();
	}

	pub fn stats(&self) -> StreamStats {
		let ring = self.ring.lock();
		StreamStats { blocks: ring.blocks, overruns: ring.overruns, filled: ring.filled }
	}
}

#[cfg(test)]
mod tests {
	use std::{sync::Arc, thread};

	use super::*;

	const WAIT: Duration = Duration::from_millis(10);

	fn block(len: usize, start: f32) -> Vec<Sample> {
		(0..len).map(|i| Sample::new(start + i as f32, -(start + i as f32))).collect()
	}

	fn running_pool(count: usize, len: usize) -> RingPool {
		let pool = RingPool::new(count, len);
		pool.start();
		pool
	}

	#[test]
	fn fills_to_capacity_then_counts_overruns() {
		let pool = running_pool(4, 8);

		for n in 0..4 {
			assert_eq!(pool.submit(&block(8, n as f32 * 8.0)).unwrap(), Submit::Stored);
		}
		assert_eq!(pool.stats(), StreamStats { blocks: 4, overruns: 0, filled: 4 });

		assert_eq!(pool.submit(&block(8, 100.0)).unwrap(), Submit::Overrun);
		assert_eq!(pool.stats(), StreamStats { blocks: 5, overruns: 1, filled: 4 });

		let mut dst = vec![Sample::default(); 8];
		for n in 0..4 {
			assert_eq!(pool.drain(&mut dst, WAIT), 8);
			assert_eq!(dst, block(8, n as f32 * 8.0));
		}

		assert_eq!(pool.stats().filled, 0);
		assert_eq!(pool.drain(&mut dst, WAIT), 0);
	}

	#[test]
	fn overruns_grow_by_excess_submissions() {
		let pool = running_pool(3, 2);

		for n in 0..10 {
			pool.submit(&block(2, n as f32)).unwrap();
		}

		let stats = pool.stats();
		assert_eq!(stats.overruns, 7);
		assert_eq!(stats.filled, 3);
	}

	#[test]
	fn partial_drains_stay_within_one_slot() {
		let pool = running_pool(2, 8);
		pool.submit(&block(8, 0.0)).unwrap();
		pool.submit(&block(8, 8.0)).unwrap();

		let mut dst = vec![Sample::default(); 5];
		assert_eq!(pool.drain(&mut dst, WAIT), 5);
		assert_eq!(dst, block(5, 0.0));

		// Only the 3 frames left in the first slot, never the start of the second
		assert_eq!(pool.drain(&mut dst, WAIT), 3);
		assert_eq!(dst[..3], block(3, 5.0)[..]);
		assert_eq!(pool.stats().filled, 1);

		assert_eq!(pool.drain(&mut dst, WAIT), 5);
		assert_eq!(dst, block(5, 8.0));
	}

	#[test]
	fn oversized_destination_takes_one_block() {
		let pool = running_pool(2, 4);
		pool.submit(&block(4, 0.0)).unwrap();
		pool.submit(&block(4, 4.0)).unwrap();

		let mut dst = vec![Sample::default(); 16];
		assert_eq!(pool.drain(&mut dst, WAIT), 4);
		assert_eq!(dst[..4], block(4, 0.0)[..]);
	}

	#[test]
	fn wrong_block_length_is_rejected_untouched() {
		let pool = running_pool(2, 4);

		let err = pool.submit(&block(3, 0.0)).unwrap_err();
		assert!(matches!(err, Error::BlockLength { expected: 4, got: 3 }));
		assert_eq!(pool.stats(), StreamStats::default());
	}

	#[test]
	fn reset_clears_every_cursor() {
		let pool = running_pool(3, 4);
		for n in 0..5 {
			pool.submit(&block(4, n as f32)).unwrap();
		}
		let mut dst = vec![Sample::default(); 2];
		pool.drain(&mut dst, WAIT);

		pool.reset();

		let ring = pool.ring.lock();
		assert_eq!((ring.write_idx, ring.read_idx, ring.read_pos), (0, 0, 0));
		assert_eq!((ring.filled, ring.overruns, ring.blocks), (0, 0, 0));
		assert_eq!(ring.slots.len(), 3);
	}

	#[test]
	fn indices_wrap_around() {
		let pool = running_pool(2, 2);
		let mut dst = vec![Sample::default(); 2];

		for n in 0..5 {
			pool.submit(&block(2, n as f32 * 2.0)).unwrap();
			assert_eq!(pool.drain(&mut dst, WAIT), 2);
			assert_eq!(dst, block(2, n as f32 * 2.0));
		}

		assert_eq!(pool.stats().overruns, 0);
	}

	#[test]
	fn stopped_pool_reads_nothing() {
		let pool = running_pool(2, 2);
		pool.submit(&block(2, 0.0)).unwrap();
		pool.stop();

		let mut dst = vec![Sample::default(); 2];
		assert_eq!(pool.drain(&mut dst, Duration::from_secs(5)), 0);
	}

	#[test]
	fn empty_pool_times_out() {
		let pool = running_pool(2, 2);
		let mut dst = vec![Sample::default(); 2];

		let started = Instant::now();
		assert_eq!(pool.drain(&mut dst, Duration::from_millis(20)), 0);
		assert!(started.elapsed() >= Duration::from_millis(20));
	}

	#[test]
	fn waiting_reader_wakes_on_submit() {
		let pool = Arc::new(running_pool(2, 4));

		let reader = thread::spawn({
			let pool = Arc::clone(&pool);
			move || {
				let mut dst = vec![Sample::default(); 4];
				let n = pool.drain(&mut dst, Duration::from_secs(5));
				(n, dst)
			}
		});

		thread::sleep(Duration::from_millis(20));
		pool.submit(&block(4, 1.0)).unwrap();

		let (n, dst) = reader.join().unwrap();
		assert_eq!(n, 4);
		assert_eq!(dst, block(4, 1.0));
	}

	#[test]
	fn stop_releases_waiting_reader() {
		let pool = Arc::new(running_pool(2, 4));

		let reader = thread::spawn({
			let pool = Arc::clone(&pool);
			move || {
				let mut dst = vec![Sample::default(); 4];
				pool.drain(&mut dst, Duration::from_secs(30))
			}
		});

		thread::sleep(Duration::from_millis(20));
		let started = Instant::now();
		pool.stop();

		assert_eq!(reader.join().unwrap(), 0);
		assert!(started.elapsed() < Duration::from_secs(30));
	}
}
