#![doc = include_str!("../readme.md")]

use std::ops::{Deref, DerefMut};

use num::Complex;

pub mod device;
pub mod driver;
mod err;
#[cfg(feature = "libfobos")]
pub mod ffi;
pub mod frontend;
pub mod registry;
pub mod ring;
#[cfg(feature = "sim")]
pub mod sim;
pub mod stream;
pub mod ty;

pub use device::FobosDevice;
pub use driver::{Backend, Driver};
pub use err::{Error, Result};
pub use ring::{RingPool, StreamStats};
pub use stream::{RxStream, StreamConfig, StreamReader, StreamState};
pub use ty::*;

/// Frames per sample block delivered by the driver
pub const DEFAULT_BUF_LEN: usize = 128 * 1024;

/// Sample blocks held by the ring buffer pool
pub const DEFAULT_BUF_COUNT: usize = 16;

pub mod internals {
	use std::slice;

	use crate::Sample;

	/// # Panics
	/// In case the length of a slice is odd
	#[inline]
	pub fn floats_as_samples(slice: &[f32]) -> &[Sample] {
		assert_eq!(slice.len() & 1, 0, "Slice length must be multiply of 2");

		let ptr = slice.as_ptr().cast::<Sample>();
		let len = slice.len() / 2;

		unsafe { slice::from_raw_parts(ptr, len) }
	}

	#[inline]
	pub fn samples_as_floats(slice: &[Sample]) -> &[f32] {
		let len = slice.len();
		let ptr = slice.as_ptr().cast::<f32>();

		unsafe { slice::from_raw_parts(ptr, len * 2) }
	}
}

/// One I/Q frame of the native `CF32` stream format
#[derive(Debug, Copy, Clone, Default, PartialEq)]
#[repr(transparent)]
pub struct Sample(Complex<f32>);

impl Sample {
	pub const fn new(i: f32, q: f32) -> Self {
		Self(Complex::new(i, q))
	}
}

impl Deref for Sample {
	type Target = Complex<f32>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for Sample {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

impl From<Sample> for Complex<f32> {
	fn from(value: Sample) -> Self {
		value.0
	}
}

impl From<Complex<f32>> for Sample {
	fn from(value: Complex<f32>) -> Self {
		Self(value)
	}
}
