use std::io;

use thiserror::Error;

pub type Result<T = (), E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("Invalid stream configuration: {0}")]
	Config(&'static str),

	#[error("Driver call `{op}` failed with code {code}")]
	Driver { op: &'static str, code: i32 },

	#[error("Device not found: {0}")]
	NotFound(String),

	#[error("Not supported: {0}")]
	NotSupported(&'static str),

	#[error("Invalid value for parameter: {0}")]
	Param(&'static str),

	#[error("Stream: {0}")]
	Stream(&'static str),

	#[error("Unexpected block length {got}, expected {expected}")]
	BlockLength { expected: usize, got: usize },

	#[error("Failed to spawn receive thread: {0}")]
	Spawn(#[source] io::Error),

	#[error("Receive thread panicked")]
	Worker,
}

impl Error {
	/// Maps a vendor status code into a result, `0` being success
	pub fn check(op: &'static str, code: i32) -> Result<()> {
		if code == 0 { Ok(()) } else { Err(Error::Driver { op, code }) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_status_is_success() {
		assert!(Error::check("fobos_rx_open", 0).is_ok());
	}

	#[test]
	fn nonzero_status_names_the_call() {
		let err = Error::check("fobos_rx_set_frequency", -3).unwrap_err();
		assert!(matches!(err, Error::Driver { op: "fobos_rx_set_frequency", code: -3 }));
		assert_eq!(err.to_string(), "Driver call `fobos_rx_set_frequency` failed with code -3");
	}
}
