use std::{
	collections::BTreeMap,
	fmt::{Display, Formatter},
};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// String key-value arguments passed by the host for opening devices and
/// setting up streams
pub type Kwargs = BTreeMap<String, String>;

/// Native stream format, interleaved complex 32-bit floats
pub const FORMAT_CF32: &str = "CF32";

#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Direction {
	Tx = 0,
	Rx = 1,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ClockSource {
	#[default]
	Internal = 0,
	External = 1,
}

impl ClockSource {
	/// Accepts the numeric form as well as the master/slave aliases
	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"0" | "internal" | "master" => Some(ClockSource::Internal),
			"1" | "external" | "slave" => Some(ClockSource::External),
			_ => None,
		}
	}
}

impl Display for ClockSource {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			ClockSource::Internal => write!(f, "internal"),
			ClockSource::External => write!(f, "external"),
		}
	}
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Range {
	pub min: f64,
	pub max: f64,
}

impl Range {
	pub const fn new(min: f64, max: f64) -> Self {
		Self { min, max }
	}

	pub fn clamp(&self, value: f64) -> f64 {
		value.clamp(self.min, self.max)
	}

	pub fn span(&self) -> f64 {
		self.max - self.min
	}
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArgType {
	Int,
	String,
}

/// Describes one setting or stream argument to the host
#[derive(Debug, Clone, PartialEq)]
pub struct ArgInfo {
	pub key: &'static str,
	pub value: String,
	pub name: &'static str,
	pub description: &'static str,
	pub units: &'static str,
	pub ty: ArgType,
	pub options: Vec<(&'static str, &'static str)>,
}

/// Identification strings reported by an opened board
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardInfo {
	pub hw_revision: String,
	pub fw_version: String,
	pub manufacturer: String,
	pub product: String,
	pub serial: String,
}

/// Versions of the vendor library and kernel driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiInfo {
	pub lib_version: String,
	pub drv_version: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clock_source_aliases() {
		assert_eq!(ClockSource::parse("master"), Some(ClockSource::Internal));
		assert_eq!(ClockSource::parse("slave"), Some(ClockSource::External));
		assert_eq!(ClockSource::parse("1"), Some(ClockSource::External));
		assert_eq!(ClockSource::parse("ext"), None);
	}

	#[test]
	fn direction_from_host_constant() {
		assert!(matches!(Direction::try_from(1), Ok(Direction::Rx)));
		assert!(matches!(Direction::try_from(0), Ok(Direction::Tx)));
		assert!(Direction::try_from(2).is_err());
	}
}
