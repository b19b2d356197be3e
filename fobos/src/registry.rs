use tracing::{debug, error, info};

use crate::{Backend, Error, Kwargs, Result};

pub const DRIVER_KEY: &str = "FobosSDR";
pub const LABEL: &str = "Fobos SDR";
pub const MANUFACTURER: &str = "RigExpert";

/// Describes every attached board, keeping only the one with the requested
/// `serial` if the argument is present
pub fn find<B: Backend>(backend: &B, args: &Kwargs) -> Result<Vec<Kwargs>> {
	let serials = backend.list_devices()?;
	debug!(count = serials.len(), "Found devices");

	let found = serials
		.into_iter()
		.filter(|serial| args.get("serial").is_none_or(|wanted| wanted == serial))
		.map(|serial| {
			Kwargs::from([
				("label".to_owned(), LABEL.to_owned()),
				("serial".to_owned(), serial),
				("manufacturer".to_owned(), MANUFACTURER.to_owned()),
			])
		})
		.collect();

	Ok(found)
}

/// Resolves the open index from `serial` or `index`, defaulting to the first
/// board
pub fn resolve_index<B: Backend>(backend: &B, args: &Kwargs) -> Result<usize> {
	if let Some(wanted) = args.get("serial") {
		let serials = backend.list_devices()?;

		if serials.is_empty() {
			return Err(Error::NotFound("no Fobos devices attached".into()));
		}

		return match serials.iter().position(|serial| serial == wanted) {
			Some(index) => {
				info!(serial = %wanted, index, "Found device by serial");
				Ok(index)
			}
			None => {
				error!(serial = %wanted, available = ?serials, "Device with requested serial not found");
				Err(Error::NotFound(format!("serial {wanted}")))
			}
		};
	}

	match args.get("index") {
		Some(index) => index.trim().parse().map_err(|_| Error::Param("index")),
		None => Ok(0),
	}
}
