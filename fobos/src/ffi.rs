//! Bindings to the vendor `libfobos` receiver library.

use std::{
	ffi::{c_char, c_int, c_uint, c_void},
	ptr, slice,
};

use tracing::{debug, warn};

use crate::{ApiInfo, Backend, BoardInfo, ClockSource, Driver, Error, Result, Sample, internals};

const INFO_LEN: usize = 32;
const SERIALS_LEN: usize = 256;

#[repr(C)]
struct FobosDev {
	_opaque: [u8; 0],
}

type RxCallback = unsafe extern "C" fn(buf: *mut f32, buf_length: u32, ctx: *mut c_void);

unsafe extern "C" {
	fn fobos_rx_get_api_info(lib_version: *mut c_char, drv_version: *mut c_char) -> c_int;
	fn fobos_rx_list_devices(serials: *mut c_char) -> c_int;
	fn fobos_rx_open(out_dev: *mut *mut FobosDev, index: u32) -> c_int;
	fn fobos_rx_close(dev: *mut FobosDev) -> c_int;
	fn fobos_rx_get_board_info(
		dev: *mut FobosDev,
		hw_revision: *mut c_char,
		fw_version: *mut c_char,
		manufacturer: *mut c_char,
		product: *mut c_char,
		serial: *mut c_char,
	) -> c_int;
	fn fobos_rx_set_frequency(dev: *mut FobosDev, value: f64, actual: *mut f64) -> c_int;
	fn fobos_rx_set_samplerate(dev: *mut FobosDev, value: f64, actual: *mut f64) -> c_int;
	fn fobos_rx_get_samplerates(dev: *mut FobosDev, values: *mut f64, count: *mut c_uint) -> c_int;
	fn fobos_rx_set_lna_gain(dev: *mut FobosDev, value: c_uint) -> c_int;
	fn fobos_rx_set_vga_gain(dev: *mut FobosDev, value: c_uint) -> c_int;
	fn fobos_rx_set_direct_sampling(dev: *mut FobosDev, enabled: c_uint) -> c_int;
	fn fobos_rx_set_clk_source(dev: *mut FobosDev, value: c_int) -> c_int;
	fn fobos_rx_read_async(dev: *mut FobosDev, cb: RxCallback, ctx: *mut c_void, buf_count: u32, buf_length: u32) -> c_int;
	fn fobos_rx_cancel_async(dev: *mut FobosDev) -> c_int;
}

fn c_string(buf: &[c_char]) -> String {
	let bytes: Vec<u8> = buf.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
	String::from_utf8_lossy(&bytes).into_owned()
}

fn to_u32(value: usize, name: &'static str) -> Result<u32> {
	u32::try_from(value).map_err(|_| Error::Param(name))
}

/// The system-wide vendor library
#[derive(Debug, Default, Copy, Clone)]
pub struct Libfobos;

impl Backend for Libfobos {
	type Driver = FobosDriver;

	fn api_info(&self) -> ApiInfo {
		let mut lib = [0 as c_char; INFO_LEN];
		let mut drv = [0 as c_char; INFO_LEN];

		let code = unsafe { fobos_rx_get_api_info(lib.as_mut_ptr(), drv.as_mut_ptr()) };
		if code != 0 {
			warn!(code, "fobos_rx_get_api_info failed");
		}

		ApiInfo { lib_version: c_string(&lib), drv_version: c_string(&drv) }
	}

	fn list_devices(&self) -> Result<Vec<String>> {
		let mut serials = [0 as c_char; SERIALS_LEN];

		let count = unsafe { fobos_rx_list_devices(serials.as_mut_ptr()) };
		if count < 0 {
			return Err(Error::Driver { op: "fobos_rx_list_devices", code: count });
		}

		let serials = c_string(&serials);
		Ok(serials.split_whitespace().take(count as usize).map(str::to_owned).collect())
	}

	fn open(&self, index: usize) -> Result<FobosDriver> {
		let mut dev = ptr::null_mut();

		Error::check("fobos_rx_open", unsafe { fobos_rx_open(&raw mut dev, to_u32(index, "index")?) })?;

		if dev.is_null() {
			return Err(Error::NotFound(format!("no board at index {index}")));
		}

		Ok(FobosDriver { dev })
	}
}

/// An opened board, closed on drop
pub struct FobosDriver {
	dev: *mut FobosDev,
}

// The library serializes access internally and explicitly supports
// cancelling an async read from another thread
unsafe impl Send for FobosDriver {}
unsafe impl Sync for FobosDriver {}

impl Drop for FobosDriver {
	fn drop(&mut self) {
		let code = unsafe { fobos_rx_close(self.dev) };
		if code != 0 {
			warn!(code, "fobos_rx_close failed");
		}
	}
}

type BlockSink<'a> = &'a mut dyn FnMut(&[Sample]);

unsafe extern "C" fn rx_callback(buf: *mut f32, buf_length: u32, ctx: *mut c_void) {
	let on_block = unsafe { &mut *ctx.cast::<BlockSink<'_>>() };
	let floats = unsafe { slice::from_raw_parts(buf, buf_length as usize * 2) };
	on_block(internals::floats_as_samples(floats));
}

impl Driver for FobosDriver {
	fn board_info(&self) -> Result<BoardInfo> {
		let mut fields = [[0 as c_char; INFO_LEN]; 5];
		let [hw, fw, manufacturer, product, serial] = &mut fields;

		Error::check("fobos_rx_get_board_info", unsafe {
			fobos_rx_get_board_info(
				self.dev,
				hw.as_mut_ptr(),
				fw.as_mut_ptr(),
				manufacturer.as_mut_ptr(),
				product.as_mut_ptr(),
				serial.as_mut_ptr(),
			)
		})?;

		Ok(BoardInfo {
			hw_revision: c_string(hw),
			fw_version: c_string(fw),
			manufacturer: c_string(manufacturer),
			product: c_string(product),
			serial: c_string(serial),
		})
	}

	fn set_frequency(&self, hz: f64) -> Result<f64> {
		let mut actual = 0.0;
		Error::check("fobos_rx_set_frequency", unsafe { fobos_rx_set_frequency(self.dev, hz, &raw mut actual) })?;
		Ok(actual)
	}

	fn set_sample_rate(&self, hz: f64) -> Result<f64> {
		let mut actual = 0.0;
		Error::check("fobos_rx_set_samplerate", unsafe { fobos_rx_set_samplerate(self.dev, hz, &raw mut actual) })?;
		Ok(actual)
	}

	fn sample_rates(&self) -> Result<Vec<f64>> {
		let mut count: c_uint = 0;
		Error::check("fobos_rx_get_samplerates", unsafe {
			fobos_rx_get_samplerates(self.dev, ptr::null_mut(), &raw mut count)
		})?;

		let mut rates = vec![0.0; count as usize];
		if rates.is_empty() {
			return Ok(rates);
		}

		Error::check("fobos_rx_get_samplerates", unsafe {
			fobos_rx_get_samplerates(self.dev, rates.as_mut_ptr(), &raw mut count)
		})?;
		rates.truncate(count as usize);

		Ok(rates)
	}

	fn set_lna_gain(&self, index: u32) -> Result<()> {
		Error::check("fobos_rx_set_lna_gain", unsafe { fobos_rx_set_lna_gain(self.dev, index) })
	}

	fn set_vga_gain(&self, index: u32) -> Result<()> {
		Error::check("fobos_rx_set_vga_gain", unsafe { fobos_rx_set_vga_gain(self.dev, index) })
	}

	fn set_direct_sampling(&self, enabled: bool) -> Result<()> {
		Error::check("fobos_rx_set_direct_sampling", unsafe { fobos_rx_set_direct_sampling(self.dev, enabled.into()) })
	}

	fn set_clock_source(&self, source: ClockSource) -> Result<()> {
		Error::check("fobos_rx_set_clk_source", unsafe { fobos_rx_set_clk_source(self.dev, source.into()) })
	}

	fn read_async(&self, buf_count: usize, buf_len: usize, on_block: &mut dyn FnMut(&[Sample])) -> Result<()> {
		let (buf_count, buf_len) = (to_u32(buf_count, "buf_count")?, to_u32(buf_len, "buf_len")?);
		let mut sink: BlockSink = on_block;
		let ctx = (&raw mut sink).cast::<c_void>();

		debug!(buf_count, buf_len, "fobos_rx_read_async");
		Error::check("fobos_rx_read_async", unsafe { fobos_rx_read_async(self.dev, rx_callback, ctx, buf_count, buf_len) })
	}

	fn cancel_async(&self) -> Result<()> {
		Error::check("fobos_rx_cancel_async", unsafe { fobos_rx_cancel_async(self.dev) })
	}
}
