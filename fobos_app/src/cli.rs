use clap::Parser;
use fobos::DEFAULT_BUF_COUNT;

#[derive(Parser, Debug)]
#[command(name = "fobos_rx", version, about = "Receive I/Q samples from a Fobos SDR")]
pub struct Cli {
	/// List attached boards and exit
	#[arg(long)]
	pub list: bool,

	/// Open the board with this serial number
	#[arg(long)]
	pub serial: Option<String>,

	/// Open the board at this index, ignored when --serial is given
	#[arg(long)]
	pub index: Option<usize>,

	/// Center frequency in Hz
	#[arg(short, long, default_value_t = 100e6)]
	pub frequency: f64,

	/// Sample rate in Hz, snapped to the nearest supported rate
	#[arg(short, long, default_value_t = 10e6)]
	pub sample_rate: f64,

	/// LNA gain in dB (0-33)
	#[arg(long, default_value_t = 16.0)]
	pub lna: f64,

	/// VGA gain in dB (0-30)
	#[arg(long, default_value_t = 10.0)]
	pub vga: f64,

	/// Use the HF1/HF2 direct sampling inputs
	#[arg(long)]
	pub direct_sampling: bool,

	/// internal/master or external/slave
	#[arg(long, default_value = "internal")]
	pub clock_source: String,

	/// Blocks buffered between the driver and the reader
	#[arg(long, default_value_t = DEFAULT_BUF_COUNT)]
	pub buf_count: usize,

	/// Stop after this many frames
	#[arg(short = 'n', long, default_value_t = 20_000_000)]
	pub frames: usize,

	/// Increase verbosity (-v, -vv)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,
}
