fn main() {
	#[cfg(feature = "libfobos")]
	{
		println!("cargo:rustc-link-lib=fobos");
	}
}
