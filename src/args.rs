//! Support for command line argument parsing.
//!
//! See [crate] documentation for details on command line arguments and examples.

use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Debug};
use std::str::FromStr;

use dcf77::{Config, ConfigError, OscillatorKind};
use dcf77::config::DEFAULT_FREQUENCY;
use wallclock::TimeBase;

/// The error type for parsing command line arguments.
#[cfg_attr(test, derive(PartialEq))]
pub enum ArgumentsError {
	/// The option was unrecognized. The option is returned as the payload of this variant.
	UnrecognizedOption(String),
	/// A positional argument was supplied; none are accepted. The argument is returned as the
	/// payload of this variant.
	UnexpectedArgument(String),
	/// Error converting an option or parameter to UTF-8. The argument index and original
	/// [`OsString`] that could not be converted are returned as the payload of this variant.
	InvalidUTF8(usize, OsString),
	/// The parameter for an option was not supplied. The option is returned as the payload for this
	/// variant.
	MissingParameter(String),
	/// The parameter for an option could not be parsed. The option and the supplied parameter are
	/// returned as the payload for this variant.
	InvalidValue(String, String),
	/// Help option (-h) was included, so print help details and exit.
	Help
}

impl Display for ArgumentsError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ArgumentsError::UnrecognizedOption(s) => write!(f, "Unrecognized option: {}", s),
			ArgumentsError::UnexpectedArgument(s) => write!(f, "Unexpected argument: {}", s),
			ArgumentsError::InvalidUTF8(i, v) => write!(f, "Invalid UTF-8 in argument {}: {:?}", i, v),
			ArgumentsError::MissingParameter(s) => write!(f, "Missing parameter for option {}", s),
			ArgumentsError::InvalidValue(o, v) => write!(f, "Invalid value for option {}: {}", o, v),
			ArgumentsError::Help => write!(f, "Help requested")
		}
	}
}

impl Debug for ArgumentsError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

impl Error for ArgumentsError {}

/// Convert an argument to [`&str`].
///
/// The function takes the argument index `i`, optional argument name `a`, and the argument `s`.
///
/// # Errors
///
/// Returns [`ArgumentsError::InvalidUTF8`] if the argument could not be converted to UTF-8 or
/// [`ArgumentsError::MissingParameter`] if the argument is `None`.
fn arg_to_str<'a, 'b>(i: usize, a: Option<&'a str>, s: Option<&'b OsString>)
	-> Result<&'b str, ArgumentsError>
{
	match s {
		Some(v) => v.to_str().ok_or_else(|| ArgumentsError::InvalidUTF8(i, v.clone())),
		None => Err(ArgumentsError::MissingParameter(a.map(String::from).unwrap_or_default()))
	}
}

/// Parse the parameter `s` (argument `i`) of option `a`.
///
/// # Errors
///
/// As [`arg_to_str`], plus [`ArgumentsError::InvalidValue`] if the parameter does not parse as `T`.
fn parse_value<T: FromStr>(i: usize, a: &str, s: Option<&OsString>) -> Result<T, ArgumentsError> {
	arg_to_str(i, Some(a), s).and_then(
		|v| v.parse().map_err(|_| ArgumentsError::InvalidValue(a.to_string(), v.to_string()))
	)
}

/// Parse an oscillator name, case insensitive.
fn parse_oscillator(i: usize, a: &str, s: Option<&OsString>) -> Result<OscillatorKind, ArgumentsError> {
	let v = arg_to_str(i, Some(a), s)?;
	match v.to_ascii_lowercase().as_str() {
		"accumulator" => Ok(OscillatorKind::Accumulator),
		"table" => Ok(OscillatorKind::Table),
		_ => Err(ArgumentsError::InvalidValue(a.to_string(), v.to_string()))
	}
}

/// Parsed command line arguments.
#[derive(Debug, PartialEq)]
pub struct Arguments {
	/// List output devices and exit.
	pub list_devices: bool,
	/// Output device id or name substring (if provided).
	pub device: Option<String>,
	/// Carrier frequency in Hz.
	pub frequency: f64,
	/// Peak amplitude, (0, 1].
	pub amplitude: f32,
	/// Requested sample rate (if provided).
	pub samplerate: Option<u32>,
	/// Clock to transmit.
	pub time_base: TimeBase,
	/// Seconds added to the wall clock when seeding.
	pub offset: u8,
	/// Relative amplitude during a pulse, [0, 1].
	pub low_factor: f32,
	/// Carrier oscillator design.
	pub oscillator: OscillatorKind,
	/// Crossfade length in samples at pulse edges.
	pub ramp: u32,
	/// Transmit zone announcement bits.
	pub announce: bool,
	/// Print the telegram and exit without touching the audio host.
	pub dry_run: bool
}

impl Default for Arguments {
	fn default() -> Arguments {
		Arguments {
			list_devices: false,
			device: None,
			frequency: DEFAULT_FREQUENCY,
			amplitude: 1.,
			samplerate: None,
			time_base: TimeBase::Local,
			offset: 0,
			low_factor: 0.,
			oscillator: OscillatorKind::Accumulator,
			ramp: 0,
			announce: false,
			dry_run: false
		}
	}
}

impl Arguments {
	/// Parse command line arguments.
	///
	/// The input can be any type that implements [`Iterator`] that yields [`OsString`], though
	/// typically this would be [`std::env::args_os`]. This function assumes that the application
	/// name is **not** supplied as the first item yielded by `args`.
	///
	/// Only syntax is checked here. Value ranges are checked by [`Arguments::config`].
	///
	/// # Errors
	///
	/// This function can return any of the variants in [`ArgumentsError`]. See that documentation
	/// for more details.
	pub fn parse(mut args: impl Iterator<Item = OsString>) -> Result<Arguments, ArgumentsError>
	{
		let mut parsed = Arguments::default();
		let mut i = 0;
		while let Some(arg) = args.next() {
			match arg_to_str(i, None, Some(&arg))? {
				"-l" | "--list-devices" => parsed.list_devices = true,
				"-u" | "--utc" => parsed.time_base = TimeBase::Utc,
				"--announce" => parsed.announce = true,
				"--dry-run" => parsed.dry_run = true,
				"-h" | "--help" => return Err(ArgumentsError::Help),
				n @ ("-d" | "--device") => {
					parsed.device = Some(String::from(arg_to_str(i+1, Some(n), args.next().as_ref())?));
					// Increment because we called args.next()
					i += 1;
				},
				n @ ("-f" | "--frequency") => {
					parsed.frequency = parse_value(i+1, n, args.next().as_ref())?;
					i += 1;
				},
				n @ ("-a" | "--amplitude") => {
					parsed.amplitude = parse_value(i+1, n, args.next().as_ref())?;
					i += 1;
				},
				n @ ("-s" | "--samplerate") => {
					parsed.samplerate = Some(parse_value(i+1, n, args.next().as_ref())?);
					i += 1;
				},
				n @ ("-o" | "--offset") => {
					parsed.offset = parse_value(i+1, n, args.next().as_ref())?;
					i += 1;
				},
				n @ "--low-factor" => {
					parsed.low_factor = parse_value(i+1, n, args.next().as_ref())?;
					i += 1;
				},
				n @ "--oscillator" => {
					parsed.oscillator = parse_oscillator(i+1, n, args.next().as_ref())?;
					i += 1;
				},
				n @ "--ramp" => {
					parsed.ramp = parse_value(i+1, n, args.next().as_ref())?;
					i += 1;
				},
				v => {
					return Err(if v.starts_with('-') {
						ArgumentsError::UnrecognizedOption(v.to_string())
					} else {
						ArgumentsError::UnexpectedArgument(v.to_string())
					});
				}
			}
			i += 1;
		}

		Ok(parsed)
	}

	/// Build the generator configuration for output at `samplerate`.
	///
	/// # Errors
	///
	/// Returns the [`ConfigError`] for the first out of range value.
	pub fn config(&self, samplerate: u32) -> Result<Config, ConfigError> {
		Ok(Config::new(self.frequency, samplerate, self.amplitude, self.low_factor, self.time_base,
			self.offset)?
			.with_oscillator(self.oscillator)?
			.with_ramp(self.ramp)?
			.with_announcements(self.announce))
	}
}
