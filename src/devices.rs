//! Output device discovery and stream format selection.
//!
//! The matching and format rules are plain functions over names and config ranges, so they can
//! be tested without an audio host.

use std::{error, fmt};

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize};
use cpal::{SupportedStreamConfig, SupportedStreamConfigRange};

/// Sample rate used when nothing is queried, if it is high enough for the carrier.
const DRY_RUN_SAMPLERATE: u32 = 192000;

/// The error type for choosing an output device and format.
pub enum DeviceError {
	/// The host has no default output device.
	NoDefaultDevice,
	/// An empty device name was given.
	EmptyQuery,
	/// A device index beyond the list of output devices. The index and the number of devices are
	/// provided in the payload.
	IndexOutOfRange(usize, usize),
	/// No output device name contains the query. The query and all device labels are provided in
	/// the payload.
	NoMatch(String, Vec<String>),
	/// More than one output device name contains the query. The query and the matching device
	/// labels are provided in the payload.
	Ambiguous(String, Vec<String>),
	/// The device has no output configuration covering the requested sample rate.
	UnsupportedSampleRate(u32),
	/// The device covers the sample rate, but not with `f32` samples. The rate and the formats it
	/// does offer are provided in the payload.
	UnsupportedSampleFormat(u32, Vec<SampleFormat>),
	/// The device's default sample rate cannot carry the requested frequency. The rate and the
	/// frequency are provided in the payload.
	SampleRateTooLow(u32, f64),
	/// Error listing the host's devices.
	Devices(cpal::DevicesError),
	/// Error listing a device's supported configurations.
	SupportedConfigs(cpal::SupportedStreamConfigsError),
	/// Error reading a device's default configuration.
	DefaultConfig(cpal::DefaultStreamConfigError)
}

impl fmt::Display for DeviceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DeviceError::NoDefaultDevice => write!(f, "Failed to get default audio output device"),
			DeviceError::EmptyQuery => write!(f, "--device cannot be empty"),
			DeviceError::IndexOutOfRange(i, n) =>
				write!(f, "Output device {} does not exist, there are {} output devices", i, n),
			DeviceError::NoMatch(q, all) => {
				write!(f, "No output device matches '{}'.\nAvailable output devices:", q)?;
				all.iter().try_for_each(|d| write!(f, "\n  {}", d))
			},
			DeviceError::Ambiguous(q, matches) => {
				write!(f, "Multiple output devices match '{}':", q)?;
				matches.iter().try_for_each(|d| write!(f, "\n  {}", d))?;
				write!(f, "\nRefine --device or pass an explicit numeric device ID.")
			},
			DeviceError::UnsupportedSampleRate(r) =>
				write!(f, "Requested samplerate {} Hz is not supported by the selected output device", r),
			DeviceError::UnsupportedSampleFormat(r, formats) => {
				write!(f, "Selected output device has no f32 output at {} Hz, only", r)?;
				formats.iter().try_for_each(|s| write!(f, " {}", s))
			},
			DeviceError::SampleRateTooLow(r, freq) => write!(f,
				"Default output samplerate is too low for the requested carrier frequency \
				({} Hz <= 2 * {} Hz). Select a high-rate output device, lower --frequency, or pass \
				--samplerate explicitly.", r, freq),
			DeviceError::Devices(e) => write!(f, "Failed to list audio devices: {}", e),
			DeviceError::SupportedConfigs(e) => write!(f, "Failed to query output configurations: {}", e),
			DeviceError::DefaultConfig(e) => write!(f, "Failed to query default output configuration: {}", e)
		}
	}
}

impl fmt::Debug for DeviceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

impl error::Error for DeviceError {}

impl From<cpal::DevicesError> for DeviceError {
	fn from(e: cpal::DevicesError) -> DeviceError {
		DeviceError::Devices(e)
	}
}

impl From<cpal::SupportedStreamConfigsError> for DeviceError {
	fn from(e: cpal::SupportedStreamConfigsError) -> DeviceError {
		DeviceError::SupportedConfigs(e)
	}
}

impl From<cpal::DefaultStreamConfigError> for DeviceError {
	fn from(e: cpal::DefaultStreamConfigError) -> DeviceError {
		DeviceError::DefaultConfig(e)
	}
}

/// Label for device `index` in listings and errors.
fn label(index: usize, name: &str) -> String {
	format!("[{}] {}", index, name)
}

/// Find the device named by `query` among `names`.
///
/// A query that parses as an integer is an index into `names`. Anything else must be a case
/// insensitive substring of exactly one name; surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`DeviceError::IndexOutOfRange`], [`DeviceError::EmptyQuery`],
/// [`DeviceError::NoMatch`] or [`DeviceError::Ambiguous`].
pub fn match_device<S: AsRef<str>>(names: &[S], query: &str) -> Result<usize, DeviceError> {
	if let Ok(index) = query.trim().parse::<usize>() {
		return if index < names.len() {
			Ok(index)
		} else {
			Err(DeviceError::IndexOutOfRange(index, names.len()))
		};
	}

	let needle = query.trim().to_lowercase();
	if needle.is_empty() {
		return Err(DeviceError::EmptyQuery);
	}

	let matches: Vec<usize> = names.iter()
		.enumerate()
		.filter(|(_, n)| n.as_ref().to_lowercase().contains(&needle))
		.map(|(i, _)| i)
		.collect();

	match matches[..] {
		[index] => Ok(index),
		[] => Err(DeviceError::NoMatch(
			query.to_string(),
			names.iter().enumerate().map(|(i, n)| label(i, n.as_ref())).collect()
		)),
		_ => Err(DeviceError::Ambiguous(
			query.to_string(),
			matches.iter().map(|&i| label(i, names[i].as_ref())).collect()
		))
	}
}

/// A resolved output device.
pub struct OutputDevice {
	/// The device handle.
	pub device: cpal::Device,
	/// How the device was chosen, for display.
	pub label: String
}

fn device_name(device: &cpal::Device) -> String {
	device.name().unwrap_or_else(|_| String::from("unknown"))
}

/// Pick the output device named by `query`, or the host's default output device.
///
/// # Errors
///
/// See [`match_device`], plus [`DeviceError::NoDefaultDevice`] and [`DeviceError::Devices`].
pub fn select_device(host: &cpal::Host, query: Option<&str>) -> Result<OutputDevice, DeviceError> {
	let Some(query) = query else {
		let device = host.default_output_device().ok_or(DeviceError::NoDefaultDevice)?;
		let label = format!("default output ({})", device_name(&device));
		return Ok(OutputDevice { device, label });
	};

	let mut devices: Vec<cpal::Device> = host.output_devices()?.collect();
	let names: Vec<String> = devices.iter().map(device_name).collect();
	let index = match_device(&names, query)?;
	log::debug!("Device query '{}' matched {}", query, label(index, &names[index]));
	Ok(OutputDevice {
		device: devices.swap_remove(index),
		label: format!("{} ({})", index, names[index])
	})
}

/// Print the host's output devices and their supported configurations.
///
/// # Errors
///
/// Returns [`DeviceError::Devices`] if the devices cannot be listed. Devices whose
/// configurations cannot be read are still listed.
pub fn list_devices(host: &cpal::Host) -> Result<(), DeviceError> {
	let default = host.default_output_device().map(|d| device_name(&d));
	println!("Output devices ({}):", host.id().name());
	for (i, device) in host.output_devices()?.enumerate() {
		let name = device_name(&device);
		let marker = if default.as_deref() == Some(name.as_str()) { " (default)" } else { "" };
		println!("  {}{}", label(i, &name), marker);
		match device.supported_output_configs() {
			Ok(configs) => for c in configs {
				println!("      {} ch, {}-{} Hz, {}",
					c.channels(), c.min_sample_rate().0, c.max_sample_rate().0, c.sample_format());
			},
			Err(e) => println!("      {}", DeviceError::from(e))
		}
	}
	Ok(())
}

/// Stream parameters chosen for a device.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputFormat {
	/// Sample rate in Hz.
	pub samplerate: u32,
	/// Interleaved channels per frame.
	pub channels: u16,
	/// Buffer sizes the device accepts.
	pub buffer_size: SupportedBufferSize
}

impl OutputFormat {
	/// The stream configuration, asking for host buffers of `block_frames` frames when the device
	/// allows it.
	pub fn stream_config(&self, block_frames: u32) -> StreamConfig {
		StreamConfig {
			channels: self.channels,
			sample_rate: SampleRate(self.samplerate),
			buffer_size: buffer_size_for(&self.buffer_size, block_frames)
		}
	}
}

/// A fixed buffer of `block_frames` if `supported` covers it, otherwise the host default.
pub fn buffer_size_for(supported: &SupportedBufferSize, block_frames: u32) -> BufferSize {
	match supported {
		SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&block_frames) =>
			BufferSize::Fixed(block_frames),
		_ => BufferSize::Default
	}
}

/// Choose among `ranges` an `f32` configuration covering `samplerate`, preferring the fewest
/// channels. The stream is always rendered as `f32`.
///
/// # Errors
///
/// Returns [`DeviceError::UnsupportedSampleFormat`] if only other sample formats cover
/// `samplerate`, and [`DeviceError::UnsupportedSampleRate`] if nothing does.
pub fn pick_format(ranges: &[SupportedStreamConfigRange], samplerate: u32) -> Result<OutputFormat, DeviceError> {
	let covering: Vec<_> = ranges.iter()
		.filter(|r| (r.min_sample_rate().0..=r.max_sample_rate().0).contains(&samplerate))
		.collect();
	if covering.is_empty() {
		return Err(DeviceError::UnsupportedSampleRate(samplerate));
	}
	covering.iter()
		.filter(|r| r.sample_format() == SampleFormat::F32)
		.min_by_key(|r| r.channels())
		.map(|r| OutputFormat {
			samplerate,
			channels: r.channels(),
			buffer_size: r.buffer_size().clone()
		})
		.ok_or_else(|| {
			let mut formats: Vec<_> = covering.iter().map(|r| r.sample_format()).collect();
			formats.dedup();
			DeviceError::UnsupportedSampleFormat(samplerate, formats)
		})
}

/// Use the device default configuration, provided its rate can carry `frequency`. A default
/// with another sample format falls back to an `f32` configuration of `ranges` at the same rate.
///
/// # Errors
///
/// Returns [`DeviceError::SampleRateTooLow`] unless the default rate exceeds `2 * frequency`, or
/// an error from [`pick_format`] when the fallback finds nothing.
pub fn default_format(default: &SupportedStreamConfig, ranges: &[SupportedStreamConfigRange], frequency: f64)
	-> Result<OutputFormat, DeviceError>
{
	let samplerate = default.sample_rate().0;
	if samplerate as f64 <= 2. * frequency {
		return Err(DeviceError::SampleRateTooLow(samplerate, frequency));
	}
	if default.sample_format() != SampleFormat::F32 {
		log::debug!("Default output format is {}, looking for f32", default.sample_format());
		return pick_format(ranges, samplerate);
	}
	Ok(OutputFormat {
		samplerate,
		channels: default.channels(),
		buffer_size: default.buffer_size().clone()
	})
}

/// Choose the stream format for `device`: the `requested` rate if the device supports it,
/// otherwise the device default.
///
/// # Errors
///
/// Returns [`DeviceError::UnsupportedSampleRate`], [`DeviceError::UnsupportedSampleFormat`] or
/// [`DeviceError::SampleRateTooLow`], or an error querying the device.
pub fn resolve_format(device: &cpal::Device, requested: Option<u32>, frequency: f64)
	-> Result<OutputFormat, DeviceError>
{
	match requested {
		Some(samplerate) => {
			let ranges: Vec<_> = device.supported_output_configs()?.collect();
			pick_format(&ranges, samplerate)
		},
		None => {
			let default = device.default_output_config()?;
			let ranges: Vec<_> = match default.sample_format() {
				SampleFormat::F32 => Vec::new(),
				_ => device.supported_output_configs()?.collect()
			};
			default_format(&default, &ranges, frequency)
		}
	}
}

/// Sample rate to report when no device is queried: 192 kHz, or just above twice the carrier
/// frequency if that is higher.
pub fn dry_run_samplerate(frequency: f64) -> u32 {
	if (DRY_RUN_SAMPLERATE as f64) > 2. * frequency {
		DRY_RUN_SAMPLERATE
	} else {
		(2. * frequency) as u32 + 1
	}
}
