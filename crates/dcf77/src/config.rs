//! Generator configuration.
//!
//! A [`Config`] is validated once, at construction, and is immutable afterwards. Every
//! combination that could be rejected is rejected here, so nothing on the streaming path needs
//! to re-check it.

use core::{error, fmt};
use wallclock::TimeBase;

use crate::BLOCKS_PER_SECOND;

/// Default carrier frequency, the DCF77 transmitter frequency in Hz.
pub const DEFAULT_FREQUENCY: f64 = 77500.;

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLERATE: u32 = 192000;

/// How the carrier sine wave is produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OscillatorKind {
	/// Running phase accumulator with one `sin` evaluation per sample.
	#[default]
	Accumulator,
	/// Precomputed table covering one full period of the sample/carrier rate ratio.
	Table
}

/// The error type for building a [`Config`].
#[derive(Clone, Copy, PartialEq)]
pub enum ConfigError {
	/// The sample rate must be at least one sample per 100 ms block. The rate is provided in the
	/// payload.
	InvalidSampleRate(u32),
	/// The carrier frequency must be finite and positive. The frequency is provided in the payload.
	InvalidFrequency(f64),
	/// The carrier frequency is not below half the sample rate.
	AboveNyquist {
		/// Requested carrier frequency in Hz.
		frequency: f64,
		/// Requested sample rate in Hz.
		samplerate: u32
	},
	/// The amplitude must be in (0, 1]. The amplitude is provided in the payload.
	InvalidAmplitude(f32),
	/// The low-pulse factor must be in [0, 1]. The factor is provided in the payload.
	InvalidLowFactor(f32),
	/// The second offset must be in [0, 59]. The offset is provided in the payload.
	InvalidOffset(u8),
	/// A table oscillator needs a whole number carrier frequency. The frequency is provided in the
	/// payload.
	NonIntegralTableFrequency(f64),
	/// The amplitude ramp must be shorter than one 100 ms block.
	RampTooLong {
		/// Requested ramp length in samples.
		ramp: u32,
		/// Samples per block at the configured sample rate.
		block: u32
	}
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::InvalidSampleRate(x) => write!(f, "Invalid sample rate: {} Hz", x),
			ConfigError::InvalidFrequency(x) => write!(f, "Invalid carrier frequency: {} Hz", x),
			ConfigError::AboveNyquist { frequency, samplerate } =>
				write!(f, "Carrier frequency {} Hz must be below half the sample rate ({} Hz)", frequency, samplerate),
			ConfigError::InvalidAmplitude(x) => write!(f, "Amplitude must be in (0, 1], got {}", x),
			ConfigError::InvalidLowFactor(x) => write!(f, "Low-pulse factor must be in [0, 1], got {}", x),
			ConfigError::InvalidOffset(x) => write!(f, "Second offset must be in [0, 59], got {}", x),
			ConfigError::NonIntegralTableFrequency(x) =>
				write!(f, "Table oscillator requires a whole number frequency, got {} Hz", x),
			ConfigError::RampTooLong { ramp, block } =>
				write!(f, "Amplitude ramp of {} samples must be shorter than a block ({} samples)", ramp, block),
		}
	}
}

impl fmt::Debug for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

impl error::Error for ConfigError {}

/// Validated generator configuration.
///
/// # Examples
///
/// ```
/// # use dcf77::{Config, ConfigError, OscillatorKind};
/// # use wallclock::TimeBase;
/// let config = Config::new(77500., 192000, 1.0, 0.15, TimeBase::Local, 0).unwrap();
/// assert_eq!(config.block_frames(), 19200);
///
/// let config = config.with_oscillator(OscillatorKind::Table).unwrap();
/// assert_eq!(config.oscillator(), OscillatorKind::Table);
///
/// assert!(matches!(
/// 	Config::new(77500., 96000, 1.0, 0.0, TimeBase::Utc, 0),
/// 	Err(ConfigError::AboveNyquist { .. })
/// ));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
	frequency: f64,
	samplerate: u32,
	amplitude: f32,
	low_factor: f32,
	time_base: TimeBase,
	offset: u8,
	oscillator: OscillatorKind,
	ramp: u32,
	announce: bool
}

impl Default for Config {
	/// 77.5 kHz carrier at 192 kHz, full amplitude, hard mute during low pulses, local time.
	fn default() -> Self {
		Config {
			frequency: DEFAULT_FREQUENCY,
			samplerate: DEFAULT_SAMPLERATE,
			amplitude: 1.0,
			low_factor: 0.0,
			time_base: TimeBase::Local,
			offset: 0,
			oscillator: OscillatorKind::Accumulator,
			ramp: 0,
			announce: false
		}
	}
}

impl Config {
	/// Create a new configuration.
	///
	/// # Errors
	///
	/// Returns the first [`ConfigError`] found, checking the sample rate, frequency (including the
	/// Nyquist limit), amplitude, low-pulse factor, and offset in that order.
	pub fn new(frequency: f64, samplerate: u32, amplitude: f32, low_factor: f32, time_base: TimeBase, offset: u8)
		-> Result<Config, ConfigError>
	{
		Config {
			frequency,
			samplerate,
			amplitude,
			low_factor,
			time_base,
			offset,
			..Config::default()
		}.validate()
	}

	/// Use `kind` to produce the carrier.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::NonIntegralTableFrequency`] for a table oscillator with a fractional
	/// carrier frequency.
	pub fn with_oscillator(mut self, kind: OscillatorKind) -> Result<Config, ConfigError> {
		self.oscillator = kind;
		self.validate()
	}

	/// Ramp the amplitude linearly over `ramp` samples at every pulse window edge.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::RampTooLong`] unless `ramp` is shorter than one block.
	pub fn with_ramp(mut self, ramp: u32) -> Result<Config, ConfigError> {
		self.ramp = ramp;
		self.validate()
	}

	/// Transmit the zone announcement bits (16-19) when running on local time.
	pub fn with_announcements(mut self, announce: bool) -> Config {
		self.announce = announce;
		self
	}

	/// Check every invariant, returning `self` if all hold.
	fn validate(self) -> Result<Config, ConfigError> {
		if self.samplerate < BLOCKS_PER_SECOND as u32 {
			return Err(ConfigError::InvalidSampleRate(self.samplerate));
		}
		if !self.frequency.is_finite() || self.frequency <= 0. {
			return Err(ConfigError::InvalidFrequency(self.frequency));
		}
		if self.frequency >= self.samplerate as f64 / 2. {
			return Err(ConfigError::AboveNyquist { frequency: self.frequency, samplerate: self.samplerate });
		}
		if !(self.amplitude > 0. && self.amplitude <= 1.) {
			return Err(ConfigError::InvalidAmplitude(self.amplitude));
		}
		if !(self.low_factor >= 0. && self.low_factor <= 1.) {
			return Err(ConfigError::InvalidLowFactor(self.low_factor));
		}
		if self.offset > 59 {
			return Err(ConfigError::InvalidOffset(self.offset));
		}
		if self.oscillator == OscillatorKind::Table && self.frequency != (self.frequency as u64) as f64 {
			return Err(ConfigError::NonIntegralTableFrequency(self.frequency));
		}
		if self.ramp >= self.block_frames() {
			return Err(ConfigError::RampTooLong { ramp: self.ramp, block: self.block_frames() });
		}
		Ok(self)
	}

	/// Carrier frequency in Hz.
	pub fn frequency(&self) -> f64 {
		self.frequency
	}

	/// Output sample rate in Hz.
	pub fn samplerate(&self) -> u32 {
		self.samplerate
	}

	/// Peak amplitude of the carrier, in (0, 1].
	pub fn amplitude(&self) -> f32 {
		self.amplitude
	}

	/// Fraction of [`Config::amplitude`] used during low pulse windows, in [0, 1].
	pub fn low_factor(&self) -> f32 {
		self.low_factor
	}

	/// The civil clock the telegram encodes.
	pub fn time_base(&self) -> TimeBase {
		self.time_base
	}

	/// Whether the telegram encodes UTC rather than local time.
	pub fn is_utc(&self) -> bool {
		self.time_base == TimeBase::Utc
	}

	/// Seconds added to the wall clock second when seeding, in [0, 59].
	pub fn offset(&self) -> u8 {
		self.offset
	}

	/// The carrier implementation.
	pub fn oscillator(&self) -> OscillatorKind {
		self.oscillator
	}

	/// Amplitude ramp length in samples; zero switches hard.
	pub fn ramp(&self) -> u32 {
		self.ramp
	}

	/// Whether zone announcement bits are transmitted.
	pub fn announcements(&self) -> bool {
		self.announce && !self.is_utc()
	}

	/// Samples per 100 ms block.
	pub fn block_frames(&self) -> u32 {
		self.samplerate / BLOCKS_PER_SECOND as u32
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_test() {
		let c = Config::default();
		assert_eq!(c, c.validate().unwrap());
		assert_eq!(c.frequency(), 77500.);
		assert_eq!(c.samplerate(), 192000);
		assert_eq!(c.amplitude(), 1.0);
		assert_eq!(c.low_factor(), 0.0);
		assert_eq!(c.time_base(), TimeBase::Local);
		assert_eq!(c.offset(), 0);
		assert_eq!(c.oscillator(), OscillatorKind::Accumulator);
		assert_eq!(c.ramp(), 0);
		assert!(!c.announcements());
		assert_eq!(c.block_frames(), 19200);
	}

	#[test]
	fn validation_test() {
		let local = TimeBase::Local;
		assert!(Config::new(440., 48000, 0.5, 0.0, local, 0).is_ok());
		assert!(Config::new(23999., 48000, 1.0, 1.0, local, 59).is_ok());

		assert_eq!(Config::new(440., 0, 0.5, 0.0, local, 0), Err(ConfigError::InvalidSampleRate(0)));
		assert_eq!(Config::new(1., 9, 0.5, 0.0, local, 0), Err(ConfigError::InvalidSampleRate(9)));
		assert_eq!(Config::new(0., 48000, 0.5, 0.0, local, 0), Err(ConfigError::InvalidFrequency(0.)));
		assert_eq!(Config::new(-5., 48000, 0.5, 0.0, local, 0), Err(ConfigError::InvalidFrequency(-5.)));
		assert!(matches!(
			Config::new(f64::NAN, 48000, 0.5, 0.0, local, 0),
			Err(ConfigError::InvalidFrequency(_))
		));
		assert_eq!(
			Config::new(24000., 48000, 0.5, 0.0, local, 0),
			Err(ConfigError::AboveNyquist { frequency: 24000., samplerate: 48000 })
		);
		assert_eq!(Config::new(440., 48000, 0.0, 0.0, local, 0), Err(ConfigError::InvalidAmplitude(0.0)));
		assert_eq!(Config::new(440., 48000, 1.5, 0.0, local, 0), Err(ConfigError::InvalidAmplitude(1.5)));
		assert!(matches!(
			Config::new(440., 48000, f32::NAN, 0.0, local, 0),
			Err(ConfigError::InvalidAmplitude(_))
		));
		assert_eq!(Config::new(440., 48000, 0.5, -0.1, local, 0), Err(ConfigError::InvalidLowFactor(-0.1)));
		assert_eq!(Config::new(440., 48000, 0.5, 1.1, local, 0), Err(ConfigError::InvalidLowFactor(1.1)));
		assert_eq!(Config::new(440., 48000, 0.5, 0.0, local, 60), Err(ConfigError::InvalidOffset(60)));
	}

	#[test]
	fn extension_test() {
		let c = Config::new(440.5, 48000, 0.5, 0.0, TimeBase::Local, 0).unwrap();
		assert_eq!(c.with_oscillator(OscillatorKind::Table), Err(ConfigError::NonIntegralTableFrequency(440.5)));
		assert!(c.with_oscillator(OscillatorKind::Accumulator).is_ok());

		assert_eq!(c.with_ramp(4799).unwrap().ramp(), 4799);
		assert_eq!(c.with_ramp(4800), Err(ConfigError::RampTooLong { ramp: 4800, block: 4800 }));

		assert!(c.with_announcements(true).announcements());
		let utc = Config::new(440., 48000, 0.5, 0.0, TimeBase::Utc, 0).unwrap();
		assert!(utc.is_utc());
		assert!(!utc.with_announcements(true).announcements());
	}
}
