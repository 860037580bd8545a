//! Map a position within the minute to a carrier level.
//!
//! Every second except the 59th starts with a reduced carrier: 100 ms for a `0` bit, 200 ms for
//! a `1` bit. Second 59 stays at full power so a receiver can find the minute mark.

use crate::Frame;

/// Carrier level for one 100 ms block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
	/// Unmodulated carrier.
	Full,
	/// Reduced carrier, i.e. inside a pulse.
	Low
}

/// The carrier level for block `decisecond` of `second`, transmitting `frame`.
///
/// # Examples
///
/// ```
/// # use dcf77::{Frame, Level, pulse_level};
/// let ones = Frame::from_bits(u64::MAX);
/// assert_eq!(pulse_level(30, 0, Frame::default()), Level::Low);
/// assert_eq!(pulse_level(30, 1, Frame::default()), Level::Full);
/// assert_eq!(pulse_level(30, 1, ones), Level::Low);
/// assert_eq!(pulse_level(59, 0, ones), Level::Full);
/// ```
#[inline]
pub fn pulse_level(second: u8, decisecond: u8, frame: Frame) -> Level {
	match (second, decisecond) {
		(59, _) => Level::Full,
		(_, 0) => Level::Low,
		(s, 1) if frame.bit(s) => Level::Low,
		_ => Level::Full
	}
}

/// The amplitude multiplier for block `decisecond` of `second`: `1.0` for [`Level::Full`],
/// `low_factor` for [`Level::Low`].
#[inline]
pub fn amplitude_scale(second: u8, decisecond: u8, frame: Frame, low_factor: f32) -> f32 {
	match pulse_level(second, decisecond, frame) {
		Level::Full => 1.,
		Level::Low => low_factor
	}
}
