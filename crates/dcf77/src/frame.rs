//! The DCF77 amplitude modulated time telegram.
//!
//! One telegram is sent per minute, one bit per second, LSB (bit 0) first. Bit 59 is never sent:
//! the missing pulse in second 59 marks the minute boundary. See
//! [DCF77 documentation](https://en.wikipedia.org/wiki/DCF77#Time_code_details) for details.
//!
//! | Bits  | Content                                         |
//! | ----- | ----------------------------------------------- |
//! | 0-15  | Reserved, transmitted as zero                   |
//! | 16    | A1: daylight saving change at end of this hour  |
//! | 17    | Z1: CEST (summer time) in effect                |
//! | 18    | Z2: CET (standard time) in effect               |
//! | 19    | A2: leap second at end of this hour             |
//! | 20    | Start of encoded time, always 1                 |
//! | 21-27 | Minute, BCD                                     |
//! | 28    | Even parity over 21-27                          |
//! | 29-34 | Hour, BCD                                       |
//! | 35    | Even parity over 29-34                          |
//! | 36-41 | Day of month, BCD                               |
//! | 42-44 | ISO weekday (Monday = 1), BCD                   |
//! | 45-49 | Month, BCD                                      |
//! | 50-57 | Year within century, BCD                        |
//! | 58    | Even parity over 36-57                          |
//!
//! Bits 16-19 are an optional extension ([`Announcements`]); [`build_frame`] leaves them clear.
//!
//! # Examples
//!
//! ```
//! # use dcf77::build_frame;
//! # use wallclock::DateTime;
//! let now = DateTime::new(2026, 2, 18, 10, 58, 45, 0).unwrap();
//! let telegram = build_frame(&now, true);
//! // The telegram always describes the next minute
//! assert_eq!(telegram.target, DateTime::new(2026, 2, 18, 10, 59, 0, 0).unwrap());
//! assert_eq!(telegram.frame.minute(), 59);
//! assert!(telegram.frame.is_valid());
//! ```

use wallclock::{Clock, DateTime};

/// Number of bits in a telegram.
pub const FRAME_BITS: u8 = 59;

/// Start of encoded time marker, always set.
const START_BIT: u8 = 20;
/// Announcement and zone bits, see [`Announcements`].
const ANNOUNCE_LO: u8 = 16;
/// Minute field and its parity bit.
const MINUTE: (u8, u8) = (21, 27);
const MINUTE_PARITY: u8 = 28;
/// Hour field and its parity bit.
const HOUR: (u8, u8) = (29, 34);
const HOUR_PARITY: u8 = 35;
/// Date fields, all covered by a single parity bit.
const DAY: (u8, u8) = (36, 41);
const WEEKDAY: (u8, u8) = (42, 44);
const MONTH: (u8, u8) = (45, 49);
const YEAR: (u8, u8) = (50, 57);
const DATE_PARITY: u8 = 58;

/// Encode `n` as two binary coded decimal digits: tens in the high nibble, units in the low.
///
/// Only `0 <= n <= 99` is meaningful; larger values trip a debug assertion.
///
/// # Examples
///
/// ```
/// # use dcf77::frame::bcd;
/// assert_eq!(bcd(0), 0x00);
/// assert_eq!(bcd(7), 0x07);
/// assert_eq!(bcd(59), 0x59);
/// assert_eq!(bcd(99), 0x99);
/// ```
#[inline]
pub const fn bcd(n: u8) -> u8 {
	debug_assert!(n <= 99, "BCD input out of range");
	((n / 10) % 10) << 4 | (n % 10)
}

/// A 59 bit DCF77 telegram, bit 0 transmitted first.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame(u64);

impl Frame {
	/// Wrap raw telegram bits. Nothing is checked; see [`Frame::is_valid`].
	pub const fn from_bits(bits: u64) -> Frame {
		Frame(bits)
	}

	/// The raw telegram bits.
	pub const fn bits(self) -> u64 {
		self.0
	}

	/// The value of bit `index`. Bits at or beyond [`FRAME_BITS`] read as `false`.
	#[inline]
	pub const fn bit(self, index: u8) -> bool {
		index < FRAME_BITS && (self.0 >> index) & 1 == 1
	}

	/// The bits `lo..=hi`, shifted down to bit 0.
	///
	/// Requires `lo <= hi < 64`.
	pub const fn field(self, lo: u8, hi: u8) -> u64 {
		debug_assert!(lo <= hi && hi < 64);
		(self.0 >> lo) & (u64::MAX >> (63 - (hi - lo)))
	}

	/// Even parity over bits `lo..=hi`: `true` when an odd number of them are set.
	///
	/// Requires `lo <= hi < 64`.
	pub const fn parity(self, lo: u8, hi: u8) -> bool {
		self.field(lo, hi).count_ones() & 1 == 1
	}

	/// Whether the telegram is well formed: start bit set, nothing beyond bit 58, and all three
	/// parity bits matching their ranges.
	pub fn is_valid(self) -> bool {
		self.0 >> FRAME_BITS == 0
			&& self.bit(START_BIT)
			&& self.bit(MINUTE_PARITY) == self.parity(MINUTE.0, MINUTE.1)
			&& self.bit(HOUR_PARITY) == self.parity(HOUR.0, HOUR.1)
			&& self.bit(DATE_PARITY) == self.parity(DAY.0, YEAR.1)
	}

	/// Decode a BCD field.
	fn decimal(self, (lo, hi): (u8, u8)) -> u8 {
		let v = self.field(lo, hi) as u8;
		(v >> 4) * 10 + (v & 0xf)
	}

	/// Encoded minute.
	pub fn minute(self) -> u8 {
		self.decimal(MINUTE)
	}

	/// Encoded hour.
	pub fn hour(self) -> u8 {
		self.decimal(HOUR)
	}

	/// Encoded day of month.
	pub fn day(self) -> u8 {
		self.decimal(DAY)
	}

	/// Encoded ISO weekday.
	pub fn weekday(self) -> u8 {
		self.decimal(WEEKDAY)
	}

	/// Encoded month.
	pub fn month(self) -> u8 {
		self.decimal(MONTH)
	}

	/// Encoded year within the century.
	pub fn year(self) -> u8 {
		self.decimal(YEAR)
	}

	/// Replace bits 16-19 with `announcements`. No parity range covers them, so a valid frame
	/// stays valid.
	pub fn with_announcements(self, announcements: Announcements) -> Frame {
		Frame(self.0 & !(0xf << ANNOUNCE_LO) | (announcements.pack() as u64) << ANNOUNCE_LO)
	}

	/// The announcement bits currently set.
	pub fn announcements(self) -> Announcements {
		Announcements::unpack(self.field(ANNOUNCE_LO, ANNOUNCE_LO + 3) as u8)
	}
}

impl core::fmt::Debug for Frame {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(f, "Frame({:#017x})", self.0)
	}
}

/// Zone and announcement flags carried in bits 16-19.
///
/// Which of these a transmitter sets varies, so they are applied separately from
/// [`build_frame`] through [`Frame::with_announcements`].
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Announcements {
	/// A1: the zone switches between standard and summer time at the end of this hour.
	pub dst_change: bool,
	/// Z1: summer time (CEST) is in effect.
	pub summer_time: bool,
	/// Z2: standard time (CET) is in effect.
	pub standard_time: bool,
	/// A2: a leap second is inserted at the end of this hour.
	pub leap_second: bool
}

impl Announcements {
	/// Derive zone flags for the minute `target` from `clock`'s zone rules.
	///
	/// Z1/Z2 reflect daylight saving at `target`. A1 is set when daylight saving at the start of
	/// the previous minute differs from an hour later, i.e. a switch is coming up within the hour.
	/// Leap seconds are not announced.
	pub fn for_target<C: Clock>(clock: &C, target: &DateTime) -> Announcements {
		let t = target.to_unix();
		let dst = clock.zone_at(t).is_dst;
		Announcements {
			dst_change: clock.zone_at(t - 60).is_dst != clock.zone_at(t + 3540).is_dst,
			summer_time: dst,
			standard_time: !dst,
			leap_second: false
		}
	}

	fn pack(self) -> u8 {
		self.dst_change as u8
			| (self.summer_time as u8) << 1
			| (self.standard_time as u8) << 2
			| (self.leap_second as u8) << 3
	}

	fn unpack(bits: u8) -> Announcements {
		Announcements {
			dst_change: bits & 0x1 != 0,
			summer_time: bits & 0x2 != 0,
			standard_time: bits & 0x4 != 0,
			leap_second: bits & 0x8 != 0
		}
	}
}

/// An encoded telegram and the minute it describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Telegram {
	/// The telegram bits.
	pub frame: Frame,
	/// The start of the minute the telegram describes.
	pub target: DateTime
}

/// Build the telegram describing the minute after `now`.
///
/// The encoded minute is `floor_to_minute(now) + 1 minute`, never the current one: a receiver
/// applies the time at the minute mark that ends the transmission. With `utc_mode` the civil
/// fields are taken from `now` converted to UTC; otherwise they are used as given.
///
/// This function is pure: it never reads the clock and never allocates.
pub fn build_frame(now: &DateTime, utc_mode: bool) -> Telegram {
	let now = if utc_mode { now.to_utc() } else { *now };
	let target = now.floor_to_minute().add_minutes(1);

	let mut bits: u64 = 1 << START_BIT;
	bits |= (bcd(target.minute()) as u64) << MINUTE.0;
	bits |= (bcd(target.hour()) as u64) << HOUR.0;
	bits |= (bcd(target.day()) as u64) << DAY.0;
	bits |= (bcd(target.iso_weekday()) as u64) << WEEKDAY.0;
	bits |= (bcd(target.month()) as u64) << MONTH.0;
	bits |= (bcd(target.two_digit_year()) as u64) << YEAR.0;

	let unsealed = Frame(bits);
	bits |= (unsealed.parity(MINUTE.0, MINUTE.1) as u64) << MINUTE_PARITY;
	bits |= (unsealed.parity(HOUR.0, HOUR.1) as u64) << HOUR_PARITY;
	bits |= (unsealed.parity(DAY.0, YEAR.1) as u64) << DATE_PARITY;

	Telegram { frame: Frame(bits), target }
}
