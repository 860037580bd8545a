//! Civil calendar time in a fixed zone.
//!
//! All conversions use the proleptic Gregorian calendar and ignore leap seconds, matching the way
//! Unix timestamps are counted. The day arithmetic rotates the year to start in March so that the
//! leap day falls at the end of the rotated year, which keeps the month lookup a pair of linear
//! equations. More details: http://howardhinnant.github.io/date_algorithms.html

use core::fmt;

/// Seconds per minute.
const SECONDS_PER_MINUTE: i64 = 60;
/// Seconds per hour.
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
/// Seconds per day.
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;
/// Days in one 400 year Gregorian cycle.
const DAYS_PER_ERA: i64 = 146097;
/// Days from March 1, 0000 (rotated calendar origin) to January 1, 1970.
const DAYS_FROM_ERA_ORIGIN_TO_EPOCH: i64 = 719468;
/// Nanoseconds per decisecond.
const NANOS_PER_DECISECOND: u32 = 100_000_000;

/// Unix time with nanosecond granularity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
	/// Seconds since the Unix epoch.
	pub sec: i64,
	/// Nanoseconds since the beginning of `sec`, ranging [0, 999999999].
	pub nsec: u32
}

impl Timestamp {
	/// Create a new timestamp. Nanoseconds beyond one second are carried into `sec`.
	pub const fn new(sec: i64, nsec: u32) -> Timestamp {
		Timestamp {
			sec: sec + (nsec / 1_000_000_000) as i64,
			nsec: nsec % 1_000_000_000
		}
	}
}

/// Offset from UTC and daylight saving state of a zone at some instant.
///
/// The offset is added to UTC to get local time, e.g. Berlin in summer is `+7200`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZoneInfo {
	/// UTC offset in seconds.
	pub utc_offset: i32,
	/// Whether daylight saving (summer) time is in effect.
	pub is_dst: bool
}

impl ZoneInfo {
	/// Coordinated Universal Time.
	pub const UTC: ZoneInfo = ZoneInfo { utc_offset: 0, is_dst: false };
}

/// Whether `year` is a leap year in the Gregorian calendar.
///
/// # Examples
///
/// ```
/// # use wallclock::civil::is_leap_year;
/// assert!(is_leap_year(2000));
/// assert!(is_leap_year(2024));
/// assert!(!is_leap_year(1900));
/// assert!(!is_leap_year(2026));
/// ```
pub const fn is_leap_year(year: i32) -> bool {
	year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `month` (1-12) of `year`. Returns 0 for an invalid month.
pub const fn days_in_month(year: i32, month: u8) -> u8 {
	match month {
		1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
		4 | 6 | 9 | 11 => 30,
		2 if is_leap_year(year) => 29,
		2 => 28,
		_ => 0
	}
}

/// Days since January 1, 1970 for a civil date.
pub const fn days_from_civil(year: i32, month: u8, day: u8) -> i64 {
	let y = if month <= 2 { year as i64 - 1 } else { year as i64 };
	let era = y.div_euclid(400);
	let year_of_era = y - era * 400;
	// Month index in the rotated calendar, March == 0
	let m = (month as i64 + 9) % 12;
	let day_of_year = (153 * m + 2) / 5 + day as i64 - 1;
	let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
	era * DAYS_PER_ERA + day_of_era - DAYS_FROM_ERA_ORIGIN_TO_EPOCH
}

/// Civil date `(year, month, day)` for a count of days since January 1, 1970.
pub const fn civil_from_days(days: i64) -> (i32, u8, u8) {
	let z = days + DAYS_FROM_ERA_ORIGIN_TO_EPOCH;
	let era = z.div_euclid(DAYS_PER_ERA);
	let day_of_era = z - era * DAYS_PER_ERA;
	let year_of_era = (day_of_era
		- day_of_era / 1460
		+ day_of_era / 36524
		- day_of_era / (DAYS_PER_ERA - 1)) / 365;
	let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
	let m = (5 * day_of_year + 2) / 153;
	let day = (day_of_year - (153 * m + 2) / 5 + 1) as u8;
	let month = (if m < 10 { m + 3 } else { m - 9 }) as u8;
	let year = year_of_era + era * 400 + if month <= 2 { 1 } else { 0 };
	(year as i32, month, day)
}

/// Civil calendar time, tagged with the zone it is expressed in.
///
/// Field values are always in range; the only way to construct a [`DateTime`] is through
/// [`DateTime::new`] (which validates) or conversions from a [`Timestamp`]. The fields are read
/// through accessors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateTime {
	year: i32,
	month: u8,
	day: u8,
	hour: u8,
	minute: u8,
	second: u8,
	nanosecond: u32,
	zone: ZoneInfo
}

impl DateTime {
	/// Create a UTC date time from its civil fields, or `None` if any field is out of range.
	///
	/// # Examples
	///
	/// ```
	/// # use wallclock::DateTime;
	/// assert!(DateTime::new(2024, 2, 29, 12, 0, 0, 0).is_some());
	/// assert!(DateTime::new(2026, 2, 29, 12, 0, 0, 0).is_none());
	/// assert!(DateTime::new(2026, 1, 1, 24, 0, 0, 0).is_none());
	/// ```
	pub fn new(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: u8, nanosecond: u32)
		-> Option<DateTime>
	{
		let valid = (1..=12).contains(&month)
			&& day >= 1 && day <= days_in_month(year, month)
			&& hour < 24 && minute < 60 && second < 60
			&& nanosecond < 1_000_000_000;
		valid.then_some(DateTime { year, month, day, hour, minute, second, nanosecond, zone: ZoneInfo::UTC })
	}

	/// Absolute Gregorian year, e.g. 2026.
	pub fn year(&self) -> i32 {
		self.year
	}

	/// Month of the year, ranged [1, 12].
	pub fn month(&self) -> u8 {
		self.month
	}

	/// Day of the month, ranged [1, 31].
	pub fn day(&self) -> u8 {
		self.day
	}

	/// Hour, ranged [0, 23].
	pub fn hour(&self) -> u8 {
		self.hour
	}

	/// Minute, ranged [0, 59].
	pub fn minute(&self) -> u8 {
		self.minute
	}

	/// Second, ranged [0, 59].
	pub fn second(&self) -> u8 {
		self.second
	}

	/// Nanoseconds into the second, ranged [0, 999999999].
	pub fn nanosecond(&self) -> u32 {
		self.nanosecond
	}

	/// The zone the civil fields are expressed in.
	pub fn zone(&self) -> ZoneInfo {
		self.zone
	}

	/// Re-tag the civil fields with `zone` without changing them.
	pub fn with_zone(mut self, zone: ZoneInfo) -> DateTime {
		self.zone = zone;
		self
	}

	/// Convert a Unix timestamp to civil time in `zone`.
	///
	/// Returns `None` for instants before the Unix epoch, or if applying the offset overflows.
	pub fn from_unix(time: Timestamp, zone: ZoneInfo) -> Option<DateTime> {
		if time.sec < 0 {
			return None;
		}
		let local = time.sec.checked_add(zone.utc_offset as i64)?;
		// Bound the year so every field conversion below is lossless
		if local > i32::MAX as i64 * 365 * SECONDS_PER_DAY / 2 {
			return None;
		}
		Some(DateTime::from_local_seconds(local, time.nsec % 1_000_000_000, zone))
	}

	/// Build from seconds since the epoch as counted on the local civil clock.
	fn from_local_seconds(local: i64, nanosecond: u32, zone: ZoneInfo) -> DateTime {
		let days = local.div_euclid(SECONDS_PER_DAY);
		let secs = local.rem_euclid(SECONDS_PER_DAY);
		let (year, month, day) = civil_from_days(days);
		DateTime {
			year,
			month,
			day,
			hour: (secs / SECONDS_PER_HOUR) as u8,
			minute: (secs % SECONDS_PER_HOUR / SECONDS_PER_MINUTE) as u8,
			second: (secs % SECONDS_PER_MINUTE) as u8,
			nanosecond,
			zone
		}
	}

	/// Seconds since the epoch on the local civil clock, i.e. ignoring the zone offset.
	fn local_seconds(&self) -> i64 {
		days_from_civil(self.year, self.month, self.day) * SECONDS_PER_DAY
			+ self.hour as i64 * SECONDS_PER_HOUR
			+ self.minute as i64 * SECONDS_PER_MINUTE
			+ self.second as i64
	}

	/// The Unix timestamp (whole seconds) this civil time denotes.
	pub fn to_unix(&self) -> i64 {
		self.local_seconds() - self.zone.utc_offset as i64
	}

	/// The same instant expressed in UTC.
	pub fn to_utc(&self) -> DateTime {
		DateTime::from_local_seconds(self.to_unix(), self.nanosecond, ZoneInfo::UTC)
	}

	/// Truncate to the start of the current minute.
	pub fn floor_to_minute(mut self) -> DateTime {
		self.second = 0;
		self.nanosecond = 0;
		self
	}

	/// Add `minutes` (possibly negative) to the civil clock, carrying into hours, days, months and
	/// years. The zone tag is kept as-is.
	///
	/// # Examples
	///
	/// ```
	/// # use wallclock::DateTime;
	/// let t = DateTime::new(2024, 12, 31, 23, 59, 30, 0).unwrap();
	/// assert_eq!(t.add_minutes(1), DateTime::new(2025, 1, 1, 0, 0, 30, 0).unwrap());
	/// ```
	pub fn add_minutes(self, minutes: i64) -> DateTime {
		let local = self.local_seconds() + minutes * SECONDS_PER_MINUTE;
		DateTime::from_local_seconds(local, self.nanosecond, self.zone)
	}

	/// ISO 8601 weekday: 1 = Monday ... 7 = Sunday.
	pub fn iso_weekday(&self) -> u8 {
		// Jan 1, 1970 was a Thursday
		(days_from_civil(self.year, self.month, self.day) + 3).rem_euclid(7) as u8 + 1
	}

	/// The last two digits of the year, ranged [0, 99].
	pub fn two_digit_year(&self) -> u8 {
		self.year.rem_euclid(100) as u8
	}

	/// Tenths of a second elapsed within the current second, ranged [0, 9].
	pub fn decisecond(&self) -> u8 {
		(self.nanosecond / NANOS_PER_DECISECOND) as u8
	}
}

impl fmt::Display for DateTime {
	/// Formats as `YYYY-MM-DD HH:MM:SS`.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
			self.year, self.month, self.day, self.hour, self.minute, self.second)
	}
}

#[cfg(test)]
mod tests {
	extern crate std;
	use std::string::ToString;
	use core::mem::MaybeUninit;
	use super::*;

	// Get the libc version of UTC calendar time
	fn utc_time(time: libc::time_t) -> libc::tm {
		unsafe {
			let mut utc = MaybeUninit::<libc::tm>::uninit();
			libc::gmtime_r(&time, utc.as_mut_ptr());
			utc.assume_init()
		}
	}

	fn compare_dates(time: i64) {
		let d1 = utc_time(time as libc::time_t);
		let d2 = DateTime::from_unix(Timestamp::new(time, 0), ZoneInfo::UTC).unwrap();
		assert_eq!(d1.tm_year + 1900, d2.year, "time: {}", time);
		assert_eq!(d1.tm_mon + 1, d2.month as i32, "time: {}", time);
		assert_eq!(d1.tm_mday, d2.day as i32, "time: {}", time);
		assert_eq!(d1.tm_hour, d2.hour as i32, "time: {}", time);
		assert_eq!(d1.tm_min, d2.minute as i32, "time: {}", time);
		assert_eq!(d1.tm_sec, d2.second as i32, "time: {}", time);
		// libc counts Sunday as 0, ISO as 7
		let wday = if d1.tm_wday == 0 { 7 } else { d1.tm_wday };
		assert_eq!(wday, d2.iso_weekday() as i32, "time: {}", time);
		assert_eq!(d2.to_unix(), time);
	}

	#[test]
	fn from_unix_test() {
		compare_dates(0);
		compare_dates(5097600);
		compare_dates(951782400);
		compare_dates(1709164800);
		compare_dates(1716742705);
		compare_dates(1735689570);
		compare_dates(1771412325);
		compare_dates(2147483647);
		compare_dates(4107542399);

		assert!(DateTime::from_unix(Timestamp::new(-1, 0), ZoneInfo::UTC).is_none());
		assert!(DateTime::from_unix(Timestamp::new(i64::MAX, 0), ZoneInfo::UTC).is_none());
		assert!(DateTime::from_unix(Timestamp::new(i64::MAX - 10, 0), ZoneInfo { utc_offset: 3600, is_dst: false }).is_none());
	}

	#[test]
	fn zone_offset_test() {
		let cest = ZoneInfo { utc_offset: 7200, is_dst: true };
		// Sun, May 26, 2024. 16:58:25 UTC == 18:58:25 CEST.
		let d = DateTime::from_unix(Timestamp::new(1716742705, 250_000_000), cest).unwrap();
		assert_eq!((d.hour, d.minute, d.second), (18, 58, 25));
		assert_eq!(d.decisecond(), 2);
		assert_eq!(d.zone, cest);
		assert_eq!(d.to_unix(), 1716742705);

		let utc = d.to_utc();
		assert_eq!((utc.hour, utc.minute, utc.second), (16, 58, 25));
		assert_eq!(utc.nanosecond, 250_000_000);
		assert_eq!(utc.zone, ZoneInfo::UTC);
	}

	#[test]
	fn add_minutes_test() {
		let t = DateTime::new(2026, 2, 18, 10, 58, 45, 24_000_000).unwrap();
		assert_eq!(t.floor_to_minute().add_minutes(1), DateTime::new(2026, 2, 18, 10, 59, 0, 0).unwrap());

		let t = DateTime::new(2024, 2, 28, 23, 59, 0, 0).unwrap();
		assert_eq!(t.add_minutes(1), DateTime::new(2024, 2, 29, 0, 0, 0, 0).unwrap());
		let t = DateTime::new(2026, 2, 28, 23, 59, 0, 0).unwrap();
		assert_eq!(t.add_minutes(1), DateTime::new(2026, 3, 1, 0, 0, 0, 0).unwrap());
		let t = DateTime::new(2099, 12, 31, 23, 59, 0, 0).unwrap();
		assert_eq!(t.add_minutes(1), DateTime::new(2100, 1, 1, 0, 0, 0, 0).unwrap());
		let t = DateTime::new(2025, 1, 1, 0, 0, 0, 0).unwrap();
		assert_eq!(t.add_minutes(-1), DateTime::new(2024, 12, 31, 23, 59, 0, 0).unwrap());
	}

	#[test]
	fn calendar_test() {
		assert_eq!(days_in_month(2024, 2), 29);
		assert_eq!(days_in_month(2100, 2), 28);
		assert_eq!(days_in_month(2000, 2), 29);
		assert_eq!(days_in_month(2026, 4), 30);
		assert_eq!(days_in_month(2026, 12), 31);
		assert_eq!(days_in_month(2026, 13), 0);

		assert_eq!(days_from_civil(1970, 1, 1), 0);
		assert_eq!(days_from_civil(2024, 2, 29), 19782);
		for days in [-800000, -1, 0, 1, 19782, 20502, 2932896] {
			let (y, m, d) = civil_from_days(days);
			assert_eq!(days_from_civil(y, m, d), days);
		}

		// Feb 18, 2026 was a Wednesday, Sunday is 7
		assert_eq!(DateTime::new(2026, 2, 18, 0, 0, 0, 0).unwrap().iso_weekday(), 3);
		assert_eq!(DateTime::new(2024, 5, 26, 0, 0, 0, 0).unwrap().iso_weekday(), 7);
		assert_eq!(DateTime::new(2024, 1, 1, 0, 0, 0, 0).unwrap().iso_weekday(), 1);
	}

	#[test]
	fn accessors_test() {
		let t = DateTime::new(2026, 2, 18, 10, 58, 45, 24_000_000).unwrap();
		assert_eq!((t.year(), t.month(), t.day()), (2026, 2, 18));
		assert_eq!((t.hour(), t.minute(), t.second(), t.nanosecond()), (10, 58, 45, 24_000_000));
		assert_eq!(t.zone(), ZoneInfo::UTC);

		// Out of range civil fields cannot be built
		assert!(DateTime::new(2026, 2, 18, 10, 200, 0, 0).is_none());
		assert!(DateTime::new(2026, 2, 18, 10, 0, 60, 0).is_none());
		assert!(DateTime::new(2026, 0, 18, 10, 0, 0, 0).is_none());
		assert!(DateTime::new(2026, 2, 18, 10, 0, 0, 1_000_000_000).is_none());
	}

	#[test]
	fn display_test() {
		let t = DateTime::new(2026, 2, 8, 9, 5, 3, 999_999_999).unwrap();
		assert_eq!(t.to_string(), "2026-02-08 09:05:03");
		assert_eq!(t.two_digit_year(), 26);
		assert_eq!(t.decisecond(), 9);
		assert_eq!(t.nanosecond(), 999_999_999);
	}
}
