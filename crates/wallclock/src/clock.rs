//! The wall clock capability.
//!
//! Code that needs the current time receives a [`Clock`] rather than reading the system clock
//! directly, so it can be driven by a scripted clock in tests. [`SystemClock`] (feature `now`) is
//! the real implementation.

use crate::civil::{DateTime, ZoneInfo};
#[cfg(feature = "now")]
use crate::civil::Timestamp;
#[cfg(feature = "now")]
use core::mem::MaybeUninit;

/// Which civil clock a [`Clock`] reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeBase {
	/// Coordinated Universal Time.
	Utc,
	/// The local zone of the host, including daylight saving rules.
	#[default]
	Local
}

/// A source of wall clock time.
pub trait Clock {
	/// Sample the current time, expressed in the clock's time base.
	///
	/// Returns `None` if the underlying clock could not be read.
	fn now(&self) -> Option<DateTime>;

	/// The zone in effect at Unix time `unix` in this clock's time base.
	fn zone_at(&self, unix: i64) -> ZoneInfo;
}

impl<C: Clock + ?Sized> Clock for &C {
	fn now(&self) -> Option<DateTime> {
		(**self).now()
	}

	fn zone_at(&self, unix: i64) -> ZoneInfo {
		(**self).zone_at(unix)
	}
}

/// Get the current time as a Unix timestamp with nanosecond granularity.
///
/// Returns `None` if `libc::clock_gettime` fails. This function is thread safe.
///
/// # Examples
///
/// ```
/// # use wallclock::now;
/// let c = now().expect("Failed to get current time");
/// assert!(c.sec > 0);
/// ```
#[cfg_attr(docsrs, doc(cfg(feature = "now")))]
#[cfg(feature = "now")]
pub fn now() -> Option<Timestamp> {
	let mut time = MaybeUninit::<libc::timespec>::uninit();
	// Safety:
	// - clock_gettime does not read time, only writes
	// - if clock_gettime returns zero, time is successfully initialized
	unsafe {
		match libc::clock_gettime(libc::CLOCK_REALTIME, time.as_mut_ptr()) {
			0 => {
				let time = time.assume_init();
				Some(Timestamp::new(time.tv_sec as i64, time.tv_nsec as u32))
			},
			_ => None
		}
	}
}

/// Get the host's local zone at Unix time `unix`.
///
/// Uses `libc::localtime_r`, so it honours the `TZ` environment variable and `/etc/localtime`.
#[cfg_attr(docsrs, doc(cfg(feature = "now")))]
#[cfg(feature = "now")]
pub fn local_zone(unix: i64) -> Option<ZoneInfo> {
	let time = libc::time_t::try_from(unix).ok()?;
	let mut tm = MaybeUninit::<libc::tm>::uninit();
	// Safety:
	// - localtime_r only reads time and writes tm
	// - a non-null return means tm is initialized
	unsafe {
		if libc::localtime_r(&time, tm.as_mut_ptr()).is_null() {
			return None;
		}
		let tm = tm.assume_init();
		Some(ZoneInfo {
			utc_offset: tm.tm_gmtoff as i32,
			is_dst: tm.tm_isdst > 0
		})
	}
}

// libc only exposes `tzset` for Windows; POSIX provides it everywhere else.
#[cfg(feature = "now")]
unsafe extern "C" {
	fn tzset();
}

/// The host's realtime clock, reported in UTC or local time.
#[cfg_attr(docsrs, doc(cfg(feature = "now")))]
#[cfg(feature = "now")]
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
	base: TimeBase
}

#[cfg(feature = "now")]
impl SystemClock {
	/// Create a clock reporting in `base`.
	pub fn new(base: TimeBase) -> SystemClock {
		if let TimeBase::Local = base {
			// localtime_r is not required to pick up zone rules on its own
			unsafe { tzset() };
		}
		SystemClock { base }
	}

	/// The time base this clock reports in.
	pub fn base(&self) -> TimeBase {
		self.base
	}
}

#[cfg(feature = "now")]
impl Clock for SystemClock {
	fn now(&self) -> Option<DateTime> {
		let time = now()?;
		DateTime::from_unix(time, self.zone_at(time.sec))
	}

	fn zone_at(&self, unix: i64) -> ZoneInfo {
		match self.base {
			TimeBase::Utc => ZoneInfo::UTC,
			TimeBase::Local => local_zone(unix).unwrap_or(ZoneInfo::UTC)
		}
	}
}

#[cfg(all(test, feature = "now"))]
mod tests {
	use super::*;

	#[test]
	fn system_clock_test() {
		let utc = SystemClock::new(TimeBase::Utc);
		assert_eq!(utc.base(), TimeBase::Utc);
		let t = utc.now().unwrap();
		assert_eq!(t.zone(), ZoneInfo::UTC);
		assert!(t.year() >= 2024);
		assert_eq!(utc.zone_at(1716742705), ZoneInfo::UTC);

		let local = SystemClock::new(TimeBase::Local);
		let t = local.now().unwrap();
		let stamp = now().unwrap();
		// Both samples are taken within a second of each other
		assert!((t.to_unix() - stamp.sec).abs() <= 1);
		assert!(local_zone(stamp.sec).is_some());
	}

	#[test]
	fn clock_by_reference_test() {
		let clock = SystemClock::new(TimeBase::Utc);
		let by_ref: &dyn Clock = &clock;
		assert_eq!(by_ref.zone_at(0), ZoneInfo::UTC);
		assert!(by_ref.now().is_some());
	}
}
