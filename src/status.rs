//! Console output: the live status line and the dry run telegram breakdown.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::ops::Range;
use std::thread;
use std::time::Duration;

use dcf77::{Frame, Telegram};
use wallclock::{DateTime, TimeBase, ZoneInfo};

use crate::streamer::{Monitor, Snapshot, StopHandle};

/// Bit groups of the status line, each followed by its separator. Parity bits are attached to
/// their field with a dot.
const GROUPS: [(u8, u8, &str); 13] = [
	(0, 1, " "),
	(1, 15, " "),
	(15, 20, " "),
	(20, 21, " "),
	(21, 28, "."),
	(28, 29, " "),
	(29, 35, "."),
	(35, 36, " "),
	(36, 42, " "),
	(42, 45, " "),
	(45, 50, " "),
	(50, 58, "."),
	(58, 59, " ")
];

const INVERT: &str = "\x1b[7m";
const RESET: &str = "\x1b[0m";

/// Clears the status line.
pub const CLEAR_LINE: &str = "\r\x1b[K";

/// Status line refresh interval.
const REFRESH: Duration = Duration::from_millis(100);

/// Seconds of the minute in which the status clock may re-read the local zone. The renderer
/// reads it at second 59.
const ZONE_WINDOW: Range<i64> = 20..40;

/// Wall clock for the status line.
///
/// Reading the local zone goes through `localtime_r`, which serializes on a lock inside libc. The
/// renderer takes that lock when it rebuilds the telegram, so this clock keeps the zone it was
/// created with and re-reads it at most once a minute, inside [`ZONE_WINDOW`].
pub struct DisplayClock {
	base: TimeBase,
	zone: ZoneInfo,
	/// Minute (Unix time / 60) the zone was last read in.
	checked: i64
}

impl DisplayClock {
	/// Start from the zone of `start`, a sample already taken in time base `base`.
	pub fn new(base: TimeBase, start: &DateTime) -> DisplayClock {
		DisplayClock { base, zone: start.zone(), checked: start.to_unix().div_euclid(60) }
	}

	/// The current time in the cached zone.
	pub fn now(&mut self) -> Option<DateTime> {
		let time = wallclock::now()?;
		if self.base == TimeBase::Local && zone_due(self.checked, time.sec) {
			self.checked = time.sec.div_euclid(60);
			if let Some(zone) = wallclock::local_zone(time.sec) {
				self.zone = zone;
			}
		}
		DateTime::from_unix(time, self.zone)
	}
}

/// Whether a zone last read in minute `checked` should be read again at Unix time `unix`.
fn zone_due(checked: i64, unix: i64) -> bool {
	unix.div_euclid(60) != checked && ZONE_WINDOW.contains(&unix.rem_euclid(60))
}

/// The 59 telegram bits, bit 0 first, grouped by field with bit `second` shown in reverse
/// video. The trailing `X` stands for the missing pulse in second 59.
pub fn status_bits(frame: Frame, second: u8) -> String {
	let mut line = String::with_capacity(96);
	for (lo, hi, sep) in GROUPS {
		for i in lo..hi {
			let bit = if frame.bit(i) { '1' } else { '0' };
			if i == second {
				let _ = write!(line, "{}{}{}", INVERT, bit, RESET);
			} else {
				line.push(bit);
			}
		}
		line.push_str(sep);
	}
	line.push('X');
	line
}

/// The full status line for wall clock time `now`.
pub fn status_line(now: &DateTime, snapshot: &Snapshot) -> String {
	format!("{} -> {}", now, status_bits(snapshot.frame, snapshot.position.second))
}

/// The bits `lo..=hi` of `frame`, bit `lo` first.
fn bit_string(frame: Frame, lo: u8, hi: u8) -> String {
	(lo..=hi).map(|i| if frame.bit(i) { '1' } else { '0' }).collect()
}

/// Multi-line description of each field of `telegram`, for the dry run.
pub fn breakdown(telegram: &Telegram) -> String {
	let f = telegram.frame;
	let a = f.announcements();
	let check = |bit: u8, lo: u8, hi: u8| if f.bit(bit) == f.parity(lo, hi) { "ok" } else { "BAD" };
	let mut out = String::new();
	let _ = writeln!(out, "time_bits: {:#017x}", f.bits());
	let _ = writeln!(out, "  [00-15] reserved    {}", bit_string(f, 0, 15));
	let _ = writeln!(out, "  [16]    A1          {} (dst change {})", bit_string(f, 16, 16), a.dst_change);
	let _ = writeln!(out, "  [17-18] Z1 Z2       {} (cest {}, cet {})", bit_string(f, 17, 18), a.summer_time,
		a.standard_time);
	let _ = writeln!(out, "  [19]    A2          {} (leap second {})", bit_string(f, 19, 19), a.leap_second);
	let _ = writeln!(out, "  [20]    start       {}", bit_string(f, 20, 20));
	let _ = writeln!(out, "  [21-27] minute      {} = {:02}", bit_string(f, 21, 27), f.minute());
	let _ = writeln!(out, "  [28]    parity      {} ({})", bit_string(f, 28, 28), check(28, 21, 27));
	let _ = writeln!(out, "  [29-34] hour        {} = {:02}", bit_string(f, 29, 34), f.hour());
	let _ = writeln!(out, "  [35]    parity      {} ({})", bit_string(f, 35, 35), check(35, 29, 34));
	let _ = writeln!(out, "  [36-41] day         {} = {:02}", bit_string(f, 36, 41), f.day());
	let _ = writeln!(out, "  [42-44] weekday     {} = {}", bit_string(f, 42, 44), f.weekday());
	let _ = writeln!(out, "  [45-49] month       {} = {:02}", bit_string(f, 45, 49), f.month());
	let _ = writeln!(out, "  [50-57] year        {} = {:02}", bit_string(f, 50, 57), f.year());
	let _ = write!(out, "  [58]    parity      {} ({})", bit_string(f, 58, 58), check(58, 36, 57));
	out
}

/// Record `frame` as the last telegram seen, returning whether it differs from the previous one.
fn is_new_telegram(last: &mut Option<Frame>, frame: Frame) -> bool {
	last.replace(frame) != Some(frame)
}

/// Redraw the status line at about 10 Hz until `stop` is requested, then clear it.
///
/// Reads `monitor` without ever blocking the renderer, and logs each new telegram at `debug` so
/// the renderer does not have to. Output errors are ignored; the line is cosmetic.
pub fn run_status(monitor: Monitor, stop: StopHandle, mut clock: DisplayClock) {
	let mut stdout = io::stdout();
	let mut last = None;
	while !stop.is_requested() {
		let snapshot = monitor.snapshot();
		if is_new_telegram(&mut last, snapshot.frame) {
			log::debug!("Telegram {:?}", snapshot.frame);
		}
		if let Some(now) = clock.now() {
			let _ = write!(stdout, "\r{}", status_line(&now, &snapshot));
			let _ = stdout.flush();
		}
		thread::sleep(REFRESH);
	}
	let _ = write!(stdout, "{}", CLEAR_LINE);
	let _ = stdout.flush();
}
