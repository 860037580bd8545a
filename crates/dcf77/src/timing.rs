//! Position within the minute, in 100 ms blocks.
//!
//! The position is a free running odometer over 600 states: ten blocks per second, sixty seconds
//! per minute. It is set from the wall clock once per session and only ever incremented after
//! that. The block at second 59, decisecond 0 is the refresh point, where the telegram for the
//! coming minute is rebuilt so it is ready before its first pulse at second 0.

use core::fmt;
use wallclock::DateTime;

use crate::oscillator::Carrier;
use crate::{BLOCKS_PER_MINUTE, BLOCKS_PER_SECOND, Config, Frame, build_frame};

/// Second and decisecond of the block being transmitted.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Position {
	/// Second within the minute, ranged [0, 59].
	pub second: u8,
	/// Block within the second, ranged [0, 9].
	pub decisecond: u8
}

impl Position {
	/// The refresh point.
	pub const REFRESH: Position = Position { second: 59, decisecond: 0 };

	/// Create a position, or `None` if either part is out of range.
	pub fn new(second: u8, decisecond: u8) -> Option<Position> {
		(second < 60 && decisecond < BLOCKS_PER_SECOND).then_some(Position { second, decisecond })
	}

	/// The position matching wall clock time `now`, with `offset` seconds added (mod 60).
	///
	/// # Examples
	///
	/// ```
	/// # use dcf77::Position;
	/// # use wallclock::DateTime;
	/// let now = DateTime::new(2026, 2, 18, 10, 0, 58, 730_000_000).unwrap();
	/// assert_eq!(Position::seeded(&now, 0), Position::new(58, 7).unwrap());
	/// assert_eq!(Position::seeded(&now, 5), Position::new(3, 7).unwrap());
	/// ```
	pub fn seeded(now: &DateTime, offset: u8) -> Position {
		Position {
			second: ((now.second() as u16 + offset as u16) % 60) as u8,
			decisecond: now.decisecond()
		}
	}

	/// The position one block later, wrapping from (59, 9) to (0, 0).
	#[inline]
	pub fn next(self) -> Position {
		if self.decisecond + 1 < BLOCKS_PER_SECOND {
			Position { decisecond: self.decisecond + 1, ..self }
		} else if self.second < 59 {
			Position { second: self.second + 1, decisecond: 0 }
		} else {
			Position::default()
		}
	}

	/// Whether this is the block at which the next telegram is built.
	#[inline]
	pub fn is_refresh_point(self) -> bool {
		self == Position::REFRESH
	}

	/// Blocks since the start of the minute, ranged [0, 599].
	pub fn index(self) -> u16 {
		self.second as u16 * BLOCKS_PER_SECOND as u16 + self.decisecond as u16
	}

	/// Inverse of [`Position::index`]. Indexes wrap modulo 600.
	pub fn from_index(index: u16) -> Position {
		let index = index % BLOCKS_PER_MINUTE;
		Position {
			second: (index / BLOCKS_PER_SECOND as u16) as u8,
			decisecond: (index % BLOCKS_PER_SECOND as u16) as u8
		}
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:02}.{}", self.second, self.decisecond)
	}
}

/// Everything the render path mutates: position, telegram and carrier.
///
/// Owned by a single renderer; nothing else writes to it.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorState {
	/// The block being transmitted.
	pub position: Position,
	/// The telegram being transmitted.
	pub frame: Frame,
	/// Carrier phase or table index.
	pub oscillator: Carrier
}

impl GeneratorState {
	/// Create the state for a session starting at `now`: the telegram for the next minute, the
	/// position seeded from `now` and the configured offset, and a fresh carrier.
	pub fn new(config: &Config, now: &DateTime) -> GeneratorState {
		GeneratorState {
			position: Position::seeded(now, config.offset()),
			frame: build_frame(now, config.is_utc()).frame,
			oscillator: Carrier::from_config(config)
		}
	}

	/// Realign the position with wall clock time `now`. The carrier keeps its phase.
	pub fn seed(&mut self, now: &DateTime, offset: u8) {
		self.position = Position::seeded(now, offset);
	}

	/// Replace the telegram with the one for the minute after `now`.
	pub fn refresh(&mut self, now: &DateTime, utc_mode: bool) {
		self.frame = build_frame(now, utc_mode).frame;
	}

	/// Move to the next block. Returns `true` when the new position is the refresh point, in
	/// which case the caller should replace [`GeneratorState::frame`].
	#[inline]
	pub fn advance(&mut self) -> bool {
		self.position = self.position.next();
		self.position.is_refresh_point()
	}
}
