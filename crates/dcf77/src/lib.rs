//! Generate a DCF77 time signal as audio.
//!
//! [DCF77] transmits the civil time of the next minute as a 59 bit telegram, one bit per second,
//! by briefly lowering the amplitude of a 77.5 kHz carrier. A speaker driven at a high sample rate
//! radiates enough of that carrier (or one of its aliases) for a nearby radio clock to pick it up.
//!
//! This crate holds everything up to the audio samples:
//!	- [`frame`] encodes the telegram for a given civil time.
//! - [`timing`] tracks the position within the minute in 100 ms blocks.
//! - [`modulation`] decides the carrier level for each block.
//! - [`oscillator`] produces the phase continuous carrier.
//! - [`config`] validates the generator parameters up front.
//!
//! Getting the samples to a sound card is left to the caller.
//!
//! This crate is `no_std` (with `alloc`) by default, using [`libm`] for the sine function.
//! Enabling feature `std` uses [`f64::sin`] from the standard library instead and routes
//! [`log`] through its `std` support.
//!
//! [DCF77]: https://en.wikipedia.org/wiki/DCF77
//!
//! # Examples
//! ```
//! # use dcf77::{Config, GeneratorState, Oscillator, amplitude_scale};
//! # use wallclock::DateTime;
//! let config = Config::default();
//! let now = DateTime::new(2026, 2, 18, 10, 58, 45, 120_000_000).unwrap();
//! let mut state = GeneratorState::new(&config, &now);
//!
//! // 100 ms of audio for the current block
//! let mut block = vec![0f32; config.block_frames() as usize];
//! let scale = amplitude_scale(state.position.second, state.position.decisecond, state.frame,
//! 	config.low_factor());
//! state.oscillator.render(&mut block, config.amplitude() * scale);
//!
//! // Move on to the next block, refreshing the telegram at the minute boundary
//! if state.advance() {
//! 	state.refresh(&now, config.is_utc());
//! }
//! ```

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod frame;
pub mod modulation;
pub mod oscillator;
pub mod timing;

pub use config::{Config, ConfigError, OscillatorKind};
pub use frame::{Announcements, Frame, Telegram, build_frame};
pub use modulation::{Level, amplitude_scale, pulse_level};
pub use oscillator::{Carrier, Envelope, Oscillator, PhaseAccumulator, SineTable};
pub use timing::{GeneratorState, Position};

/// Number of 100 ms blocks in one second.
pub const BLOCKS_PER_SECOND: u8 = 10;

/// Number of 100 ms blocks in one minute, i.e. the number of distinct [`Position`]s.
pub const BLOCKS_PER_MINUTE: u16 = 600;

#[cfg(any(test, feature = "std"))]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
#[inline(always)]
fn sin64(x: f64) -> f64 {
	x.sin()
}

#[cfg(all(not(test), not(feature = "std")))]
#[inline(always)]
fn sin64(x: f64) -> f64 {
	libm::sin(x)
}
