//! Wall clock access and calendar arithmetic.
//!
//! This crate is divided into two halves: [`civil`] converts between Unix timestamps and civil
//! calendar time (year, month, day, hour, minute, second) in a fixed zone, and [`clock`] provides
//! the [`Clock`] capability used to sample the current time in either UTC or the local zone.
//!
//! The crate is `no_std`. Enabling the `now` feature adds [`SystemClock`], which reads the system
//! realtime clock and the local zone rules through `libc`.
//!
//! # Examples
//!
//! ```
//! # use wallclock::{DateTime, Timestamp, ZoneInfo};
//! // Wed, Feb 18, 2026. 10:58:45 UTC.
//! let date = DateTime::from_unix(Timestamp::new(1771412325, 0), ZoneInfo::UTC).unwrap();
//! assert_eq!((date.year(), date.month(), date.day()), (2026, 2, 18));
//! assert_eq!((date.hour(), date.minute(), date.second()), (10, 58, 45));
//! assert_eq!(date.iso_weekday(), 3);
//! ```

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod civil;
pub mod clock;

pub use civil::*;
pub use clock::*;
