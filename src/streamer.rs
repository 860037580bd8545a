//! The render side of a session.
//!
//! A [`Streamer`] owns the [`GeneratorState`] and turns host buffers of any size into carrier
//! samples. Everything it shares with other threads is atomic: the stop request, the fault flag
//! and the [`Monitor`] snapshot. The render path never blocks on any of them, and only logs when
//! something goes wrong.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::time::Duration;

use dcf77::{Announcements, Config, Envelope, Frame, GeneratorState, Oscillator, Position, Telegram};
use dcf77::{amplitude_scale, build_frame};
use wallclock::{Clock, DateTime};

use crate::error::SessionError;

/// Outcome of one [`Streamer::render`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Render {
	/// Keep the stream running.
	Continue,
	/// A stop was requested; the buffer holds silence and the stream can be closed.
	Stop
}

/// Cooperative stop request, shared between the control thread and the renderer.
#[derive(Clone, Default, Debug)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
	/// Create a handle with no stop requested.
	pub fn new() -> StopHandle {
		StopHandle::default()
	}

	/// Ask the renderer to stop at the next buffer. Never blocks.
	pub fn request(&self) {
		self.0.store(true, Ordering::Release);
	}

	/// Whether a stop has been requested.
	pub fn is_requested(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}

/// Raised by the audio error callback for transient stream errors.
///
/// The next block begun after the flag is raised is rendered as silence.
#[derive(Clone, Default, Debug)]
pub struct FaultFlag(Arc<AtomicBool>);

impl FaultFlag {
	/// Create a lowered flag.
	pub fn new() -> FaultFlag {
		FaultFlag::default()
	}

	/// Mark a fault.
	pub fn raise(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	/// Lower the flag, returning whether it was raised.
	pub fn take(&self) -> bool {
		self.0.swap(false, Ordering::Relaxed)
	}
}

/// Advisory copy of the render position and telegram for display.
///
/// The two parts are stored separately, so a reader may see a telegram from one block with the
/// position of the next. That is fine for a status line.
#[derive(Clone, Default, Debug)]
pub struct Monitor(Arc<MonitorCell>);

#[derive(Default, Debug)]
struct MonitorCell {
	frame: AtomicU64,
	position: AtomicU16
}

/// A value read from a [`Monitor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
	/// Telegram being transmitted.
	pub frame: Frame,
	/// Block being transmitted.
	pub position: Position
}

impl Monitor {
	/// Create an empty monitor: zero telegram at position (0, 0).
	pub fn new() -> Monitor {
		Monitor::default()
	}

	fn publish(&self, frame: Frame, position: Position) {
		self.0.frame.store(frame.bits(), Ordering::Relaxed);
		self.0.position.store(position.index(), Ordering::Relaxed);
	}

	/// Read the most recently published values.
	pub fn snapshot(&self) -> Snapshot {
		Snapshot {
			frame: Frame::from_bits(self.0.frame.load(Ordering::Relaxed)),
			position: Position::from_index(self.0.position.load(Ordering::Relaxed))
		}
	}
}

/// Build the telegram for the minute after `now`, adding the zone announcement bits when
/// `config` asks for them.
pub fn telegram_for<C: Clock>(config: &Config, clock: &C, now: &DateTime) -> Telegram {
	let telegram = build_frame(now, config.is_utc());
	if !config.announcements() {
		return telegram;
	}
	let announcements = Announcements::for_target(clock, &telegram.target);
	Telegram {
		frame: telegram.frame.with_announcements(announcements),
		..telegram
	}
}

/// Time from `now` until the next 100 ms boundary of the wall clock. Exactly on a boundary this
/// is a full 100 ms.
pub fn alignment_delay(now: &DateTime) -> Duration {
	const BLOCK: u32 = 100_000_000;
	Duration::from_nanos((BLOCK - now.nanosecond() % BLOCK) as u64)
}

/// Renders the carrier for a session, one host buffer at a time.
pub struct Streamer<C> {
	config: Config,
	clock: C,
	state: GeneratorState,
	envelope: Envelope,
	/// Frames of the current block already written.
	emitted: u32,
	/// Whether the current block is replaced by silence.
	silent: bool,
	stopped: bool,
	stop: StopHandle,
	fault: FaultFlag,
	monitor: Monitor
}

impl<C: Clock> Streamer<C> {
	/// Create a streamer with the telegram and position taken from one sample of `clock`.
	///
	/// # Errors
	///
	/// Returns [`SessionError::ClockUnavailable`] if `clock` cannot be read.
	pub fn new(config: Config, clock: C) -> Result<Streamer<C>, SessionError> {
		let now = clock.now().ok_or(SessionError::ClockUnavailable)?;
		let mut state = GeneratorState::new(&config, &now);
		state.frame = telegram_for(&config, &clock, &now).frame;
		let streamer = Streamer {
			envelope: Envelope::new(0., config.ramp()),
			config,
			clock,
			state,
			emitted: 0,
			silent: false,
			stopped: false,
			stop: StopHandle::new(),
			fault: FaultFlag::new(),
			monitor: Monitor::new()
		};
		streamer.monitor.publish(streamer.state.frame, streamer.state.position);
		Ok(streamer)
	}

	/// Rebuild the telegram and re-seed the position from a fresh clock sample, returning that
	/// sample.
	///
	/// # Errors
	///
	/// Returns [`SessionError::ClockUnavailable`] if the clock cannot be read.
	pub fn prime(&mut self) -> Result<DateTime, SessionError> {
		let now = self.clock.now().ok_or(SessionError::ClockUnavailable)?;
		self.state.frame = telegram_for(&self.config, &self.clock, &now).frame;
		self.seed(&now);
		Ok(now)
	}

	/// Move the position to match `now`, restarting at the beginning of that block.
	pub fn seed(&mut self, now: &DateTime) {
		self.state.seed(now, self.config.offset());
		self.emitted = 0;
		self.monitor.publish(self.state.frame, self.state.position);
	}

	/// Handle that stops this streamer.
	pub fn stop_handle(&self) -> StopHandle {
		self.stop.clone()
	}

	/// Flag that degrades the next block to silence.
	pub fn fault_flag(&self) -> FaultFlag {
		self.fault.clone()
	}

	/// Read-only view of the render position.
	pub fn monitor(&self) -> Monitor {
		self.monitor.clone()
	}

	/// The generator state.
	pub fn state(&self) -> &GeneratorState {
		&self.state
	}

	/// Fill interleaved `out` (`channels` samples per frame) with the next stretch of carrier.
	///
	/// Position advances every time a full block of [`Config::block_frames`] frames has been
	/// written, so `out` may have any length; a buffer crossing a block boundary is rendered with
	/// the right amplitude on either side. A trailing partial frame is filled with silence.
	///
	/// Once a stop has been requested every call writes silence and returns [`Render::Stop`].
	pub fn render(&mut self, out: &mut [f32], channels: usize) -> Render {
		if self.stopped || self.stop.is_requested() {
			out.fill(0.);
			self.stopped = true;
			return Render::Stop;
		}

		let channels = channels.max(1);
		let block = self.config.block_frames();
		let mut rest = out;
		while rest.len() >= channels {
			if self.emitted == 0 {
				self.begin_block();
			}
			let frames = ((block - self.emitted) as usize).min(rest.len() / channels);
			let (run, tail) = mem::take(&mut rest).split_at_mut(frames * channels);
			self.state.oscillator.render_interleaved(run, channels, &mut self.envelope);
			if self.silent {
				run.fill(0.);
			}
			self.emitted += frames as u32;
			if self.emitted == block {
				self.emitted = 0;
				self.end_block();
			}
			rest = tail;
		}
		rest.fill(0.);

		Render::Continue
	}

	fn begin_block(&mut self) {
		let Position { second, decisecond } = self.state.position;
		let scale = amplitude_scale(second, decisecond, self.state.frame, self.config.low_factor());
		self.envelope.set_target(self.config.amplitude() * scale);
		self.silent = self.fault.take();
		self.monitor.publish(self.state.frame, self.state.position);
	}

	fn end_block(&mut self) {
		if self.state.advance() {
			self.refresh();
		}
	}

	fn refresh(&mut self) {
		match self.clock.now() {
			Some(now) => self.state.frame = telegram_for(&self.config, &self.clock, &now).frame,
			None => log::warn!("Failed to read the clock, repeating the previous telegram")
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::Cell;
	use dcf77::OscillatorKind;
	use wallclock::{TimeBase, Timestamp, ZoneInfo};

	/// Clock returning a settable instant and counting reads.
	struct TestClock {
		now: Cell<Option<DateTime>>,
		reads: Cell<u32>,
		dst: bool
	}

	impl TestClock {
		fn at(now: DateTime) -> TestClock {
			TestClock { now: Cell::new(Some(now)), reads: Cell::new(0), dst: false }
		}
	}

	impl Clock for TestClock {
		fn now(&self) -> Option<DateTime> {
			self.reads.set(self.reads.get() + 1);
			self.now.get()
		}

		fn zone_at(&self, _unix: i64) -> ZoneInfo {
			ZoneInfo { utc_offset: if self.dst { 7200 } else { 3600 }, is_dst: self.dst }
		}
	}

	fn at(minute: u8, second: u8, nanosecond: u32) -> DateTime {
		DateTime::new(2026, 2, 18, 10, minute, second, nanosecond).unwrap()
	}

	/// 100 frames per block, carrier at a fifth of the sample rate.
	fn small_config() -> Config {
		Config::new(200., 1000, 1., 0., TimeBase::Local, 0).unwrap()
	}

	fn peak(samples: &[f32]) -> f32 {
		samples.iter().fold(0f32, |m, s| m.max(s.abs()))
	}

	#[test]
	fn block_levels_test() {
		// Telegram for 10:59, bit 45 is 0
		let mut s = Streamer::new(small_config(), TestClock::at(at(58, 45, 0))).unwrap();
		assert_eq!(s.state().position, Position::new(45, 0).unwrap());
		assert!(!s.state().frame.bit(45));

		let mut out = vec![1f32; 100];
		assert_eq!(s.render(&mut out, 1), Render::Continue);
		assert_eq!(peak(&out), 0.);
		assert_eq!(s.state().position, Position::new(45, 1).unwrap());

		s.render(&mut out, 1);
		assert!(peak(&out) > 0.9);
		assert_eq!(s.state().position, Position::new(45, 2).unwrap());

		// Bit 46 is 1: two low blocks
		let mut s = Streamer::new(small_config(), TestClock::at(at(58, 46, 0))).unwrap();
		assert!(s.state().frame.bit(46));
		for _ in 0..2 {
			s.render(&mut out, 1);
			assert_eq!(peak(&out), 0.);
		}
		s.render(&mut out, 1);
		assert!(peak(&out) > 0.9);
	}

	#[test]
	fn straddling_buffer_test() {
		let mut s = Streamer::new(small_config(), TestClock::at(at(58, 45, 0))).unwrap();
		let mut out = vec![1f32; 150];
		s.render(&mut out, 1);
		assert_eq!(peak(&out[..100]), 0.);
		assert!(peak(&out[100..]) > 0.9);
		assert_eq!(s.state().position, Position::new(45, 1).unwrap());

		// 50 more frames finish the block
		let mut out = vec![0f32; 50];
		s.render(&mut out, 1);
		assert_eq!(s.state().position, Position::new(45, 2).unwrap());
	}

	#[test]
	fn buffer_size_independence_test() {
		let config = small_config().with_ramp(10).unwrap();
		let mut whole = Streamer::new(config, TestClock::at(at(58, 45, 0))).unwrap();
		let mut parts = Streamer::new(config, TestClock::at(at(58, 45, 0))).unwrap();

		let mut a = vec![0f32; 1000];
		whole.render(&mut a, 1);
		let mut b = vec![0f32; 1000];
		for chunk in b.chunks_mut(64) {
			parts.render(chunk, 1);
		}
		assert_eq!(a, b);
		assert_eq!(whole.state(), parts.state());
	}

	#[test]
	fn interleaved_test() {
		let mut s = Streamer::new(small_config(), TestClock::at(at(58, 45, 0))).unwrap();
		let mut out = vec![0f32; 401];
		s.render(&mut out, 2);
		for frame in out[..400].chunks_exact(2) {
			assert_eq!(frame[0], frame[1]);
		}
		assert_eq!(out[400], 0.);
		assert!(peak(&out[200..400]) > 0.9);
		assert_eq!(s.state().position, Position::new(45, 2).unwrap());
	}

	#[test]
	fn refresh_test() {
		let clock = TestClock::at(at(58, 58, 900_000_000));
		let mut s = Streamer::new(small_config(), &clock).unwrap();
		assert_eq!(s.state().frame.minute(), 59);
		assert_eq!(clock.reads.get(), 1);

		// The clock has moved on; the refresh at (59, 0) picks that up
		clock.now.set(Some(at(59, 59, 0)));
		let mut out = vec![0f32; 100];
		s.render(&mut out, 1);
		assert_eq!(s.state().position, Position::REFRESH);
		assert_eq!(clock.reads.get(), 2);
		assert_eq!(s.state().frame.minute(), 0);
		assert_eq!(s.state().frame.hour(), 11);

		// Only once per minute
		for _ in 0..599 {
			s.render(&mut out, 1);
		}
		assert_eq!(clock.reads.get(), 2);
		s.render(&mut out, 1);
		assert_eq!(clock.reads.get(), 3);
	}

	#[test]
	fn clock_failure_test() {
		let clock = TestClock::at(at(58, 58, 900_000_000));
		let mut s = Streamer::new(small_config(), &clock).unwrap();
		let frame = s.state().frame;
		clock.now.set(None);
		let mut out = vec![0f32; 100];
		assert_eq!(s.render(&mut out, 1), Render::Continue);
		assert_eq!(s.state().position, Position::REFRESH);
		assert_eq!(s.state().frame, frame);
		assert!(matches!(s.prime(), Err(SessionError::ClockUnavailable)));

		let clock = TestClock { now: Cell::new(None), reads: Cell::new(0), dst: false };
		assert!(matches!(Streamer::new(small_config(), &clock), Err(SessionError::ClockUnavailable)));
	}

	#[test]
	fn stop_test() {
		let mut s = Streamer::new(small_config(), TestClock::at(at(58, 45, 0))).unwrap();
		let stop = s.stop_handle();
		let mut out = vec![0f32; 100];
		s.render(&mut out, 1);
		s.render(&mut out, 1);
		assert!(peak(&out) > 0.9);

		stop.request();
		assert!(stop.is_requested());
		assert_eq!(s.render(&mut out, 1), Render::Stop);
		assert_eq!(peak(&out), 0.);
		assert_eq!(s.state().position, Position::new(45, 2).unwrap());
		out.fill(1.);
		assert_eq!(s.render(&mut out, 1), Render::Stop);
		assert_eq!(peak(&out), 0.);
	}

	#[test]
	fn fault_test() {
		let mut s = Streamer::new(small_config(), TestClock::at(at(58, 45, 100_000_000))).unwrap();
		let fault = s.fault_flag();
		let mut out = vec![0f32; 100];
		s.render(&mut out, 1);
		assert!(peak(&out) > 0.9);

		fault.raise();
		s.render(&mut out, 1);
		assert_eq!(peak(&out), 0.);
		assert_eq!(s.state().position, Position::new(45, 3).unwrap());

		s.render(&mut out, 1);
		assert!(peak(&out) > 0.9);
	}

	#[test]
	fn monitor_test() {
		let mut s = Streamer::new(small_config(), TestClock::at(at(58, 45, 0))).unwrap();
		let monitor = s.monitor();
		assert_eq!(monitor.snapshot(), Snapshot {
			frame: s.state().frame,
			position: Position::new(45, 0).unwrap()
		});
		let mut out = vec![0f32; 250];
		s.render(&mut out, 1);
		// The block being rendered, not the next one
		assert_eq!(monitor.snapshot().position, Position::new(45, 2).unwrap());
		assert_eq!(monitor.snapshot().frame, s.state().frame);
	}

	#[test]
	fn prime_test() {
		let clock = TestClock::at(at(58, 45, 0));
		let mut s = Streamer::new(small_config(), &clock).unwrap();
		let mut out = vec![0f32; 50];
		s.render(&mut out, 1);

		clock.now.set(Some(at(59, 10, 330_000_000)));
		let now = s.prime().unwrap();
		assert_eq!(now, at(59, 10, 330_000_000));
		assert_eq!(s.state().position, Position::new(10, 3).unwrap());
		assert_eq!(s.state().frame.minute(), 0);

		// A fresh block starts after re-seeding
		let mut out = vec![0f32; 100];
		s.render(&mut out, 1);
		assert_eq!(s.state().position, Position::new(10, 4).unwrap());

		let config = Config::new(200., 1000, 1., 0., TimeBase::Local, 7).unwrap();
		let s = Streamer::new(config, TestClock::at(at(58, 58, 0))).unwrap();
		assert_eq!(s.state().position, Position::new(5, 0).unwrap());
	}

	#[test]
	fn announcements_test() {
		let clock = TestClock { dst: true, ..TestClock::at(at(58, 45, 0)) };
		let config = small_config().with_announcements(true);
		let s = Streamer::new(config, &clock).unwrap();
		let a = s.state().frame.announcements();
		assert!(a.summer_time && !a.standard_time && !a.dst_change && !a.leap_second);
		assert!(s.state().frame.is_valid());

		let telegram = telegram_for(&config, &clock, &at(58, 45, 0));
		assert_eq!(telegram.frame.bits(), build_frame(&at(58, 45, 0), false).frame.bits() | 1 << 17);

		let utc = Config::new(200., 1000, 1., 0., TimeBase::Utc, 0).unwrap().with_announcements(true);
		let s = Streamer::new(utc, &clock).unwrap();
		assert_eq!(s.state().frame.announcements(), Announcements::default());
	}

	#[test]
	fn utc_test() {
		let cet = ZoneInfo { utc_offset: 3600, is_dst: false };
		let now = DateTime::from_unix(Timestamp::new(1771412325, 0), cet).unwrap();
		assert_eq!(now.hour(), 11);
		let utc = Config::new(200., 1000, 1., 0., TimeBase::Utc, 0).unwrap();
		let s = Streamer::new(utc, TestClock::at(now)).unwrap();
		assert_eq!(s.state().frame.hour(), 10);
		assert_eq!(s.state().frame.minute(), 59);
	}

	#[test]
	fn table_oscillator_test() {
		let config = small_config().with_oscillator(OscillatorKind::Table).unwrap();
		let mut s = Streamer::new(config, TestClock::at(at(58, 45, 100_000_000))).unwrap();
		let mut out = vec![0f32; 100];
		s.render(&mut out, 1);
		assert!(peak(&out) > 0.9);
		assert!(peak(&out) <= 1.);
	}

	#[test]
	fn alignment_test() {
		assert_eq!(alignment_delay(&at(0, 0, 24_000_000)), Duration::from_millis(76));
		assert_eq!(alignment_delay(&at(0, 0, 0)), Duration::from_millis(100));
		assert_eq!(alignment_delay(&at(0, 0, 999_999_999)), Duration::from_nanos(1));
		assert_eq!(alignment_delay(&at(0, 0, 500_000_001)), Duration::from_nanos(99_999_999));
	}
}
