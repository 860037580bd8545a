//! Phase continuous carrier generation.
//!
//! Both oscillators keep their position between calls, so a carrier rendered in blocks of any
//! size is sample for sample identical to one rendered in a single call. Amplitude is applied
//! on top and never touches the phase.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::f64::consts::TAU;

use crate::config::{Config, OscillatorKind};
use crate::sin64;

/// A source of carrier samples in `[-1, 1]`.
pub trait Oscillator {
	/// Produce the next sample at unit amplitude.
	fn next_sample(&mut self) -> f32;

	/// Fill `out` with consecutive samples, each multiplied by `amplitude`.
	fn render(&mut self, out: &mut [f32], amplitude: f32) {
		for sample in out {
			*sample = amplitude * self.next_sample();
		}
	}

	/// Fill interleaved `out` with consecutive samples shaped by `envelope`, writing the same
	/// value to each of the `channels` slots of a frame. A trailing partial frame is left as is.
	fn render_interleaved(&mut self, out: &mut [f32], channels: usize, envelope: &mut Envelope) {
		for frame in out.chunks_exact_mut(channels.max(1)) {
			frame.fill(envelope.next() * self.next_sample());
		}
	}
}

/// Running phase with one sine evaluation per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseAccumulator {
	phase: f64,
	step: f64
}

impl PhaseAccumulator {
	/// Create an accumulator for a carrier of `frequency` Hz sampled at `samplerate` Hz, starting
	/// at phase zero.
	///
	/// `frequency` is expected to be below the Nyquist frequency, which [`Config`] guarantees.
	pub fn new(frequency: f64, samplerate: u32) -> PhaseAccumulator {
		PhaseAccumulator {
			phase: 0.,
			step: TAU * frequency / samplerate as f64
		}
	}

	/// Current phase in radians, ranged [0, 2π).
	pub fn phase(&self) -> f64 {
		self.phase
	}
}

impl Oscillator for PhaseAccumulator {
	#[inline]
	fn next_sample(&mut self) -> f32 {
		let sample = sin64(self.phase) as f32;
		// step < π, so one subtraction keeps the phase in range
		self.phase += self.step;
		if self.phase >= TAU {
			self.phase -= TAU;
		}
		sample
	}
}

/// Precomputed samples covering exactly one period of the carrier/sample rate ratio.
///
/// A carrier of `f` Hz at `r` Hz repeats every `r / gcd(r, f)` samples, which is at most one
/// second of audio. The table holds that many samples and is read with a wrapping index.
#[derive(Clone, Debug, PartialEq)]
pub struct SineTable {
	table: Box<[f32]>,
	index: usize
}

impl SineTable {
	/// Build the table for an integral `frequency` sampled at `samplerate` Hz.
	///
	/// This is the only allocation an oscillator makes. `samplerate` must be positive, which
	/// [`Config`] guarantees.
	pub fn new(frequency: u32, samplerate: u32) -> SineTable {
		let (f, r) = (frequency as u64, samplerate as u64);
		let len = r / gcd(f, r);
		let table: Vec<f32> = (0..len)
			// Reduce before scaling so large indexes keep full precision
			.map(|i| sin64(TAU * ((f * i) % r) as f64 / r as f64) as f32)
			.collect();
		SineTable {
			table: table.into_boxed_slice(),
			index: 0
		}
	}

	/// Number of samples in one period.
	pub fn len(&self) -> usize {
		self.table.len()
	}

	/// Read position of the next sample.
	pub fn index(&self) -> usize {
		self.index
	}
}

impl Oscillator for SineTable {
	#[inline]
	fn next_sample(&mut self) -> f32 {
		let sample = self.table[self.index];
		self.index += 1;
		if self.index == self.table.len() {
			self.index = 0;
		}
		sample
	}
}

/// Binary GCD. `gcd(0, n) == n`.
const fn gcd(a: u64, b: u64) -> u64 {
	// Source: https://en.wikipedia.org/wiki/Binary_GCD_algorithm
	if a == 0 || b == 0 { return a | b }

	let i = a.trailing_zeros();
	let j = b.trailing_zeros();
	let k = if j < i { j } else { i };
	let mut u = a >> i;
	let mut v = b >> j;

	loop {
		if u > v {
			let tmp = u;
			u = v;
			v = tmp;
		}

		v -= u;

		if v == 0 {
			break u << k
		}

		v >>= v.trailing_zeros();
	}
}

/// The configured oscillator.
#[derive(Clone, Debug, PartialEq)]
pub enum Carrier {
	Accumulator(PhaseAccumulator),
	Table(SineTable)
}

impl Carrier {
	/// Create the oscillator selected by `config`.
	pub fn from_config(config: &Config) -> Carrier {
		match config.oscillator() {
			OscillatorKind::Accumulator => Carrier::Accumulator(
				PhaseAccumulator::new(config.frequency(), config.samplerate())
			),
			// Validation guarantees an integral frequency below samplerate / 2
			OscillatorKind::Table => {
				let table = SineTable::new(config.frequency() as u32, config.samplerate());
				log::debug!("Sine table of {} samples at {} Hz", table.len(), config.samplerate());
				Carrier::Table(table)
			}
		}
	}
}

// Dispatch once per call rather than once per sample
impl Oscillator for Carrier {
	#[inline]
	fn next_sample(&mut self) -> f32 {
		match self {
			Carrier::Accumulator(o) => o.next_sample(),
			Carrier::Table(o) => o.next_sample()
		}
	}

	fn render(&mut self, out: &mut [f32], amplitude: f32) {
		match self {
			Carrier::Accumulator(o) => o.render(out, amplitude),
			Carrier::Table(o) => o.render(out, amplitude)
		}
	}

	fn render_interleaved(&mut self, out: &mut [f32], channels: usize, envelope: &mut Envelope) {
		match self {
			Carrier::Accumulator(o) => o.render_interleaved(out, channels, envelope),
			Carrier::Table(o) => o.render_interleaved(out, channels, envelope)
		}
	}
}

/// Amplitude follower that moves linearly to a new level over a fixed number of samples.
///
/// With a ramp of zero samples every change takes effect on the next sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
	level: f32,
	target: f32,
	step: f32,
	remaining: u32,
	ramp: u32
}

impl Envelope {
	/// Create an envelope resting at `level` with transitions lasting `ramp` samples.
	pub fn new(level: f32, ramp: u32) -> Envelope {
		Envelope {
			level,
			target: level,
			step: 0.,
			remaining: 0,
			ramp
		}
	}

	/// Start moving towards `target` from the current level. Repeating the current target
	/// does not restart a transition in progress.
	pub fn set_target(&mut self, target: f32) {
		if target == self.target {
			return;
		}
		self.target = target;
		if self.ramp == 0 {
			self.level = target;
			self.remaining = 0;
		} else {
			self.step = (target - self.level) / self.ramp as f32;
			self.remaining = self.ramp;
		}
	}

	/// Advance by one sample and return the level to apply to it.
	#[inline]
	pub fn next(&mut self) -> f32 {
		if self.remaining > 0 {
			self.remaining -= 1;
			self.level = if self.remaining == 0 { self.target } else { self.level + self.step };
		}
		self.level
	}

	/// The level applied to the most recent sample.
	pub fn level(&self) -> f32 {
		self.level
	}

	/// The level being moved towards.
	pub fn target(&self) -> f32 {
		self.target
	}

	/// Whether the envelope has reached its target.
	pub fn is_settled(&self) -> bool {
		self.remaining == 0
	}
}
