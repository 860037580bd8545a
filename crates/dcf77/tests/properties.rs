//! Property-based tests for the telegram encoder and the oscillators.

use dcf77::{Frame, Oscillator, PhaseAccumulator, Position, SineTable, amplitude_scale, build_frame};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use wallclock::{DateTime, Timestamp, ZoneInfo};

fn proptest_config() -> ProptestConfig {
	ProptestConfig {
		cases: 2_000,
		..ProptestConfig::default()
	}
}

/// Any instant from 1970 to 2100, in any zone a real clock could report.
fn any_time() -> impl Strategy<Value = DateTime> {
	(0i64..4_102_444_800, 0u32..1_000_000_000, -43_200i32..=50_400, any::<bool>())
		.prop_filter_map("before the epoch", |(sec, nsec, utc_offset, is_dst)| {
			DateTime::from_unix(Timestamp::new(sec, nsec), ZoneInfo { utc_offset, is_dst })
		})
}

#[test]
fn telegram_parity_holds() {
	proptest!(proptest_config(), |(now in any_time(), utc in any::<bool>())| {
		let t = build_frame(&now, utc);
		let f = t.frame;
		prop_assert!(f.is_valid(), "{:?} for {}", f, now);
		prop_assert_eq!(f.parity(21, 27), f.bit(28));
		prop_assert_eq!(f.parity(29, 34), f.bit(35));
		prop_assert_eq!(f.parity(36, 57), f.bit(58));
		prop_assert!(f.bit(20));
		prop_assert_eq!(f.field(0, 19), 0);
	});
}

#[test]
fn telegram_encodes_next_minute() {
	proptest!(proptest_config(), |(now in any_time())| {
		let t = build_frame(&now, false);
		let expected = now.floor_to_minute().add_minutes(1);
		prop_assert_eq!(t.target, expected);
		prop_assert_eq!(t.target.to_unix() - now.floor_to_minute().to_unix(), 60);
		prop_assert_eq!(t.frame.minute(), expected.minute());
		prop_assert_eq!(t.frame.hour(), expected.hour());
		prop_assert_eq!(t.frame.day(), expected.day());
		prop_assert_eq!(t.frame.weekday(), expected.iso_weekday());
		prop_assert_eq!(t.frame.month(), expected.month());
		prop_assert_eq!(t.frame.year(), expected.two_digit_year());
	});
}

#[test]
fn oscillator_split_is_seamless() {
	// Tables hold up to a second of audio each, keep the case count modest
	let config = ProptestConfig { cases: 200, ..ProptestConfig::default() };
	proptest!(config, |(
		split in 0usize..=4800,
		frequency in 1u32..24_000,
		samplerate in prop::sample::select(vec![44_100u32, 48_000, 96_000, 192_000])
	)| {
		let total = 4800;
		let accumulator = PhaseAccumulator::new(frequency as f64, samplerate);
		let table = SineTable::new(frequency, samplerate);

		let mut whole = vec![0f32; total];
		let mut parts = vec![0f32; total];
		accumulator.clone().render(&mut whole, 0.8);
		let mut o = accumulator;
		let (a, b) = parts.split_at_mut(split);
		o.render(a, 0.8);
		o.render(b, 0.8);
		prop_assert_eq!(&parts, &whole);

		table.clone().render(&mut whole, 0.8);
		let mut o = table;
		let (a, b) = parts.split_at_mut(split);
		o.render(a, 0.8);
		o.render(b, 0.8);
		prop_assert_eq!(&parts, &whole);
		prop_assert!(whole.iter().all(|s| s.abs() <= 0.8));
	});
}

#[test]
fn pulse_lengths_match_bits() {
	proptest!(proptest_config(), |(bits in 0u64..(1 << 59))| {
		let frame = Frame::from_bits(bits);
		for second in 0..59u8 {
			let low = (0..10u8)
				.filter(|d| amplitude_scale(second, *d, frame, 0.) == 0.)
				.count();
			prop_assert_eq!(low, if frame.bit(second) { 2 } else { 1 });
		}
		prop_assert!((0..10u8).all(|d| amplitude_scale(59, d, frame, 0.) == 1.));
	});
}

#[test]
fn position_cycles_in_one_minute() {
	proptest!(proptest_config(), |(start in 0u16..600)| {
		let mut p = Position::from_index(start);
		let mut refreshes = 0;
		for _ in 0..600 {
			p = p.next();
			refreshes += p.is_refresh_point() as u32;
		}
		prop_assert_eq!(p, Position::from_index(start));
		prop_assert_eq!(refreshes, 1);
	});
}
