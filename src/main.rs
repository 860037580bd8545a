//! Synchronize DCF77 radio clocks using a loudspeaker.
//!
//! This application plays an amplitude modulated [DCF77] carrier through an ordinary audio output.
//! Audio hardware running at a high sample rate leaks enough RF at the carrier frequency (or one
//! of its aliases) for a radio controlled clock placed next to the speaker to pick up the time
//! telegram. The audio itself is not meant to be heard.
//!
//! The signal is generated in 100 ms blocks, kept in step with the wall clock by seeding once at
//! start. The telegram for the next minute is rebuilt at second 59 of every minute.
//!
//! [DCF77]: https://en.wikipedia.org/wiki/DCF77
//!
//! # Command Line Arguments
//!
//! General form: `dcf77sync [options...]`
//!
//! | Short form | Long form        | Argument                 | Default         | Description                          |
//! | ---------- | ---------------- | ------------------------ | --------------- | ------------------------------------ |
//! | `-l`       | `--list-devices` |                          |                 | List output devices and exit         |
//! | `-d`       | `--device`       | Index or name substring  | Default output  | Output device                        |
//! | `-f`       | `--frequency`    | Hz                       | 77500           | Carrier frequency                    |
//! | `-a`       | `--amplitude`    | (0, 1]                   | 1.0             | Peak amplitude                       |
//! | `-s`       | `--samplerate`   | Hz                       | Device default  | Output sample rate                   |
//! | `-u`       | `--utc`          |                          | Local time      | Transmit UTC                         |
//! | `-o`       | `--offset`       | 0-59                     | 0               | Seconds added to the wall clock      |
//! |            | `--low-factor`   | [0, 1]                   | 0.0             | Relative amplitude during a pulse    |
//! |            | `--oscillator`   | `accumulator` or `table` | `accumulator`   | Carrier oscillator                   |
//! |            | `--ramp`         | Samples                  | 0               | Crossfade length at pulse edges      |
//! |            | `--announce`     |                          | Off             | Transmit zone bits 16-19 (local time) |
//! |            | `--dry-run`      |                          |                 | Print the telegram and exit          |
//!
//! The log level defaults to `info` and can be changed with `RUST_LOG`.
//!
//! # Examples
//!
//! Transmit local time on the default output device
//! ```sh
//! dcf77sync
//! ```
//!
//! Transmit UTC on a USB sound card at 192 kHz
//! ```sh
//! dcf77sync -d usb -s 192000 -u
//! ```
//!
//! Show the telegram for the coming minute
//! ```sh
//! dcf77sync --dry-run
//! ```

use std::error::Error;
use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::sync::mpsc::sync_channel;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use dcf77::Config;
use wallclock::{Clock, SystemClock, TimeBase};

use args::{Arguments, ArgumentsError};
use devices::{OutputDevice, OutputFormat};
use error::SessionError;
use status::DisplayClock;
use streamer::{Render, StopHandle, Streamer, alignment_delay, telegram_for};

mod args;
mod devices;
mod error;
mod status;
mod streamer;

/// How long to wait for the renderer to acknowledge a stop before closing the stream anyway.
const STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// Simple multi-threaded flag using a condition variable.
///
/// Note that this type does not currently support re-use, i.e. when a single thread calls
/// [`Flagger::notify`], all subsequent calls to [`Flagger::wait`] will return immediately.
///
/// # Examples
/// ```
/// let flagger = Flagger::new();
/// let flagger_clone = flagger.clone();
/// thread::spawn(move || {
/// 	// Do some work
///
/// 	// Notify work completed
/// 	flagger_clone.notify();
/// });
///
/// // Wait for thread to complete
/// flagger.wait();
/// ```
struct Flagger {
	/// Mutex containing the flag. `true` means continue waiting.
	mutex: Mutex<bool>,
	/// Condition variable to manage wait/notify.
	cond: Condvar
}

impl Flagger {
	/// Create a new [`Flagger`] ready to be [`wait`](Flagger::wait)ed on.
	fn new() -> Arc<Flagger> {
		Arc::new(Flagger {
			mutex: Mutex::new(true),
			cond: Condvar::new()
		})
	}

	/// Wait for another thread to call [`Flagger::notify`].
	///
	/// A poisoned lock is taken over as is; the flag is a plain `bool` and cannot be left
	/// inconsistent.
	fn wait(&self) {
		let guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
		drop(self.cond.wait_while(guard, |pending| *pending).unwrap_or_else(PoisonError::into_inner));
	}

	/// Like [`Flagger::wait`], giving up after `timeout`. Returns `true` if notified.
	fn wait_timeout(&self, timeout: Duration) -> bool {
		let guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
		let (guard, _) = self.cond.wait_timeout_while(guard, timeout, |pending| *pending)
			.unwrap_or_else(PoisonError::into_inner);
		!*guard
	}

	/// Notify threads [`wait`](Flagger::wait)ing to unblock.
	///
	/// This call will unblock all waiting threads, and immediately unblock all subsequent calls to
	/// [`Flagger::wait`].
	fn notify(&self) {
		let mut flag = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
		*flag = false;
		self.cond.notify_all();
	}
}

/// Block until `input` yields a line, ends, or fails, then request a stop and wake `finish`.
fn wait_for_stop<R: BufRead>(mut input: R, stop: &StopHandle, finish: &Flagger) {
	// Enter, end of input, or a read error all end the session
	let _ = input.read_line(&mut String::new());
	stop.request();
	finish.notify();
}

/// Print the startup banner.
fn print_banner(output: &OutputDevice, config: &Config) {
	let rule = "=".repeat(96);
	println!("{}", rule);
	println!("  {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
	println!();
	println!("  Output device: {}", output.label);
	println!("  Samplerate: {} Hz", config.samplerate());
	println!("  Carrier frequency: {} Hz", config.frequency());
	println!("  Amplitude: {:.3}", config.amplitude());
	println!("  Low-pulse factor: {:.3}", config.low_factor());
	println!("  Time base: {}", time_base_name(config.time_base()));
	println!("  Press <Enter> to terminate");
	println!("{}", rule);
}

fn time_base_name(base: TimeBase) -> &'static str {
	match base {
		TimeBase::Utc => "UTC",
		TimeBase::Local => "local"
	}
}

/// Print the telegram for the coming minute without touching the audio host.
///
/// # Errors
///
/// Returns [`dcf77::ConfigError`] for invalid arguments, or [`SessionError::ClockUnavailable`].
fn dry_run(args: &Arguments) -> Result<(), Box<dyn Error>> {
	let samplerate = args.samplerate.unwrap_or_else(|| devices::dry_run_samplerate(args.frequency));
	let config = args.config(samplerate)?;
	let clock = SystemClock::new(config.time_base());
	let now = clock.now().ok_or(SessionError::ClockUnavailable)?;
	let telegram = telegram_for(&config, &clock, &now);

	println!("DCF77 dry run");
	match &args.device {
		Some(d) => println!("device: {} (not queried in dry-run)", d),
		None => println!("device: default output (not queried in dry-run)")
	}
	println!("samplerate: {}", config.samplerate());
	println!("time base: {}", time_base_name(config.time_base()));
	println!("target_time: {}", telegram.target);
	println!("{}", status::breakdown(&telegram));
	Ok(())
}

/// Stream the time signal to `output` until the user stops it or the device goes away.
///
/// Three threads cooperate: the audio host's render callback, a control thread waiting for
/// <Enter> on stdin, and a status thread redrawing the console line. Only atomics are shared
/// with the render callback.
///
/// # Errors
///
/// - [`SessionError::ClockUnavailable`] if the clock cannot be read at startup.
/// - [`cpal::BuildStreamError`], [`cpal::PlayStreamError`] from configuring and playing audio.
/// - [`SessionError::DeviceLost`] if the device disappears while streaming.
fn run_session(output: OutputDevice, format: OutputFormat, config: Config) -> Result<(), Box<dyn Error>> {
	let clock = SystemClock::new(config.time_base());
	let mut streamer = Streamer::new(config, clock)?;
	let stop = streamer.stop_handle();
	let fault = streamer.fault_flag();
	let monitor = streamer.monitor();
	// Woken to end the session
	let finish = Flagger::new();
	// Woken once the renderer has honored the stop
	let drained = Flagger::new();
	let (lost_tx, lost_rx) = sync_channel::<cpal::StreamError>(1);

	print_banner(&output, &config);

	// Start on a 100 ms boundary of the wall clock
	let now = streamer.prime()?;
	thread::sleep(alignment_delay(&now));
	let now = streamer.prime()?;
	log::debug!("Seeded at {} as {}", now, streamer.state().position);

	let channels = format.channels as usize;
	let stream_config = format.stream_config(config.block_frames());
	log::debug!("Stream config: {:?}", stream_config);
	let stream = {
		let drained = drained.clone();
		let finish = finish.clone();
		let stop = stop.clone();
		output.device.build_output_stream(
			&stream_config,
			move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
				if let Render::Stop = streamer.render(data, channels) {
					drained.notify();
				}
			},
			move |error| match error {
				cpal::StreamError::DeviceNotAvailable => {
					log::error!("Audio output device is no longer available");
					let _ = lost_tx.try_send(error);
					stop.request();
					finish.notify();
				},
				e => {
					log::warn!("Error occurred on the stream: {}", e);
					fault.raise();
				}
			},
			None)?
	};
	stream.play()?;
	log::info!("Transmitting on {} at {} Hz", output.label, config.samplerate());

	{
		let stop = stop.clone();
		let finish = finish.clone();
		thread::spawn(move || wait_for_stop(io::stdin().lock(), &stop, &finish));
	}
	let status = {
		let stop = stop.clone();
		let clock = DisplayClock::new(config.time_base(), &now);
		thread::spawn(move || status::run_status(monitor, stop, clock))
	};

	finish.wait();
	stop.request();
	if !drained.wait_timeout(STOP_TIMEOUT) {
		log::warn!("Stream did not acknowledge the stop, closing it anyway");
	}
	drop(stream);
	let _ = status.join();
	log::info!("Transmission stopped");

	match lost_rx.try_recv() {
		Ok(e) => Err(SessionError::DeviceLost(e).into()),
		Err(_) => Ok(())
	}
}

/// Resolve the device and format, then run a session. Listing and dry runs return early.
///
/// # Errors
///
/// This function can generate a variety of errors, all wrapped in `Box<dyn Error>`:
/// - [`devices::DeviceError`] for device lookup and format selection.
/// - [`dcf77::ConfigError`] for out of range arguments.
/// - Any error from [`run_session`].
fn play(args: Arguments) -> Result<ExitCode, Box<dyn Error>> {
	let host = cpal::default_host();
	if args.list_devices {
		devices::list_devices(&host)?;
		return Ok(ExitCode::SUCCESS);
	}
	if args.dry_run {
		dry_run(&args)?;
		return Ok(ExitCode::SUCCESS);
	}

	let output = devices::select_device(&host, args.device.as_deref())?;
	let format = devices::resolve_format(&output.device, args.samplerate, args.frequency)?;
	let config = args.config(format.samplerate)?;
	run_session(output, format, config)?;

	Ok(ExitCode::SUCCESS)
}

/// Main program entry point.
///
/// Parses input arguments and plays the time signal. See [`crate`] documentation for details.
fn main() -> ExitCode {
	env_logger::builder()
		.filter_level(log::LevelFilter::Info)
		.parse_default_env()
		.init();

	let args = match Arguments::parse(std::env::args_os().skip(1)) {
		Ok(a) => a,
		Err(e) => {
			return if let ArgumentsError::Help = e {
				println!("\
Synchronize DCF77 radio clocks using a loudspeaker.

Usage: dcf77sync [OPTIONS]

Options:
  -l, --list-devices         list output devices and exit
  -d, --device <DEVICE>      output device index or name substring, default output if omitted
  -f, --frequency <HZ>       carrier frequency, default 77500
  -a, --amplitude <AMP>      peak amplitude in (0, 1], default 1.0
  -s, --samplerate <HZ>      output sample rate, default depends on device
  -u, --utc                  transmit UTC instead of local time
  -o, --offset <SECONDS>     seconds added to the wall clock, 0-59, default 0
  --low-factor <FACTOR>      relative amplitude during a pulse in [0, 1], default 0.0
  --oscillator <KIND>        accumulator or table, default accumulator
  --ramp <SAMPLES>           crossfade length at pulse edges, default 0
  --announce                 transmit zone announcement bits (local time only)
  --dry-run                  print the telegram for the coming minute and exit
  -h, --help                 print this help

Examples:
  dcf77sync -l
  dcf77sync -d usb -s 192000
  dcf77sync -u --low-factor 0.15
  dcf77sync --dry-run\n");
				ExitCode::SUCCESS
			} else {
				eprintln!("{}", e);
				ExitCode::FAILURE
			}
		}
	};

	play(args)
		.inspect_err(|e| log::error!("{}", e))
		.unwrap_or(ExitCode::FAILURE)
}
