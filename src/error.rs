//! Errors that end a session.

use std::{error, fmt};

/// The error type for running a session.
pub enum SessionError {
	/// The system clock could not be read.
	ClockUnavailable,
	/// The output device went away while streaming. The underlying stream error is provided in
	/// the payload.
	DeviceLost(cpal::StreamError)
}

impl fmt::Display for SessionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionError::ClockUnavailable => write!(f, "Failed to get current system time"),
			SessionError::DeviceLost(e) => write!(f, "Audio output device lost: {}", e)
		}
	}
}

impl fmt::Debug for SessionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

impl error::Error for SessionError {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match self {
			SessionError::DeviceLost(e) => Some(e),
			_ => None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_test() {
		assert_eq!(SessionError::ClockUnavailable.to_string(), "Failed to get current system time");
		let lost = SessionError::DeviceLost(cpal::StreamError::DeviceNotAvailable);
		assert!(lost.to_string().starts_with("Audio output device lost: "));
		assert!(error::Error::source(&lost).is_some());
		assert_eq!(format!("{:?}", lost), lost.to_string());
	}
}
