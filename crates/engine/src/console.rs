use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
	Char(char),
	Enter,
	Backspace,
	Escape,
	/// Any key the line reader ignores (arrows, function keys, ...).
	Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
	pub key: Key,
	pub ctrl: bool,
	pub alt: bool,
}

impl KeyInfo {
	pub const fn plain(key: Key) -> Self {
		Self { key, ctrl: false, alt: false }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
	#[error("key read was cancelled")]
	Cancelled,
	#[error("console input closed")]
	Closed,
	#[error("console I/O error: {0}")]
	Io(String),
}

/// Raw console primitives.
///
/// Every operation must be safe to call while a [`Console::read_key`] is
/// outstanding and must not block on that read.
#[async_trait]
pub trait Console: Send + Sync {
	/// Returns true when a key is already buffered.
	fn key_available(&self) -> bool;

	/// Waits for the next key press or cancellation.
	///
	/// A key read concurrently with cancellation stays buffered for the next
	/// call.
	async fn read_key(&self, cancel: &CancellationToken) -> Result<KeyInfo, ConsoleError>;

	/// Returns `(left, top)`.
	fn cursor_position(&self) -> (u16, u16);

	fn set_cursor_position(&self, left: u16, top: u16);

	fn write_str(&self, text: &str);

	fn write_char(&self, ch: char) {
		let mut buf = [0u8; 4];
		self.write_str(ch.encode_utf8(&mut buf));
	}
}
