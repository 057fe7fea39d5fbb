use std::sync::Arc;

use parking_lot::Mutex;
use shellhost_engine::{CancellationToken, Console, ConsoleError, Key, KeyInfo};

use crate::handle_queue::{HandleQueue, Lease};
use crate::prompt::ReadLineError;

const ERASE_CHAR: &str = "\u{8} \u{8}";

/// Minimal line reader built on raw console key reads.
///
/// One read runs at a time. [`Self::abort`] cancels the active read, which
/// then discards its partial input and returns an empty line.
pub struct ConsoleReadLine {
	console: Arc<dyn Console>,
	gate: Arc<HandleQueue>,
	active: Mutex<Option<CancellationToken>>,
}

impl ConsoleReadLine {
	pub fn new(console: Arc<dyn Console>) -> Self {
		Self {
			console,
			gate: Arc::new(HandleQueue::new("console-read-line")),
			active: Mutex::new(None),
		}
	}

	/// Reads one line. Cancellation before any key is read is an error;
	/// cancellation mid-line yields an empty line. A read already in
	/// progress is aborted first.
	pub async fn read_line(&self, is_command_line: bool, cancel: &CancellationToken) -> Result<String, ReadLineError> {
		if cancel.is_cancelled() {
			return Err(ReadLineError::Cancelled);
		}

		if self.gate.is_leased() {
			tracing::debug!("aborting in-flight console read before starting a new one");
			self.abort();
		}
		let _gate = tokio::select! {
			lease = Lease::acquire(Arc::clone(&self.gate)) => lease,
			() = cancel.cancelled() => return Ok(String::new()),
		};
		let token = cancel.child_token();
		*self.active.lock() = Some(token.clone());
		let _active = ClearActive(&self.active);

		let mut line = String::new();
		loop {
			let key = match self.console.read_key(&token).await {
				Ok(key) => key,
				Err(ConsoleError::Cancelled) => {
					tracing::debug!(typed = line.len(), "console read-line aborted");
					return Ok(String::new());
				}
				Err(error) => return Err(error.into()),
			};
			if self.apply_key(&mut line, key, is_command_line) {
				self.console.write_str("\n");
				return Ok(line);
			}
		}
	}

	/// Edits `line` for `key`; returns true when the line is accepted.
	fn apply_key(&self, line: &mut String, key: KeyInfo, is_command_line: bool) -> bool {
		match key.key {
			Key::Enter => return true,
			Key::Backspace => {
				if line.pop().is_some() {
					self.console.write_str(ERASE_CHAR);
				}
			}
			Key::Escape if is_command_line => {
				for _ in line.drain(..) {
					self.console.write_str(ERASE_CHAR);
				}
			}
			Key::Char(ch) if !key.ctrl && !key.alt => {
				line.push(ch);
				self.console.write_char(ch);
			}
			Key::Char(_) | Key::Escape | Key::Other => {}
		}
		false
	}

	/// Cancels the active read, if any. Does not wait for it to return.
	pub fn abort(&self) {
		if let Some(token) = self.active.lock().as_ref() {
			token.cancel();
		}
	}

	pub fn is_reading(&self) -> bool {
		self.gate.is_leased()
	}

	/// Waits until no read is in progress.
	pub async fn wait_for_exit(&self) {
		drop(Lease::acquire(Arc::clone(&self.gate)).await);
	}
}

struct ClearActive<'a>(&'a Mutex<Option<CancellationToken>>);

impl Drop for ClearActive<'_> {
	fn drop(&mut self) {
		self.0.lock().take();
	}
}

/// Prompt strategy that reads straight from the console.
pub struct LegacyReadLineContext {
	reader: ConsoleReadLine,
}

impl LegacyReadLineContext {
	pub fn new(console: Arc<dyn Console>) -> Self {
		Self {
			reader: ConsoleReadLine::new(console),
		}
	}

	pub async fn invoke_read_line(&self, is_command_line: bool, cancel: &CancellationToken) -> Result<String, ReadLineError> {
		self.reader.read_line(is_command_line, cancel).await
	}

	pub fn abort_read_line(&self) {
		self.reader.abort();
	}

	pub async fn wait_for_read_line_exit(&self) {
		self.reader.wait_for_exit().await;
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use pretty_assertions::assert_eq;
	use shellhost_engine::mock::MockConsole;

	use super::*;

	fn reader() -> (Arc<MockConsole>, Arc<ConsoleReadLine>) {
		let console = Arc::new(MockConsole::new());
		let reader = Arc::new(ConsoleReadLine::new(console.clone()));
		(console, reader)
	}

	#[tokio::test]
	async fn reads_until_enter_and_echoes() {
		let (console, reader) = reader();
		console.type_str("dir");
		console.push_key(Key::Enter);

		let line = reader.read_line(true, &CancellationToken::new()).await.expect("line");
		assert_eq!(line, "dir");
		assert_eq!(console.output(), "dir\n");
		assert_eq!(console.cursor_position(), (0, 1));
	}

	#[tokio::test]
	async fn backspace_erases_last_char() {
		let (console, reader) = reader();
		console.type_str("lsx");
		console.push_key(Key::Backspace);
		console.push_key(Key::Enter);

		let line = reader.read_line(true, &CancellationToken::new()).await.expect("line");
		assert_eq!(line, "ls");
		assert_eq!(console.output(), "lsx\u{8} \u{8}\n");
	}

	#[tokio::test]
	async fn escape_clears_command_line_only() {
		let (console, reader) = reader();
		console.type_str("ab");
		console.push_key(Key::Escape);
		console.type_str("c");
		console.push_key(Key::Enter);
		assert_eq!(reader.read_line(true, &CancellationToken::new()).await.expect("line"), "c");

		console.type_str("ab");
		console.push_key(Key::Escape);
		console.push_key(Key::Enter);
		assert_eq!(reader.read_line(false, &CancellationToken::new()).await.expect("line"), "ab");
	}

	#[tokio::test]
	async fn pre_cancelled_read_never_touches_console() {
		let (console, reader) = reader();
		let cancel = CancellationToken::new();
		cancel.cancel();

		let result = reader.read_line(true, &cancel).await;
		assert!(matches!(result, Err(ReadLineError::Cancelled)));
		assert_eq!(console.read_count(), 0);
	}

	#[tokio::test]
	async fn abort_returns_empty_line() {
		let (console, reader) = reader();
		console.type_str("partial");

		let task = {
			let reader = Arc::clone(&reader);
			tokio::spawn(async move { reader.read_line(true, &CancellationToken::new()).await })
		};
		tokio::time::timeout(Duration::from_secs(1), async {
			while console.key_available() {
				tokio::task::yield_now().await;
			}
		})
		.await
		.expect("keys consumed");

		reader.abort();
		assert_eq!(task.await.unwrap().expect("aborted read"), "");
		reader.wait_for_exit().await;
		assert!(!reader.is_reading());
	}

	#[tokio::test]
	async fn second_read_aborts_the_first() {
		let (console, reader) = reader();
		console.type_str("stale");

		let first = {
			let reader = Arc::clone(&reader);
			tokio::spawn(async move { reader.read_line(true, &CancellationToken::new()).await })
		};
		tokio::time::timeout(Duration::from_secs(1), async {
			while console.key_available() || !reader.is_reading() {
				tokio::task::yield_now().await;
			}
		})
		.await
		.expect("first read started");

		let second = {
			let reader = Arc::clone(&reader);
			tokio::spawn(async move { reader.read_line(true, &CancellationToken::new()).await })
		};
		let stale = tokio::time::timeout(Duration::from_millis(300), first)
			.await
			.expect("first read aborted")
			.unwrap()
			.expect("aborted read");
		assert_eq!(stale, "");

		console.type_str("fresh");
		console.push_key(Key::Enter);
		let fresh = tokio::time::timeout(Duration::from_secs(1), second)
			.await
			.expect("second read finished")
			.unwrap()
			.expect("line");
		assert_eq!(fresh, "fresh");
	}

	#[tokio::test]
	async fn abort_when_idle_is_a_no_op() {
		let (console, reader) = reader();
		reader.abort();
		console.type_str("ok");
		console.push_key(Key::Enter);
		assert_eq!(reader.read_line(true, &CancellationToken::new()).await.expect("line"), "ok");
	}
}
