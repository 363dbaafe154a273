// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An in-memory, back-pressured pipe connecting a [`PipeSource`] and
//! [`PipeSink`] through a shared, capacity-bounded [`Buffer`]. Useful for
//! wiring a producer and consumer on separate threads without a concrete
//! transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::cancel::throw_if_reached;
use crate::error::{Error, Result};
use crate::raw::{RawReader, RawWriter};
use crate::Buffer;

/// How often a blocked pipe endpoint wakes to re-check cancellation while
/// waiting on its condvar. Cooperative cancellation has no way to interrupt
/// a blocked `wait` directly, so endpoints poll at this granularity instead.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Shared {
	buffer: Mutex<Buffer>,
	capacity: usize,
	not_empty: Condvar,
	not_full: Condvar,
	reader_closed: AtomicBool,
	writer_closed: AtomicBool,
}

/// Creates a connected pipe with room for `capacity` bytes before writes
/// start blocking.
pub fn pipe(capacity: usize) -> (PipeSource, PipeSink) {
	let shared = Arc::new(Shared {
		buffer: Mutex::new(Buffer::new()),
		capacity,
		not_empty: Condvar::new(),
		not_full: Condvar::new(),
		reader_closed: AtomicBool::new(false),
		writer_closed: AtomicBool::new(false),
	});
	(PipeSource { shared: shared.clone() }, PipeSink { shared })
}

/// The read half of a [`pipe`].
pub struct PipeSource {
	shared: Arc<Shared>,
}

/// The write half of a [`pipe`].
pub struct PipeSink {
	shared: Arc<Shared>,
}

impl RawReader for PipeSource {
	fn read_at_most_to(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
		throw_if_reached()?;
		loop {
			let mut buf = self.shared.buffer.lock().unwrap_or_else(|e| e.into_inner());
			if buf.size() > 0 {
				let n = byte_count.min(buf.size());
				let moved = sink.move_from(&mut buf, n)?;
				drop(buf);
				self.shared.not_full.notify_all();
				return Ok(Some(moved));
			}
			if self.shared.writer_closed.load(Ordering::SeqCst) {
				return Ok(None);
			}
			let (_guard, _timed_out) = self
				.shared
				.not_empty
				.wait_timeout(buf, POLL_INTERVAL)
				.unwrap_or_else(|e| e.into_inner());
			throw_if_reached()?;
		}
	}

	fn close(&mut self) -> Result {
		self.shared.reader_closed.store(true, Ordering::SeqCst);
		self.shared.not_full.notify_all();
		Ok(())
	}
}

impl RawWriter for PipeSink {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		throw_if_reached()?;
		let mut remaining = byte_count;
		while remaining > 0 {
			let mut buf = self.shared.buffer.lock().unwrap_or_else(|e| e.into_inner());
			if self.shared.reader_closed.load(Ordering::SeqCst) {
				return Err(Error::closed());
			}
			let capacity_left = self.shared.capacity.saturating_sub(buf.size());
			if capacity_left == 0 {
				let (_guard, _timed_out) = self
					.shared
					.not_full
					.wait_timeout(buf, POLL_INTERVAL)
					.unwrap_or_else(|e| e.into_inner());
				throw_if_reached()?;
				continue;
			}
			let n = remaining.min(capacity_left);
			let moved = buf.move_from(source, n)?;
			remaining -= moved;
			drop(buf);
			self.shared.not_empty.notify_all();
			throw_if_reached()?;
		}
		Ok(())
	}

	fn flush(&mut self) -> Result { Ok(()) }

	fn close(&mut self) -> Result {
		self.shared.writer_closed.store(true, Ordering::SeqCst);
		self.shared.not_empty.notify_all();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn write_then_read_round_trips() {
		let (mut source, mut sink) = pipe(4096);
		let mut staged = Buffer::new();
		staged.write_slice(b"hello");
		sink.write(&mut staged, 5).unwrap();
		sink.close().unwrap();

		let mut out = Buffer::new();
		let n = source.read_at_most_to(&mut out, 1024).unwrap();
		assert_eq!(n, Some(5));
		assert_eq!(out.read_utf8().unwrap(), "hello");
	}

	#[test]
	fn read_after_writer_closed_and_drained_is_none() {
		let (mut source, mut sink) = pipe(4096);
		let mut staged = Buffer::new();
		staged.write_slice(b"x");
		sink.write(&mut staged, 1).unwrap();
		sink.close().unwrap();

		let mut out = Buffer::new();
		source.read_at_most_to(&mut out, 1).unwrap();
		assert_eq!(source.read_at_most_to(&mut out, 1).unwrap(), None);
	}

	#[test]
	fn write_after_reader_closed_fails() {
		let (mut source, mut sink) = pipe(4096);
		source.close().unwrap();
		let mut staged = Buffer::new();
		staged.write_slice(b"x");
		assert!(sink.write(&mut staged, 1).is_err());
	}

	#[test]
	fn writer_blocks_until_reader_drains_past_capacity() {
		let (mut source, mut sink) = pipe(8);
		let mut staged = Buffer::new();
		staged.write_slice(&[1u8; 8]);
		sink.write(&mut staged, 8).unwrap();

		let mut staged2 = Buffer::new();
		staged2.write_slice(&[2u8; 4]);

		let shared = sink.shared.clone();
		let handle = std::thread::spawn(move || {
			let mut sink = PipeSink { shared };
			sink.write(&mut staged2, 4).unwrap();
		});

		std::thread::sleep(Duration::from_millis(100));
		let mut out = Buffer::new();
		source.read_at_most_to(&mut out, 8).unwrap();
		handle.join().unwrap();
		assert_eq!(out.size(), 8);
	}
}
