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

//! The two minimal capability traits a transport exposes: [`RawReader`] and
//! [`RawWriter`]. Deliberately small — the source/buffered distinction is a
//! capability add-on (a [`Buffer`] staged in front), not an inheritance
//! chain, in the spirit of the teacher's `Source`/`Sink` split.

use crate::cancel::throw_if_reached;
use crate::error::Result;
use crate::Buffer;

/// A source of bytes: files, sockets, in-memory pipes, decompressors.
///
/// Implementations must check [`throw_if_reached`] before any blocking
/// operation, and again immediately after returning from one, so
/// cancellation and timeouts are observed promptly even across long reads.
pub trait RawReader {
	/// Appends at most `byte_count` bytes to `sink`'s tail, returning the
	/// number of bytes produced. Returns `Ok(None)` at end of stream.
	/// Never returns `Ok(Some(0))` while the source is still alive.
	fn read_at_most_to(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>>;

	/// Releases the underlying resource. Idempotent.
	fn close(&mut self) -> Result { Ok(()) }
}

/// A sink for bytes: files, sockets, in-memory pipes, compressors.
pub trait RawWriter {
	/// Consumes exactly `byte_count` bytes from `source`'s head, retrying
	/// until all are accepted or the underlying channel fails.
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result;

	/// Ensures previously written bytes are no longer retained internally.
	fn flush(&mut self) -> Result { Ok(()) }

	/// Flushes and releases the underlying resource. Idempotent.
	fn close(&mut self) -> Result { self.flush() }
}

impl RawReader for Buffer {
	fn read_at_most_to(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
		throw_if_reached()?;
		if self.size() == 0 {
			return Ok(None);
		}
		let n = byte_count.min(self.size());
		let moved = sink.move_from(self, n)?;
		Ok(Some(moved))
	}
}

impl RawWriter for Buffer {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		throw_if_reached()?;
		self.move_from(source, byte_count)?;
		Ok(())
	}
}

/// Adapts any [`std::io::Read`] into a [`RawReader`]. This is the generic
/// "platform byte source" adapter; it has no knowledge of files or sockets,
/// those live outside this crate.
pub struct IoReader<R> {
	inner: R,
}

impl<R: std::io::Read> IoReader<R> {
	pub fn new(inner: R) -> Self { Self { inner } }
}

impl<R: std::io::Read> RawReader for IoReader<R> {
	fn read_at_most_to(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
		throw_if_reached()?;
		let mut scratch = vec![0u8; byte_count.min(crate::DEFAULT_BLOCK_SIZE).max(1)];
		loop {
			match self.inner.read(&mut scratch) {
				Ok(0) => return Ok(None),
				Ok(n) => {
					sink.write_slice(&scratch[..n]);
					throw_if_reached()?;
					return Ok(Some(n));
				}
				Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e.into()),
			}
		}
	}
}

/// Adapts any [`std::io::Write`] into a [`RawWriter`]. The generic
/// "platform byte sink" counterpart to [`IoReader`].
pub struct IoWriter<W> {
	inner: W,
}

impl<W: std::io::Write> IoWriter<W> {
	pub fn new(inner: W) -> Self { Self { inner } }
}

impl<W: std::io::Write> RawWriter for IoWriter<W> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result {
		throw_if_reached()?;
		let mut remaining = byte_count;
		let mut scratch = vec![0u8; crate::DEFAULT_BLOCK_SIZE];
		while remaining > 0 {
			let n = source.read_into_slice(&mut scratch[..remaining.min(scratch.len())]);
			if n == 0 { break }
			let mut off = 0;
			while off < n {
				match self.inner.write(&scratch[off..n]) {
					Ok(0) => return Err(crate::error::Error::io(std::io::Error::new(
						std::io::ErrorKind::WriteZero,
						"writer accepted zero bytes",
					))),
					Ok(written) => off += written,
					Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
					Err(e) => return Err(e.into()),
				}
			}
			remaining -= n;
			throw_if_reached()?;
		}
		Ok(())
	}

	fn flush(&mut self) -> Result {
		self.inner.flush().map_err(Into::into)
	}
}
