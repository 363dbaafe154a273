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

//! Buffered wrappers: a [`Buffer`] staged in front of a raw source
//! ([`BufferedReader`]) or behind a raw sink ([`BufferedWriter`]), so typed
//! reads/writes and delimiter scans don't each make a syscall-sized round
//! trip to the transport.

use crate::buffer::{BufferOptions, PeekReader};
use crate::error::{Error, Result};
use crate::raw::{RawReader, RawWriter};
use crate::Buffer;
use crate::DEFAULT_BLOCK_SIZE;

/// Stages reads from a [`RawReader`] through an internal [`Buffer`], so
/// callers can request more than is immediately available and get it in as
/// few underlying reads as possible.
pub struct BufferedReader<R> {
	inner: R,
	buffer: Buffer,
	closed: bool,
}

impl<R: RawReader> BufferedReader<R> {
	pub fn new(inner: R) -> Self {
		Self::with_options(inner, BufferOptions::default())
	}

	pub fn with_options(inner: R, options: BufferOptions) -> Self {
		Self { inner, buffer: Buffer::with_options(options), closed: false }
	}

	/// Direct access to the bytes already staged, without pulling more from
	/// the underlying source.
	pub fn buffer(&self) -> &Buffer { &self.buffer }

	/// Fills the internal buffer until it holds at least `byte_count`
	/// bytes, or the source is exhausted. Returns whether the target was
	/// reached.
	fn fill(&mut self, byte_count: usize) -> Result<bool> {
		while self.buffer.size() < byte_count {
			if self.closed {
				return Err(Error::closed());
			}
			match self.inner.read_at_most_to(&mut self.buffer, DEFAULT_BLOCK_SIZE)? {
				Some(_) => continue,
				None => return Ok(false),
			}
		}
		Ok(true)
	}

	/// `true` once at least `byte_count` bytes are available.
	pub fn request(&mut self, byte_count: usize) -> Result<bool> {
		self.fill(byte_count)
	}

	/// Like [`Self::request`], failing with `Eof` if the source runs out
	/// first.
	pub fn require(&mut self, byte_count: usize) -> Result<()> {
		if self.fill(byte_count)? { Ok(()) } else { Err(Error::eof()) }
	}

	pub fn exhausted(&mut self) -> Result<bool> {
		Ok(!self.fill(1)?)
	}

	/// A non-destructive cursor over the bytes currently staged. Does not
	/// pull more from the source first — call [`Self::request`] beforehand
	/// if a minimum is needed.
	pub fn peek(&mut self) -> PeekReader {
		self.buffer.peek()
	}

	/// Appends at most `byte_count` bytes to `sink` from the staged buffer,
	/// topping it up from the source first if empty.
	pub fn read_at_most_to(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<Option<usize>> {
		if !self.fill(1)? {
			return Ok(None);
		}
		let n = byte_count.min(self.buffer.size());
		Ok(Some(sink.move_from(&mut self.buffer, n)?))
	}

	/// Drains everything remaining (pulling from the source until
	/// exhausted) into `sink`, returning the total bytes transferred.
	pub fn transfer_to(&mut self, sink: &mut dyn RawWriter) -> Result<usize> {
		let mut total = 0;
		loop {
			if !self.fill(DEFAULT_BLOCK_SIZE)? && self.buffer.exhausted() {
				break;
			}
			let n = self.buffer.size();
			if n == 0 { break }
			sink.write(&mut self.buffer, n)?;
			total += n;
		}
		Ok(total)
	}

	pub fn read_u8(&mut self) -> Result<u8> { self.require(1)?; self.buffer.read_u8() }
	pub fn read_i8(&mut self) -> Result<i8> { self.require(1)?; self.buffer.read_i8() }
	pub fn read_u16(&mut self) -> Result<u16> { self.require(2)?; self.buffer.read_u16() }
	pub fn read_u16_le(&mut self) -> Result<u16> { self.require(2)?; self.buffer.read_u16_le() }
	pub fn read_i16(&mut self) -> Result<i16> { self.require(2)?; self.buffer.read_i16() }
	pub fn read_i16_le(&mut self) -> Result<i16> { self.require(2)?; self.buffer.read_i16_le() }
	pub fn read_u32(&mut self) -> Result<u32> { self.require(4)?; self.buffer.read_u32() }
	pub fn read_u32_le(&mut self) -> Result<u32> { self.require(4)?; self.buffer.read_u32_le() }
	pub fn read_i32(&mut self) -> Result<i32> { self.require(4)?; self.buffer.read_i32() }
	pub fn read_i32_le(&mut self) -> Result<i32> { self.require(4)?; self.buffer.read_i32_le() }
	pub fn read_u64(&mut self) -> Result<u64> { self.require(8)?; self.buffer.read_u64() }
	pub fn read_u64_le(&mut self) -> Result<u64> { self.require(8)?; self.buffer.read_u64_le() }
	pub fn read_i64(&mut self) -> Result<i64> { self.require(8)?; self.buffer.read_i64() }
	pub fn read_i64_le(&mut self) -> Result<i64> { self.require(8)?; self.buffer.read_i64_le() }

	pub fn read_decimal_long(&mut self) -> Result<i64> {
		self.fill(20)?;
		self.buffer.read_decimal_long()
	}

	pub fn read_hexadecimal_unsigned_long(&mut self) -> Result<u64> {
		self.fill(16)?;
		self.buffer.read_hexadecimal_unsigned_long()
	}

	/// Reads a line terminated by `\n` or `\r\n`, pulling from the source
	/// until a terminator appears or it's exhausted.
	pub fn read_utf8_line(&mut self) -> Result<Option<String>> {
		loop {
			if self.buffer.index_of(b'\n', 0, None).is_some() {
				break;
			}
			if !self.fill(self.buffer.size() + DEFAULT_BLOCK_SIZE)? {
				break;
			}
		}
		self.buffer.read_utf8_line()
	}

	pub fn read_utf8_line_strict(&mut self) -> Result<String> {
		loop {
			if self.buffer.index_of(b'\n', 0, None).is_some() {
				break;
			}
			if !self.fill(self.buffer.size() + DEFAULT_BLOCK_SIZE)? {
				break;
			}
		}
		self.buffer.read_utf8_line_strict()
	}

	/// Pulls the source to exhaustion and decodes everything staged as
	/// UTF-8, replacing invalid sequences with U+FFFD.
	pub fn read_utf8(&mut self) -> Result<String> {
		self.fill(usize::MAX)?;
		self.buffer.read_utf8()
	}

	/// Requires exactly `byte_count` bytes and decodes them as UTF-8,
	/// replacing invalid sequences with U+FFFD.
	pub fn read_utf8_count(&mut self, byte_count: usize) -> Result<String> {
		self.require(byte_count)?;
		self.buffer.read_utf8_count(byte_count)
	}

	/// Moves exactly `byte_count` bytes into `sink`'s tail, failing with
	/// `Eof` if the source runs out first. All-or-nothing: on failure,
	/// `sink` is left untouched.
	pub fn read_to(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<()> {
		self.require(byte_count)?;
		sink.move_from(&mut self.buffer, byte_count)?;
		Ok(())
	}

	/// Releases the underlying source. Idempotent.
	pub fn close(&mut self) -> Result {
		if self.closed { return Ok(()) }
		self.closed = true;
		self.buffer.clear();
		self.inner.close()
	}
}

/// Stages writes behind a [`RawWriter`] through an internal [`Buffer`], so
/// small typed writes don't each reach the transport.
pub struct BufferedWriter<W> {
	inner: W,
	buffer: Buffer,
	closed: bool,
}

impl<W: RawWriter> BufferedWriter<W> {
	pub fn new(inner: W) -> Self {
		Self::with_options(inner, BufferOptions::default())
	}

	pub fn with_options(inner: W, options: BufferOptions) -> Self {
		Self { inner, buffer: Buffer::with_options(options), closed: false }
	}

	pub fn buffer(&self) -> &Buffer { &self.buffer }

	/// Writes every currently buffered byte to the underlying sink, without
	/// flushing the sink itself.
	pub fn emit(&mut self) -> Result {
		if self.closed { return Err(Error::closed()) }
		let n = self.buffer.size();
		if n > 0 {
			self.inner.write(&mut self.buffer, n)?;
		}
		Ok(())
	}

	/// Writes only whole `DEFAULT_BLOCK_SIZE` segments, leaving a partial
	/// tail segment staged for more writes to fill before it's emitted.
	pub fn emit_complete_segments(&mut self) -> Result {
		if self.closed { return Err(Error::closed()) }
		let complete = (self.buffer.size() / DEFAULT_BLOCK_SIZE) * DEFAULT_BLOCK_SIZE;
		if complete > 0 {
			self.inner.write(&mut self.buffer, complete)?;
		}
		Ok(())
	}

	/// Emits everything staged, then flushes the underlying sink.
	pub fn flush(&mut self) -> Result {
		self.emit()?;
		self.inner.flush()
	}

	pub fn write_slice(&mut self, bytes: &[u8]) { self.buffer.write_slice(bytes) }
	pub fn write_u8(&mut self, value: u8) { self.buffer.write_u8(value) }
	pub fn write_i8(&mut self, value: i8) { self.buffer.write_i8(value) }
	pub fn write_u16(&mut self, value: u16) { self.buffer.write_u16(value) }
	pub fn write_u16_le(&mut self, value: u16) { self.buffer.write_u16_le(value) }
	pub fn write_i16(&mut self, value: i16) { self.buffer.write_i16(value) }
	pub fn write_i16_le(&mut self, value: i16) { self.buffer.write_i16_le(value) }
	pub fn write_u32(&mut self, value: u32) { self.buffer.write_u32(value) }
	pub fn write_u32_le(&mut self, value: u32) { self.buffer.write_u32_le(value) }
	pub fn write_i32(&mut self, value: i32) { self.buffer.write_i32(value) }
	pub fn write_i32_le(&mut self, value: i32) { self.buffer.write_i32_le(value) }
	pub fn write_u64(&mut self, value: u64) { self.buffer.write_u64(value) }
	pub fn write_u64_le(&mut self, value: u64) { self.buffer.write_u64_le(value) }
	pub fn write_i64(&mut self, value: i64) { self.buffer.write_i64(value) }
	pub fn write_i64_le(&mut self, value: i64) { self.buffer.write_i64_le(value) }
	pub fn write_decimal_long(&mut self, value: i64) { self.buffer.write_decimal_long(value) }
	pub fn write_hexadecimal_unsigned_long(&mut self, value: u64) {
		self.buffer.write_hexadecimal_unsigned_long(value)
	}
	pub fn write_utf8(&mut self, text: &str) { self.buffer.write_utf8(text) }
	pub fn write_utf8_line(&mut self, text: &str) { self.buffer.write_utf8_line(text) }

	/// Pulls everything staged on `source` through this writer, emitting as
	/// it goes.
	pub fn transfer_from(&mut self, source: &mut dyn RawReader) -> Result<usize> {
		let mut total = 0;
		loop {
			match source.read_at_most_to(&mut self.buffer, DEFAULT_BLOCK_SIZE)? {
				Some(n) => {
					total += n;
					self.emit_complete_segments()?;
				}
				None => break,
			}
		}
		self.emit()?;
		Ok(total)
	}

	/// Flushes and releases the underlying sink. Idempotent. If both the
	/// final flush and the close itself fail, the flush's error wins and the
	/// close's error is attached to it as the cause, so neither is lost.
	pub fn close(&mut self) -> Result {
		if self.closed { return Ok(()) }
		self.closed = true;
		let flush_result = self.emit().and_then(|_| self.inner.flush());
		let close_result = self.inner.close();
		match (flush_result, close_result) {
			(Err(e), Err(c)) => Err(e.attach_source(c)),
			(Err(e), Ok(())) => Err(e),
			(Ok(()), Err(c)) => Err(c),
			(Ok(()), Ok(())) => Ok(()),
		}
	}
}

impl<R> Drop for BufferedReader<R> {
	fn drop(&mut self) {
		self.buffer.clear();
	}
}

impl<W> Drop for BufferedWriter<W> {
	fn drop(&mut self) {
		self.buffer.clear();
	}
}
