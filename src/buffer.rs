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

//! [`Buffer`]: the universal in-memory byte container. An ordered queue of
//! [`Segment`]s that is both a [`RawReader`](crate::raw::RawReader) and a
//! [`RawWriter`](crate::raw::RawWriter) of itself.

mod options;
mod peek;
mod read;
mod write;

pub use options::BufferOptions;
pub use peek::PeekReader;

use std::collections::VecDeque;
use log::trace;
use crate::error::{Error, Result};
use crate::pool::SegmentPool;
use crate::segment::Segment;

/// An ordered, growable queue of byte segments. Not safe to share between
/// threads without external synchronization — see the crate's concurrency
/// notes.
pub struct Buffer {
	pub(crate) pool: &'static SegmentPool,
	pub(crate) segments: VecDeque<Segment>,
	byte_count: usize,
	pub(crate) options: BufferOptions,
}

impl Default for Buffer {
	fn default() -> Self { Self::new() }
}

impl Buffer {
	pub fn new() -> Self {
		Self::with_pool_and_options(SegmentPool::shared(), BufferOptions::default())
	}

	pub fn with_options(options: BufferOptions) -> Self {
		Self::with_pool_and_options(SegmentPool::shared(), options)
	}

	pub fn with_pool(pool: &'static SegmentPool) -> Self {
		Self::with_pool_and_options(pool, BufferOptions::default())
	}

	pub fn with_pool_and_options(pool: &'static SegmentPool, options: BufferOptions) -> Self {
		Self { pool, segments: VecDeque::new(), byte_count: 0, options }
	}

	/// The number of bytes currently held.
	pub fn size(&self) -> usize { self.byte_count }

	/// `true` if this buffer holds no bytes.
	pub fn exhausted(&self) -> bool { self.byte_count == 0 }

	/// Appends raw bytes to the tail.
	pub fn write_slice(&mut self, bytes: &[u8]) {
		self.write_slice_range(bytes, 0, bytes.len());
	}

	/// Appends `len` bytes of `bytes` starting at `off`.
	pub fn write_slice_range(&mut self, bytes: &[u8], off: usize, len: usize) {
		let mut src = &bytes[off..off + len];
		while !src.is_empty() {
			if self.segments.back().map_or(true, |s| s.write_capacity() == 0) {
				self.segments.push_back(Segment::claim(self.pool));
			}
			let seg = self.segments.back_mut().expect("segment just claimed");
			let n = seg.push_slice(src);
			debug_assert!(n > 0, "freshly claimed segment must accept at least one byte");
			self.byte_count += n;
			src = &src[n..];
		}
		self.compact();
	}

	pub(crate) fn push_segment(&mut self, seg: Segment) {
		self.byte_count += seg.len();
		self.segments.push_back(seg);
	}

	/// Moves `byte_count` bytes from `source`'s head to this buffer's tail,
	/// re-linking whole segments and splitting the boundary segment only
	/// when necessary. This is the crate's zero-copy workhorse: cross-buffer
	/// writes move segments, not bytes.
	pub fn move_from(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		if byte_count > source.byte_count {
			return Err(Error::eof());
		}
		let mut remaining = byte_count;
		while remaining > 0 {
			let seg_len = match source.segments.front() {
				Some(seg) => seg.len(),
				None => break,
			};
			if seg_len == 0 { break }
			if seg_len <= remaining {
				let seg = source.segments.pop_front().expect("front just checked");
				source.byte_count -= seg_len;
				self.push_segment(seg);
				remaining -= seg_len;
			} else {
				let mut front = source.segments.pop_front().expect("front just checked");
				let prefix = front.split_prefix(remaining, self.options.share_threshold, self.pool);
				source.byte_count -= remaining;
				source.segments.push_front(front);
				self.push_segment(prefix);
				remaining = 0;
			}
		}
		source.compact();
		self.compact();
		Ok(byte_count - remaining)
	}

	/// Copies (not moves) `byte_count` bytes starting at `offset` from this
	/// buffer into `sink`, aliasing segments instead of duplicating bytes.
	pub fn copy_to(&mut self, sink: &mut Buffer, offset: usize, byte_count: usize) -> Result {
		let end = offset.checked_add(byte_count).ok_or_else(Error::eof)?;
		if end > self.byte_count {
			return Err(Error::eof());
		}
		let mut remaining = byte_count;
		let mut pos = 0usize;
		let mut start = offset;
		for seg in self.segments.iter_mut() {
			if remaining == 0 { break }
			let seg_len = seg.len();
			if pos + seg_len <= start {
				pos += seg_len;
				continue;
			}
			let start_in_seg = start.saturating_sub(pos);
			let avail = seg_len - start_in_seg;
			let take = avail.min(remaining);
			if take > 0 {
				let shared = seg.share_range(start_in_seg, take);
				sink.push_segment(shared);
				remaining -= take;
			}
			pos += seg_len;
			start = pos;
		}
		sink.compact();
		Ok(())
	}

	/// Discards up to `byte_count` bytes from the head, returning the
	/// number actually discarded.
	pub fn skip(&mut self, byte_count: usize) -> usize {
		let mut remaining = byte_count;
		while remaining > 0 {
			let (n, emptied) = match self.segments.front_mut() {
				None => break,
				Some(seg) => {
					let n = seg.skip(remaining);
					(n, seg.is_empty())
				}
			};
			remaining -= n;
			self.byte_count -= n;
			if emptied {
				let seg = self.segments.pop_front().expect("front just checked");
				seg.recycle(self.pool);
			}
			if n == 0 { break }
		}
		byte_count - remaining
	}

	/// Discards every byte.
	pub fn clear(&mut self) {
		for seg in self.segments.drain(..) {
			seg.recycle(self.pool);
		}
		self.byte_count = 0;
	}

	/// Reads the byte at `index`, without consuming it. `O(size /
	/// block_size)`: segments are scanned linearly, this is not true random
	/// access.
	pub fn get(&self, index: usize) -> Result<u8> {
		if index >= self.byte_count {
			return Err(Error::eof());
		}
		let mut pos = 0usize;
		for seg in &self.segments {
			let len = seg.len();
			if index < pos + len {
				return Ok(seg.peek_byte(index - pos).expect("index within segment"));
			}
			pos += len;
		}
		unreachable!("index checked against byte_count above")
	}

	/// Searches for `byte` within `[from, to)`, head-relative, returning its
	/// absolute position. `to` defaults to [`Self::size`].
	pub fn index_of(&self, byte: u8, from: usize, to: Option<usize>) -> Option<usize> {
		let to = to.unwrap_or(self.byte_count).min(self.byte_count);
		if from >= to { return None }
		let mut pos = 0usize;
		for seg in &self.segments {
			let len = seg.len();
			let seg_start = pos;
			let seg_end = pos + len;
			pos += len;
			if seg_end <= from { continue }
			if seg_start >= to { break }
			let data = seg.data();
			let lo = from.saturating_sub(seg_start);
			let hi = (to - seg_start).min(len);
			if let Some(rel) = data[lo..hi].iter().position(|&b| b == byte) {
				return Some(seg_start + lo + rel);
			}
		}
		None
	}

	/// A non-destructive read cursor over this buffer's current contents.
	pub fn peek(&mut self) -> PeekReader {
		PeekReader::new(self)
	}

	/// Fills `dst` completely or fails with `Eof`, consuming whatever
	/// prefix was available either way.
	pub(crate) fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
		let n = self.read_into_slice(dst);
		if n == dst.len() { Ok(()) } else { Err(Error::eof()) }
	}

	pub(crate) fn read_into_slice(&mut self, dst: &mut [u8]) -> usize {
		let mut filled = 0;
		while filled < dst.len() {
			let (n, emptied) = match self.segments.front_mut() {
				None => break,
				Some(seg) => {
					let n = seg.read_into(&mut dst[filled..]);
					(n, seg.is_empty())
				}
			};
			filled += n;
			self.byte_count -= n;
			if emptied {
				let seg = self.segments.pop_front().expect("front just checked");
				seg.recycle(self.pool);
			} else if n == 0 {
				break;
			}
		}
		filled
	}

	/// Merges adjacent segments where the predecessor is owned, unshared,
	/// and has room for its successor's bytes, and drops now-empty leading
	/// segments. Keeps the segment count within
	/// `ceil(size / (block_size / 2)) + 1` (the crate's compaction bound).
	pub(crate) fn compact(&mut self) {
		let mut i = 0;
		while i + 1 < self.segments.len() {
			let can_merge = {
				let a = &self.segments[i];
				let b = &self.segments[i + 1];
				a.can_compact_with(b)
			};
			if can_merge {
				let mut b = self.segments.remove(i + 1).expect("index in range");
				let b_len = b.len();
				let moved = {
					let a = &mut self.segments[i];
					b.write_to(a, b_len)
				};
				debug_assert_eq!(moved, b_len, "compaction guarantees the successor fits whole");
				trace!("compacted {moved} bytes into segment {i}");
				if b.is_empty() {
					b.recycle(self.pool);
				} else {
					self.segments.insert(i + 1, b);
					i += 1;
				}
			} else {
				i += 1;
			}
		}
		while matches!(self.segments.front(), Some(s) if s.is_empty()) {
			let seg = self.segments.pop_front().expect("front just checked");
			seg.recycle(self.pool);
			trace!("recycled an emptied leading segment after compaction");
		}
	}
}

impl Drop for Buffer {
	fn drop(&mut self) {
		self.clear();
	}
}
