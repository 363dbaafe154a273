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

//! Segments: bounded, possibly-shared views over a pooled [`Block`](crate::pool::Block).
//!
//! A segment tracks `pos`/`limit` within its block (`0 <= pos <= limit <=
//! DEFAULT_BLOCK_SIZE`). Sharedness isn't stored — it's `Arc::strong_count(&self.block)
//! > 1`, computed fresh at every call, the same way the teacher's `Memory::is_shared`
//! reads `Rc::strong_count`. That makes it self-correcting: once every other alias of
//! a block is dropped, the remaining segment is sole owner again and can append or
//! compact, with no flag left stuck from a share that's long gone. Mutation (appending,
//! clearing, forking) goes through `Arc::get_mut`, which only succeeds while a segment
//! is the block's sole owner — the compiler enforces the "shared segments are
//! copy-on-write" rule for us, no unsafe required.

use std::sync::Arc;
use all_asserts::assert_le;
use crate::pool::{Block, SegmentPool};
use crate::DEFAULT_BLOCK_SIZE;

pub(crate) struct Segment {
	block: Arc<Block>,
	pos: usize,
	limit: usize,
}

impl Segment {
	/// Claims a fresh, empty, owned segment from `pool`.
	pub(crate) fn claim(pool: &SegmentPool) -> Self {
		Self {
			block: pool.take(),
			pos: 0,
			limit: 0,
		}
	}

	pub(crate) fn recycle(self, pool: &SegmentPool) {
		pool.recycle(self.block);
	}

	pub(crate) fn len(&self) -> usize { self.limit - self.pos }
	pub(crate) fn is_empty(&self) -> bool { self.pos == self.limit }
	/// Bytes that can still be appended, if this segment owns its block.
	pub(crate) fn write_capacity(&self) -> usize {
		if self.is_owner() { DEFAULT_BLOCK_SIZE - self.limit } else { 0 }
	}
	/// `true` iff another segment currently aliases this block.
	pub(crate) fn is_shared(&self) -> bool { Arc::strong_count(&self.block) > 1 }
	/// `true` iff this segment is the block's sole reference, and so may
	/// mutate it (append, or serve as a compaction predecessor).
	pub(crate) fn is_owner(&self) -> bool { Arc::strong_count(&self.block) == 1 }

	/// The readable range of this segment.
	pub(crate) fn data(&self) -> &[u8] {
		&self.block.bytes[self.pos..self.limit]
	}

	/// Copies bytes from the head of this segment into `dst`, consuming
	/// them. Returns the number of bytes copied. Never requires exclusive
	/// block access: reading only advances `pos`.
	pub(crate) fn read_into(&mut self, dst: &mut [u8]) -> usize {
		let n = dst.len().min(self.len());
		dst[..n].copy_from_slice(&self.block.bytes[self.pos..self.pos + n]);
		self.pos += n;
		n
	}

	/// Discards up to `n` bytes from the head, returning the number
	/// discarded.
	pub(crate) fn skip(&mut self, n: usize) -> usize {
		let n = n.min(self.len());
		self.pos += n;
		n
	}

	/// Returns a single byte without consuming it.
	pub(crate) fn peek_byte(&self, offset: usize) -> Option<u8> {
		self.block.bytes.get(self.pos + offset).copied()
	}

	pub(crate) fn pop_front(&mut self) -> Option<u8> {
		if self.is_empty() { return None }
		let byte = self.block.bytes[self.pos];
		self.pos += 1;
		Some(byte)
	}

	/// Appends as much of `src` as fits, returning the number of bytes
	/// written. Only valid on an owned, unshared segment.
	pub(crate) fn push_slice(&mut self, src: &[u8]) -> usize {
		if !self.is_owner() { return 0 }
		let n = src.len().min(DEFAULT_BLOCK_SIZE - self.limit);
		if n == 0 { return 0 }
		let block = Arc::get_mut(&mut self.block)
			.expect("owned, unshared segment must have sole access to its block");
		block.bytes[self.limit..self.limit + n].copy_from_slice(&src[..n]);
		self.limit += n;
		n
	}

	pub(crate) fn push_byte(&mut self, byte: u8) -> bool {
		self.push_slice(&[byte]) == 1
	}

	/// Produces a new segment aliasing the same block, covering `len` bytes
	/// starting `start` bytes into this segment's readable range. Both this
	/// and the returned segment report `is_shared()` for as long as the
	/// alias lives — that's a live `Arc::strong_count` check, not a flag, so
	/// it stops once the alias is dropped. Does not advance `self`'s own
	/// range — callers that copy rather than move rely on that.
	pub(crate) fn share_range(&mut self, start: usize, len: usize) -> Self {
		assert_le!(start + len, self.len());
		Self {
			block: Arc::clone(&self.block),
			pos: self.pos + start,
			limit: self.pos + start + len,
		}
	}

	/// Produces a new segment aliasing the same block, covering at most
	/// `byte_count` bytes from this segment's head, and advances past them so
	/// `self` becomes the disjoint remainder. Both segments alias the same
	/// block for as long as the other lives.
	fn share(&mut self, byte_count: usize) -> Self {
		let len = byte_count.min(self.len());
		let prefix = self.share_range(0, len);
		self.pos += len;
		prefix
	}

	/// Copies `byte_count` bytes into a brand-new owned segment, taken from
	/// `pool`, consuming them from this segment.
	fn copy_prefix(&mut self, byte_count: usize, pool: &SegmentPool) -> Self {
		let mut fresh = Segment::claim(pool);
		let n = byte_count.min(self.len());
		let copied = fresh.push_slice(&self.block.bytes[self.pos..self.pos + n]);
		debug_assert_eq!(copied, n);
		self.pos += n;
		fresh
	}

	/// Splits off a prefix of `byte_count` bytes (the "head") from this
	/// segment (the "tail", mutated in place to the remainder). Large
	/// prefixes (`>= share_threshold`) alias the same block, zero-copy;
	/// small ones are memcpy'd into a freshly claimed segment. This is the
	/// core zero-copy primitive: moving a large span between buffers costs
	/// an `Arc::clone`, not a byte-for-byte copy.
	pub(crate) fn split_prefix(
		&mut self,
		byte_count: usize,
		share_threshold: usize,
		pool: &SegmentPool,
	) -> Self {
		debug_assert!(byte_count <= self.len());
		if byte_count >= share_threshold {
			self.share(byte_count)
		} else {
			self.copy_prefix(byte_count, pool)
		}
	}

	/// Copies bytes from this segment's head into `target`'s tail. Both
	/// segments must be non-shared (the caller is expected to have already
	/// forked/split as needed). Returns the number of bytes moved.
	pub(crate) fn write_to(&mut self, target: &mut Segment, byte_count: usize) -> usize {
		debug_assert!(!self.is_shared() && !target.is_shared());
		let n = byte_count.min(self.len()).min(target.write_capacity());
		if n == 0 { return 0 }
		let n = target.push_slice(&self.block.bytes[self.pos..self.pos + n]);
		self.pos += n;
		n
	}

	/// `true` if `self` (the predecessor in queue order) and `other` (its
	/// successor) together fit in one block and `self` can absorb `other`'s
	/// bytes without copying into a fresh allocation.
	pub(crate) fn can_compact_with(&self, other: &Segment) -> bool {
		self.is_owner() && self.len() + other.len() <= DEFAULT_BLOCK_SIZE
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pool() -> SegmentPool { SegmentPool::default() }

	#[test]
	fn fresh_segment_is_empty_and_owned() {
		let pool = pool();
		let seg = Segment::claim(&pool);
		assert!(seg.is_empty());
		assert!(seg.is_owner());
		assert!(!seg.is_shared());
		assert_eq!(seg.write_capacity(), DEFAULT_BLOCK_SIZE);
	}

	#[test]
	fn push_then_read_round_trips() {
		let pool = pool();
		let mut seg = Segment::claim(&pool);
		assert_eq!(seg.push_slice(b"hello"), 5);
		assert_eq!(seg.len(), 5);
		let mut buf = [0u8; 5];
		assert_eq!(seg.read_into(&mut buf), 5);
		assert_eq!(&buf, b"hello");
		assert!(seg.is_empty());
	}

	#[test]
	fn small_split_copies_into_fresh_segment() {
		let pool = pool();
		let mut seg = Segment::claim(&pool);
		seg.push_slice(b"0123456789");
		let prefix = seg.split_prefix(4, 1024, &pool);
		assert_eq!(prefix.data(), b"0123");
		assert_eq!(seg.data(), b"456789");
		assert!(!prefix.is_shared());
		assert!(!seg.is_shared(), "below-threshold split shouldn't alias");
	}

	#[test]
	fn large_split_shares_the_block() {
		let pool = pool();
		let mut seg = Segment::claim(&pool);
		let data = vec![7u8; 2048];
		seg.push_slice(&data);
		let prefix = seg.split_prefix(2000, 1024, &pool);
		assert_eq!(prefix.len(), 2000);
		assert_eq!(seg.len(), 48);
		assert!(prefix.is_shared());
		assert!(seg.is_shared());
		assert!(!seg.is_owner());
	}

	#[test]
	fn shared_segment_cannot_be_written() {
		let pool = pool();
		let mut seg = Segment::claim(&pool);
		seg.push_slice(&[1; 2048]);
		let mut prefix = seg.split_prefix(1200, 1024, &pool);
		assert_eq!(prefix.push_slice(b"x"), 0);
		assert_eq!(seg.push_slice(b"x"), 0);
	}

	#[test]
	fn sharedness_clears_once_the_alias_is_dropped() {
		let pool = pool();
		let mut seg = Segment::claim(&pool);
		seg.push_slice(&[9; 2048]);
		let alias = seg.share_range(0, seg.len());
		assert!(seg.is_shared());
		assert!(!seg.is_owner());
		drop(alias);
		assert!(!seg.is_shared(), "dropping the only alias should un-share the block");
		assert!(seg.is_owner());
		assert_eq!(seg.push_slice(b"more"), 4, "segment should accept writes again");
	}

	#[test]
	fn compaction_candidate_detection() {
		let pool = pool();
		let mut a = Segment::claim(&pool);
		a.push_slice(b"abc");
		let mut b = Segment::claim(&pool);
		b.push_slice(b"def");
		assert!(a.can_compact_with(&b));
		let n = b.write_to(&mut a, b.len());
		assert_eq!(n, 3);
		assert_eq!(a.data(), b"abcdef");
	}
}
