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

//! ## How it works
//!
//! Bytes live in reusable, fixed-size chunks of memory called *blocks*. A
//! [`Buffer`] holds an ordered queue of *segments*, each a bounded view over
//! one block. When a segment empties, its block is returned to a
//! [`SegmentPool`](pool::SegmentPool) instead of being freed; claiming a
//! segment first tries to reuse a pooled block before allocating a fresh
//! one.
//!
//! ### Segments
//!
//! Moving bytes between buffers — the common case for relaying data from a
//! source to a sink — re-links whole segments rather than copying their
//! bytes. Splitting a segment at a boundary that doesn't land on a segment
//! edge either aliases the underlying block (for spans at or above the
//! buffer's `share_threshold`) or copies the small remainder into a fresh
//! segment, whichever is cheaper. Aliased blocks are copy-on-write: writing
//! to a shared segment is never allowed directly, only after every other
//! reference to its block has been dropped.
//!
//! Small, fragmented segments are merged back together opportunistically so
//! a buffer with many small writes doesn't end up holding far more segments
//! than its byte count would otherwise need.
//!
//! ### Cancellation
//!
//! Every blocking call — reading from or writing to a transport, waiting on
//! a [`pipe`] — checks [`cancel::throw_if_reached`] before doing any actual
//! work. A [`cancel::CancelScope`] opened on the current thread establishes
//! a timeout or deadline (or explicitly cancels) for every blocking call
//! made while it's in scope, nested scopes intersecting with their parents.
//!
//! ### Scope
//!
//! This crate provides the in-memory core only: segment pooling, the
//! buffer, the raw reader/writer contracts, buffered wrappers, an in-memory
//! pipe, and cooperative cancellation. Concrete transports (files, sockets),
//! codecs (compression, hashing, text encodings beyond UTF-8), and an
//! immutable byte-string value type are left to other crates built on top.

mod buffer;
mod buffered;
mod cancel;
mod error;
mod pipe;
mod pool;
mod raw;
mod segment;

/// The size, in bytes, of every block a [`pool::SegmentPool`] hands out.
/// Segments never span more than one block, so this is also the largest
/// contiguous run a single segment can hold.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

pub use buffer::{Buffer, BufferOptions, PeekReader};
pub use buffered::{BufferedReader, BufferedWriter};
pub use cancel::{interrupt_current_thread, remaining_timeout, throw_if_reached, CancelHandle, CancelScope};
pub use error::{Error, ErrorKind, Result};
pub use pipe::{pipe, PipeSink, PipeSource};
pub use pool::{PoolOptions, SegmentPool};
pub use raw::{IoReader, IoWriter, RawReader, RawWriter};
