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

//! A single error type for the whole crate, in the shape of the teacher's
//! `error.rs`: a small `kind` enum plus an optional boxed cause.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use thiserror::Error as ThisError;

/// The kind of failure that occurred, independent of its message or cause.
#[derive(Copy, Clone, Eq, PartialEq, Debug, ThisError)]
pub enum ErrorKind {
	#[error("IO error")]
	Io,
	#[error("source exhausted prematurely")]
	Eof,
	#[error("current thread is interrupted")]
	Interrupted,
	#[error("timeout")]
	Timeout,
	#[error("cancelled")]
	Cancelled,
	#[error("invalid argument")]
	Argument,
	#[error("invalid number format")]
	NumberFormat,
	#[error("invalid character encoding")]
	CharacterCoding,
	#[error("invalid operation on closed stream")]
	Closed,
}

/// The crate's error type: a [`ErrorKind`] with an optional message override
/// and an optional underlying cause.
#[derive(Debug)]
pub struct Error {
	kind: ErrorKind,
	message: Option<String>,
	source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.message {
			Some(message) => f.write_str(message),
			None => fmt::Display::fmt(&self.kind, f),
		}
	}
}

impl StdError for Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
	}
}

pub type Result<T = ()> = std::result::Result<T, Error>;

impl Error {
	pub fn new(kind: ErrorKind) -> Self {
		Self { kind, message: None, source: None }
	}

	pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self { kind, message: Some(message.into()), source: None }
	}

	pub fn with_source(
		kind: ErrorKind,
		source: impl StdError + Send + Sync + 'static,
	) -> Self {
		Self { kind, message: None, source: Some(Box::new(source)) }
	}

	/// Returns the kind of this error.
	pub fn kind(&self) -> ErrorKind { self.kind }

	pub(crate) fn io(source: io::Error) -> Self {
		if source.kind() == io::ErrorKind::UnexpectedEof {
			Self::new(ErrorKind::Eof)
		} else {
			Self::with_source(ErrorKind::Io, source)
		}
	}

	pub(crate) fn eof() -> Self { Self::new(ErrorKind::Eof) }

	pub(crate) fn closed() -> Self { Self::new(ErrorKind::Closed) }

	pub(crate) fn cancelled() -> Self { Self::new(ErrorKind::Cancelled) }

	pub(crate) fn timeout() -> Self {
		Self::with_message(ErrorKind::Timeout, "timeout")
	}

	pub(crate) fn timeout_condition() -> Self {
		Self::with_message(
			ErrorKind::Timeout,
			"timeout or deadline elapsed before the condition was signalled",
		)
	}

	pub(crate) fn interrupted() -> Self {
		Self::with_message(ErrorKind::Interrupted, "current thread is interrupted")
	}

	/// Attaches `source` as this error's cause, unless one is already set —
	/// used to chain a second failure (e.g. from `close` after `flush`) onto
	/// the first without discarding either.
	pub(crate) fn attach_source(mut self, source: Error) -> Self {
		if self.source.is_none() {
			self.source = Some(Box::new(source));
		}
		self
	}
}

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self { Error::io(value) }
}

impl From<Error> for io::Error {
	fn from(value: Error) -> Self {
		match value.kind {
			ErrorKind::Eof => io::Error::new(io::ErrorKind::UnexpectedEof, value),
			_ => io::Error::other(value),
		}
	}
}
