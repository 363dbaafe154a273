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

//! Cooperative cancellation. A thread pushes [`CancelScope`]s onto a stack as
//! it enters nested blocking regions; every blocking operation in the crate
//! calls [`throw_if_reached`] before and after doing any actual work, so a
//! timeout, deadline, or explicit cancellation is observed promptly without
//! the target thread being interrupted from outside.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::error::{Error, Result};

/// A single entry in a thread's cancellation stack: a timeout/deadline pair
/// plus `cancelled`/`shielded` flags, combined with its parent scope by
/// [`CancelToken::effective`].
#[derive(Clone)]
struct CancelToken {
	timeout: Option<Duration>,
	deadline: Option<Instant>,
	started: Instant,
	cancelled: Arc<AtomicBool>,
	shielded: bool,
}

use std::sync::Arc;

impl CancelToken {
	/// The deadline this token enforces, accounting for its own timeout.
	fn own_deadline(&self) -> Option<Instant> {
		let from_timeout = self.timeout.map(|t| self.started + t);
		match (from_timeout, self.deadline) {
			(Some(a), Some(b)) => Some(a.min(b)),
			(a, b) => a.or(b),
		}
	}
}

thread_local! {
	static STACK: RefCell<Vec<CancelToken>> = RefCell::new(Vec::new());
	static INTERRUPTED: Cell<bool> = Cell::new(false);
}

/// A handle used to cancel or inspect a [`CancelScope`] from outside the
/// thread that opened it — e.g. another thread deciding a request timed out.
#[derive(Clone)]
pub struct CancelHandle {
	cancelled: Arc<AtomicBool>,
	signal: Arc<(Mutex<()>, Condvar)>,
}

impl CancelHandle {
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
		debug!("scope cancelled from a CancelHandle");
		let (lock, cvar) = &*self.signal;
		let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
		cvar.notify_all();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}
}

/// An RAII guard opened on the current thread's cancellation stack. Pushes
/// its token on construction, pops it on drop, regardless of unwinding.
///
/// Nested scopes intersect: the effective timeout is the minimum of every
/// enclosing scope's timeout, and the effective deadline the earliest of
/// every enclosing scope's deadline. A [`Self::shield`]ed scope is immune to
/// its parents' cancellation and deadlines, but still honors its own.
pub struct CancelScope {
	signal: Arc<(Mutex<()>, Condvar)>,
	depth: usize,
}

impl CancelScope {
	/// Opens a scope with no timeout, deadline, or shielding — a no-op
	/// boundary useful only for grouping.
	pub fn new() -> Self {
		Self::push(CancelToken {
			timeout: None,
			deadline: None,
			started: Instant::now(),
			cancelled: Arc::new(AtomicBool::new(false)),
			shielded: false,
		})
	}

	/// Opens a scope that expires `timeout` from now, intersected with any
	/// enclosing scope's remaining time.
	pub fn with_timeout(timeout: Duration) -> Self {
		Self::push(CancelToken {
			timeout: Some(timeout),
			deadline: None,
			started: Instant::now(),
			cancelled: Arc::new(AtomicBool::new(false)),
			shielded: false,
		})
	}

	/// Opens a scope that expires at an absolute `deadline`.
	pub fn with_deadline(deadline: Instant) -> Self {
		Self::push(CancelToken {
			timeout: None,
			deadline: Some(deadline),
			started: Instant::now(),
			cancelled: Arc::new(AtomicBool::new(false)),
			shielded: false,
		})
	}

	/// Opens a scope immune to every enclosing scope's cancellation and
	/// deadlines. Its own timeout/deadline, if any, still applies.
	pub fn shield() -> Self {
		Self::push(CancelToken {
			timeout: None,
			deadline: None,
			started: Instant::now(),
			cancelled: Arc::new(AtomicBool::new(false)),
			shielded: true,
		})
	}

	fn push(token: CancelToken) -> Self {
		let signal = Arc::new((Mutex::new(()), Condvar::new()));
		let shielded = token.shielded;
		let depth = STACK.with(|stack| {
			let mut stack = stack.borrow_mut();
			stack.push(token);
			stack.len()
		});
		trace!("entered cancel scope at depth {depth} (shielded: {shielded})");
		Self { signal, depth }
	}

	/// A handle that lets another thread cancel this scope.
	pub fn token(&self) -> CancelHandle {
		let cancelled = STACK.with(|stack| {
			stack.borrow()[self.depth - 1].cancelled.clone()
		});
		CancelHandle { cancelled, signal: self.signal.clone() }
	}

	/// Cancels this scope (and everything nested inside it) immediately.
	pub fn cancel(&self) {
		STACK.with(|stack| {
			stack.borrow()[self.depth - 1].cancelled.store(true, Ordering::SeqCst);
		});
		debug!("cancel scope at depth {} cancelled", self.depth);
		let (lock, cvar) = &*self.signal;
		let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
		cvar.notify_all();
	}

	/// Blocks the current thread until either `signal` is notified or this
	/// scope's effective deadline/cancellation is reached, whichever comes
	/// first.
	pub fn wait_for_signal(&self) -> Result {
		throw_if_reached()?;
		let (lock, cvar) = &*self.signal;
		let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
		let deadline = effective_deadline();
		let _unused = match deadline {
			Some(d) => {
				let timeout = d.saturating_duration_since(Instant::now());
				let (_guard, timed_out) = cvar
					.wait_timeout(guard, timeout)
					.unwrap_or_else(|e| e.into_inner());
				if timed_out.timed_out() && !is_cancelled() {
					return Err(Error::timeout_condition());
				}
			}
			None => {
				let _guard = cvar.wait(guard).unwrap_or_else(|e| e.into_inner());
			}
		};
		throw_if_reached()
	}
}

impl Default for CancelScope {
	fn default() -> Self { Self::new() }
}

impl Drop for CancelScope {
	fn drop(&mut self) {
		STACK.with(|stack| {
			stack.borrow_mut().pop();
		});
		trace!("exited cancel scope at depth {}", self.depth);
	}
}

/// Marks the current thread as interrupted; the next [`throw_if_reached`]
/// call (on this thread) returns `Interrupted`. Mirrors cooperative
/// interruption conventions from threaded runtimes that have no true
/// async-signal-safe cancellation.
pub fn interrupt_current_thread() {
	INTERRUPTED.with(|flag| flag.set(true));
	debug!("current thread marked interrupted");
}

/// `true` if the current thread's scope stack has been cancelled, stopping
/// the walk at the first shielded scope.
fn is_cancelled() -> bool {
	STACK.with(|stack| {
		let stack = stack.borrow();
		for token in stack.iter().rev() {
			if token.cancelled.load(Ordering::SeqCst) {
				return true;
			}
			if token.shielded {
				break;
			}
		}
		false
	})
}

/// The time remaining before the current thread's nearest enforceable
/// deadline elapses, if any — the effective intersection of every enclosing
/// [`CancelScope`]'s timeout and deadline (invariant 6: nesting only ever
/// tightens the bound, never loosens it).
pub fn remaining_timeout() -> Option<Duration> {
	effective_deadline().map(|d| d.saturating_duration_since(Instant::now()))
}

/// The nearest deadline enforceable from the current thread's scope stack,
/// stopping the walk at the first shielded scope (a shield blocks its
/// parents' deadlines from propagating inward, but not its own).
fn effective_deadline() -> Option<Instant> {
	STACK.with(|stack| {
		let stack = stack.borrow();
		let mut nearest: Option<Instant> = None;
		for token in stack.iter().rev() {
			if let Some(d) = token.own_deadline() {
				nearest = Some(nearest.map_or(d, |n| n.min(d)));
			}
			if token.shielded {
				break;
			}
		}
		nearest
	})
}

/// Checked at every blocking-operation boundary. Returns, in priority order:
/// `Interrupted` if the current thread was interrupted, `Cancelled` if any
/// enclosing (non-shielded-over) scope was cancelled, `Timeout` if the
/// nearest enforceable deadline has elapsed. Otherwise `Ok(())`.
pub fn throw_if_reached() -> Result {
	if INTERRUPTED.with(|flag| flag.get()) {
		trace!("throw_if_reached: current thread is interrupted");
		return Err(Error::interrupted());
	}
	if is_cancelled() {
		trace!("throw_if_reached: scope stack is cancelled");
		return Err(Error::cancelled());
	}
	if let Some(deadline) = effective_deadline() {
		if Instant::now() >= deadline {
			trace!("throw_if_reached: effective deadline elapsed");
			return Err(Error::timeout());
		}
	}
	Ok(())
}
