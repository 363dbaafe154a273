// SPDX-License-Identifier: Apache-2.0

//! Black-box tests over [`CancelScope`]: nesting, timeouts, shielding.

use std::time::{Duration, Instant};
use estuary::{remaining_timeout, throw_if_reached, CancelScope, ErrorKind};
use pretty_assertions::assert_eq;

#[test]
fn s5_timeout_fires_within_tolerance() {
	let scope = CancelScope::with_timeout(Duration::from_millis(100));
	let started = Instant::now();
	loop {
		if let Err(e) = throw_if_reached() {
			assert_eq!(e.kind(), ErrorKind::Timeout);
			break;
		}
		if started.elapsed() > Duration::from_millis(500) {
			panic!("timeout never fired");
		}
		std::thread::sleep(Duration::from_millis(5));
	}
	let elapsed = started.elapsed();
	assert!(elapsed >= Duration::from_millis(50), "{elapsed:?} fired too early");
	assert!(elapsed <= Duration::from_millis(400), "{elapsed:?} fired too late");
	drop(scope);
}

#[test]
fn no_open_scope_never_throws() {
	assert!(throw_if_reached().is_ok());
}

#[test]
fn explicit_cancel_is_observed_immediately() {
	let scope = CancelScope::new();
	assert!(throw_if_reached().is_ok());
	scope.cancel();
	assert_eq!(throw_if_reached().unwrap_err().kind(), ErrorKind::Cancelled);
}

#[test]
fn shield_hides_outer_cancellation() {
	let outer = CancelScope::new();
	outer.cancel();
	assert_eq!(throw_if_reached().unwrap_err().kind(), ErrorKind::Cancelled);
	let inner = CancelScope::shield();
	assert!(throw_if_reached().is_ok());
	drop(inner);
	assert_eq!(throw_if_reached().unwrap_err().kind(), ErrorKind::Cancelled);
}

#[test]
fn scope_pops_cleanly_on_drop_even_across_a_panic() {
	let result = std::panic::catch_unwind(|| {
		let _scope = CancelScope::with_timeout(Duration::from_millis(0));
		panic!("boom");
	});
	assert!(result.is_err());
	std::thread::sleep(Duration::from_millis(5));
	// The expired scope was popped when its stack frame unwound.
	assert!(throw_if_reached().is_ok());
}

#[test]
fn s6_nested_scopes_intersect_to_the_tighter_bound() {
	let _outer = CancelScope::with_timeout(Duration::from_millis(500));
	let outer_remaining = remaining_timeout().unwrap();
	assert!(outer_remaining <= Duration::from_millis(500));
	assert!(outer_remaining > Duration::from_millis(400));

	{
		let _inner = CancelScope::with_timeout(Duration::from_millis(100));
		let inner_remaining = remaining_timeout().unwrap();
		assert!(inner_remaining <= Duration::from_millis(100));
	}

	// The inner scope popped; the outer bound is back in effect.
	let outer_remaining_again = remaining_timeout().unwrap();
	assert!(outer_remaining_again > Duration::from_millis(100));
}

#[test]
fn cancel_handle_lets_another_thread_cancel_a_wait() {
	// The scope stays on this thread (its stack slot lives in this thread's
	// thread-local); a `CancelHandle` is the Send-safe way for another
	// thread to reach in and cancel it.
	let scope = CancelScope::new();
	let handle = scope.token();
	let canceller = std::thread::spawn(move || {
		std::thread::sleep(Duration::from_millis(20));
		handle.cancel();
	});

	let result = scope.wait_for_signal();
	canceller.join().unwrap();
	assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
}
