// SPDX-License-Identifier: Apache-2.0

//! Benchmarks the block recycling [`SegmentPool`] provides, exercised
//! indirectly through [`Buffer`] (the pool's `take`/`recycle` themselves are
//! crate-private; every buffer allocation and drop round-trips through them).

use criterion::{black_box, BatchSize, Criterion, criterion_group, criterion_main};
use estuary::{Buffer, PoolOptions, SegmentPool, DEFAULT_BLOCK_SIZE};

fn alloc_and_drop_one_block(c: &mut Criterion) {
	c.bench_function("claim_and_recycle_one_block", |b| b.iter(|| {
		let mut buf = Buffer::new();
		buf.write_slice(black_box(&[0u8; DEFAULT_BLOCK_SIZE]));
		drop(buf);
	}));
}

fn repeated_claim_recycle_cycles(c: &mut Criterion) {
	c.bench_function("1000_claim_recycle_cycles", |b| b.iter(|| {
		for _ in 0..1000 {
			let mut buf = Buffer::new();
			buf.write_slice(black_box(b"x"));
			buf.clear();
		}
	}));
}

fn contended_shared_pool(c: &mut Criterion) {
	c.bench_function("available_parallelism_threads_against_the_shared_pool", |b| b.iter_batched(
		|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
		|threads| {
			std::thread::scope(|scope| {
				for _ in 0..threads {
					scope.spawn(|| {
						for _ in 0..200 {
							let mut buf = Buffer::new();
							buf.write_slice(&[1u8; DEFAULT_BLOCK_SIZE]);
						}
					});
				}
			});
		},
		BatchSize::SmallInput,
	));
}

fn dedicated_pool_with_a_tight_cap(c: &mut Criterion) {
	// Buffer::with_pool needs a `&'static SegmentPool`; leaking one is the
	// ordinary way to get that for the life of the process in a benchmark.
	let pool: &'static SegmentPool = Box::leak(Box::new(
		SegmentPool::new(PoolOptions::default().set_shard_count(1).set_shard_block_cap(2)),
	));
	c.bench_function("small_cap_pool_churn", |b| b.iter(|| {
		for _ in 0..100 {
			let mut buf = Buffer::with_pool(pool);
			buf.write_slice(black_box(b"y"));
		}
	}));
}

criterion_group!(
	pool,
	alloc_and_drop_one_block,
	repeated_claim_recycle_cycles,
	contended_shared_pool,
	dedicated_pool_with_a_tight_cap,
);
criterion_main!(pool);
