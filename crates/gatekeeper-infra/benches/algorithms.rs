//! Decision-path benchmarks over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use gatekeeper_core::domain::LimitConfig;
use gatekeeper_core::ports::{RateLimiter, SystemClock};
use gatekeeper_infra::store::MemoryStore;
use gatekeeper_infra::{FixedWindowCounter, SlidingWindowCounter, TokenBucket};

/// A budget large enough that the benchmark never runs dry.
fn config() -> LimitConfig {
    LimitConfig::new(1_000_000_000, Duration::from_secs(1), 0)
}

fn bench_algorithms(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let clock = Arc::new(SystemClock);

    let limiters: Vec<(&str, Arc<dyn RateLimiter>)> = rt.block_on(async {
        let store = Arc::new(MemoryStore::new(clock.clone()));
        vec![
            (
                "token_bucket",
                Arc::new(TokenBucket::new(store.clone(), clock.clone(), &config()))
                    as Arc<dyn RateLimiter>,
            ),
            (
                "sliding_window",
                Arc::new(SlidingWindowCounter::new(
                    store.clone(),
                    clock.clone(),
                    &config(),
                )),
            ),
            (
                "fixed_window",
                Arc::new(FixedWindowCounter::new(store, clock.clone(), &config())),
            ),
        ]
    });

    let mut group = c.benchmark_group("allow");
    for (name, limiter) in &limiters {
        let limiter = limiter.clone();
        group.bench_function(*name, |b| {
            b.to_async(&rt).iter(|| {
                let limiter = limiter.clone();
                async move {
                    limiter.allow("bench:key").await.expect("decision");
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_algorithms);
criterion_main!(benches);
