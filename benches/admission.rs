use chrono::Duration;
use commsd::auth::jwt::TokenAuthority;
use commsd::auth::rate_limit::RateLimiter;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};

// Benchmarks for the two hot admission-path primitives: every request pays
// for one limiter check, and every authenticated request for one token
// validation.

fn rate_limiter_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limiter");
    group.throughput(Throughput::Elements(1));

    // High rate so the bucket never empties; we measure bookkeeping, not
    // denials.
    let limiter = RateLimiter::new(u32::MAX / 4, std::time::Duration::from_secs(1));

    group.bench_function("allow_hot_key", |b| {
        b.iter(|| limiter.allow("198.51.100.7"))
    });

    let spread = RateLimiter::new(u32::MAX / 4, std::time::Duration::from_secs(1));
    let keys: Vec<String> = (0..1024).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
    let mut next = 0usize;
    group.bench_function("allow_spread_keys", |b| {
        b.iter(|| {
            next = (next + 1) % keys.len();
            spread.allow(&keys[next])
        })
    });

    group.finish();
}

fn token_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokens");
    group.throughput(Throughput::Elements(1));

    let authority = TokenAuthority::new(
        b"bench-secret-0123456789abcdefgh",
        "commcomms",
        "commcomms-api",
        Duration::minutes(15),
        Duration::days(7),
    );

    group.bench_function("issue_access", |b| {
        b.iter(|| authority.issue_access("bench-user").unwrap())
    });

    let token = authority.issue_access("bench-user").unwrap();
    group.bench_function("validate_access", |b| {
        b.iter(|| authority.validate_access(&token).unwrap())
    });

    group.finish();
}

criterion_group!(benches, rate_limiter_benchmark, token_benchmark);
criterion_main!(benches);
