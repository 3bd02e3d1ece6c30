#![cfg(feature = "memory-store")]

use rs_session_role::{BatchVerifier, MemoryStore, NoCache, Profile, ResolverBuilder, UserId};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

const REPEATS: usize = 5;

async fn benchmark_async<F, Fut>(name: &str, iterations: usize, mut op: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        for _ in 0..iterations {
            op().await;
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / iterations as f64;
    let ops_per_sec = iterations as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (iters={iterations}, repeats={REPEATS})"
    );
}

fn setup_roster(size: usize) -> (MemoryStore, Vec<UserId>) {
    let store = MemoryStore::new();
    let users: Vec<UserId> = (0..size)
        .map(|i| UserId::try_from(format!("user_{i}").as_str()).unwrap())
        .collect();
    for (i, user) in users.iter().enumerate() {
        let role = if i % 10 == 0 { "therapist" } else { "client" };
        store.set_profile(user.clone(), Profile::with_role(role));
    }
    (store, users)
}

#[tokio::test]
#[ignore = "manual performance test; run with --ignored --nocapture"]
async fn perf_resolve_and_batch() {
    let iterations = 200_000;

    let (store, users) = setup_roster(1);
    let user = users[0].clone();
    let resolver = ResolverBuilder::new(store.clone()).cache(NoCache).build();
    benchmark_async("resolve_no_cache", iterations, || {
        let resolver = &resolver;
        let user = &user;
        async move {
            black_box(resolver.resolve(user, false).await.unwrap());
        }
    })
    .await;

    let resolver = ResolverBuilder::new(store).build();
    resolver.resolve(&user, false).await.unwrap();
    benchmark_async("resolve_hot_cache", iterations, || {
        let resolver = &resolver;
        let user = &user;
        async move {
            black_box(resolver.resolve(user, false).await.unwrap());
        }
    })
    .await;

    let (store, users) = setup_roster(500);
    let batch = BatchVerifier::new(Arc::new(ResolverBuilder::new(store).build()));
    benchmark_async("batch_verify_500_warm", 200, || {
        let batch = &batch;
        let users = users.clone();
        async move {
            black_box(batch.batch_verify(users).await);
        }
    })
    .await;
}
