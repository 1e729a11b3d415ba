use criterion::{black_box, criterion_group, criterion_main, Criterion};
use relaynet::socket::{BoxedSocket, Connection, ConnectionPool};
use std::time::Duration;

/// Put/get cycles against a pool holding idle connections to many hosts.
/// Everything stays in memory; the channels are unconnected duplex pipes.
fn benchmark_pool_operations(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();

    let pool = ConnectionPool::new(Duration::from_secs(60));
    let mut peers = Vec::new();
    for i in 0..64 {
        let (client, server) = tokio::io::duplex(64);
        peers.push(server);
        pool.put(Connection::with_channel(
            format!("host{i}.test"),
            80,
            false,
            BoxedSocket::new(client),
        ));
    }

    c.bench_function("pool_get_put", |b| {
        b.iter(|| {
            let conn = pool.get(black_box("host63.test"), 80).unwrap();
            pool.put(conn);
        })
    });

    c.bench_function("pool_miss", |b| {
        b.iter(|| black_box(pool.get(black_box("absent.test"), 80)))
    });

    c.bench_function("pool_idle_count", |b| b.iter(|| black_box(pool.idle_count())));
    drop(peers);
}

criterion_group!(benches, benchmark_pool_operations);
criterion_main!(benches);
