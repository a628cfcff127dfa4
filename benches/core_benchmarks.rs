use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use qkforge::config::{ChannelConfig, HierarchyConfig, QberConfig, SessionConfig};
use qkforge::hierarchy::KeyHierarchy;
use qkforge::hybrid::{derive_session_key, Provenance, SharedSecret};
use qkforge::protocol::establish_session;
use qkforge::provider::ProviderChain;
use qkforge::qkd::{CancelToken, QkdChannel};

fn bench_bb84_run(c: &mut Criterion) {
    let channel = QkdChannel::new(ChannelConfig::new(4096, false, 42)).unwrap();
    let cancel = CancelToken::new();
    c.bench_function("bb84_run_4096", |b| {
        b.iter(|| black_box(channel.run(&cancel).unwrap()))
    });
}

fn bench_hybrid_derivation(c: &mut Criterion) {
    let classical = SharedSecret::new(Provenance::Classical, vec![1u8; 32]);
    let post_quantum = SharedSecret::new(Provenance::PostQuantum, vec![2u8; 32]);
    let qkd = SharedSecret::new(Provenance::Qkd, vec![3u8; 64]);
    c.bench_function("derive_session_key", |b| {
        b.iter(|| {
            black_box(
                derive_session_key(
                    Some(&classical),
                    Some(&post_quantum),
                    Some(&qkd),
                    b"bench-context",
                )
                .unwrap(),
            )
        })
    });
}

fn bench_session_establishment(c: &mut Criterion) {
    let config = SessionConfig {
        channel: ChannelConfig::new(1024, false, 42),
        qber: QberConfig::default(),
        context: b"bench-session".to_vec(),
    };
    let chain = ProviderChain::stub_only();
    let cancel = CancelToken::new();
    c.bench_function("establish_session_1024", |b| {
        b.iter(|| black_box(establish_session(&config, &chain, &cancel).unwrap()))
    });
}

fn bench_dek_rotation(c: &mut Criterion) {
    let hierarchy = KeyHierarchy::new(
        HierarchyConfig::default(),
        Arc::new(ProviderChain::stub_only()),
    )
    .unwrap();
    hierarchy.create_root(None).unwrap();
    let kek = hierarchy.issue_kek().unwrap();
    let dek = hierarchy.issue_dek(kek.id, "bench-shard").unwrap();
    c.bench_function("rotate_dek", |b| {
        b.iter(|| black_box(hierarchy.rotate(dek.id).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_bb84_run,
    bench_hybrid_derivation,
    bench_session_establishment,
    bench_dek_rotation
);
criterion_main!(benches);
