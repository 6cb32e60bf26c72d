//! Connection reuse benchmark suite.
//!
//! Measures the cost of obtaining the shared connection:
//! - Cached fast path, sequential and concurrent callers
//! - Full cycle: connect, release, reconnect
//!
//! Run with: cargo bench --bench connection_reuse
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use url::Url;

use subsocial_api::{
    ConnectionManager, EndpointConfig, ManagerOptions, Method, RpcClient, Subscription,
    SubscriptionId, SubscriptionMethod, Transport, TypeRegistry,
};

// ============================================================================
// In-memory client
// ============================================================================

struct MemoryClient;

struct MemoryTransport {
    live: AtomicBool,
}

#[async_trait]
impl RpcClient for MemoryClient {
    type Transport = MemoryTransport;

    fn register_types(&self, registry: &mut TypeRegistry) -> subsocial_api::Result<()> {
        subsocial_api::types::register_subsocial_types(registry)
    }

    async fn connect(
        &self,
        _url: &Url,
        _types: Arc<TypeRegistry>,
    ) -> subsocial_api::Result<MemoryTransport> {
        Ok(MemoryTransport {
            live: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn wait_ready(&self) -> subsocial_api::Result<()> {
        Ok(())
    }

    async fn request(&self, _method: Method) -> subsocial_api::Result<Value> {
        Ok(json!("Subsocial"))
    }

    async fn subscribe(&self, _method: SubscriptionMethod) -> subsocial_api::Result<Subscription> {
        let (_tx, rx) = mpsc::unbounded_channel();
        Ok(Subscription::new(SubscriptionId::Number(0), rx))
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    fn disconnect(&self) {
        self.live.store(false, Ordering::Relaxed);
    }
}

fn manager() -> anyhow::Result<ConnectionManager<MemoryClient>> {
    Ok(ConnectionManager::with_client(
        MemoryClient,
        EndpointConfig::from_override(None)?,
        ManagerOptions::default(),
    ))
}

// ============================================================================
// Benchmark Parameters
// ============================================================================

const CALLER_COUNTS: &[usize] = &[1, 16, 128];

// ============================================================================
// Benchmark: Cached Fast Path
// ============================================================================

fn bench_cached_connection(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let manager = manager().expect("manager");
    rt.block_on(manager.connection()).expect("connect");

    let mut group = c.benchmark_group("cached_connection");

    for &callers in CALLER_COUNTS {
        group.bench_with_input(
            BenchmarkId::new("callers", callers),
            &callers,
            |b, &callers| {
                b.to_async(&rt).iter(|| {
                    let manager = manager.clone();
                    async move {
                        let tasks: Vec<_> = (0..callers)
                            .map(|_| {
                                let manager = manager.clone();
                                tokio::spawn(async move { manager.connection().await })
                            })
                            .collect();
                        for task in tasks {
                            let _ = task.await;
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: Full Cycle
// ============================================================================

fn bench_connect_release_cycle(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let manager = manager().expect("manager");

    let mut group = c.benchmark_group("connect_release_cycle");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("cycle", |b| {
        b.to_async(&rt).iter(|| {
            let manager = manager.clone();
            async move {
                let _ = manager.connection().await;
                manager.release_if_idle(Duration::ZERO);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cached_connection, bench_connect_release_cycle);
criterion_main!(benches);
