// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use tokio::sync::Mutex;

use pinax::hub::ObserverHub;
use pinax::ops::FunctionExecutor;
use pinax::store::CanvasStore;

// Group names: `ops.cycle`, `ops.read`. Case IDs stay stable across refactors
// so results remain comparable over time.
fn benches_ops(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    {
        let mut group = c.benchmark_group("ops.cycle");

        for (case_id, n) in [("create_4", 4usize), ("create_16", 16)] {
            group.throughput(Throughput::Elements(n as u64));
            group.bench_function(case_id, |b| {
                b.iter(|| {
                    runtime.block_on(async {
                        let executor = FunctionExecutor::new(
                            Arc::new(Mutex::new(CanvasStore::default())),
                            Arc::new(ObserverHub::new()),
                        );
                        for i in 0..n {
                            let result = executor
                                .execute(
                                    "create_container",
                                    json!({"id": format!("container_{i}")}),
                                )
                                .await;
                            black_box(result.is_success());
                        }
                    })
                })
            });
        }

        group.finish();
    }

    {
        let mut group = c.benchmark_group("ops.read");

        let executor = FunctionExecutor::new(
            Arc::new(Mutex::new(CanvasStore::default())),
            Arc::new(ObserverHub::new()),
        );
        runtime.block_on(async {
            for i in 0..16 {
                executor
                    .execute("create_container", json!({"id": format!("container_{i}")}))
                    .await;
            }
        });

        group.throughput(Throughput::Elements(16));
        group.bench_function("snapshot_16", |b| {
            b.iter(|| {
                runtime.block_on(async {
                    let result = executor.execute("get_canvas_state", json!(null)).await;
                    black_box(result.detail["containers"].as_array().map(Vec::len))
                })
            })
        });

        group.finish();
    }
}

criterion_group!(benches, benches_ops);
criterion_main!(benches);
