// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Simulated sync example.
//!
//! Demonstrates:
//! 1. Syncing from a flaky in-process source (random latency, 30% failures)
//! 2. Watching per-attempt progress as retries and timeouts happen
//! 3. Writing the merged snapshot to `./local_data.json` (or SQL when
//!    `SYNC_CONFIG` sets `sql_url`)
//! 4. Re-attempting the write when persistence fails
//! 5. Displaying metrics (OTEL-compatible)
//!
//! # Run
//!
//! ```bash
//! cargo run --example simulated_sync
//! RUST_LOG=resilient_sync=debug cargo run --example simulated_sync
//! SYNC_CONFIG='{"sql_url": "sqlite:sync.db?mode=rwc"}' cargo run --example simulated_sync
//! ```

use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use resilient_sync::{
    SimulatedSource, SimulatedSourceConfig, SyncConfig, SyncError,
    SyncOrchestrator,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures all metrics for OTEL export)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("resilient_sync=info")),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           resilient-sync: Simulated Sync Example              ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure the orchestrator
    // ─────────────────────────────────────────────────────────────────────────
    // SYNC_CONFIG may hold a JSON config, e.g. '{"sql_url": "sqlite:sync.db?mode=rwc"}'
    let config = match std::env::var("SYNC_CONFIG") {
        Ok(json) => SyncConfig::from_json_str(&json)?,
        Err(_) => SyncConfig::default(),
    };
    println!("📦 Policy: {} attempts, {}ms per attempt, {}ms backoff",
        config.max_attempts, config.per_attempt_timeout_ms, config.backoff_ms);

    let store = config.open_store().await?;
    println!("   Store: {}", store.kind());
    let source = Arc::new(SimulatedSource::new(SimulatedSourceConfig::default()));
    let orchestrator = SyncOrchestrator::from_config(&config, source, store.clone())?;

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Print progress as it happens
    // ─────────────────────────────────────────────────────────────────────────
    let mut progress = orchestrator.progress().subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            println!("   └─ {}", event);
        }
    });

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Run
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🚀 Starting sync...");
    let start = std::time::Instant::now();
    match orchestrator.run().await {
        Ok(snapshot) => {
            println!("\n✅ Synced {} users and {} transactions in {:?}",
                snapshot.users().len(), snapshot.transactions().len(), start.elapsed());
            println!("   └─ Written to the {} store", store.kind());
        }
        Err(SyncError::PersistenceFailed { snapshot, source }) => {
            // ─────────────────────────────────────────────────────────────────
            // 4. The data was fetched; try the write once more
            // ─────────────────────────────────────────────────────────────────
            println!("\n⚠️  Write failed ({}), retrying once...", source);
            match orchestrator.persist(&snapshot).await {
                Ok(()) => println!("   └─ ✅ Saved on second attempt"),
                Err(e) => println!("   └─ ❌ Still failing: {}", e),
            }
        }
        Err(e) => {
            println!("\n❌ Sync aborted after {:?}: {}", start.elapsed(), e);
            println!("   └─ Nothing was written; the previous snapshot (if any) is untouched.");
        }
    }

    if let Some(saved) = store.load().await? {
        println!("\n📖 Stored snapshot: timestamp={} checksum={}",
            saved.timestamp(), saved.checksum()?);
    }

    println!("\n📊 Runs: {:?}", orchestrator.stats());
    println!("   └─ Late responses suppressed: {}", orchestrator.late_responses_suppressed());

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Dump raw metrics (OTEL-compatible)
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Raw Metrics (OTEL export format):");
    dump_metrics(&snapshotter);

    drop(orchestrator);
    let _ = printer.await;

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics in OTEL-compatible format
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(_) => {}
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let max = samples.iter().map(|v| v.into_inner()).fold(0.0, f64::max);
                histograms.push((name, label_str, count, sum, max));
            }
        }
    }

    counters.sort();
    histograms.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

    if !counters.is_empty() {
        println!("   ┌─ Counters (cumulative)");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }

    if !histograms.is_empty() {
        println!("   └─ Histograms (distributions)");
        for (name, labels, count, sum, max) in &histograms {
            println!("   │  └─ {}{}", name, labels);
            println!("   │     count={} sum={:.4} max={:.4}", count, sum, max);
        }
    }

    if counters.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
