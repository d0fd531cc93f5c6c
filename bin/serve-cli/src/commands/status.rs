// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `infer-serve status` command: display host telemetry and the service
//! configuration.
//!
//! Readings that cannot be taken on this machine show as `n/a`; the
//! command itself never fails because of them.

use resource_monitor::{SystemProbe, TelemetryReport};
use serve_runtime::ServeConfig;

pub async fn execute(config: ServeConfig) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║            infer-serve · Service Status             ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let probe = SystemProbe::new(config.cpu_sample_interval());
    let report = tokio::task::spawn_blocking(move || TelemetryReport::capture(&probe)).await?;

    // ── Host ───────────────────────────────────────────────────
    println!("  Host");
    match report.cpu_percent {
        Some(cpu) => println!("   CPU:          {cpu:.1}%  {}", usage_bar(cpu as f64 / 100.0)),
        None => println!("   CPU:          n/a"),
    }
    match report.memory_percent {
        Some(mem) => println!("   Memory:       {mem:.1}%  {}", usage_bar(mem as f64 / 100.0)),
        None => println!("   Memory:       n/a"),
    }
    println!();

    // ── Accelerator ────────────────────────────────────────────
    println!("  Accelerator");
    match &report.accelerator {
        Some(acc) => {
            println!("   Device:       {}", acc.name);
            println!(
                "   Memory:       {:.2} / {:.2} GB",
                acc.memory_used_gb(),
                acc.memory_total_gb()
            );
        }
        None => println!("   Device:       none detected"),
    }
    println!();

    // ── Service ────────────────────────────────────────────────
    println!("  Service");
    let artifact = if config.model_path.exists() {
        "present"
    } else {
        "missing, random weights will be used"
    };
    println!("   Model:        {} ({artifact})", config.model_path.display());
    println!("   Address:      {}", config.bind_addr());
    println!("   Device:       {}", config.device);
    println!(
        "   Workers:      {} (queue {}, policy {})",
        config.workers, config.queue_capacity, config.compute_policy
    );
    match config.request_timeout_ms {
        Some(ms) => println!("   Timeout:      {ms} ms"),
        None => println!("   Timeout:      none"),
    }
    println!();

    if !report.failed_probes.is_empty() {
        println!("  Degraded probes: {}", report.failed_probes.join(", "));
        println!();
    }
    println!("{}", report.summary());

    Ok(())
}

/// Creates a visual usage bar (0.0-1.0 scale).
fn usage_bar(ratio: f64) -> String {
    let filled = (ratio * 20.0).round().clamp(0.0, 20.0) as usize;
    let empty = 20 - filled;
    let symbol = if ratio >= 0.9 {
        "#"
    } else if ratio >= 0.7 {
        "="
    } else {
        "-"
    };
    format!("[{}{}]", symbol.repeat(filled), ".".repeat(empty))
}
