// Host CPU sampling via sysinfo, feeding the load guard on a fixed interval

use std::sync::{Arc, Mutex};
use std::time::Instant;

use sysinfo::System;
use tokio::time::{Duration, interval};
use tracing::instrument;

use super::LoadGuard;

pub struct CpuSampler {
    sys: Arc<Mutex<System>>,
    last_refresh: Arc<Mutex<Option<(Instant, f64)>>>,
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            last_refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// Global CPU usage in percent. Calls closer together than sysinfo's minimum update
    /// interval return the cached value instead of blocking.
    #[instrument(skip(self), fields(operation = "sample_cpu"))]
    pub async fn sample(&self) -> anyhow::Result<f64> {
        let sys = self.sys.clone();
        let last_refresh = self.last_refresh.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            let mut guard = last_refresh
                .lock()
                .map_err(|e| anyhow::anyhow!("cpu cache lock poisoned: {}", e))?;
            let now = Instant::now();
            let usage = match *guard {
                Some((prev_ts, prev_usage))
                    if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
                {
                    prev_usage
                }
                _ => {
                    sys.refresh_cpu_all();
                    let usage = sys.global_cpu_usage() as f64;
                    *guard = Some((now, usage));
                    usage
                }
            };
            Ok(usage.clamp(0.0, 100.0))
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}

/// Samples every `sample_interval_ms` and records into `guard` until shutdown.
pub fn spawn_sampler(
    sampler: Arc<CpuSampler>,
    guard: Arc<LoadGuard>,
    sample_interval_ms: u64,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_millis(sample_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match sampler.sample().await {
                        Ok(percent) => {
                            guard.record_sample(percent);
                        }
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                operation = "sample_cpu",
                                "CPU sample failed"
                            );
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    tracing::debug!("Load sampler shutting down");
                    break;
                }
            }
        }
    })
}
