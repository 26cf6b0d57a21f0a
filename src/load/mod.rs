// Host load admission control: windowed CPU average -> protection zone -> concurrency ceilings.

mod sampler;

pub use sampler::{CpuSampler, spawn_sampler};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{LoadConfig, ZoneLimits};
use crate::error::LoadRejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadZone {
    Green,
    Yellow,
    Red,
    Critical,
}

/// Process-wide load snapshot. Written by the sampler, read before admitting batches.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSnapshot {
    pub current_percent: f64,
    pub short_avg_percent: f64,
    pub long_avg_percent: f64,
    pub zone: LoadZone,
    pub limits: ZoneLimits,
    pub red_queue_available: usize,
}

/// Result of [`LoadGuard::can_admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub reason: &'static str,
}

#[derive(Debug)]
struct LoadState {
    samples: VecDeque<f64>,
    current: f64,
    zone: LoadZone,
}

/// Held for the duration of one admitted batch. In the red zone it occupies a queue slot.
#[derive(Debug)]
pub struct LoadPermit {
    _slot: Option<OwnedSemaphorePermit>,
    zone: LoadZone,
    max_workers: usize,
}

impl LoadPermit {
    pub fn zone(&self) -> LoadZone {
        self.zone
    }

    /// Worker ceiling of the zone the batch was admitted in.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }
}

#[derive(Debug)]
pub struct LoadGuard {
    config: LoadConfig,
    state: Mutex<LoadState>,
    red_queue: Arc<Semaphore>,
}

impl LoadGuard {
    pub fn new(config: LoadConfig) -> Arc<Self> {
        let red_queue = Arc::new(Semaphore::new(config.red.max_callers));
        Arc::new(Self {
            state: Mutex::new(LoadState {
                samples: VecDeque::with_capacity(config.long_window),
                current: 0.0,
                zone: LoadZone::Green,
            }),
            config,
            red_queue,
        })
    }

    fn lock(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn limits(&self, zone: LoadZone) -> ZoneLimits {
        match zone {
            LoadZone::Green => self.config.green,
            LoadZone::Yellow => self.config.yellow,
            LoadZone::Red => self.config.red,
            LoadZone::Critical => self.config.critical,
        }
    }

    fn zone_for(&self, percent: f64) -> LoadZone {
        if percent >= self.config.critical_percent {
            LoadZone::Critical
        } else if percent >= self.config.red_percent {
            LoadZone::Red
        } else if percent >= self.config.yellow_percent {
            LoadZone::Yellow
        } else {
            LoadZone::Green
        }
    }

    /// Feeds one CPU sample. Returns `Some((from, to))` on a zone transition.
    pub fn record_sample(&self, percent: f64) -> Option<(LoadZone, LoadZone)> {
        let percent = percent.clamp(0.0, 100.0);
        let mut state = self.lock();
        state.current = percent;
        state.samples.push_back(percent);
        while state.samples.len() > self.config.long_window {
            state.samples.pop_front();
        }
        let short = average(state.samples.iter().rev().take(self.config.short_window));
        let zone = self.zone_for(short);
        if zone == state.zone {
            return None;
        }
        let from = state.zone;
        state.zone = zone;
        drop(state);
        if zone > from {
            tracing::warn!(from = ?from, to = ?zone, cpu_short_avg = short, "load zone escalated");
        } else {
            tracing::info!(from = ?from, to = ?zone, cpu_short_avg = short, "load zone relaxed");
        }
        Some((from, zone))
    }

    pub fn zone(&self) -> LoadZone {
        self.lock().zone
    }

    pub fn snapshot(&self) -> LoadSnapshot {
        let state = self.lock();
        LoadSnapshot {
            current_percent: state.current,
            short_avg_percent: average(state.samples.iter().rev().take(self.config.short_window)),
            long_avg_percent: average(state.samples.iter()),
            zone: state.zone,
            limits: self.limits(state.zone),
            red_queue_available: self.red_queue.available_permits(),
        }
    }

    /// Critical always rejects, red admits while the queue has room, green/yellow always admit.
    pub fn can_admit(&self) -> Admission {
        match self.zone() {
            LoadZone::Green | LoadZone::Yellow => Admission {
                allowed: true,
                reason: "ok",
            },
            LoadZone::Red if self.red_queue.available_permits() > 0 => Admission {
                allowed: true,
                reason: "queued",
            },
            LoadZone::Red => Admission {
                allowed: false,
                reason: "queue_full",
            },
            LoadZone::Critical => Admission {
                allowed: false,
                reason: "overloaded",
            },
        }
    }

    /// Admits one batch, holding a red-zone queue slot when needed.
    pub fn admit(&self) -> Result<LoadPermit, LoadRejection> {
        let zone = self.zone();
        let max_workers = self.limits(zone).max_workers;
        match zone {
            LoadZone::Green | LoadZone::Yellow => Ok(LoadPermit {
                _slot: None,
                zone,
                max_workers,
            }),
            LoadZone::Red => {
                let slot = Arc::clone(&self.red_queue)
                    .try_acquire_owned()
                    .map_err(|_| LoadRejection::QueueFull)?;
                Ok(LoadPermit {
                    _slot: Some(slot),
                    zone,
                    max_workers,
                })
            }
            LoadZone::Critical => Err(LoadRejection::Overloaded),
        }
    }
}

fn average<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> Arc<LoadGuard> {
        LoadGuard::new(LoadConfig {
            short_window: 3,
            long_window: 10,
            ..LoadConfig::default()
        })
    }

    #[test]
    fn sustained_high_cpu_is_critical() {
        let g = guard();
        for _ in 0..3 {
            g.record_sample(96.0);
        }
        assert_eq!(g.zone(), LoadZone::Critical);
        assert_eq!(
            g.can_admit(),
            Admission {
                allowed: false,
                reason: "overloaded"
            }
        );
        assert_eq!(g.admit().unwrap_err(), LoadRejection::Overloaded);
    }

    #[test]
    fn single_spike_is_averaged_out() {
        let g = guard();
        g.record_sample(10.0);
        g.record_sample(10.0);
        g.record_sample(100.0);
        assert_eq!(g.zone(), LoadZone::Green);
        assert!(g.can_admit().allowed);
    }

    #[test]
    fn zone_limits_shrink_with_severity() {
        let g = guard();
        let order = [LoadZone::Green, LoadZone::Yellow, LoadZone::Red, LoadZone::Critical];
        for pair in order.windows(2) {
            assert!(g.limits(pair[0]).max_workers >= g.limits(pair[1]).max_workers);
            assert!(g.limits(pair[0]).max_callers >= g.limits(pair[1]).max_callers);
        }
    }

    #[test]
    fn red_zone_queue_bounds_admissions() {
        let g = guard();
        for _ in 0..3 {
            g.record_sample(90.0);
        }
        assert_eq!(g.zone(), LoadZone::Red);
        let capacity = g.limits(LoadZone::Red).max_callers;
        let permits: Vec<_> = (0..capacity).map(|_| g.admit().unwrap()).collect();
        assert_eq!(g.can_admit().reason, "queue_full");
        assert_eq!(g.admit().unwrap_err(), LoadRejection::QueueFull);
        drop(permits);
        assert!(g.can_admit().allowed);
    }

    #[test]
    fn transitions_are_reported_once() {
        let g = guard();
        assert_eq!(
            g.record_sample(80.0),
            Some((LoadZone::Green, LoadZone::Yellow))
        );
        assert_eq!(g.record_sample(80.0), None);
        assert_eq!(
            g.record_sample(60.0),
            None,
            "average of 80, 80, 60 is still yellow"
        );
    }
}
