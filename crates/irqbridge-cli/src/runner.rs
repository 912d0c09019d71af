//! Runs a script against peripheral threads on a simulated platform.

use crate::config::{AppConfig, SourceDef, SourceDefError};
use anyhow::{anyhow, Context, Result};
use irqbridge_core::{
    EventType, InterruptBridge, OverflowPolicy, PlatformInterrupts, Raised, ResourceId,
    ScriptedDelivery, SimulatedPlatform,
};
use irqbridge_lua::ScriptHost;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest a source thread sleeps before re-checking the stop flag.
const STOP_POLL: Duration = Duration::from_millis(5);

/// Per-source counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceSummary {
    pub name: String,
    pub event: EventType,
    pub resource: ResourceId,
    /// Events raised.
    pub raised: u64,
    /// Queued for a scripted handler.
    pub queued: u64,
    /// Dropped because the queue was full.
    pub overflowed: u64,
    /// Line, event type or CPU-wide switch disabled; flag latched.
    pub latched: u64,
}

/// Result of a complete run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub script: String,
    pub overflow_policy: OverflowPolicy,
    pub sources: Vec<SourceSummary>,
    /// Entries delivered after the script returned.
    pub drained_after_script: usize,
    /// Stale entries discarded after the script returned.
    pub discarded_after_script: usize,
}

impl RunSummary {
    /// Events raised across all sources.
    #[must_use]
    pub fn total_raised(&self) -> u64 {
        self.sources.iter().map(|s| s.raised).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "script: {}", self.script)?;
        writeln!(f, "overflow policy: {}", self.overflow_policy)?;
        writeln!(f, "events raised: {}", self.total_raised())?;
        for s in &self.sources {
            writeln!(
                f,
                "source {} ({} {}): raised {}, queued {}, overflowed {}, latched {}",
                s.name, s.event, s.resource, s.raised, s.queued, s.overflowed, s.latched
            )?;
        }
        write!(
            f,
            "drained after script: {} delivered, {} discarded",
            self.drained_after_script, self.discarded_after_script
        )
    }
}

struct Source {
    name: String,
    event: EventType,
    resource: ResourceId,
    period: Duration,
    count: Option<u64>,
}

impl Source {
    fn from_def(
        index: usize,
        def: &SourceDef,
        platform: &SimulatedPlatform,
    ) -> Result<Self, SourceDefError> {
        let resource = def.validate(index)?;
        let label = def.label(index);
        // Probing the line checks the resource against the layout.
        platform
            .get_hw_interrupt(def.event, resource)
            .map_err(|e| SourceDefError::Platform {
                label: label.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            name: label,
            event: def.event,
            resource,
            period: Duration::from_millis(def.period_ms),
            count: def.count,
        })
    }
}

/// Runs `script` with `config`.
///
/// Sources start before the script and stop when it returns. Remaining
/// queued events are then delivered without running further script code.
///
/// # Errors
///
/// Invalid sources, script errors (including handler failures) and
/// panicked source threads.
pub fn run(config: &AppConfig, script: &Path) -> Result<RunSummary> {
    let platform = Arc::new(SimulatedPlatform::new(config.platform));
    let bridge: Arc<InterruptBridge> = Arc::new(InterruptBridge::with_config(
        platform.clone(),
        config.bridge.clone(),
    ));

    let sources = config
        .sources
        .iter()
        .enumerate()
        .map(|(i, def)| Source::from_def(i, def, &platform))
        .collect::<Result<Vec<_>, _>>()?;

    let host = ScriptHost::new(Arc::clone(&bridge)).context("failed to create script host")?;

    let stop = Arc::new(AtomicBool::new(false));
    let handles: Vec<_> = sources
        .into_iter()
        .map(|s| {
            spawn_source(
                s,
                Arc::clone(&platform),
                Arc::clone(&bridge),
                Arc::clone(&stop),
            )
        })
        .collect();
    tracing::info!(sources = handles.len(), "event sources started");

    let result = host.exec_file(script);
    stop.store(true, Ordering::Release);

    let mut summaries = Vec::with_capacity(handles.len());
    for handle in handles {
        summaries.push(
            handle
                .join()
                .map_err(|_| anyhow!("event source thread panicked"))?,
        );
    }
    tracing::info!("event sources stopped");

    result.with_context(|| format!("script {} failed", script.display()))?;

    let drained = host
        .drain_pending()
        .context("handler failed while draining after script")?;

    Ok(RunSummary {
        script: script.display().to_string(),
        overflow_policy: config.bridge.overflow_policy,
        sources: summaries,
        drained_after_script: drained.delivered,
        discarded_after_script: drained.discarded,
    })
}

fn spawn_source(
    source: Source,
    platform: Arc<SimulatedPlatform>,
    bridge: Arc<InterruptBridge>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<SourceSummary> {
    thread::spawn(move || {
        let mut summary = SourceSummary {
            name: source.name,
            event: source.event,
            resource: source.resource,
            raised: 0,
            queued: 0,
            overflowed: 0,
            latched: 0,
        };

        while !stop.load(Ordering::Acquire) && source.count.map_or(true, |c| summary.raised < c)
        {
            match platform.raise(&bridge, source.event, source.resource) {
                Ok(Raised::Delivered(report)) => match report.scripted {
                    ScriptedDelivery::Queued => summary.queued += 1,
                    ScriptedDelivery::Overflowed => summary.overflowed += 1,
                    ScriptedDelivery::NoHandler | ScriptedDelivery::Masked => {}
                },
                Ok(Raised::Latched) => summary.latched += 1,
                Err(e) => {
                    tracing::error!(source = %summary.name, error = %e, "event source stopped");
                    break;
                }
            }
            summary.raised += 1;
            wait(source.period, &stop);
        }
        summary
    })
}

/// Sleeps for `period` or until `stop` is set.
fn wait(period: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + period;
    loop {
        let now = Instant::now();
        if now >= deadline || stop.load(Ordering::Acquire) {
            return;
        }
        thread::sleep((deadline - now).min(STOP_POLL));
    }
}
