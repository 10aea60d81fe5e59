//! `rampartctl simulate`: drive the orchestrator against a generated
//! [`DemoSite`] and collect what happened.

use std::{io::Write, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use rampart_core::{
    config::OrchestratorConfig,
    demo::{DemoEngine, DemoSite},
    orchestration::{ExcludeList, ScanOrchestrator},
};
use rampart_model::{Mode, ScanEvent, ScanEventPayload, ScanSnapshot};
use tokio::sync::broadcast::{
    Receiver,
    error::{RecvError, TryRecvError},
};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Overrides the configured initial mode.
    pub mode: Option<Mode>,
    pub hosts: usize,
    pub depth: usize,
    pub fanout: usize,
    pub latency: Duration,
    pub exclude: Vec<String>,
    pub pause_after: Option<Duration>,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            mode: None,
            hosts: 2,
            depth: 2,
            fanout: 3,
            latency: Duration::ZERO,
            exclude: Vec::new(),
            pause_after: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub mode: Mode,
    /// Final state of every scan, in id order.
    pub scans: Vec<ScanSnapshot>,
    /// One line per observed event, in arrival order.
    pub events: Vec<String>,
    /// Events the collector fell too far behind to see.
    pub missed_events: u64,
}

impl SimulationReport {
    pub fn write_to(
        &self,
        out: &mut impl Write,
        with_events: bool,
    ) -> std::io::Result<()> {
        if with_events {
            for line in &self.events {
                writeln!(out, "{line}")?;
            }
            if self.missed_events > 0 {
                writeln!(out, "({} events missed)", self.missed_events)?;
            }
        }
        writeln!(out, "mode: {}", self.mode)?;
        for scan in &self.scans {
            writeln!(
                out,
                "scan {} '{}': {} sent={} skipped={} errors={} hosts={}/{} results={} percent={}",
                scan.id,
                scan.name,
                scan.state,
                scan.progress.requests_sent,
                scan.progress.requests_skipped,
                scan.progress.errors,
                scan.progress.hosts_processed,
                scan.progress.hosts_total,
                scan.result_count,
                scan.progress.percent,
            )?;
        }
        Ok(())
    }
}

/// One human readable line for `event`.
pub fn describe(event: &ScanEvent) -> String {
    let prefix = format!(
        "[scan {} #{}] {}",
        event.meta.scan_id,
        event.meta.sequence,
        event.payload.label()
    );
    match &event.payload {
        ScanEventPayload::ScanAdded { name } => format!("{prefix} name={name}"),
        ScanEventPayload::Progressed { percent } => {
            format!("{prefix} percent={percent}")
        }
        ScanEventPayload::HostStarted { host }
        | ScanEventPayload::HostCompleted { host } => {
            format!("{prefix} host={host}")
        }
        ScanEventPayload::HostProgressed { host, percent, uri } => {
            format!("{prefix} host={host} percent={percent} uri={uri}")
        }
        ScanEventPayload::ResultRecorded {
            uri,
            method,
            skipped,
        } => format!("{prefix} {method} {uri} skipped={skipped}"),
        ScanEventPayload::ScanRemoved { final_state } => {
            format!("{prefix} final_state={final_state}")
        }
        ScanEventPayload::Started
        | ScanEventPayload::Paused
        | ScanEventPayload::Resumed
        | ScanEventPayload::Stopped
        | ScanEventPayload::Finished => prefix,
    }
}

#[derive(Debug, Default)]
struct Collector {
    events: Vec<String>,
    missed: u64,
}

impl Collector {
    fn drain(&mut self, rx: &mut Receiver<ScanEvent>) {
        loop {
            match rx.try_recv() {
                Ok(event) => self.events.push(describe(&event)),
                Err(TryRecvError::Lagged(skipped)) => self.missed += skipped,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

/// Start one subtree scan per demo host and wait for all of them to end.
///
/// Fails when the mode policy refuses a scan, e.g. in [`Mode::Safe`].
pub async fn simulate(
    mut config: OrchestratorConfig,
    options: SimulateOptions,
) -> Result<SimulationReport> {
    if let Some(mode) = options.mode {
        config.initial_mode = mode;
    }
    let exclude = ExcludeList::try_compile(&options.exclude)
        .context("invalid --exclude pattern")?;

    let site = Arc::new(DemoSite::generate(
        options.hosts,
        options.depth,
        options.fanout,
    ));
    let engine = DemoEngine::new(Arc::clone(&site)).with_latency(options.latency);
    let orchestrator = Arc::new(
        ScanOrchestrator::new(config, Arc::new(engine))
            .context("failed to build orchestrator")?,
    );
    if !exclude.is_empty() {
        orchestrator.set_exclude_list(exclude.patterns());
    }

    let mut rx = orchestrator.subscribe();
    let mut collector = Collector::default();

    for root in site.roots().into_iter().filter(|node| node.in_scope) {
        let path = root.path.clone();
        orchestrator
            .start_scan_subtree(root)
            .with_context(|| format!("failed to start scan of {path}"))?;
    }
    info!(
        target: "rampart::simulate",
        mode = orchestrator.mode().as_str(),
        scans = orchestrator.get_all_scans().len(),
        pages = site.len(),
        "simulation started"
    );

    let pauser = options.pause_after.map(|delay| {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let paused = orchestrator.pause_all_scans();
            tokio::time::sleep(delay).await;
            let resumed = orchestrator.resume_all_scans();
            info!(
                target: "rampart::simulate",
                paused,
                resumed,
                "pause/resume cycle complete"
            );
        })
    });

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) => collector.events.push(describe(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        target: "rampart::simulate",
                        skipped,
                        "event collector lagged"
                    );
                    collector.missed += skipped;
                }
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                if orchestrator.get_active_scans().is_empty() {
                    break;
                }
            }
        }
    }
    collector.drain(&mut rx);

    if let Some(pauser) = pauser {
        pauser.abort();
    }
    let scans = orchestrator.get_all_scans();
    let mode = orchestrator.mode();

    orchestrator.shutdown().await;
    collector.drain(&mut rx);

    Ok(SimulationReport {
        mode,
        scans,
        events: collector.events,
        missed_events: collector.missed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_model::ScanState;

    #[tokio::test]
    async fn every_host_scan_finishes() {
        let report = simulate(
            OrchestratorConfig::default(),
            SimulateOptions {
                hosts: 2,
                depth: 1,
                fanout: 2,
                ..SimulateOptions::default()
            },
        )
        .await
        .expect("simulate");

        assert_eq!(report.scans.len(), 2);
        for scan in &report.scans {
            assert_eq!(scan.state, ScanState::Finished);
            // Root, two children and the external link.
            assert_eq!(scan.progress.requests_sent, 4);
        }
        assert!(report.events.iter().any(|line| line.contains("finished")));
        assert!(report.events.iter().any(|line| line.contains("scan_removed")));
    }

    #[tokio::test]
    async fn safe_mode_refuses_to_simulate() {
        let err = simulate(
            OrchestratorConfig::default(),
            SimulateOptions {
                mode: Some(Mode::Safe),
                ..SimulateOptions::default()
            },
        )
        .await
        .expect_err("safe mode");
        assert!(format!("{err:#}").contains("safe"));
    }

    #[tokio::test]
    async fn exclusions_are_reported_as_skipped() {
        let report = simulate(
            OrchestratorConfig::default(),
            SimulateOptions {
                hosts: 1,
                depth: 1,
                fanout: 2,
                exclude: vec![r"https://host0\.demo/p1/".to_string()],
                ..SimulateOptions::default()
            },
        )
        .await
        .expect("simulate");

        let scan = &report.scans[0];
        assert_eq!(scan.progress.requests_skipped, 1);
        assert_eq!(scan.progress.requests_sent, 3);
    }

    #[tokio::test]
    async fn bad_exclude_pattern_is_an_error() {
        let result = simulate(
            OrchestratorConfig::default(),
            SimulateOptions {
                exclude: vec!["(".to_string()],
                ..SimulateOptions::default()
            },
        )
        .await;
        assert!(result.is_err());
    }
}
