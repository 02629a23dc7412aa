// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! The single authoritative in-memory snapshot of the transfer, mutated
//! only by normalized events and read by the render coordinator.

use std::time::{Duration, Instant};

use tracing::{event, Level};

use crate::events::TransferEvent;
use crate::history::{RateHistory, ThroughputSample, RATE_HISTORY_CAPACITY};
use crate::tui::formatters::{format_bytes, format_eta, format_speed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    #[default]
    Initializing,
    Downloading,
    Completed,
    Failed,
}

impl TransferPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferPhase::Completed | TransferPhase::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            TransferPhase::Initializing => "Initializing",
            TransferPhase::Downloading => "Downloading",
            TransferPhase::Completed => "Complete",
            TransferPhase::Failed => "Failed",
        }
    }
}

/// Point-in-time view of one remote connection; not retained historically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerSample {
    pub address: String,
    pub transport: String,
    pub bytes_received: u64,
}

#[derive(Debug, Clone)]
pub struct FileRow {
    pub path: String,
    pub size: u64,
    pub done: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TransferSummary {
    pub name: String,
    pub total_size: u64,
    pub downloaded: u64,
    pub rate_bps: u64,
    /// `None` while the rate is zero and bytes remain: unknowable, shown "∞".
    pub eta: Option<Duration>,
    pub peer_count: usize,
    pub phase: TransferPhase,
}

pub struct DashboardState {
    pub summary: TransferSummary,
    pub files: Vec<FileRow>,
    pub peers: Vec<PeerSample>,
    pub log: Vec<String>,
    pub rate_history: RateHistory,
    started_at: Instant,
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            summary: TransferSummary::default(),
            files: Vec::new(),
            peers: Vec::new(),
            log: Vec::new(),
            rate_history: RateHistory::new(RATE_HISTORY_CAPACITY),
            started_at: Instant::now(),
        }
    }

    pub fn apply(&mut self, event: TransferEvent) {
        match event {
            TransferEvent::Started {
                name,
                total_size,
                files,
            } => self.apply_started(name, total_size, files),
            TransferEvent::Progress {
                downloaded,
                rate_bps,
                peers,
            } => self.apply_progress(downloaded, rate_bps, peers),
            TransferEvent::FileCompleted { path } => self.apply_file_completed(&path),
            TransferEvent::Completed => self.apply_completed(),
            TransferEvent::Failed { message, fatal } => self.apply_failed(&message, fatal),
        }
    }

    fn apply_started(&mut self, name: String, total_size: u64, files: Vec<(String, u64)>) {
        if !self.files.is_empty() || self.summary.phase != TransferPhase::Initializing {
            event!(Level::WARN, "Duplicate transfer-start event ignored");
            self.push_log("Ignored duplicate transfer-start event".to_string());
            return;
        }

        self.summary.name = name;
        self.summary.total_size = total_size;
        self.summary.phase = TransferPhase::Downloading;
        self.files = files
            .into_iter()
            .map(|(path, size)| FileRow {
                path,
                size,
                done: false,
            })
            .collect();

        self.push_log(format!("Downloading: {}", self.summary.name));
        let saving: Vec<String> = self
            .files
            .iter()
            .map(|f| format!("Saving: {}", f.path))
            .collect();
        for line in saving {
            self.push_log(line);
        }
    }

    fn apply_progress(&mut self, downloaded: u64, rate_bps: u64, peers: Vec<PeerSample>) {
        let summary = &mut self.summary;

        // Downloaded bytes never regress and never exceed the known total.
        let mut capped = downloaded.max(summary.downloaded);
        if summary.total_size > 0 {
            capped = capped.min(summary.total_size);
        }
        summary.downloaded = capped;
        summary.rate_bps = rate_bps;
        summary.peer_count = peers.len();
        self.peers = peers;

        let remaining = summary.total_size.saturating_sub(summary.downloaded);
        summary.eta = if summary.total_size == 0 {
            None
        } else if remaining == 0 {
            Some(Duration::ZERO)
        } else if rate_bps > 0 {
            Some(Duration::from_secs(remaining / rate_bps))
        } else {
            None
        };

        let label = self.elapsed_label();
        self.rate_history.push(ThroughputSample {
            label,
            mbps: rate_bps as f64 / (1024.0 * 1024.0),
        });

        let line = format!(
            "Progress: {:.1}%, {} / {}, {}, ETA {}",
            self.progress_ratio() * 100.0,
            format_bytes(self.summary.downloaded),
            format_bytes(self.summary.total_size),
            format_speed(self.summary.rate_bps),
            format_eta(self.summary.eta),
        );
        self.push_log(line);
    }

    fn apply_file_completed(&mut self, path: &str) {
        match self.files.iter_mut().find(|f| f.path == path) {
            Some(file) => {
                if !file.done {
                    file.done = true;
                    self.push_log(format!("Finished downloading {}", path));
                }
            }
            None => {
                event!(Level::WARN, "Completion for unknown file: {}", path);
                self.push_log(format!("Completion reported for unknown file: {}", path));
            }
        }
    }

    fn apply_completed(&mut self) {
        if self.summary.phase.is_terminal() {
            return;
        }
        self.summary.phase = TransferPhase::Completed;
        if self.summary.total_size > 0 {
            self.summary.downloaded = self.summary.total_size;
        }
        self.summary.eta = Some(Duration::ZERO);
        self.push_log("All files downloaded".to_string());
    }

    fn apply_failed(&mut self, message: &str, fatal: bool) {
        event!(Level::ERROR, "Engine error (fatal={}): {}", fatal, message);
        self.push_log(format!("Error: {}", message));
        if fatal && !self.summary.phase.is_terminal() {
            self.summary.phase = TransferPhase::Failed;
        }
    }

    /// Gauge value: floor of the completed fraction, clamped to [0, 100].
    pub fn gauge_percent(&self) -> u16 {
        if self.summary.total_size == 0 {
            return 0;
        }
        let percent = (self.summary.downloaded as u128 * 100) / self.summary.total_size as u128;
        percent.min(100) as u16
    }

    pub fn progress_ratio(&self) -> f64 {
        if self.summary.total_size == 0 {
            return 0.0;
        }
        (self.summary.downloaded as f64 / self.summary.total_size as f64).clamp(0.0, 1.0)
    }

    /// Top `k` peers by received bytes, ties kept in snapshot order.
    pub fn top_peers(&self, k: usize) -> Vec<&PeerSample> {
        let mut peers: Vec<&PeerSample> = self.peers.iter().collect();
        peers.sort_by(|a, b| b.bytes_received.cmp(&a.bytes_received));
        peers.truncate(k);
        peers
    }

    pub fn push_log(&mut self, line: String) {
        self.log.push(line);
    }

    fn elapsed_label(&self) -> String {
        let secs = self.started_at.elapsed().as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_event() -> TransferEvent {
        TransferEvent::Started {
            name: "sample.iso".to_string(),
            total_size: 104_857_600,
            files: vec![
                ("a.bin".to_string(), 52_428_800),
                ("b.bin".to_string(), 52_428_800),
            ],
        }
    }

    fn progress(downloaded: u64, rate_bps: u64) -> TransferEvent {
        TransferEvent::Progress {
            downloaded,
            rate_bps,
            peers: Vec::new(),
        }
    }

    fn peer(address: &str, bytes: u64) -> PeerSample {
        PeerSample {
            address: address.to_string(),
            transport: "https".to_string(),
            bytes_received: bytes,
        }
    }

    #[test]
    fn test_reference_scenario() {
        let mut state = DashboardState::new();

        state.apply(started_event());
        assert_eq!(state.summary.phase, TransferPhase::Downloading);
        assert_eq!(state.gauge_percent(), 0);
        assert_eq!(state.files.len(), 2);

        state.apply(progress(52_428_800, 1_048_576));
        assert_eq!(state.gauge_percent(), 50);
        assert_eq!(state.summary.eta, Some(Duration::from_secs(50)));

        state.apply(TransferEvent::FileCompleted {
            path: "a.bin".to_string(),
        });
        assert!(state.files[0].done);
        assert!(!state.files[1].done);

        state.apply(TransferEvent::Completed);
        assert_eq!(state.gauge_percent(), 100);
        assert_eq!(state.summary.phase, TransferPhase::Completed);
        assert!(state.log.iter().any(|l| l == "All files downloaded"));
    }

    #[test]
    fn test_downloaded_is_monotonic_and_capped() {
        let mut state = DashboardState::new();
        state.apply(started_event());

        state.apply(progress(10_000, 100));
        assert_eq!(state.summary.downloaded, 10_000);

        // A lower figure never winds the counter back.
        state.apply(progress(5_000, 100));
        assert_eq!(state.summary.downloaded, 10_000);

        // An overshoot is clamped to the total.
        state.apply(progress(u64::MAX, 100));
        assert_eq!(state.summary.downloaded, state.summary.total_size);
    }

    #[test]
    fn test_zero_rate_eta_is_undefined() {
        let mut state = DashboardState::new();
        state.apply(started_event());

        state.apply(progress(1, 0));
        assert_eq!(state.summary.eta, None);
    }

    #[test]
    fn test_file_completion_is_idempotent() {
        let mut state = DashboardState::new();
        state.apply(started_event());

        for _ in 0..2 {
            state.apply(TransferEvent::FileCompleted {
                path: "a.bin".to_string(),
            });
        }
        assert!(state.files[0].done);
        let completions = state
            .log
            .iter()
            .filter(|l| l.starts_with("Finished downloading"))
            .count();
        assert_eq!(completions, 1);
    }

    #[test]
    fn test_unknown_file_completion_is_nonfatal() {
        let mut state = DashboardState::new();
        state.apply(started_event());

        state.apply(TransferEvent::FileCompleted {
            path: "ghost.bin".to_string(),
        });
        assert_eq!(state.files.len(), 2);
        assert!(state.files.iter().all(|f| !f.done));
        assert!(state.log.iter().any(|l| l.contains("unknown file")));
        assert_eq!(state.summary.phase, TransferPhase::Downloading);
    }

    #[test]
    fn test_terminal_phases_latch() {
        let mut state = DashboardState::new();
        state.apply(started_event());

        state.apply(TransferEvent::Completed);
        state.apply(TransferEvent::Failed {
            message: "late error".to_string(),
            fatal: true,
        });
        assert_eq!(state.summary.phase, TransferPhase::Completed);

        let mut failed = DashboardState::new();
        failed.apply(started_event());
        failed.apply(TransferEvent::Failed {
            message: "disk gone".to_string(),
            fatal: true,
        });
        failed.apply(TransferEvent::Completed);
        assert_eq!(failed.summary.phase, TransferPhase::Failed);
    }

    #[test]
    fn test_progress_after_completion_keeps_phase() {
        let mut state = DashboardState::new();
        state.apply(started_event());
        state.apply(TransferEvent::Completed);

        state.apply(progress(1, 512));
        assert_eq!(state.summary.phase, TransferPhase::Completed);
        assert_eq!(state.summary.rate_bps, 512);
    }

    #[test]
    fn test_advisory_failure_only_logs() {
        let mut state = DashboardState::new();
        state.apply(started_event());

        state.apply(TransferEvent::Failed {
            message: "mirror hiccup".to_string(),
            fatal: false,
        });
        assert_eq!(state.summary.phase, TransferPhase::Downloading);
        assert!(state.log.iter().any(|l| l.contains("mirror hiccup")));
    }

    #[test]
    fn test_failed_reachable_from_initializing() {
        let mut state = DashboardState::new();
        state.apply(TransferEvent::Failed {
            message: "manifest unreachable".to_string(),
            fatal: true,
        });
        assert_eq!(state.summary.phase, TransferPhase::Failed);
    }

    #[test]
    fn test_every_progress_pushes_one_sample() {
        let mut state = DashboardState::new();
        state.apply(started_event());

        for i in 0..(RATE_HISTORY_CAPACITY + 5) {
            state.apply(progress(i as u64, 1024));
        }
        assert_eq!(state.rate_history.len(), RATE_HISTORY_CAPACITY);
    }

    #[test]
    fn test_top_peers_orders_and_limits() {
        let mut state = DashboardState::new();
        state.apply(started_event());

        let peers: Vec<PeerSample> = (0..12)
            .map(|i| peer(&format!("mirror-{}.example.net", i), (i % 4) as u64 * 100))
            .collect();
        state.apply(TransferEvent::Progress {
            downloaded: 0,
            rate_bps: 0,
            peers,
        });

        let top = state.top_peers(10);
        assert_eq!(top.len(), 10);
        // Descending by received bytes.
        for pair in top.windows(2) {
            assert!(pair[0].bytes_received >= pair[1].bytes_received);
        }
        // Ties keep snapshot order: mirror-3 came before mirror-7 and mirror-11.
        let tied: Vec<&str> = top
            .iter()
            .filter(|p| p.bytes_received == 300)
            .map(|p| p.address.as_str())
            .collect();
        assert_eq!(
            tied,
            vec![
                "mirror-3.example.net",
                "mirror-7.example.net",
                "mirror-11.example.net"
            ]
        );
    }

    #[test]
    fn test_gauge_percent_floors_and_handles_zero_total() {
        let mut state = DashboardState::new();
        assert_eq!(state.gauge_percent(), 0);

        state.apply(TransferEvent::Started {
            name: "t".to_string(),
            total_size: 3,
            files: vec![("x".to_string(), 3)],
        });
        state.apply(progress(1, 1));
        assert_eq!(state.gauge_percent(), 33);
    }
}
