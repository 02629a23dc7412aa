// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! The download engine collaborator.
//!
//! Runs as its own tokio task behind an explicit channel pair: raw
//! `EngineCallback`s flow out, `EngineCommand`s flow in. The dashboard core
//! never blocks on network or disk; all of that happens here and in the
//! fetch workers.

pub mod fetcher;
pub mod manifest;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time;
use tracing::{event, Level};

use crate::config::Settings;
use fetcher::{FileJob, WorkerReport};

const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Raw per-file payload as the engine reports it. Fields are optional on the
/// wire; the event adapter owns defaulting.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub path: Option<String>,
    pub size: Option<u64>,
}

/// Raw per-connection payload; a mirror connection is one peer.
#[derive(Debug, Clone)]
pub struct PeerPayload {
    pub address: Option<String>,
    pub transport: Option<String>,
    pub bytes_received: Option<u64>,
}

/// Engine-native callbacks, one per state change or progress tick.
#[derive(Debug)]
pub enum EngineCallback {
    Added {
        name: Option<String>,
        total_size: Option<u64>,
        files: Vec<FilePayload>,
    },
    Download {
        downloaded_bytes: Option<u64>,
        rate_bps: Option<u64>,
        peers: Vec<PeerPayload>,
    },
    FileDone {
        path: Option<String>,
    },
    Done,
    Fault {
        message: String,
        fatal: bool,
    },
}

#[derive(Debug, Clone)]
pub enum EngineCommand {
    Shutdown,
}

pub struct EngineParameters {
    pub source: String,
    pub output_dir: PathBuf,
    pub callback_tx: Sender<EngineCallback>,
    pub command_rx: Receiver<EngineCommand>,
    pub settings: Arc<Settings>,
}

pub fn spawn(params: EngineParameters) -> tokio::task::JoinHandle<()> {
    tokio::spawn(TransferEngine::new(params).run())
}

struct ConnectionStat {
    address: String,
    transport: String,
    bytes: u64,
}

pub struct TransferEngine {
    source: String,
    output_dir: PathBuf,
    callback_tx: Sender<EngineCallback>,
    command_rx: Receiver<EngineCommand>,
    settings: Arc<Settings>,
}

impl TransferEngine {
    pub fn new(params: EngineParameters) -> Self {
        Self {
            source: params.source,
            output_dir: params.output_dir,
            callback_tx: params.callback_tx,
            command_rx: params.command_rx,
            settings: params.settings,
        }
    }

    pub async fn run(mut self) {
        let manifest = match manifest::load(&self.source).await {
            Ok(m) => m,
            Err(e) => {
                event!(Level::ERROR, "Failed to resolve transfer source: {}", e);
                let _ = self
                    .callback_tx
                    .send(EngineCallback::Fault {
                        message: e.to_string(),
                        fatal: true,
                    })
                    .await;
                return;
            }
        };

        let added = EngineCallback::Added {
            name: (!manifest.name.is_empty()).then(|| manifest.name.clone()),
            total_size: Some(manifest.total_size()),
            files: manifest
                .files
                .iter()
                .map(|f| FilePayload {
                    path: Some(f.path.clone()),
                    size: Some(f.size),
                })
                .collect(),
        };
        if self.callback_tx.send(added).await.is_err() {
            return;
        }

        let jobs = build_jobs(&manifest, &self.output_dir);
        let mut files_remaining = jobs.len();

        let worker_count = self.settings.fetch_workers.clamp(1, 16).min(jobs.len().max(1));
        let mut buckets: Vec<Vec<FileJob>> = (0..worker_count).map(|_| Vec::new()).collect();
        for (i, job) in jobs.into_iter().enumerate() {
            buckets[i % worker_count].push(job);
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let (report_tx, mut report_rx) =
            tokio::sync::mpsc::channel::<WorkerReport>(REPORT_CHANNEL_CAPACITY);

        let client = reqwest::Client::new();
        for (worker, bucket) in buckets.into_iter().enumerate() {
            tokio::spawn(fetcher::fetch_worker(
                worker,
                client.clone(),
                bucket,
                report_tx.clone(),
                shutdown_tx.subscribe(),
            ));
        }
        drop(report_tx);

        let tick_ms = self.settings.progress_interval_ms.max(100);
        let mut tick = time::interval(Duration::from_millis(tick_ms));

        let mut connections: BTreeMap<usize, ConnectionStat> = BTreeMap::new();
        let mut downloaded_total: u64 = 0;
        let mut bytes_this_tick: u64 = 0;

        loop {
            tokio::select! {
                Some(command) = self.command_rx.recv() => {
                    match command {
                        EngineCommand::Shutdown => {
                            event!(Level::INFO, "Engine shutting down on command");
                            let _ = shutdown_tx.send(());
                            return;
                        }
                    }
                }

                maybe_report = report_rx.recv() => {
                    let report = match maybe_report {
                        Some(r) => r,
                        None => {
                            if files_remaining > 0 {
                                let _ = self.callback_tx.send(EngineCallback::Fault {
                                    message: "fetch workers stopped unexpectedly".to_string(),
                                    fatal: true,
                                }).await;
                            }
                            return;
                        }
                    };

                    match report {
                        WorkerReport::Connected { worker, address, transport } => {
                            connections.insert(worker, ConnectionStat {
                                address,
                                transport,
                                bytes: 0,
                            });
                        }
                        WorkerReport::Chunk { worker, bytes } => {
                            if let Some(stat) = connections.get_mut(&worker) {
                                stat.bytes += bytes;
                            }
                            bytes_this_tick += bytes;
                            downloaded_total += bytes;
                        }
                        WorkerReport::FileFinished { path } => {
                            files_remaining = files_remaining.saturating_sub(1);
                            if self.callback_tx.send(EngineCallback::FileDone {
                                path: Some(path),
                            }).await.is_err() {
                                return;
                            }
                            if files_remaining == 0 {
                                let _ = self.callback_tx.send(EngineCallback::Done).await;
                                let _ = shutdown_tx.send(());
                                return;
                            }
                        }
                        WorkerReport::MirrorFault { path, message } => {
                            if self.callback_tx.send(EngineCallback::Fault {
                                message: format!("mirror error on {}: {}", path, message),
                                fatal: false,
                            }).await.is_err() {
                                return;
                            }
                        }
                        WorkerReport::FileFailed { path, message } => {
                            event!(Level::ERROR, "Transfer failed on {}: {}", path, message);
                            let _ = self.callback_tx.send(EngineCallback::Fault {
                                message: format!("{}: {}", path, message),
                                fatal: true,
                            }).await;
                            let _ = shutdown_tx.send(());
                            return;
                        }
                    }
                }

                _ = tick.tick() => {
                    let rate_bps = bytes_this_tick.saturating_mul(1000) / tick_ms;
                    bytes_this_tick = 0;
                    let peers = connections.values().map(|c| PeerPayload {
                        address: Some(c.address.clone()),
                        transport: Some(c.transport.clone()),
                        bytes_received: Some(c.bytes),
                    }).collect();
                    if self.callback_tx.send(EngineCallback::Download {
                        downloaded_bytes: Some(downloaded_total),
                        rate_bps: Some(rate_bps),
                        peers,
                    }).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

fn build_jobs(manifest: &manifest::TransferManifest, output_dir: &std::path::Path) -> Vec<FileJob> {
    let mirror_count = manifest.mirrors.len();
    manifest
        .files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            // Rotate the mirror order per file so load spreads across mirrors.
            let urls = (0..mirror_count)
                .map(|k| {
                    let mirror = &manifest.mirrors[(i + k) % mirror_count];
                    format!("{}/{}", mirror.url.trim_end_matches('/'), file.path)
                })
                .collect();
            FileJob {
                path: file.path.clone(),
                dest: output_dir.join(&file.path),
                size: file.size,
                urls,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest::parse;

    #[test]
    fn test_build_jobs_rotates_mirrors() {
        let manifest = parse(
            r#"
                [[mirrors]]
                url = "https://one.example.net/pub/"
                [[mirrors]]
                url = "https://two.example.net/pub"

                [[files]]
                path = "a.bin"
                size = 1
                [[files]]
                path = "b.bin"
                size = 2
            "#,
        )
        .expect("manifest should parse");

        let jobs = build_jobs(&manifest, std::path::Path::new("/tmp/out"));

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].urls[0], "https://one.example.net/pub/a.bin");
        assert_eq!(jobs[0].urls[1], "https://two.example.net/pub/a.bin");
        // Second file starts from the second mirror.
        assert_eq!(jobs[1].urls[0], "https://two.example.net/pub/b.bin");
        assert_eq!(jobs[1].urls[1], "https://one.example.net/pub/b.bin");
        assert_eq!(jobs[1].dest, std::path::Path::new("/tmp/out/b.bin"));
    }
}
