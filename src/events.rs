// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Event source adapter: turns raw engine callbacks into normalized
//! transfer events, one per call, with no state of its own.

use crate::engine::EngineCallback;
use crate::state::PeerSample;

pub const UNNAMED_TRANSFER: &str = "(unnamed transfer)";
pub const UNKNOWN_ADDRESS: &str = "unknown";
pub const UNKNOWN_TRANSPORT: &str = "?";

/// Normalized events the dashboard state consumes, 1:1 with its mutation
/// entry points.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    Started {
        name: String,
        total_size: u64,
        files: Vec<(String, u64)>,
    },
    Progress {
        downloaded: u64,
        rate_bps: u64,
        peers: Vec<PeerSample>,
    },
    FileCompleted {
        path: String,
    },
    Completed,
    Failed {
        message: String,
        fatal: bool,
    },
}

/// Translates one engine callback into one normalized event.
///
/// Missing or partial fields never fail here: names, addresses and counters
/// get documented defaults instead. Manifest entries without a path cannot
/// be displayed and are dropped; a pathless file-done report degrades to an
/// advisory failure so the anomaly still reaches the log.
pub fn normalize(callback: EngineCallback) -> TransferEvent {
    match callback {
        EngineCallback::Added {
            name,
            total_size,
            files,
        } => {
            let files: Vec<(String, u64)> = files
                .into_iter()
                .filter_map(|f| f.path.map(|p| (p, f.size.unwrap_or(0))))
                .collect();
            let total_size = total_size.unwrap_or_else(|| files.iter().map(|(_, s)| s).sum());
            TransferEvent::Started {
                name: name.unwrap_or_else(|| UNNAMED_TRANSFER.to_string()),
                total_size,
                files,
            }
        }
        EngineCallback::Download {
            downloaded_bytes,
            rate_bps,
            peers,
        } => TransferEvent::Progress {
            downloaded: downloaded_bytes.unwrap_or(0),
            rate_bps: rate_bps.unwrap_or(0),
            peers: peers
                .into_iter()
                .map(|p| PeerSample {
                    address: p.address.unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
                    transport: p.transport.unwrap_or_else(|| UNKNOWN_TRANSPORT.to_string()),
                    bytes_received: p.bytes_received.unwrap_or(0),
                })
                .collect(),
        },
        EngineCallback::FileDone { path } => match path {
            Some(path) => TransferEvent::FileCompleted { path },
            None => TransferEvent::Failed {
                message: "engine reported a completed file without a path".to_string(),
                fatal: false,
            },
        },
        EngineCallback::Done => TransferEvent::Completed,
        EngineCallback::Fault { message, fatal } => TransferEvent::Failed { message, fatal },
    }
}
