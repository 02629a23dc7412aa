// SPDX-FileCopyrightText: 2025 The downdeck Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio::sync::mpsc::Sender;
use tracing::{event, Level};

/// One file to stream to disk, with candidate URLs in mirror order.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub path: String,
    pub dest: PathBuf,
    pub size: u64,
    pub urls: Vec<String>,
}

/// Progress reports a fetch worker sends back to the engine task.
#[derive(Debug)]
pub enum WorkerReport {
    Connected {
        worker: usize,
        address: String,
        transport: String,
    },
    Chunk {
        worker: usize,
        bytes: u64,
    },
    FileFinished {
        path: String,
    },
    MirrorFault {
        path: String,
        message: String,
    },
    FileFailed {
        path: String,
        message: String,
    },
}

enum FetchOutcome {
    Complete,
    Interrupted,
}

/// Streams each assigned file to disk, falling back through mirrors.
///
/// Every await is raced against the shutdown channel so a quit never waits
/// on the network.
pub async fn fetch_worker(
    worker: usize,
    client: reqwest::Client,
    jobs: Vec<FileJob>,
    report_tx: Sender<WorkerReport>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    for job in jobs {
        let mut last_error = String::from("no mirrors configured");
        let mut finished = false;

        for url in &job.urls {
            let (address, transport) = endpoint_labels(url);
            if report_tx
                .send(WorkerReport::Connected {
                    worker,
                    address,
                    transport,
                })
                .await
                .is_err()
            {
                return;
            }

            match stream_file(&client, url, &job, worker, &report_tx, &mut shutdown_rx).await {
                Ok(FetchOutcome::Complete) => {
                    finished = true;
                    if report_tx
                        .send(WorkerReport::FileFinished {
                            path: job.path.clone(),
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }
                    break;
                }
                Ok(FetchOutcome::Interrupted) => return,
                Err(message) => {
                    event!(Level::WARN, "Mirror failed for {}: {}", job.path, message);
                    let _ = report_tx
                        .send(WorkerReport::MirrorFault {
                            path: job.path.clone(),
                            message: message.clone(),
                        })
                        .await;
                    last_error = message;
                }
            }
        }

        if !finished
            && report_tx
                .send(WorkerReport::FileFailed {
                    path: job.path.clone(),
                    message: last_error,
                })
                .await
                .is_err()
        {
            return;
        }
    }
}

async fn stream_file(
    client: &reqwest::Client,
    url: &str,
    job: &FileJob,
    worker: usize,
    report_tx: &Sender<WorkerReport>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Result<FetchOutcome, String> {
    if let Some(parent) = job.dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }

    let request = client.get(url).send();
    let response = tokio::select! {
        res = request => res.map_err(|e| e.to_string())?,
        _ = shutdown_rx.recv() => return Ok(FetchOutcome::Interrupted),
    };
    if !response.status().is_success() {
        return Err(format!("HTTP {} from {}", response.status(), url));
    }
    let mut response = response;

    let mut file = tokio::fs::File::create(&job.dest)
        .await
        .map_err(|e| format!("cannot create {}: {}", job.dest.display(), e))?;
    let mut written: u64 = 0;

    loop {
        let chunk = tokio::select! {
            res = response.chunk() => res.map_err(|e| e.to_string())?,
            _ = shutdown_rx.recv() => return Ok(FetchOutcome::Interrupted),
        };

        match chunk {
            Some(bytes) => {
                file.write_all(&bytes)
                    .await
                    .map_err(|e| format!("write to {} failed: {}", job.dest.display(), e))?;
                written += bytes.len() as u64;
                if report_tx
                    .send(WorkerReport::Chunk {
                        worker,
                        bytes: bytes.len() as u64,
                    })
                    .await
                    .is_err()
                {
                    return Ok(FetchOutcome::Interrupted);
                }
            }
            None => break,
        }
    }

    file.flush()
        .await
        .map_err(|e| format!("flush of {} failed: {}", job.dest.display(), e))?;

    if job.size > 0 && written != job.size {
        return Err(format!(
            "size mismatch for {}: wrote {} bytes, manifest says {}",
            job.path, written, job.size
        ));
    }

    Ok(FetchOutcome::Complete)
}

/// Peer identity of a mirror connection; unparseable URLs fall back to the
/// documented "unknown" address.
pub fn endpoint_labels(url: &str) -> (String, String) {
    match reqwest::Url::parse(url) {
        Ok(parsed) => (
            parsed
                .host_str()
                .map(|h| h.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            parsed.scheme().to_string(),
        ),
        Err(_) => ("unknown".to_string(), "?".to_string()),
    }
}
