//! On-disk snapshot of the whole corpus.
//!
//! Layout of `<dir>/snapshot.json`:
//!
//! ```text
//! {"format":"datalens-snapshot","schema_version":1,"length":<n>,"checksum":"<sha256>"}\n
//! <n bytes of body JSON>
//! ```
//!
//! The header line lets a truncated or tampered body be detected before it
//! is parsed. Writes go to a temporary file which is synced and renamed over
//! the live snapshot, so a crash leaves either the old or the new snapshot.

use crate::corpus::Corpus;
use crate::types::Metadata;
use chrono::{DateTime, Utc};
use datalens_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;

pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const SNAPSHOT_FORMAT: &str = "datalens-snapshot";
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Identity of the encoder that produced a snapshot's embeddings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderFingerprint {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

/// A snapshot read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub corpus: Corpus,
    pub saved_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    format: String,
    schema_version: u32,
    length: usize,
    checksum: String,
}

#[derive(Serialize)]
struct BodyRef<'a> {
    saved_at: DateTime<Utc>,
    provider: &'a str,
    model: &'a str,
    dimensions: usize,
    ids: &'a [String],
    documents: &'a [String],
    metadatas: &'a [Metadata],
    embeddings: &'a [Vec<f32>],
}

#[derive(Deserialize)]
struct Body {
    saved_at: DateTime<Utc>,
    provider: String,
    model: String,
    dimensions: usize,
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<Metadata>,
    embeddings: Vec<Vec<f32>>,
}

#[must_use]
pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A temp file no other save, in this process or another, writes to.
fn temp_path(dir: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("{}.tmp-{}-{}", SNAPSHOT_FILE, std::process::id(), n))
}

fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Serialize `corpus` into the snapshot byte layout.
pub fn encode(
    corpus: &Corpus,
    fingerprint: &EncoderFingerprint,
    saved_at: DateTime<Utc>,
) -> AppResult<Vec<u8>> {
    let body = serde_json::to_vec(&BodyRef {
        saved_at,
        provider: &fingerprint.provider,
        model: &fingerprint.model,
        dimensions: fingerprint.dimensions,
        ids: corpus.ids(),
        documents: corpus.documents(),
        metadatas: corpus.metadatas(),
        embeddings: corpus.embeddings(),
    })?;

    let header = serde_json::to_vec(&Header {
        format: SNAPSHOT_FORMAT.to_string(),
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        length: body.len(),
        checksum: checksum(&body),
    })?;

    let mut bytes = Vec::with_capacity(header.len() + 1 + body.len());
    bytes.extend_from_slice(&header);
    bytes.push(b'\n');
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Parse and validate snapshot bytes against the current encoder dimension.
///
/// Every failure is reported as `AppError::CorruptState`.
pub fn decode(bytes: &[u8], dimensions: usize) -> AppResult<LoadedSnapshot> {
    let split = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| corrupt("missing header line"))?;
    let (header_bytes, rest) = bytes.split_at(split);
    let body_bytes = &rest[1..];

    let header: Header = serde_json::from_slice(header_bytes)
        .map_err(|e| corrupt(format!("unreadable header: {}", e)))?;

    if header.format != SNAPSHOT_FORMAT {
        return Err(corrupt(format!("unknown format '{}'", header.format)));
    }
    if header.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(corrupt(format!(
            "unsupported schema_version {} (expected {})",
            header.schema_version, SNAPSHOT_SCHEMA_VERSION
        )));
    }
    if header.length != body_bytes.len() {
        return Err(corrupt(format!(
            "body is {} bytes, header says {}",
            body_bytes.len(),
            header.length
        )));
    }
    if header.checksum != checksum(body_bytes) {
        return Err(corrupt("checksum mismatch"));
    }

    let body: Body = serde_json::from_slice(body_bytes)
        .map_err(|e| corrupt(format!("unreadable body: {}", e)))?;

    if body.dimensions != dimensions {
        return Err(corrupt(format!(
            "snapshot dimension {} does not match encoder dimension {}",
            body.dimensions, dimensions
        )));
    }
    if let Some((i, bad)) = body
        .embeddings
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != dimensions)
    {
        return Err(corrupt(format!(
            "embedding {} has dimension {}, expected {}",
            i,
            bad.len(),
            dimensions
        )));
    }

    let corpus = Corpus::from_columns(body.ids, body.documents, body.metadatas, body.embeddings)?;

    Ok(LoadedSnapshot {
        corpus,
        saved_at: body.saved_at,
        provider: body.provider,
        model: body.model,
    })
}

fn corrupt(reason: impl std::fmt::Display) -> AppError {
    AppError::CorruptState(format!("Snapshot {}", reason))
}

/// Read the snapshot in `dir`, if one exists.
///
/// A missing file is `Ok(None)`. Unreadable or invalid content is
/// `AppError::CorruptState`.
pub async fn load(dir: &Path, dimensions: usize) -> AppResult<Option<LoadedSnapshot>> {
    let path = snapshot_path(dir);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AppError::CorruptState(format!(
                "Failed to read snapshot {:?}: {}",
                path, e
            )))
        }
    };

    decode(&bytes, dimensions).map(Some)
}

/// Atomically replace the snapshot in `dir` with `corpus`.
pub async fn save(dir: &Path, corpus: &Corpus, fingerprint: &EncoderFingerprint) -> AppResult<()> {
    let bytes = encode(corpus, fingerprint, Utc::now())
        .map_err(|e| AppError::Persistence(format!("Failed to serialize snapshot: {}", e)))?;

    let tmp = temp_path(dir);
    let path = snapshot_path(dir);

    write_synced(&tmp, &bytes).await.map_err(|e| {
        AppError::Persistence(format!("Failed to write snapshot {:?}: {}", tmp, e))
    })?;

    if let Err(e) = tokio::fs::rename(&tmp, &path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(AppError::Persistence(format!(
            "Failed to move snapshot into place at {:?}: {}",
            path, e
        )));
    }

    // The rename is only durable once the directory entry is synced
    if let Err(e) = sync_dir(dir).await {
        tracing::warn!("Could not sync store directory {:?}: {}", dir, e);
    }

    tracing::debug!(
        "Wrote snapshot {:?} ({} records, {} bytes)",
        path,
        corpus.len(),
        bytes.len()
    );
    Ok(())
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Move an unusable snapshot aside so the next save does not overwrite it.
///
/// Best effort: returns the new path on success, `None` otherwise. Targets
/// are never reused, so repeated quarantines keep every earlier file.
pub async fn quarantine(dir: &Path) -> Option<PathBuf> {
    let path = snapshot_path(dir);
    let stamp = Utc::now().timestamp_millis();

    let mut target = dir.join(format!("{}.corrupt-{}", SNAPSHOT_FILE, stamp));
    let mut n = 1;
    while tokio::fs::try_exists(&target).await.unwrap_or(false) {
        target = dir.join(format!("{}.corrupt-{}-{}", SNAPSHOT_FILE, stamp, n));
        n += 1;
    }

    match tokio::fs::rename(&path, &target).await {
        Ok(()) => Some(target),
        Err(e) => {
            tracing::warn!("Could not quarantine snapshot {:?}: {}", path, e);
            None
        }
    }
}
