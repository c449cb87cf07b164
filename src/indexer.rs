//! Offline batch indexer.
//!
//! Turns one raw source document (statute XML or plain text) into a set of
//! overlapping fixed-size chunks stored in the FTS5 `chunks` table. The whole
//! chunk set for a source is replaced in a single transaction on every run;
//! there is no incremental update and no per-chunk deletion.

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::config::IndexingConfig;
use crate::error::{PipelineError, Result};

/// Strip markup and collapse whitespace into single spaces.
///
/// Any `<...>` tag becomes one space, which is enough for the e-Gov statute
/// XML: element text is what matters, structure does not survive chunking
/// anyway.
pub fn normalize_source(raw: &str) -> String {
    let tag_re = Regex::new(r"<[^>]+>").unwrap();
    let ws_re = Regex::new(r"\s+").unwrap();

    let stripped = tag_re.replace_all(raw, " ");
    ws_re.replace_all(&stripped, " ").trim().to_string()
}

/// Split normalized text into overlapping character windows.
///
/// Window size `size`, each subsequent window starting `overlap` chars before
/// the previous end (clamped to 0). The tail shorter than `size` still
/// becomes the final chunk.
pub fn chunk_windows(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap);
    }

    out
}

/// Replace the stored chunk set for `source_id` with a fresh chunking of
/// `raw_text`. Returns the number of chunks written.
///
/// Delete + insert + source-row upsert run in one transaction so concurrent
/// readers never observe a partially replaced source.
pub async fn reindex(
    pool: &SqlitePool,
    source_id: &str,
    raw_text: &str,
    config: &IndexingConfig,
) -> Result<usize> {
    let text = normalize_source(raw_text);
    let parts = chunk_windows(&text, config.chunk_size, config.chunk_overlap);

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let content_hash = format!("{:x}", hasher.finalize());

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| PipelineError::Index(e.to_string()))?;

    sqlx::query("DELETE FROM chunks WHERE source_id = ?")
        .bind(source_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PipelineError::Index(e.to_string()))?;

    for part in &parts {
        sqlx::query("INSERT INTO chunks (source_id, content) VALUES (?, ?)")
            .bind(source_id)
            .bind(part)
            .execute(&mut *tx)
            .await
            .map_err(|e| PipelineError::Index(e.to_string()))?;
    }

    sqlx::query(
        r#"
        INSERT INTO sources (source_id, content_hash, chunk_count, indexed_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(source_id) DO UPDATE SET
            content_hash = excluded.content_hash,
            chunk_count = excluded.chunk_count,
            indexed_at = excluded.indexed_at
        "#,
    )
    .bind(source_id)
    .bind(&content_hash)
    .bind(parts.len() as i64)
    .bind(Utc::now().timestamp())
    .execute(&mut *tx)
    .await
    .map_err(|e| PipelineError::Index(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| PipelineError::Index(e.to_string()))?;

    Ok(parts.len())
}
