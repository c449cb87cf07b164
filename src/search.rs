//! Ranked full-text retrieval over the chunk store.
//!
//! Pure local lookup: no generation call happens here. The store is opened
//! per call and closed before returning, so no connection stays pinned to a
//! request.

use regex::Regex;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::error::{PipelineError, Result};

/// One ranked match. Lower `score` = better (FTS5 bm25 convention).
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub source_id: String,
    /// Excerpt around the best matching region; matched spans wrapped in
    /// `【`/`】`, surrounding text elided with ` … `.
    pub snippet: String,
    pub score: f64,
}

/// Reduce a free-text question to an FTS5 match expression: keep Unicode
/// letters, digits, and whitespace, drop everything else.
pub fn normalize_query(query: &str) -> String {
    let strip_re = Regex::new(r"[^\p{L}\p{N}\s]").unwrap();
    let ws_re = Regex::new(r"\s+").unwrap();

    let stripped = strip_re.replace_all(query, " ");
    ws_re.replace_all(&stripped, " ").trim().to_string()
}

/// Ranked search over stored chunks. An empty normalized query returns no
/// results without touching the store; a store that cannot be opened is a
/// retrieval failure.
pub async fn search_chunks(
    config: &Config,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchResult>> {
    let q = normalize_query(query);
    if q.is_empty() {
        return Ok(Vec::new());
    }

    let pool = db::connect(config)
        .await
        .map_err(|e| PipelineError::Retrieval(e.to_string()))?;

    let rows = sqlx::query(
        r#"
        SELECT
            source_id,
            snippet(chunks, 1, '【', '】', ' … ', 12) AS snippet,
            bm25(chunks) AS score
        FROM chunks
        WHERE chunks MATCH ?
        ORDER BY score ASC
        LIMIT ?
        "#,
    )
    .bind(&q)
    .bind(limit)
    .fetch_all(&pool)
    .await;

    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => {
            pool.close().await;
            return Err(PipelineError::Retrieval(e.to_string()));
        }
    };

    let results = rows
        .iter()
        .map(|row| SearchResult {
            source_id: row.get("source_id"),
            snippet: row.get("snippet"),
            score: row.get("score"),
        })
        .collect();

    pool.close().await;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize_query("残業代って、請求できますか？"), "残業代って 請求できますか");
    }

    #[test]
    fn test_normalize_keeps_letters_and_digits() {
        assert_eq!(normalize_query("第36条 協定"), "第36条 協定");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_query("  解雇   予告  "), "解雇 予告");
    }

    #[test]
    fn test_normalize_symbols_only_becomes_empty() {
        assert_eq!(normalize_query("!?！？…（）"), "");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_query(""), "");
    }
}
