//! Evidence block formatting for the generation prompt.

use crate::search::SearchResult;

/// Format retrieved excerpts into the context block that accompanies the
/// question. Empty input yields an empty string; the caller must then omit
/// the context section entirely rather than emit a bare header.
pub fn assemble(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let blocks: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "【根拠{}】source_id={}\nexcerpt={}",
                i + 1,
                r.source_id,
                r.snippet
            )
        })
        .collect();

    blocks.join("\n\n")
}
