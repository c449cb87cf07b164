//! e-Gov statute retrieval.
//!
//! Fetches the machine-readable XML of a Japanese statute from the e-Gov
//! law API so it can be fed to the indexer. Two calls: resolve a law name
//! to its `LawId` via the law-list endpoint, then download the law data.

use crate::error::{PipelineError, Result};

const EGOV_BASE: &str = "https://laws.e-gov.go.jp/api/1";

/// Resolve an exact statute name (e.g. `労働基準法`) to its e-Gov `LawId`.
/// `category` selects the law-list bucket (2 = acts).
pub async fn lookup_law_id(client: &reqwest::Client, law_name: &str, category: u8) -> Result<String> {
    let url = format!("{}/lawlists/{}", EGOV_BASE, category);

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| PipelineError::Index(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Index(format!(
            "e-Gov lawlists failed: {}",
            status
        )));
    }

    let xml = response
        .text()
        .await
        .map_err(|e| PipelineError::Index(e.to_string()))?;

    let entries = parse_law_list(xml.as_bytes())?;
    entries
        .into_iter()
        .find(|(name, _)| name.trim() == law_name)
        .map(|(_, id)| id)
        .ok_or_else(|| PipelineError::Index(format!("LawId not found for \"{}\"", law_name)))
}

/// Download the full law XML for a `LawId` or law number.
pub async fn fetch_law_xml(client: &reqwest::Client, law_id: &str) -> Result<String> {
    let url = format!("{}/lawdata/{}", EGOV_BASE, law_id);

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| PipelineError::Index(e.to_string()))?;

    let status = response.status();
    if status.as_u16() == 404 {
        return Err(PipelineError::Index(format!("e-Gov lawdata 404: {}", law_id)));
    }
    if !status.is_success() {
        return Err(PipelineError::Index(format!(
            "e-Gov lawdata failed: {}",
            status
        )));
    }

    response
        .text()
        .await
        .map_err(|e| PipelineError::Index(e.to_string()))
}

/// Pull `(LawName, LawId)` pairs out of a law-list response.
fn parse_law_list(xml: &[u8]) -> Result<Vec<(String, String)>> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut current_name: Option<String> = None;
    let mut current_id: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"LawName" || name.as_ref() == b"LawId" {
                    let is_name = name.as_ref() == b"LawName";
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        let text = te.unescape().unwrap_or_default().to_string();
                        if is_name {
                            current_name = Some(text);
                        } else {
                            current_id = Some(text);
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"LawNameListInfo" {
                    if let (Some(name), Some(id)) = (current_name.take(), current_id.take()) {
                        entries.push((name, id));
                    }
                    current_name = None;
                    current_id = None;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(PipelineError::Index(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DataRoot>
  <ApplData>
    <Category>2</Category>
    <LawNameListInfo>
      <LawId>322AC0000000049</LawId>
      <LawName>労働基準法</LawName>
      <PromulgationDate>19470407</PromulgationDate>
    </LawNameListInfo>
    <LawNameListInfo>
      <LawId>129AC0000000089</LawId>
      <LawName>民法</LawName>
      <PromulgationDate>18960427</PromulgationDate>
    </LawNameListInfo>
  </ApplData>
</DataRoot>"#;

    #[test]
    fn test_parse_law_list_pairs() {
        let entries = parse_law_list(SAMPLE.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            ("労働基準法".to_string(), "322AC0000000049".to_string())
        );
        assert_eq!(entries[1].0, "民法");
    }

    #[test]
    fn test_parse_incomplete_entry_skipped() {
        let xml = r#"<DataRoot><ApplData>
            <LawNameListInfo><LawName>名前だけ</LawName></LawNameListInfo>
        </ApplData></DataRoot>"#;
        let entries = parse_law_list(xml.as_bytes()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_empty_list() {
        let entries = parse_law_list(b"<DataRoot><ApplData/></DataRoot>").unwrap();
        assert!(entries.is_empty());
    }
}
