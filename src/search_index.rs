//! Search-index JSON for TEI SIPs.
//!
//! Writes one `SEARCH_INDEX.json` (name configurable) into each TEI SIP
//! folder. A later bag run picks the file up as the search-index datastream.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, SipError};
use crate::extract::{ExtractorKind, TeiDocument};
use crate::locator::{self, ModelFilter};
use crate::models::SipFolder;

/// One entry of the search-index array.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SearchEntry {
    pub title: String,
    pub id: String,
    pub desc: String,
    pub types: Vec<String>,
    #[serde(rename = "_fulltext")]
    pub fulltext: String,
    #[serde(rename = "_type")]
    pub kind: &'static str,
}

/// Build the search entry for a single TEI SIP.
pub fn entry_for(sip: &SipFolder) -> Result<SearchEntry> {
    let tei = TeiDocument::load(sip)?;
    Ok(SearchEntry {
        title: tei.title()?,
        id: tei.pid()?,
        desc: tei.description()?,
        types: tei.terms()?,
        fulltext: tei.full_text(),
        kind: "digitalObject",
    })
}

/// Write the search index into every TEI SIP of `project`; returns the files written.
pub fn generate(config: &Config, project: &str) -> Result<Vec<PathBuf>> {
    let sips = locator::walk(
        &config.paths.sips_root,
        project,
        &ModelFilter::All,
        &config.conventions,
    )?;

    let mut written = Vec::new();
    for sip in sips {
        if ExtractorKind::for_sip(&sip) != ExtractorKind::Tei {
            debug!("Skipping {}: not a TEI SIP", sip.folder_name);
            continue;
        }

        let entry = entry_for(&sip)?;
        let json = serde_json::to_string_pretty(&[entry])?;
        let target = sip.path().join(&config.conventions.search_index_file_name);
        std::fs::write(&target, json).map_err(SipError::io(&target))?;
        info!("Wrote search index {}", target.display());
        written.push(target);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn writes_index_for_tei_sips_only() {
        let tmp = TempDir::new().unwrap();
        let config = Config::for_project_dir(tmp.path());
        let letter = config.paths.sips_root.join("letter1");
        let places = config.paths.sips_root.join("demo_lido_painting");
        fs::create_dir_all(&letter).unwrap();
        fs::create_dir_all(&places).unwrap();
        fs::write(places.join("front.png"), b"png").unwrap();
        fs::write(
            letter.join("SOURCE.xml"),
            r#"<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc>
      <titleStmt><title>Brief über Graz</title></titleStmt>
      <publicationStmt><idno type="PID">o:demo.letter1</idno></publicationStmt>
    </fileDesc>
    <profileDesc><textClass><keywords><term>travel</term><term>letter</term></keywords></textClass></profileDesc>
  </teiHeader>
  <text><body><p>Lieber Freund</p></body></text>
</TEI>"#,
        )
        .unwrap();

        let written = generate(&config, "demo").unwrap();
        assert_eq!(written.len(), 1);
        assert!(!places.join("SEARCH_INDEX.json").exists());

        let raw = fs::read_to_string(letter.join("SEARCH_INDEX.json")).unwrap();
        assert!(raw.contains("Brief über Graz"));
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &json[0];
        assert_eq!(entry["id"], "o:demo.letter1");
        assert_eq!(entry["types"], serde_json::json!(["letter", "travel"]));
        assert_eq!(entry["_type"], "digitalObject");
        assert_eq!(entry["desc"], "Digital object of the demo GAMS project.");
        assert!(entry["_fulltext"].as_str().unwrap().ends_with("Lieber Freund"));
    }
}
