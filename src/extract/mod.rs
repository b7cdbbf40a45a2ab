//! Metadata extractors, one strategy per content model.
//!
//! [`select_extractor`] picks the strategy for a resolved [`SipFolder`]:
//!
//! | Content model | Source document | Extractor |
//! |---------------|-----------------|-----------|
//! | `tei` or empty | present | [`TeiExtractor`] |
//! | `gml` | present | [`GmlExtractor`] |
//! | anything else | present | [`GenericExtractor`] (full text still available) |
//! | any | absent | [`GenericExtractor`] |

mod generic;
mod gml;
mod tei;

pub use generic::GenericExtractor;
pub use gml::GmlExtractor;
pub use tei::{TeiDocument, TeiExtractor};

use std::path::Path;

use tracing::info;

use crate::config::Conventions;
use crate::error::{Result, SipError};
use crate::models::{ContentModel, SipFolder, SipMetadata};
use crate::xml::{Namespaces, SourceDocument, TEI_NAMESPACES};

/// Rights statement for object-level descriptors.
pub const OBJECT_RIGHTS: &str = "CC BY-SA 4.0";

/// A content-model specific metadata extraction strategy.
pub trait Extractor: Send + Sync {
    /// Type tag written as `objectType` in `sip.json`.
    fn object_type(&self) -> &'static str;

    /// Build the object descriptor for `sip`.
    fn extract(&self, sip: &SipFolder) -> Result<SipMetadata>;

    /// Namespaces used when querying the source document.
    fn namespaces(&self) -> &'static Namespaces {
        &TEI_NAMESPACES
    }

    /// Whitespace-cleaned text of the source document, if the SIP has one.
    fn extract_full_text(&self, sip: &SipFolder) -> Result<Option<String>> {
        if !sip.has_source() {
            return Ok(None);
        }
        let doc = SourceDocument::load(&sip.source_path, self.namespaces())?;
        Ok(Some(doc.full_text()))
    }

    /// Serialize `metadata` as a `sip.json` descriptor at `target`.
    fn write(&self, metadata: &SipMetadata, target: &Path) -> Result<()> {
        write_descriptor(metadata, target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Generic,
    Tei,
    Gml,
}

impl ExtractorKind {
    pub fn for_sip(sip: &SipFolder) -> Self {
        if !sip.has_source() {
            return ExtractorKind::Generic;
        }
        match sip.content_model {
            ContentModel::Tei | ContentModel::Default => ExtractorKind::Tei,
            ContentModel::Gml => ExtractorKind::Gml,
            ContentModel::Other(_) => ExtractorKind::Generic,
        }
    }
}

pub fn select_extractor<'a>(
    sip: &SipFolder,
    conventions: &'a Conventions,
) -> Box<dyn Extractor + 'a> {
    match ExtractorKind::for_sip(sip) {
        ExtractorKind::Tei => Box::new(TeiExtractor::new(conventions)),
        ExtractorKind::Gml => Box::new(GmlExtractor),
        ExtractorKind::Generic => Box::new(GenericExtractor),
    }
}

/// Serialize first, then write, so a failed serialization leaves no file behind.
pub fn write_descriptor(metadata: &SipMetadata, target: &Path) -> Result<()> {
    let json = metadata.to_descriptor_json()?;
    std::fs::write(target, json).map_err(SipError::io(target))?;
    info!("Wrote sip.json to {}", target.display());
    Ok(())
}

fn types_for(sip: &SipFolder) -> Vec<String> {
    if sip.subtype.is_empty() {
        Vec::new()
    } else {
        vec![sip.subtype.clone()]
    }
}
