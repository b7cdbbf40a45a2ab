//! Core data models for the SIP → bag pipeline.
//!
//! A [`SipFolder`] is what the locator resolves on disk; a [`SipMetadata`]
//! is what an extractor produces from it; [`SipMetadata::to_descriptor_json`]
//! renders the `sip.json` envelope consumed by the ingest service.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// `$schema` URL emitted in every `sip.json`.
pub const SIP_SCHEMA_URL: &str =
    "https://gitlab.cern.ch/digitalmemory/sip-spec/-/blob/master/sip-schema-d1.json";
/// Tool name emitted as `created_by`.
pub const CREATED_BY: &str = "Pyrilo";
/// Every bag-relative content path lives below this prefix.
pub const BAG_CONTENT_PREFIX: &str = "data/content/";

/// Metadata-extraction dialect selected by the folder name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentModel {
    /// Empty label from a `base__subtype` name; extracted like TEI.
    Default,
    Tei,
    Gml,
    /// Any other label; extracted generically.
    Other(String),
}

impl ContentModel {
    /// Parse a case-folded label from the naming grammar.
    pub fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "" => ContentModel::Default,
            "tei" => ContentModel::Tei,
            "gml" => ContentModel::Gml,
            other => ContentModel::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ContentModel::Default => "",
            ContentModel::Tei => "tei",
            ContentModel::Gml => "gml",
            ContentModel::Other(label) => label,
        }
    }
}

impl fmt::Display for ContentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentModel::Default => f.write_str("default"),
            other => f.write_str(other.label()),
        }
    }
}

/// A resolved, validated SIP folder. Lives for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipFolder {
    pub project: String,
    pub folder_name: String,
    pub folder_path: PathBuf,
    /// Conventional source-document path; may not exist for non-XML SIPs.
    pub source_path: PathBuf,
    pub subtype: String,
    pub content_model: ContentModel,
}

impl SipFolder {
    pub fn has_source(&self) -> bool {
        self.source_path.is_file()
    }

    pub fn path(&self) -> &Path {
        &self.folder_path
    }
}

/// Descriptor of one datastream inside a bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentFileMetadata {
    pub bagpath: String,
    pub dsid: String,
    pub mimetype: Option<String>,
    pub title: String,
    pub description: String,
    pub creator: String,
    pub rights: String,
    pub publisher: String,
    pub size: u64,
}

/// Object-level descriptor produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub creator: String,
    pub rights: String,
    pub publisher: String,
    pub object_type: String,
    pub types: Vec<String>,
    pub content_files: Vec<ContentFileMetadata>,
}

/// The `sip.json` envelope: `id`/`object_type` are re-keyed as
/// `recid`/`objectType` and the static provenance fields are appended.
#[derive(Debug, Serialize)]
struct SipDescriptor<'a> {
    title: &'a str,
    description: &'a str,
    creator: &'a str,
    rights: &'a str,
    publisher: &'a str,
    types: &'a [String],
    #[serde(rename = "contentFiles")]
    content_files: &'a [ContentFileMetadata],
    #[serde(rename = "$schema")]
    schema: &'static str,
    created_by: &'static str,
    source: &'static str,
    recid: &'a str,
    #[serde(rename = "objectType")]
    object_type: &'a str,
}

impl SipMetadata {
    fn descriptor(&self) -> SipDescriptor<'_> {
        SipDescriptor {
            title: &self.title,
            description: &self.description,
            creator: &self.creator,
            rights: &self.rights,
            publisher: &self.publisher,
            types: &self.types,
            content_files: &self.content_files,
            schema: SIP_SCHEMA_URL,
            created_by: CREATED_BY,
            source: "local",
            recid: &self.id,
            object_type: &self.object_type,
        }
    }

    pub fn to_descriptor_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.descriptor())
    }

    pub fn to_descriptor_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.descriptor())
    }
}
