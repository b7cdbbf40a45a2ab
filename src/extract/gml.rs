use super::{types_for, Extractor, OBJECT_RIGHTS};
use crate::datastreams;
use crate::error::Result;
use crate::models::{SipFolder, SipMetadata};
use crate::xml::{Namespaces, SourceDocument, GML_NAMESPACES};

const PID_XPATH: &str = ".//gdas:PID";
const NAME_XPATH: &str = ".//gml:name";

/// Place records: PID and name are mandatory, everything else is derived.
#[derive(Debug, Default, Clone, Copy)]
pub struct GmlExtractor;

impl Extractor for GmlExtractor {
    fn object_type(&self) -> &'static str {
        "GML"
    }

    fn namespaces(&self) -> &'static Namespaces {
        &GML_NAMESPACES
    }

    fn extract(&self, sip: &SipFolder) -> Result<SipMetadata> {
        let doc = SourceDocument::load(&sip.source_path, self.namespaces())?;
        let id = doc.require_text(PID_XPATH)?;
        let title = doc.require_text(NAME_XPATH)?;

        let publisher_creator = format!("{} GAMS project", sip.project);
        let content_files = datastreams::resolve(sip, &[])?.into_values().collect();

        Ok(SipMetadata {
            id,
            description: format!("Places for {}", title),
            title,
            creator: publisher_creator.clone(),
            rights: OBJECT_RIGHTS.to_string(),
            publisher: publisher_creator,
            object_type: self.object_type().to_string(),
            types: types_for(sip),
            content_files,
        })
    }
}
