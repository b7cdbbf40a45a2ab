use tracing::warn;

use super::{types_for, Extractor, OBJECT_RIGHTS};
use crate::datastreams;
use crate::error::Result;
use crate::models::{SipFolder, SipMetadata};

/// Placeholder metadata for SIPs without a content-model specific extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericExtractor;

impl Extractor for GenericExtractor {
    fn object_type(&self) -> &'static str {
        "Base object"
    }

    fn extract(&self, sip: &SipFolder) -> Result<SipMetadata> {
        warn!(
            "No metadata extraction for content model '{}'; creating placeholder metadata for {}",
            sip.content_model,
            sip.folder_path.display()
        );

        let project = &sip.project;
        let content_files = datastreams::resolve(sip, &[])?.into_values().collect();

        Ok(SipMetadata {
            id: sip.folder_name.clone(),
            title: format!("Object for project: {}", project),
            description: format!(
                "Object created without implemented metadata extraction for the content model. For SIP: {}",
                sip.folder_path.display()
            ),
            creator: project.clone(),
            rights: OBJECT_RIGHTS.to_string(),
            publisher: project.clone(),
            object_type: self.object_type().to_string(),
            types: types_for(sip),
            content_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentModel;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn placeholder_metadata_uses_folder_name_and_project() {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("demo_lido_painting");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("front.png"), b"png").unwrap();
        fs::write(folder.join("back.png"), b"png!").unwrap();

        let sip = SipFolder {
            project: "demo".to_string(),
            folder_name: "demo_lido_painting".to_string(),
            folder_path: folder.clone(),
            source_path: folder.join("SOURCE.xml"),
            subtype: "painting".to_string(),
            content_model: ContentModel::Other("lido".to_string()),
        };

        let meta = GenericExtractor.extract(&sip).unwrap();
        assert_eq!(meta.id, "demo_lido_painting");
        assert_eq!(meta.title, "Object for project: demo");
        assert!(meta.description.contains(&folder.display().to_string()));
        assert_eq!(meta.object_type, "Base object");
        assert_eq!(meta.types, vec!["painting"]);
        let dsids: Vec<_> = meta.content_files.iter().map(|f| f.dsid.as_str()).collect();
        assert_eq!(dsids, vec!["back", "front"]);
    }

    #[test]
    fn empty_subtype_yields_no_types() {
        let tmp = TempDir::new().unwrap();
        let folder = tmp.path().join("scans");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("page1.jpg"), b"jpg").unwrap();

        let sip = SipFolder {
            project: "demo".to_string(),
            folder_name: "scans".to_string(),
            folder_path: folder.clone(),
            source_path: folder.join("SOURCE.xml"),
            subtype: String::new(),
            content_model: ContentModel::Tei,
        };

        let meta = GenericExtractor.extract(&sip).unwrap();
        assert!(meta.types.is_empty());
        let json = meta.to_descriptor_value().unwrap();
        assert_eq!(json["types"], serde_json::json!([]));
    }
}
