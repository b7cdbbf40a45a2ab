use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::{types_for, Extractor, OBJECT_RIGHTS};
use crate::config::Conventions;
use crate::datastreams::{self, SIZE_PLACEHOLDER};
use crate::error::{Result, SipError};
use crate::models::{ContentFileMetadata, SipFolder, SipMetadata, BAG_CONTENT_PREFIX};
use crate::xml::{Element, SourceDocument, TEI_NAMESPACES, XML_NAMESPACE};

const PID_XPATH: &str = ".//idno[@type='PID']";
const TITLE_XPATH: &str = ".//titleStmt/title";
const DESCRIPTION_XPATH: &str = ".//encodingDesc/editorialDecl/p";
const AUTHOR_XPATH: &str = ".//author[@ana='marcrelator:aut']";
const TERM_XPATH: &str = ".//term";
const GRAPHIC_XPATH: &str = ".//facsimile/graphic";

const FILE_URL_PREFIX: &str = "file:///";

/// A TEI source document bound to the SIP it was read from.
pub struct TeiDocument<'s> {
    sip: &'s SipFolder,
    doc: SourceDocument,
}

impl<'s> TeiDocument<'s> {
    pub fn load(sip: &'s SipFolder) -> Result<Self> {
        let doc = SourceDocument::load(&sip.source_path, &TEI_NAMESPACES)?;
        Ok(Self { sip, doc })
    }

    pub fn pid(&self) -> Result<String> {
        self.doc.require_text(PID_XPATH)
    }

    pub fn title(&self) -> Result<String> {
        self.doc.require_text(TITLE_XPATH)
    }

    /// Editorial description, or the project placeholder when the document has none.
    pub fn description(&self) -> Result<String> {
        match self.doc.find(DESCRIPTION_XPATH)?.and_then(Element::text) {
            Some(text) => Ok(text.to_string()),
            None => {
                debug!(
                    "No description at {} in {}; using default",
                    DESCRIPTION_XPATH,
                    self.doc.path().display()
                );
                Ok(format!(
                    "Digital object of the {} GAMS project.",
                    self.sip.project
                ))
            }
        }
    }

    pub fn creator(&self) -> Result<String> {
        let default_creator = format!("{} (GAMS-project)", self.sip.project);

        let Some(author) = self.doc.find(AUTHOR_XPATH)? else {
            debug!("No marcrelator author in {}", self.doc.path().display());
            return Ok(default_creator);
        };

        let forename = self
            .doc
            .find_from(author, "./persName/forename")?
            .and_then(Element::text);
        let surname = self
            .doc
            .find_from(author, "./persName/surname")?
            .and_then(Element::text);

        match (forename, surname) {
            // TODO: switch to "{forename} {surname}" once the project creator default is retired.
            (Some(forename), Some(surname)) => debug!(
                "Author {} {} found; keeping project creator",
                forename, surname
            ),
            _ => debug!("Author without persName forename/surname; keeping project creator"),
        }

        Ok(default_creator)
    }

    /// Deduplicated `term` values, sorted.
    pub fn terms(&self) -> Result<Vec<String>> {
        let mut terms = BTreeSet::new();
        for term in self.doc.find_all(TERM_XPATH)? {
            match term.text() {
                Some(text) => {
                    terms.insert(text.to_string());
                }
                None => warn!(
                    "Empty term in {} (selected with {})",
                    self.doc.path().display(),
                    TERM_XPATH
                ),
            }
        }
        Ok(terms.into_iter().collect())
    }

    /// Datastream descriptors for every `facsimile/graphic` element.
    pub fn images(&self) -> Result<Vec<ContentFileMetadata>> {
        let graphics = self.doc.find_all(GRAPHIC_XPATH)?;
        if graphics.is_empty() {
            info!(
                "No images found in TEI document for SIP at {}",
                self.sip.folder_path.display()
            );
            return Ok(Vec::new());
        }

        let project = &self.sip.project;
        let mut images = Vec::with_capacity(graphics.len());
        for graphic in graphics {
            let url = graphic.attr("url").ok_or_else(|| {
                self.reference("@url", "no url attribute on <graphic> element")
            })?;
            let bagpath = self.image_bag_path(url)?;
            let mimetype = graphic.attr("mimeType").ok_or_else(|| {
                self.reference("@mimeType", "no mimeType attribute on <graphic> element")
            })?;
            let dsid = graphic.attr_ns(XML_NAMESPACE, "id").ok_or_else(|| {
                self.reference("@xml:id", "no xml:id attribute on <graphic> element")
            })?;

            debug!("Found image {} at {}", dsid, bagpath);
            images.push(ContentFileMetadata {
                bagpath,
                dsid: dsid.to_string(),
                mimetype: Some(mimetype.to_string()),
                title: dsid.to_string(),
                description: format!("Image datastream for GAMS project {}.", project),
                creator: project.clone(),
                rights: "CC BY 4.0".to_string(),
                publisher: format!("{} GAMS project", project),
                size: SIZE_PLACEHOLDER,
            });
        }

        info!("Found {} images in TEI document", images.len());
        Ok(images)
    }

    pub fn full_text(&self) -> String {
        self.doc.full_text()
    }

    fn reference(&self, attribute: &str, message: &str) -> SipError {
        SipError::reference(
            self.doc.path(),
            format!("{}/{}", GRAPHIC_XPATH, attribute),
            message,
        )
    }

    /// Rewrite `file:///name` to `data/content/name`; bare relative names get
    /// the same prefix. Other schemes and parent references are rejected.
    fn image_bag_path(&self, url: &str) -> Result<String> {
        let relative = url.strip_prefix(FILE_URL_PREFIX).unwrap_or(url);
        let relative = relative.strip_prefix(BAG_CONTENT_PREFIX).unwrap_or(relative);

        if let Some((scheme, _)) = relative.split_once("://") {
            return Err(self.reference(
                "@url",
                &format!(
                    "graphic url '{}' uses unsupported scheme '{}'; only file:/// and relative paths can be bagged",
                    url, scheme
                ),
            ));
        }
        if relative.is_empty()
            || relative.starts_with('/')
            || relative.split('/').any(|segment| segment == "..")
        {
            return Err(self.reference(
                "@url",
                &format!("graphic url '{}' does not point into the SIP folder", url),
            ));
        }
        Ok(format!("{}{}", BAG_CONTENT_PREFIX, relative))
    }
}

/// TEI documents: PID and title are mandatory, everything else falls back.
pub struct TeiExtractor<'a> {
    conventions: &'a Conventions,
}

impl<'a> TeiExtractor<'a> {
    pub fn new(conventions: &'a Conventions) -> Self {
        Self { conventions }
    }

    fn thumbnail(&self, sip: &SipFolder) -> Option<ContentFileMetadata> {
        let name = &self.conventions.thumbnail_file_name;
        if !sip.folder_path.join(name).exists() {
            return None;
        }
        Some(ContentFileMetadata {
            bagpath: datastreams::bag_path(name),
            dsid: self.conventions.thumbnail_datastream_id().to_string(),
            mimetype: Some("image/jpeg".to_string()),
            title: name.clone(),
            description: format!("Thumbnail generated for the {} project.", sip.project),
            creator: format!("{} GAMS-project", sip.project),
            rights: "CC BY 4.0".to_string(),
            publisher: format!("{} GAMS project", sip.project),
            size: SIZE_PLACEHOLDER,
        })
    }

    fn search_index(&self, sip: &SipFolder) -> Option<ContentFileMetadata> {
        let name = &self.conventions.search_index_file_name;
        if !sip.folder_path.join(name).exists() {
            return None;
        }
        Some(ContentFileMetadata {
            bagpath: datastreams::bag_path(name),
            dsid: self.conventions.search_index_datastream_id().to_string(),
            mimetype: Some("application/json".to_string()),
            title: name.clone(),
            description: format!("Base search json generated for the {} project.", sip.project),
            creator: format!("{} GAMS-project", sip.project),
            rights: "CC BY 4.0".to_string(),
            publisher: format!("{} GAMS project", sip.project),
            size: SIZE_PLACEHOLDER,
        })
    }
}

impl Extractor for TeiExtractor<'_> {
    fn object_type(&self) -> &'static str {
        "TEI"
    }

    fn extract(&self, sip: &SipFolder) -> Result<SipMetadata> {
        let tei = TeiDocument::load(sip)?;

        let id = tei.pid()?;
        let title = tei.title()?;
        let description = tei.description()?;
        let creator = tei.creator()?;
        let terms = tei.terms()?;
        debug!("Resolved {} terms for {}", terms.len(), id);

        // Image descriptors override the plain file descriptors by dsid.
        let mut files = datastreams::resolve(sip, &self.conventions.tei_ignored_files)?;
        let extras = tei
            .images()?
            .into_iter()
            .chain(self.thumbnail(sip))
            .chain(self.search_index(sip));
        for descriptor in extras {
            files.insert(descriptor.dsid.clone(), descriptor);
        }

        info!("Extracted metadata from TEI document for {}", id);
        Ok(SipMetadata {
            id,
            title,
            description,
            creator,
            rights: OBJECT_RIGHTS.to_string(),
            publisher: format!("{} GAMS project", sip.project),
            object_type: self.object_type().to_string(),
            types: types_for(sip),
            content_files: files.into_values().collect(),
        })
    }
}
