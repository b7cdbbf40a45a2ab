//! Datastream resolver: one [`ContentFileMetadata`] per regular file in a SIP.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, SipError};
use crate::models::{ContentFileMetadata, SipFolder, BAG_CONTENT_PREFIX};

/// Datastreams keyed by dsid. Inserting an existing dsid replaces the
/// earlier descriptor (last write wins).
pub type DatastreamMap = BTreeMap<String, ContentFileMetadata>;

/// Size reported for descriptors that are not measured on disk.
pub const SIZE_PLACEHOLDER: u64 = 9_999_999;

/// Guess a MIME type from the file extension; `None` when unknown.
pub fn guess_mimetype(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "xml" => "application/xml",
        "json" => "application/json",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "jp2" => "image/jp2",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "rdf" => "application/rdf+xml",
        "zip" => "application/zip",
        "mp3" => "audio/mpeg",
        "wav" => "audio/x-wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "mpeg" | "mpg" => "video/mpeg",
        "gml" => "application/gml+xml",
        _ => return None,
    };
    Some(mime)
}

/// Bag-relative path of a file copied into `data/content/`.
pub fn bag_path(file_name: &str) -> String {
    format!("{}{}", BAG_CONTENT_PREFIX, file_name)
}

/// Split a file name into `(root, extension)` at the last dot.
fn split_ext(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], &file_name[pos..]),
        _ => (file_name, ""),
    }
}

/// Descriptor for a file measured on disk, with the project's datastream template.
pub fn describe_file(
    project: &str,
    file_name: &str,
    mimetype: Option<&str>,
    size: u64,
) -> ContentFileMetadata {
    let (root, _) = split_ext(file_name);
    ContentFileMetadata {
        bagpath: bag_path(file_name),
        dsid: root.to_string(),
        mimetype: mimetype.map(str::to_string),
        title: format!("Datastream containing the {} file", file_name),
        description: format!("Datastream for GAMS project {}.", project),
        creator: project.to_string(),
        rights: "CC BY 4.0".to_string(),
        publisher: format!("{} GAMS project", project),
        size,
    }
}

/// Resolve every regular file directly inside the SIP folder, skipping
/// sub-directories and any name in `ignore`.
pub fn resolve(sip: &SipFolder, ignore: &[String]) -> Result<DatastreamMap> {
    let folder = sip.path();
    let mut entries: Vec<_> = std::fs::read_dir(folder)
        .map_err(SipError::io(folder))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(SipError::io(folder))?;
    entries.sort_by_key(|e| e.file_name());

    let mut datastreams = DatastreamMap::new();
    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if ignore.iter().any(|ignored| *ignored == file_name) {
            debug!("Ignoring file to map as sip contentFile: {}", file_name);
            continue;
        }

        let size = std::fs::metadata(&path).map_err(SipError::io(&path))?.len();
        let descriptor = describe_file(&sip.project, &file_name, guess_mimetype(&path), size);
        datastreams.insert(descriptor.dsid.clone(), descriptor);
    }

    Ok(datastreams)
}
