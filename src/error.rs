//! Error taxonomy for the SIP → bag pipeline.
//!
//! Every failure is fatal to the run that raised it; nothing in the pipeline
//! retries. The variants map onto the four failure families an operator has
//! to tell apart: naming, structure, missing metadata, and I/O.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a SIP folder failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureViolation {
    #[error("SIP path is not a directory (detected as file)")]
    NotADirectory,

    #[error("SIP folder must not contain sub-folders (found {count})")]
    NestedFolder { count: usize },

    #[error("SIP folder must contain at least one file")]
    EmptyFolder,
}

#[derive(Debug, Error)]
pub enum SipError {
    #[error(
        "SIP folder name '{name}' must contain exactly two or no underscores (in {})",
        .root.display()
    )]
    NamingViolation { name: String, root: PathBuf },

    #[error("invalid SIP structure at {}: {kind}", .path.display())]
    InvalidStructure {
        path: PathBuf,
        kind: StructureViolation,
    },

    #[error("missing required field at {xpath} in {}: {message}", .path.display())]
    Reference {
        path: PathBuf,
        xpath: String,
        message: String,
    },

    #[error("content model filter '{0}' must not contain an underscore; one is prepended automatically")]
    InvalidFilter(String),

    #[error("failed to parse XML document {}: {message}", .path.display())]
    Xml { path: PathBuf, message: String },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to zip bag {}: {source}", .path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("bag worker failed: {0}")]
    Task(String),
}

impl SipError {
    /// Adapter for `map_err` that attaches the offending path to an I/O error.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> SipError {
        let path = path.as_ref().to_path_buf();
        move |source| SipError::Io { path, source }
    }

    pub(crate) fn reference(
        path: impl AsRef<Path>,
        xpath: impl Into<String>,
        message: impl Into<String>,
    ) -> SipError {
        SipError::Reference {
            path: path.as_ref().to_path_buf(),
            xpath: xpath.into(),
            message: message.into(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, SipError::Reference { .. })
    }

    pub fn is_naming_violation(&self) -> bool {
        matches!(self, SipError::NamingViolation { .. })
    }

    pub fn structure_violation(&self) -> Option<&StructureViolation> {
        match self {
            SipError::InvalidStructure { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_adapter_keeps_path() {
        let err = SipError::io("/tmp/missing")(io::Error::from(io::ErrorKind::NotFound));
        assert!(err.to_string().contains("/tmp/missing"));
    }

    #[test]
    fn reference_error_names_the_xpath() {
        let err = SipError::reference("/sips/letter1", ".//idno[@type='PID']", "no element");
        assert!(err.is_reference());
        assert!(err.to_string().contains(".//idno[@type='PID']"));
    }
}
