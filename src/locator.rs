//! Content locator: resolves the child folders of the SIPs root.
//!
//! Folder names follow a small grammar:
//!
//! | Name | Content model | Subtype |
//! |------|---------------|---------|
//! | `letter1` | `tei` | empty |
//! | `demo_gml_placelist` | `gml` | `placelist` |
//! | `a_b`, `a_b_c_d` | naming violation | |
//!
//! Naming is checked for every child directory before any folder is handed
//! out, so one bad name aborts the whole walk.

use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::Conventions;
use crate::error::{Result, SipError, StructureViolation};
use crate::models::{ContentModel, SipFolder};

/// Which folders a walk visits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelFilter {
    /// Every valid folder, default and extended grammar alike.
    All,
    /// Only zero-underscore folders.
    DefaultOnly,
    /// Folders whose name contains `_{label}`.
    Model(String),
}

impl ModelFilter {
    fn accepts(&self, folder_name: &str) -> bool {
        match self {
            ModelFilter::All => true,
            ModelFilter::DefaultOnly => !folder_name.contains('_'),
            ModelFilter::Model(label) => folder_name.contains(&format!("_{}", label)),
        }
    }
}

/// Split a folder name into `(content model, subtype)` per the naming grammar.
pub fn parse_folder_name(name: &str, root: &Path) -> Result<(ContentModel, String)> {
    let parts: Vec<&str> = name.split('_').collect();
    match parts.len() {
        1 => Ok((ContentModel::Tei, String::new())),
        3 => Ok((
            ContentModel::from_label(parts[1]),
            parts[2].to_lowercase(),
        )),
        _ => Err(SipError::NamingViolation {
            name: name.to_string(),
            root: root.to_path_buf(),
        }),
    }
}

/// Check that `path` is a directory holding at least one file and no sub-folders.
pub fn validate_structure(path: &Path) -> Result<()> {
    if path.is_file() {
        return Err(SipError::InvalidStructure {
            path: path.to_path_buf(),
            kind: StructureViolation::NotADirectory,
        });
    }

    let mut entries = 0usize;
    let mut sub_folders = 0usize;
    for entry in std::fs::read_dir(path).map_err(SipError::io(path))? {
        let entry = entry.map_err(SipError::io(path))?;
        entries += 1;
        if entry.path().is_dir() {
            sub_folders += 1;
        }
    }

    if sub_folders != 0 {
        return Err(SipError::InvalidStructure {
            path: path.to_path_buf(),
            kind: StructureViolation::NestedFolder { count: sub_folders },
        });
    }
    if entries == 0 {
        return Err(SipError::InvalidStructure {
            path: path.to_path_buf(),
            kind: StructureViolation::EmptyFolder,
        });
    }
    Ok(())
}

/// Resolve a single SIP folder outside of a full walk.
pub fn resolve_folder(path: &Path, project: &str, conventions: &Conventions) -> Result<SipFolder> {
    let folder_path = std::fs::canonicalize(path).map_err(SipError::io(path))?;
    let folder_name = folder_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let root = folder_path.parent().unwrap_or(&folder_path);
    let (content_model, subtype) = parse_folder_name(&folder_name, root)?;
    validate_structure(&folder_path)?;

    Ok(SipFolder {
        project: project.to_string(),
        source_path: folder_path.join(&conventions.source_file_name),
        folder_name,
        folder_path,
        subtype,
        content_model,
    })
}

/// Scan `root` and resolve every accepted SIP folder, sorted by name.
///
/// Each call rescans the directory. Non-directory children are skipped.
pub fn walk(
    root: &Path,
    project: &str,
    filter: &ModelFilter,
    conventions: &Conventions,
) -> Result<Vec<SipFolder>> {
    if let ModelFilter::Model(label) = filter {
        if label.contains('_') {
            return Err(SipError::InvalidFilter(label.clone()));
        }
    }

    let root = std::fs::canonicalize(root).map_err(SipError::io(root))?;

    let mut candidates = Vec::new();
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(&root).to_path_buf();
            SipError::Io {
                path,
                source: e.into(),
            }
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let folder_name = entry.file_name().to_string_lossy().to_string();
        let (content_model, subtype) = parse_folder_name(&folder_name, &root)?;
        candidates.push((folder_name, path.to_path_buf(), content_model, subtype));
    }

    let mut folders = Vec::new();
    for (folder_name, folder_path, content_model, subtype) in candidates {
        if !filter.accepts(&folder_name) {
            debug!("Skipping SIP folder {} (filter {:?})", folder_name, filter);
            continue;
        }

        validate_structure(&folder_path)?;

        let source_path = folder_path.join(&conventions.source_file_name);
        info!(
            "Resolved SIP {} (content model '{}', subtype '{}')",
            folder_name, content_model, subtype
        );
        folders.push(SipFolder {
            project: project.to_string(),
            folder_name,
            folder_path,
            source_path,
            subtype,
            content_model,
        });
    }

    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sip(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("page1.jpg"), b"jpg").unwrap();
    }

    fn names(folders: &[SipFolder]) -> Vec<&str> {
        folders.iter().map(|f| f.folder_name.as_str()).collect()
    }

    #[test]
    fn two_underscores_yield_case_folded_model_and_subtype() {
        for (name, model, subtype) in [
            ("demo_gml_placelist", ContentModel::Gml, "placelist"),
            ("demo_TEI_Letter", ContentModel::Tei, "letter"),
            ("x_LIDO_Painting", ContentModel::Other("lido".to_string()), "painting"),
            ("x__plain", ContentModel::Default, "plain"),
        ] {
            let (m, s) = parse_folder_name(name, Path::new("/sips")).unwrap();
            assert_eq!(m, model, "{}", name);
            assert_eq!(s, subtype, "{}", name);
        }
    }

    #[test]
    fn zero_underscores_default_to_tei() {
        let (m, s) = parse_folder_name("letter1", Path::new("/sips")).unwrap();
        assert_eq!(m, ContentModel::Tei);
        assert_eq!(s, "");
    }

    #[test]
    fn one_or_three_plus_underscores_are_naming_violations() {
        for name in ["a_b", "a_b_c_d", "a_b_c_d_e", "_"] {
            let err = parse_folder_name(name, Path::new("/sips")).unwrap_err();
            assert!(err.is_naming_violation(), "{}", name);
        }
    }

    #[test]
    fn structure_accepts_flat_folder_with_files() {
        let tmp = TempDir::new().unwrap();
        sip(tmp.path(), "letter1");
        validate_structure(&tmp.path().join("letter1")).unwrap();
    }

    #[test]
    fn structure_rejects_nested_folder() {
        let tmp = TempDir::new().unwrap();
        sip(tmp.path(), "letter1");
        fs::create_dir(tmp.path().join("letter1").join("nested")).unwrap();
        let err = validate_structure(&tmp.path().join("letter1")).unwrap_err();
        assert_eq!(
            err.structure_violation(),
            Some(&StructureViolation::NestedFolder { count: 1 })
        );
    }

    #[test]
    fn structure_rejects_empty_folder_and_file() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();
        let err = validate_structure(&tmp.path().join("empty")).unwrap_err();
        assert_eq!(err.structure_violation(), Some(&StructureViolation::EmptyFolder));

        fs::write(tmp.path().join("file"), b"x").unwrap();
        let err = validate_structure(&tmp.path().join("file")).unwrap_err();
        assert_eq!(
            err.structure_violation(),
            Some(&StructureViolation::NotADirectory)
        );
    }

    #[test]
    fn filters_select_folders() {
        let tmp = TempDir::new().unwrap();
        sip(tmp.path(), "letter1");
        sip(tmp.path(), "demo_gml_places");
        sip(tmp.path(), "demo_tei_letter");
        fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();
        let conventions = Conventions::default();

        let all = walk(tmp.path(), "demo", &ModelFilter::All, &conventions).unwrap();
        assert_eq!(names(&all), vec!["demo_gml_places", "demo_tei_letter", "letter1"]);

        let default_only =
            walk(tmp.path(), "demo", &ModelFilter::DefaultOnly, &conventions).unwrap();
        assert_eq!(names(&default_only), vec!["letter1"]);

        let gml = walk(
            tmp.path(),
            "demo",
            &ModelFilter::Model("gml".to_string()),
            &conventions,
        )
        .unwrap();
        assert_eq!(names(&gml), vec!["demo_gml_places"]);
        assert_eq!(gml[0].content_model, ContentModel::Gml);
        assert_eq!(gml[0].subtype, "places");
        assert_eq!(gml[0].project, "demo");
        assert!(gml[0].source_path.ends_with("SOURCE.xml"));
    }

    #[test]
    fn bad_name_aborts_walk_even_when_filtered_out() {
        let tmp = TempDir::new().unwrap();
        sip(tmp.path(), "letter1");
        sip(tmp.path(), "a_b");
        let err = walk(
            tmp.path(),
            "demo",
            &ModelFilter::DefaultOnly,
            &Conventions::default(),
        )
        .unwrap_err();
        assert!(err.is_naming_violation());
    }

    #[test]
    fn filter_with_underscore_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = walk(
            tmp.path(),
            "demo",
            &ModelFilter::Model("g_ml".to_string()),
            &Conventions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SipError::InvalidFilter(_)));
    }

    #[test]
    fn resolve_single_folder() {
        let tmp = TempDir::new().unwrap();
        sip(tmp.path(), "demo_gml_places");
        let folder = resolve_folder(
            &tmp.path().join("demo_gml_places"),
            "demo",
            &Conventions::default(),
        )
        .unwrap();
        assert_eq!(folder.folder_name, "demo_gml_places");
        assert_eq!(folder.content_model, ContentModel::Gml);
        assert!(!folder.has_source());

        sip(tmp.path(), "a_b");
        let err = resolve_folder(&tmp.path().join("a_b"), "demo", &Conventions::default())
            .unwrap_err();
        assert!(err.is_naming_violation());
    }

    #[test]
    fn empty_accepted_folder_aborts_walk() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("letter1")).unwrap();
        let err = walk(tmp.path(), "demo", &ModelFilter::All, &Conventions::default())
            .unwrap_err();
        assert_eq!(err.structure_violation(), Some(&StructureViolation::EmptyFolder));
    }
}
