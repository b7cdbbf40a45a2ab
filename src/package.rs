//! Zip archives of finished bags, ready for upload.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{Result, SipError};

/// Zip the contents of `bag_dir` in memory. Entry names are relative to the
/// bag directory and use `/` separators.
pub fn zip_bag(bag_dir: &Path) -> Result<Vec<u8>> {
    let zip_err = |source: zip::result::ZipError| SipError::Zip {
        path: bag_dir.to_path_buf(),
        source,
    };

    let mut archive = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut archive));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for entry in WalkDir::new(bag_dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(bag_dir).to_path_buf();
                SipError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            let relative = entry.path().strip_prefix(bag_dir).unwrap_or(entry.path());
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if entry.file_type().is_dir() {
                zip.add_directory(name, options).map_err(zip_err)?;
            } else {
                let content = std::fs::read(entry.path()).map_err(SipError::io(entry.path()))?;
                zip.start_file(name, options).map_err(zip_err)?;
                zip.write_all(&content).map_err(SipError::io(entry.path()))?;
            }
        }

        zip.finish().map_err(zip_err)?;
    }

    Ok(archive)
}

/// Bag directories directly under `bags_root`, sorted by name.
pub fn list_bags(bags_root: &Path) -> Result<Vec<PathBuf>> {
    let mut bags = Vec::new();
    for entry in std::fs::read_dir(bags_root).map_err(SipError::io(bags_root))? {
        let path = entry.map_err(SipError::io(bags_root))?.path();
        if path.is_dir() {
            bags.push(path);
        }
    }
    bags.sort();
    Ok(bags)
}

/// Zip `bag_name` (or every bag when `None`) into `<bags_root>/<bag>.zip`.
pub fn pack(bags_root: &Path, bag_name: Option<&str>) -> Result<Vec<PathBuf>> {
    let bags = match bag_name {
        Some(name) => {
            let dir = bags_root.join(name);
            if !dir.is_dir() {
                return Err(SipError::Io {
                    path: dir,
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "bag directory not found",
                    ),
                });
            }
            vec![dir]
        }
        None => list_bags(bags_root)?,
    };

    let mut written = Vec::with_capacity(bags.len());
    for bag in bags {
        let bytes = zip_bag(&bag)?;
        let name = bag
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let target = bags_root.join(format!("{}.zip", name));
        std::fs::write(&target, &bytes).map_err(SipError::io(&target))?;
        info!("Packed {} ({} bytes)", target.display(), bytes.len());
        written.push(target);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn sample_bag(root: &Path, name: &str) -> PathBuf {
        let bag = root.join(name);
        fs::create_dir_all(bag.join("data/content")).unwrap();
        fs::create_dir_all(bag.join("data/meta")).unwrap();
        fs::write(bag.join("bagit.txt"), "BagIt-Version: 0.97\n").unwrap();
        fs::write(bag.join("data/content/page1.jpg"), b"jpg").unwrap();
        fs::write(bag.join("data/meta/sip.json"), "{}").unwrap();
        bag
    }

    #[test]
    fn zip_uses_bag_relative_names() {
        let tmp = TempDir::new().unwrap();
        let bag = sample_bag(tmp.path(), "letter1");

        let bytes = zip_bag(&bag).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert!(names.contains(&"bagit.txt".to_string()));
        assert!(names.contains(&"data/content/page1.jpg".to_string()));
        assert!(names.contains(&"data/meta/sip.json".to_string()));

        let mut content = String::new();
        archive
            .by_name("data/meta/sip.json")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "{}");
    }

    #[test]
    fn pack_all_bags_skips_files() {
        let tmp = TempDir::new().unwrap();
        sample_bag(tmp.path(), "a");
        sample_bag(tmp.path(), "b");
        fs::write(tmp.path().join("readme.txt"), "x").unwrap();

        let written = pack(tmp.path(), None).unwrap();
        assert_eq!(
            written,
            vec![tmp.path().join("a.zip"), tmp.path().join("b.zip")]
        );
        assert!(tmp.path().join("a.zip").is_file());
    }

    #[test]
    fn pack_unknown_bag_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(pack(tmp.path(), Some("nope")).is_err());
    }
}
