//! Bag assembler.
//!
//! Turns every SIP folder under the configured SIPs root into a bag directory
//! under the bags root:
//!
//! ```text
//! <bags_root>/<folder_name>/
//!   bagit.txt
//!   bag-info.txt
//!   manifest-md5.txt
//!   data/content/**      copy of the SIP folder
//!   data/meta/sip.json   object descriptor
//! ```
//!
//! A run always starts by clearing the bags root. Metadata is extracted
//! before a bag directory is created, so a SIP whose source document lacks a
//! required element never leaves a half-built bag behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::config::{Config, Conventions};
use crate::error::{Result, SipError};
use crate::extract::select_extractor;
use crate::locator::{self, ModelFilter};
use crate::models::{SipFolder, CREATED_BY};

const BAGIT_VERSION: &str = "0.97";
const MANIFEST_PLACEHOLDER: &str = "data/content/TEI_SOURCE.xml HASH";
const PAYLOAD_OXUM_PLACEHOLDER: &str = "[SOME HASH]";

/// Outcome of a [`transform`] run.
#[derive(Debug, Default)]
pub struct BagReport {
    /// Bag directories written, in folder-name order.
    pub built: Vec<PathBuf>,
    /// Folders that failed while fail-fast was disabled.
    pub failed: Vec<(String, SipError)>,
}

impl BagReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Remove every child directory of `bags_root`. Plain files are left alone.
pub fn clear_bags_root(bags_root: &Path) -> Result<()> {
    std::fs::create_dir_all(bags_root).map_err(SipError::io(bags_root))?;

    let entries = std::fs::read_dir(bags_root).map_err(SipError::io(bags_root))?;
    let mut removed = 0usize;
    for entry in entries {
        let path = entry.map_err(SipError::io(bags_root))?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(SipError::io(&path))?;
            removed += 1;
        }
    }

    info!(
        "Cleared {} bag directories under {}",
        removed,
        bags_root.display()
    );
    Ok(())
}

/// Build one bag from `sip` and return the bag directory.
pub fn build_bag(
    sip: &SipFolder,
    bags_root: &Path,
    conventions: &Conventions,
    date: NaiveDate,
) -> Result<PathBuf> {
    let extractor = select_extractor(sip, conventions);
    let metadata = extractor.extract(sip)?;

    let bag_dir = bags_root.join(&sip.folder_name);
    let content_dir = bag_dir.join("data").join("content");
    std::fs::create_dir_all(&content_dir).map_err(SipError::io(&content_dir))?;
    copy_tree(sip.path(), &content_dir)?;

    let meta_dir = bag_dir.join("data").join("meta");
    std::fs::create_dir_all(&meta_dir).map_err(SipError::io(&meta_dir))?;
    extractor.write(&metadata, &meta_dir.join("sip.json"))?;

    write_bag_files(&bag_dir, date)?;

    info!("Built bag {} ({})", bag_dir.display(), metadata.id);
    Ok(bag_dir)
}

/// Copy the contents of `from` into `to`, overwriting files that already exist.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            SipError::Io {
                path,
                source: e.into(),
            }
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(SipError::io(&target))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(SipError::io(entry.path()))?;
            debug!("Copied {} -> {}", entry.path().display(), target.display());
        }
    }
    Ok(())
}

/// Write `bagit.txt`, `bag-info.txt` and `manifest-md5.txt` into `bag_dir`.
///
/// Payload-Oxum and the md5 manifest are fixed placeholders; nothing is hashed.
pub fn write_bag_files(bag_dir: &Path, date: NaiveDate) -> Result<()> {
    let files = [
        (
            "bagit.txt",
            format!(
                "BagIt-Version: {}\nTag-File-Character-Encoding: UTF-8\n",
                BAGIT_VERSION
            ),
        ),
        (
            "bag-info.txt",
            format!(
                "Bag-Software-Agent: {}\nBagging-Date: {}\nPayload Oxum: {}\n",
                CREATED_BY,
                date.format("%Y-%m-%d"),
                PAYLOAD_OXUM_PLACEHOLDER
            ),
        ),
        ("manifest-md5.txt", format!("{}\n", MANIFEST_PLACEHOLDER)),
    ];

    for (name, content) in files {
        let path = bag_dir.join(name);
        std::fs::write(&path, content).map_err(SipError::io(&path))?;
    }
    Ok(())
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Locate every SIP of `project` and prepare the bags root for a run.
///
/// The walk runs before the clear so a naming or structure violation keeps
/// the previous bags on disk.
fn prepare(config: &Config, project: &str) -> Result<Vec<SipFolder>> {
    let sips = locator::walk(
        &config.paths.sips_root,
        project,
        &ModelFilter::All,
        &config.conventions,
    )?;
    clear_bags_root(&config.paths.bags_root)?;
    Ok(sips)
}

/// Sequential pipeline run over every SIP of `project`.
pub fn transform(config: &Config, project: &str) -> Result<BagReport> {
    let sips = prepare(config, project)?;
    let date = today();
    let fail_fast = config.pipeline.fail_fast;

    let mut report = BagReport::default();
    for sip in sips {
        if !sip.path().is_dir() {
            debug!("Skipping {}: not a directory", sip.path().display());
            continue;
        }
        match build_bag(&sip, &config.paths.bags_root, &config.conventions, date) {
            Ok(bag_dir) => report.built.push(bag_dir),
            Err(e) if fail_fast => return Err(e),
            Err(e) => {
                error!("Failed to build bag for {}: {}", sip.folder_name, e);
                report.failed.push((sip.folder_name, e));
            }
        }
    }

    info!(
        "Transform finished: {} built, {} failed",
        report.built.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Pipeline run that builds up to `pipeline.max_concurrency` bags at once on
/// the blocking pool. In fail-fast mode the first failure aborts the
/// remaining folders and is returned. Builds already running on the blocking
/// pool cannot be cancelled, so their bags may still appear after the error
/// is returned.
pub async fn transform_concurrent(config: &Config, project: &str) -> Result<BagReport> {
    let sips = prepare(config, project)?;
    let date = today();
    let fail_fast = config.pipeline.fail_fast;
    let semaphore = Arc::new(Semaphore::new(config.pipeline.max_concurrency.max(1)));
    let bags_root = Arc::new(config.paths.bags_root.clone());
    let conventions = Arc::new(config.conventions.clone());

    let mut tasks = JoinSet::new();
    for sip in sips {
        let semaphore = Arc::clone(&semaphore);
        let bags_root = Arc::clone(&bags_root);
        let conventions = Arc::clone(&conventions);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| SipError::Task(e.to_string()))?;
            let name = sip.folder_name.clone();
            let built = tokio::task::spawn_blocking(move || {
                build_bag(&sip, &bags_root, &conventions, date)
            })
            .await
            .map_err(|e| SipError::Task(e.to_string()))?;
            Ok::<_, SipError>((name, built))
        });
    }

    let mut report = BagReport::default();
    while let Some(joined) = tasks.join_next().await {
        let (name, built) = match joined {
            Ok(outcome) => outcome?,
            Err(e) => {
                tasks.abort_all();
                return Err(SipError::Task(e.to_string()));
            }
        };
        match built {
            Ok(bag_dir) => report.built.push(bag_dir),
            Err(e) if fail_fast => {
                tasks.abort_all();
                return Err(e);
            }
            Err(e) => {
                error!("Failed to build bag for {}: {}", name, e);
                report.failed.push((name, e));
            }
        }
    }

    report.built.sort();
    report.failed.sort_by(|a, b| a.0.cmp(&b.0));
    info!(
        "Transform finished: {} built, {} failed",
        report.built.len(),
        report.failed.len()
    );
    Ok(report)
}

/// Dispatch to [`transform`] or [`transform_concurrent`] by `max_concurrency`.
pub async fn run_transform(config: &Config, project: &str) -> Result<BagReport> {
    if config.pipeline.max_concurrency > 1 {
        transform_concurrent(config, project).await
    } else {
        transform(config, project)
    }
}
