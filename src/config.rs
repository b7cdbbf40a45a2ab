use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub conventions: Conventions,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_sips_root")]
    pub sips_root: PathBuf,
    #[serde(default = "default_bags_root")]
    pub bags_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sips_root: default_sips_root(),
            bags_root: default_bags_root(),
        }
    }
}

fn default_sips_root() -> PathBuf {
    PathBuf::from("./project/sips")
}
fn default_bags_root() -> PathBuf {
    PathBuf::from("./project/bagit")
}

/// File-name conventions shared by every SIP folder of a project.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Conventions {
    #[serde(default = "default_source_file_name")]
    pub source_file_name: String,
    #[serde(default = "default_thumbnail_file_name")]
    pub thumbnail_file_name: String,
    #[serde(default = "default_search_index_file_name")]
    pub search_index_file_name: String,
    /// Raw page images superseded by the TEI `<graphic>` descriptors.
    #[serde(default = "default_tei_ignored_files")]
    pub tei_ignored_files: Vec<String>,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            source_file_name: default_source_file_name(),
            thumbnail_file_name: default_thumbnail_file_name(),
            search_index_file_name: default_search_index_file_name(),
            tei_ignored_files: default_tei_ignored_files(),
        }
    }
}

fn default_source_file_name() -> String {
    "SOURCE.xml".to_string()
}
fn default_thumbnail_file_name() -> String {
    "THUMBNAIL.jpg".to_string()
}
fn default_search_index_file_name() -> String {
    "SEARCH_INDEX.json".to_string()
}
fn default_tei_ignored_files() -> Vec<String> {
    vec!["1.JPG".to_string(), "2.JPG".to_string()]
}

impl Conventions {
    pub fn thumbnail_datastream_id(&self) -> &str {
        file_stem(&self.thumbnail_file_name)
    }

    pub fn search_index_datastream_id(&self) -> &str {
        file_stem(&self.search_index_file_name)
    }
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Abort the run on the first failing SIP.
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fail_fast: default_fail_fast(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_fail_fast() -> bool {
    true
}
fn default_max_concurrency() -> usize {
    1
}

impl Config {
    /// Configuration rooted at `project_dir`, with every other field defaulted.
    pub fn for_project_dir(project_dir: &Path) -> Self {
        Self {
            paths: PathsConfig {
                sips_root: project_dir.join("sips"),
                bags_root: project_dir.join("bagit"),
            },
            ..Self::default()
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.pipeline.max_concurrency == 0 {
        anyhow::bail!("pipeline.max_concurrency must be >= 1");
    }

    if config.paths.sips_root == config.paths.bags_root {
        anyhow::bail!("paths.sips_root and paths.bags_root must differ");
    }

    let conventions = &config.conventions;
    for (key, name) in [
        ("source_file_name", &conventions.source_file_name),
        ("thumbnail_file_name", &conventions.thumbnail_file_name),
        ("search_index_file_name", &conventions.search_index_file_name),
    ] {
        if name.is_empty() {
            anyhow::bail!("conventions.{} must not be empty", key);
        }
        if name.contains('/') || name.contains('\\') {
            anyhow::bail!(
                "conventions.{} must be a plain file name, got '{}'",
                key,
                name
            );
        }
    }

    Ok(())
}

/// Render the default configuration as TOML, used by `pyrilo init`.
pub fn default_config_toml() -> Result<String> {
    toml::to_string_pretty(&Config::default()).context("Failed to render default config")
}
