//! # Pyrilo CLI (`pyrilo`)
//!
//! The `pyrilo` binary turns a folder of SIPs into BagIt-style bags ready for
//! ingest into a GAMS repository.
//!
//! ## Usage
//!
//! ```bash
//! pyrilo --config ./config/pyrilo.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pyrilo init` | Write a default config and create the SIPs/bags roots |
//! | `pyrilo sips` | List resolved SIP folders |
//! | `pyrilo bag <project>` | Clear the bags root and build one bag per SIP |
//! | `pyrilo fulltext <folder>` | Print the cleaned full text of a SIP's source document |
//! | `pyrilo search-index <project>` | Write a search-index JSON into every TEI SIP |
//! | `pyrilo pack [<bag>]` | Zip one or all bags |
//!
//! ## Examples
//!
//! ```bash
//! # List every SIP, including extended-grammar folders
//! pyrilo sips --all
//!
//! # Build bags for project "demo" with four workers, continuing past failures
//! pyrilo bag demo --jobs 4 --keep-going
//!
//! # Zip a single bag
//! pyrilo pack letter1
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use pyrilo::config::{self, Config};
use pyrilo::extract::select_extractor;
use pyrilo::locator::{self, ModelFilter};
use pyrilo::{bag, logging, package, search_index, sips};

/// Pyrilo: package GAMS submission information packages as bags.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. `pyrilo init` writes one with every default filled in.
#[derive(Parser)]
#[command(
    name = "pyrilo",
    about = "Pyrilo: repackage SIP folders into BagIt-style bags for GAMS ingest",
    version,
    long_about = "Pyrilo resolves SIP folders by naming convention, extracts object metadata \
    from their TEI or GML source documents, and writes one bag per SIP with a sip.json \
    descriptor for the GAMS ingest service."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pyrilo.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the SIPs and bags roots.
    ///
    /// An existing configuration file is left untouched.
    Init,

    /// List SIP folders under the SIPs root.
    ///
    /// Without flags only default-grammar folders (no underscore) are shown.
    Sips {
        /// Only folders of this content model (e.g. `gml`, `tei`).
        #[arg(long, conflicts_with = "all")]
        content_model: Option<String>,

        /// Every valid folder, default and extended grammar.
        #[arg(long)]
        all: bool,
    },

    /// Build one bag per SIP folder.
    ///
    /// Clears every directory under the bags root first. There is no backup.
    Bag {
        /// Project abbreviation used in descriptors (e.g. `demo`).
        project: String,

        /// Number of bags built concurrently (overrides `pipeline.max_concurrency`).
        #[arg(long)]
        jobs: Option<usize>,

        /// Keep building the remaining bags after a failure.
        #[arg(long)]
        keep_going: bool,
    },

    /// Print the whitespace-cleaned full text of a SIP's source document.
    Fulltext {
        /// Path to the SIP folder.
        folder: PathBuf,
    },

    /// Write a search-index JSON into every TEI SIP folder of a project.
    SearchIndex {
        /// Project abbreviation used in descriptions.
        project: String,
    },

    /// Zip bags into `<bags_root>/<bag>.zip`.
    Pack {
        /// Bag directory name; every bag when omitted.
        bag: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    // Commands that don't require an existing config
    if let Commands::Init = cli.command {
        return run_init(&cli.config);
    }

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Sips { content_model, all } => {
            let filter = match (content_model, all) {
                (Some(model), _) => ModelFilter::Model(model.to_lowercase()),
                (None, true) => ModelFilter::All,
                (None, false) => ModelFilter::DefaultOnly,
            };
            sips::list_sips(&cfg, &filter)?;
        }
        Commands::Bag {
            project,
            jobs,
            keep_going,
        } => {
            if let Some(jobs) = jobs {
                cfg.pipeline.max_concurrency = jobs;
            }
            if keep_going {
                cfg.pipeline.fail_fast = false;
            }
            config::validate(&cfg)?;

            let report = bag::run_transform(&cfg, &project)
                .await
                .with_context(|| format!("Bag run for project '{}' failed", project))?;
            for dir in &report.built {
                println!("built   {}", dir.display());
            }
            for (folder, err) in &report.failed {
                println!("failed  {}: {}", folder, err);
            }
            println!(
                "{} bag(s) built, {} failed",
                report.built.len(),
                report.failed.len()
            );
            if !report.is_success() {
                bail!("{} SIP folder(s) could not be bagged", report.failed.len());
            }
        }
        Commands::Fulltext { folder } => {
            let sip = locator::resolve_folder(&folder, "", &cfg.conventions)?;
            let extractor = select_extractor(&sip, &cfg.conventions);
            match extractor.extract_full_text(&sip)? {
                Some(text) => println!("{}", text),
                None => bail!(
                    "{} has no {} source document",
                    sip.path().display(),
                    cfg.conventions.source_file_name
                ),
            }
        }
        Commands::SearchIndex { project } => {
            let written = search_index::generate(&cfg, &project)?;
            for path in &written {
                println!("wrote   {}", path.display());
            }
            println!("{} search index file(s) written", written.len());
        }
        Commands::Pack { bag } => {
            let written = package::pack(&cfg.paths.bags_root, bag.as_deref())?;
            for path in &written {
                println!("packed  {}", path.display());
            }
        }
    }

    Ok(())
}

fn run_init(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
    } else {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(config_path, config::default_config_toml()?)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("Wrote default config to {}", config_path.display());
    }

    let cfg: Config = config::load_config(config_path)?;
    for dir in [&cfg.paths.sips_root, &cfg.paths.bags_root] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    println!(
        "Ready: SIPs in {}, bags in {}",
        cfg.paths.sips_root.display(),
        cfg.paths.bags_root.display()
    );
    Ok(())
}
