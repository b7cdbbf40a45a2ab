use anyhow::{Context, Result};

use crate::config::Config;
use crate::extract::ExtractorKind;
use crate::locator::{self, ModelFilter};

pub fn list_sips(config: &Config, filter: &ModelFilter) -> Result<()> {
    let sips = locator::walk(&config.paths.sips_root, "", filter, &config.conventions)
        .with_context(|| {
            format!(
                "Failed to resolve SIPs under {}",
                config.paths.sips_root.display()
            )
        })?;

    println!(
        "{:<32} {:<10} {:<16} {:<10} SOURCE",
        "FOLDER", "MODEL", "SUBTYPE", "EXTRACTOR"
    );
    for sip in &sips {
        let extractor = match ExtractorKind::for_sip(sip) {
            ExtractorKind::Tei => "tei",
            ExtractorKind::Gml => "gml",
            ExtractorKind::Generic => "generic",
        };
        println!(
            "{:<32} {:<10} {:<16} {:<10} {}",
            sip.folder_name,
            sip.content_model.to_string(),
            if sip.subtype.is_empty() { "-" } else { &sip.subtype },
            extractor,
            sip.has_source()
        );
    }
    println!("{} SIP folder(s)", sips.len());

    Ok(())
}
