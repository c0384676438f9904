// Lexicon file loader.
//
// One term per line. Blank lines and lines starting with '#' are skipped.

use crate::core::moderation::Lexicon;
use anyhow::Context;
use std::path::Path;

pub fn parse_lexicon(text: &str) -> Lexicon {
    Lexicon::new(
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#')),
    )
}

/// Read the block-list at startup. A missing or unreadable file is an error.
pub fn load_lexicon(path: impl AsRef<Path>) -> anyhow::Result<Lexicon> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading lexicon file {}", path.display()))?;

    let lexicon = parse_lexicon(&text);
    tracing::info!(path = %path.display(), entries = lexicon.len(), "Lexicon loaded");
    Ok(lexicon)
}
