use std::path::Path;

use anyhow::Context as _;
use scraper::Selector;
use serde::{Deserialize, Serialize};

/// CSS selectors used to locate each field. Every key is optional in YAML;
/// missing keys fall back to the defaults, which match the talk catalog's
/// current markup.
///
/// `title`, `description`, `speaker`, `duration`, `posted_date` and `topics`
/// are read from the `content` attribute of the matched element, so an
/// override must select an element that carries one (typically a `<meta>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectorConfig {
    pub listing_item: String,
    pub listing_item_link: String,
    pub listing_next: String,
    pub title: String,
    pub description: String,
    pub speaker: String,
    pub duration: String,
    pub posted_date: String,
    pub topics: String,
    pub view_count_payload: String,
    pub view_count_key: String,
    pub transcript_paragraph: String,
    pub language_entry: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_item: "div.talk-link".to_owned(),
            listing_item_link: "a[href]".to_owned(),
            listing_next: "div.pagination a.pagination__next[href]".to_owned(),
            title: r#"meta[property$="og:title"]"#.to_owned(),
            description: r#"meta[name$="description"]"#.to_owned(),
            speaker: r#"meta[name$="author"]"#.to_owned(),
            duration: r#"meta[property$="og:video:duration"]"#.to_owned(),
            posted_date: r#"meta[itemprop$="uploadDate"]"#.to_owned(),
            topics: r#"meta[property$="og:video:tag"]"#.to_owned(),
            view_count_payload: "script[data-spec]".to_owned(),
            view_count_key: "viewed_count".to_owned(),
            transcript_paragraph: "p".to_owned(),
            language_entry: "div.col".to_owned(),
        }
    }
}

impl SelectorConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read selector config: {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parse selector config: {}", path.display()))
    }
}

/// Selectors parsed once per run and shared by every extraction.
#[derive(Debug)]
pub struct Extractors {
    pub listing_item: Selector,
    pub listing_item_link: Selector,
    pub listing_next: Selector,
    pub title: Selector,
    pub description: Selector,
    pub speaker: Selector,
    pub duration: Selector,
    pub posted_date: Selector,
    pub topics: Selector,
    pub view_count_payload: Selector,
    pub view_count_pattern: regex::Regex,
    pub transcript_paragraph: Selector,
    pub language_entry: Selector,
    pub anchor: Selector,
}

impl Extractors {
    pub fn compile(config: &SelectorConfig) -> anyhow::Result<Self> {
        if config.view_count_key.trim().is_empty() {
            anyhow::bail!("selector config: view_count_key must not be empty");
        }
        let pattern = format!(
            r#""{}"\s*:\s*"?(\d+)"#,
            regex::escape(config.view_count_key.trim())
        );

        Ok(Self {
            listing_item: parse("listing_item", &config.listing_item)?,
            listing_item_link: parse("listing_item_link", &config.listing_item_link)?,
            listing_next: parse("listing_next", &config.listing_next)?,
            title: parse("title", &config.title)?,
            description: parse("description", &config.description)?,
            speaker: parse("speaker", &config.speaker)?,
            duration: parse("duration", &config.duration)?,
            posted_date: parse("posted_date", &config.posted_date)?,
            topics: parse("topics", &config.topics)?,
            view_count_payload: parse("view_count_payload", &config.view_count_payload)?,
            view_count_pattern: regex::Regex::new(&pattern)
                .context("compile view count pattern")?,
            transcript_paragraph: parse("transcript_paragraph", &config.transcript_paragraph)?,
            language_entry: parse("language_entry", &config.language_entry)?,
            anchor: parse("anchor", "a[href]")?,
        })
    }
}

/// Compile the default selectors, or those from the YAML file at `path`.
pub fn load_extractors(path: Option<&str>) -> anyhow::Result<Extractors> {
    let config = match path {
        Some(path) => SelectorConfig::load(Path::new(path))?,
        None => SelectorConfig::default(),
    };
    Extractors::compile(&config).context("compile selectors")
}

fn parse(name: &str, css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("invalid {name} selector {css:?}: {err:?}"))
}
