use std::time::Duration;

use anyhow::Context as _;
use scraper::Html;
use url::Url;

use crate::cli::LanguagesArgs;
use crate::fetch::{HttpSource, PageSource, fetch_document};
use crate::selectors::{self, Extractors};

pub const DEFAULT_LANGUAGES_URL: &str = "https://www.ted.com/participate/translate/our-languages";

/// One transcript language offered by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageInfo {
    pub name: String,
    pub code: String,
    pub talk_count: Option<u64>,
}

/// Check that `code` looks like a catalog language code (`en`, `pt-br`, `zh-tw`).
pub fn validate_language_code(code: &str) -> anyhow::Result<()> {
    let (primary, region) = match code.split_once('-') {
        Some((primary, region)) => (primary, Some(region)),
        None => (code, None),
    };

    let primary_ok =
        (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = region.is_none_or(|region| {
        (2..=4).contains(&region.len()) && region.chars().all(|c| c.is_ascii_alphanumeric())
    });

    if !(primary_ok && region_ok) {
        anyhow::bail!("invalid language code {code:?} (expected e.g. `en`, `pt-br`)");
    }
    Ok(())
}

/// Parse the language index page. Each entry is a block holding a link to
/// `/talks?language=<code>` whose text is the language name, followed by the
/// number of talks available in it.
pub fn parse_languages(doc: &Html, ex: &Extractors) -> Vec<LanguageInfo> {
    let mut languages = Vec::new();
    for entry in doc.select(&ex.language_entry) {
        let Some(anchor) = entry.select(&ex.anchor).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(code) = language_from_href(href) else {
            continue;
        };

        let name = anchor.text().collect::<String>().trim().to_owned();
        let entry_text = entry.text().collect::<String>();
        let talk_count = entry_text
            .replacen(&name, "", 1)
            .split_whitespace()
            .next()
            .and_then(|count| count.replace(',', "").parse().ok());

        languages.push(LanguageInfo {
            name,
            code,
            talk_count,
        });
    }
    languages
}

pub async fn list_languages(
    source: &dyn PageSource,
    ex: &Extractors,
    url: &Url,
) -> anyhow::Result<Vec<LanguageInfo>> {
    let Some(doc) = fetch_document(source, url).await else {
        anyhow::bail!("fetch language index failed: {url}");
    };
    Ok(parse_languages(&doc, ex))
}

pub async fn run(args: LanguagesArgs) -> anyhow::Result<()> {
    let url = Url::parse(&args.url).context("parse --url")?;
    let source = HttpSource::new(Duration::from_secs(args.fetch.timeout_secs.max(1)))?;
    let extractors = selectors::load_extractors(args.fetch.selectors.as_deref())?;

    let languages = list_languages(&source, &extractors, &url).await?;
    tracing::info!(count = languages.len(), "languages listed");
    for language in languages {
        let count = language
            .talk_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "-".to_owned());
        println!("{}\t{}\t{count}", language.code, language.name);
    }
    Ok(())
}

fn language_from_href(href: &str) -> Option<String> {
    let base = Url::parse("https://placeholder.invalid/").ok()?;
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| *key == "language")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
