//! Field extractors for detail and transcript pages.
//!
//! Each extractor looks at one field only, so a missing value never blocks
//! the others. Required fields return `Result<_, FieldError>`; optional ones
//! return `Option`.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use scraper::{Html, Selector};

use crate::selectors::Extractors;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("value is absent")]
    Missing,
    #[error("value has an unexpected format: {detail}")]
    FormatDrift { detail: String },
}

impl FieldError {
    fn drift(detail: impl Into<String>) -> Self {
        Self::FormatDrift {
            detail: detail.into(),
        }
    }
}

pub fn title(doc: &Html, ex: &Extractors) -> Result<String, FieldError> {
    meta_content(doc, &ex.title).ok_or(FieldError::Missing)
}

pub fn description(doc: &Html, ex: &Extractors) -> Option<String> {
    meta_content(doc, &ex.description)
}

pub fn speaker(doc: &Html, ex: &Extractors) -> Option<String> {
    meta_content(doc, &ex.speaker)
}

/// Talk length in whole seconds.
pub fn duration_seconds(doc: &Html, ex: &Extractors) -> Result<u64, FieldError> {
    let raw = meta_content(doc, &ex.duration).ok_or(FieldError::Missing)?;
    if let Ok(seconds) = raw.parse::<u64>() {
        return Ok(seconds);
    }
    // 2^64; anything at or above it would saturate in the cast.
    const OUT_OF_RANGE: f64 = 18_446_744_073_709_551_616.0;
    match raw.parse::<f64>() {
        Ok(value) if (0.0..OUT_OF_RANGE).contains(&value) && value.fract() == 0.0 => {
            Ok(value as u64)
        }
        _ => Err(FieldError::drift(format!("duration {raw:?} is not whole seconds"))),
    }
}

/// Upload date truncated to the day.
pub fn posted_date(doc: &Html, ex: &Extractors) -> Result<NaiveDate, FieldError> {
    let raw = meta_content(doc, &ex.posted_date).ok_or(FieldError::Missing)?;
    let day = raw.get(..10).unwrap_or(raw.as_str());
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| FieldError::drift(format!("upload date {raw:?} is not YYYY-MM-DD")))
}

/// View count scraped out of the page's embedded data payload.
///
/// The count is not published as metadata, so this searches the payload text
/// for the configured key. A payload without the key means the source format
/// moved and is reported as drift rather than as a plain absence.
pub fn view_count(doc: &Html, ex: &Extractors) -> Result<u64, FieldError> {
    let payload = doc
        .select(&ex.view_count_payload)
        .next()
        .map(|script| script.text().collect::<String>())
        .ok_or(FieldError::Missing)?;

    let captures = ex
        .view_count_pattern
        .captures(&payload)
        .ok_or_else(|| FieldError::drift("view count key not found in embedded payload"))?;

    captures[1]
        .parse::<u64>()
        .map_err(|err| FieldError::drift(format!("view count {:?}: {err}", &captures[1])))
}

pub fn topics(doc: &Html, ex: &Extractors) -> BTreeSet<String> {
    doc.select(&ex.topics)
        .filter_map(|tag| tag.value().attr("content"))
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Transcript paragraphs in document order.
///
/// The last paragraph block on the transcript page is site boilerplate and is
/// always dropped.
pub fn transcript(doc: &Html, ex: &Extractors) -> Vec<String> {
    let blocks = doc
        .select(&ex.transcript_paragraph)
        .map(|block| block.text().collect::<String>())
        .collect::<Vec<_>>();
    let Some((_, content)) = blocks.split_last() else {
        return Vec::new();
    };

    content
        .iter()
        .map(|text| text.replace(['\n', '\t'], ""))
        .filter(|text| !text.trim().is_empty())
        .collect()
}

fn meta_content(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
