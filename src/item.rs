use chrono::NaiveDate;
use scraper::Html;
use url::Url;

use crate::extract::{self, FieldError};
use crate::fetch::{PageSource, fetch_document};
use crate::formats::{FailureKind, TalkRecord};
use crate::selectors::Extractors;

/// Why an item was left out of the corpus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemFailure {
    #[error("detail page could not be fetched")]
    DetailFetchFailed,
    #[error("required field `{field}` is missing")]
    MissingRequiredField { field: &'static str },
    #[error("required field `{field}` changed format: {detail}")]
    FieldFormatDrift { field: &'static str, detail: String },
}

impl ItemFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::DetailFetchFailed => FailureKind::DetailFetchFailed,
            Self::MissingRequiredField { .. } => FailureKind::MissingRequiredField,
            Self::FieldFormatDrift { .. } => FailureKind::FieldFormatDrift,
        }
    }
}

fn required(field: &'static str) -> impl FnOnce(FieldError) -> ItemFailure {
    move |err| match err {
        FieldError::Missing => ItemFailure::MissingRequiredField { field },
        FieldError::FormatDrift { detail } => ItemFailure::FieldFormatDrift { field, detail },
    }
}

/// Values shared by every item of a run. `today` is read when each record is
/// assembled, so a long run that crosses midnight dates later records
/// correctly.
#[derive(Debug, Clone)]
pub struct ItemContext {
    pub language: String,
    pub today: fn() -> NaiveDate,
}

impl ItemContext {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_owned(),
            today: utc_today,
        }
    }
}

fn utc_today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// A successfully assembled record, plus whether its transcript had to be
/// left empty.
#[derive(Debug, Clone)]
pub struct ProcessedItem {
    pub record: TalkRecord,
    pub transcript_available: bool,
}

/// Everything taken from the detail page.
struct DetailFields {
    title: String,
    posted_date: NaiveDate,
    view_count: u64,
    duration_seconds: u64,
    speaker: Option<String>,
    description: Option<String>,
    topics: std::collections::BTreeSet<String>,
}

/// The transcript page for `detail`: `<detail path>/transcript?language=<lang>`.
pub fn transcript_url(detail: &Url, language: &str) -> Url {
    let mut url = detail.clone();
    let path = format!("{}/transcript", detail.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair("language", language);
    url
}

/// Fetch and extract one item.
///
/// The detail page carries the record's identity, so any problem with it
/// fails the item. The transcript page is enrichment: if it cannot be
/// fetched the record is still produced with an empty transcript.
pub async fn process_item(
    source: &dyn PageSource,
    ex: &Extractors,
    url: &Url,
    ctx: &ItemContext,
) -> Result<ProcessedItem, ItemFailure> {
    let detail = {
        let Some(doc) = fetch_document(source, url).await else {
            return Err(ItemFailure::DetailFetchFailed);
        };
        detail_fields(&doc, ex)?
    };

    let transcript_page = transcript_url(url, &ctx.language);
    let transcript = fetch_document(source, &transcript_page)
        .await
        .map(|doc| extract::transcript(&doc, ex));
    let transcript_available = transcript.is_some();
    if !transcript_available {
        tracing::info!(url = %url, "transcript unavailable; keeping record without it");
    }

    let record = TalkRecord {
        title: detail.title,
        link: url.clone(),
        posted_date: detail.posted_date,
        scrape_date: (ctx.today)(),
        language: ctx.language.clone(),
        topics: detail.topics,
        transcript: transcript.unwrap_or_default(),
        view_count: detail.view_count,
        duration_seconds: detail.duration_seconds,
        speaker: detail.speaker,
        description: detail.description,
    };

    Ok(ProcessedItem {
        record,
        transcript_available,
    })
}

fn detail_fields(doc: &Html, ex: &Extractors) -> Result<DetailFields, ItemFailure> {
    Ok(DetailFields {
        title: extract::title(doc, ex).map_err(required("title"))?,
        posted_date: extract::posted_date(doc, ex).map_err(required("posted_date"))?,
        view_count: extract::view_count(doc, ex).map_err(required("view_count"))?,
        duration_seconds: extract::duration_seconds(doc, ex).map_err(required("duration"))?,
        speaker: extract::speaker(doc, ex),
        description: extract::description(doc, ex),
        topics: extract::topics(doc, ex),
    })
}
