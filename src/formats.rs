use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

/// One extracted talk. Only complete records are ever written to the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkRecord {
    pub title: String,
    pub link: Url,
    pub posted_date: NaiveDate,
    pub scrape_date: NaiveDate,
    pub language: String,
    pub topics: BTreeSet<String>,
    pub transcript: Vec<String>,
    pub view_count: u64,
    pub duration_seconds: u64,
    pub speaker: Option<String>,
    pub description: Option<String>,
}

/// Nested body of a corpus line. Key names are what downstream tabular
/// processing reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkFields {
    pub posted_date: NaiveDate,
    pub update_date: NaiveDate,
    pub talk_title: String,
    pub talk_link: String,
    pub talk_lang: String,
    pub talk_topics: BTreeSet<String>,
    pub transcript: Vec<String>,
    pub view_count: u64,
    pub duration: u64,
    pub speaker: Option<String>,
    pub description: Option<String>,
}

/// A single corpus line: `{"<title>": { ...fields }}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusLine(pub BTreeMap<String, TalkFields>);

impl From<&TalkRecord> for CorpusLine {
    fn from(record: &TalkRecord) -> Self {
        let fields = TalkFields {
            posted_date: record.posted_date,
            update_date: record.scrape_date,
            talk_title: record.title.clone(),
            talk_link: record.link.to_string(),
            talk_lang: record.language.clone(),
            talk_topics: record.topics.clone(),
            transcript: record.transcript.clone(),
            view_count: record.view_count,
            duration: record.duration_seconds,
            speaker: record.speaker.clone(),
            description: record.description.clone(),
        };
        let mut map = BTreeMap::new();
        map.insert(record.title.clone(), fields);
        Self(map)
    }
}

impl CorpusLine {
    pub fn title(&self) -> Option<&str> {
        self.0.keys().next().map(String::as_str)
    }

    pub fn fields(&self) -> Option<&TalkFields> {
        self.0.values().next()
    }
}

/// Per-item failure categories, as reported in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    DetailFetchFailed,
    MissingRequiredField,
    FieldFormatDrift,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DetailFetchFailed => "detail_fetch_failed",
            Self::MissingRequiredField => "missing_required_field",
            Self::FieldFormatDrift => "field_format_drift",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TalkRecord {
        TalkRecord {
            title: "The power of vulnerability".to_owned(),
            link: Url::parse("https://example.com/talks/brene_brown").expect("url"),
            posted_date: NaiveDate::from_ymd_opt(2010, 12, 23).expect("date"),
            scrape_date: NaiveDate::from_ymd_opt(2026, 1, 2).expect("date"),
            language: "en".to_owned(),
            topics: ["Psychology".to_owned(), "Culture".to_owned()]
                .into_iter()
                .collect(),
            transcript: vec!["So, I'll start with this.".to_owned()],
            view_count: 56_000_000,
            duration_seconds: 1219,
            speaker: Some("Brené Brown".to_owned()),
            description: None,
        }
    }

    #[test]
    fn corpus_line_is_keyed_by_title() -> anyhow::Result<()> {
        let line = CorpusLine::from(&record());
        let json = serde_json::to_value(&line)?;

        let object = json.as_object().expect("top-level object");
        assert_eq!(object.len(), 1);
        let nested = &object["The power of vulnerability"];
        assert_eq!(nested["posted_date"], "2010-12-23");
        assert_eq!(nested["update_date"], "2026-01-02");
        assert_eq!(nested["talk_link"], "https://example.com/talks/brene_brown");
        assert_eq!(nested["talk_topics"], serde_json::json!(["Culture", "Psychology"]));
        assert_eq!(nested["view_count"], 56_000_000);
        assert_eq!(nested["duration"], 1219);
        assert!(nested["description"].is_null());
        Ok(())
    }

    #[test]
    fn corpus_line_parses_back() -> anyhow::Result<()> {
        let line = CorpusLine::from(&record());
        let text = serde_json::to_string(&line)?;
        let parsed: CorpusLine = serde_json::from_str(&text)?;

        assert_eq!(parsed.title(), Some("The power of vulnerability"));
        assert_eq!(parsed.fields().map(|f| f.talk_lang.as_str()), Some("en"));
        Ok(())
    }
}
