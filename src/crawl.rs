use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::cli::{CrawlArgs, DiscoverArgs, ExtractArgs, FetchArgs, PacingArgs};
use crate::corpus::{self, CorpusWriter};
use crate::discover::{self, DuplicatePolicy};
use crate::fetch::{HttpSource, PageSource};
use crate::formats::FailureKind;
use crate::item::{self, ItemContext, ItemFailure, ProcessedItem};
use crate::languages::validate_language_code;
use crate::rate_limit::{FixedIntervalLimiter, NoDelay, RateLimiter, RequestKind};
use crate::selectors::{self, Extractors};

pub const LINKS_FILE: &str = "talk-links.csv";
pub const CORPUS_FILE: &str = "talk_data.jsonl";

/// Shared collaborators for one run.
#[derive(Clone)]
pub struct Pipeline {
    pub source: Arc<dyn PageSource>,
    pub limiter: Arc<dyn RateLimiter>,
    pub extractors: Arc<Extractors>,
}

impl Pipeline {
    pub fn from_args(fetch: &FetchArgs, pacing: &PacingArgs) -> anyhow::Result<Self> {
        let source = HttpSource::new(Duration::from_secs(fetch.timeout_secs.max(1)))?;
        let limiter: Arc<dyn RateLimiter> = if pacing.no_delay {
            Arc::new(NoDelay)
        } else {
            Arc::new(FixedIntervalLimiter::new(
                Duration::from_millis(pacing.listing_delay_ms),
                Duration::from_millis(pacing.item_delay_ms),
            ))
        };
        let extractors = selectors::load_extractors(fetch.selectors.as_deref())?;

        Ok(Self {
            source: Arc::new(source),
            limiter,
            extractors: Arc::new(extractors),
        })
    }
}

/// Outcome counts for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub detail_fetch_failed: usize,
    pub missing_required_field: usize,
    pub field_format_drift: usize,
    pub transcript_unavailable: usize,
}

impl CrawlReport {
    pub fn failed(&self) -> usize {
        self.detail_fetch_failed + self.missing_required_field + self.field_format_drift
    }

    fn record_failure(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::DetailFetchFailed => self.detail_fetch_failed += 1,
            FailureKind::MissingRequiredField => self.missing_required_field += 1,
            FailureKind::FieldFormatDrift => self.field_format_drift += 1,
        }
    }
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "attempted={} succeeded={} failed={}",
            self.attempted,
            self.succeeded,
            self.failed()
        )?;
        for (kind, count) in [
            (FailureKind::DetailFetchFailed, self.detail_fetch_failed),
            (FailureKind::MissingRequiredField, self.missing_required_field),
            (FailureKind::FieldFormatDrift, self.field_format_drift),
        ] {
            writeln!(f, "  {}={count}", kind.as_str())?;
        }
        write!(f, "  transcript_unavailable={}", self.transcript_unavailable)
    }
}

pub async fn run(args: CrawlArgs) -> anyhow::Result<()> {
    validate_language_code(&args.language)?;
    let start_url = parse_start_url(&args.url)?;

    let out_dir = PathBuf::from(&args.out);
    if out_dir.exists() {
        anyhow::bail!("crawl output directory already exists: {}", out_dir.display());
    }

    let pipeline = Pipeline::from_args(&args.fetch, &args.pacing)?;
    let links = discover_links(&pipeline, &start_url, duplicate_policy(args.dedup_links)).await?;

    // Created only once discovery has succeeded.
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create crawl output dir: {}", out_dir.display()))?;
    checkpoint_links(&out_dir.join(LINKS_FILE), &links)?;

    let writer = CorpusWriter::create(&out_dir.join(CORPUS_FILE), false)?;
    let report = extract_into(
        &pipeline,
        limit(&links, args.max_items),
        &args.language,
        writer,
        args.concurrency,
    )
    .await?;

    println!("{report}");
    Ok(())
}

pub async fn discover(args: DiscoverArgs) -> anyhow::Result<()> {
    let start_url = parse_start_url(&args.url)?;
    let pipeline = Pipeline::from_args(&args.fetch, &args.pacing)?;

    let links = discover_links(&pipeline, &start_url, duplicate_policy(args.dedup_links)).await?;
    checkpoint_links(Path::new(&args.out), &links)?;

    println!("links={}", links.len());
    Ok(())
}

pub async fn extract(args: ExtractArgs) -> anyhow::Result<()> {
    validate_language_code(&args.language)?;
    let links = corpus::read_links(Path::new(&args.links)).context("load link checkpoint")?;
    tracing::info!(links = links.len(), checkpoint = %args.links, "loaded link checkpoint");

    let pipeline = Pipeline::from_args(&args.fetch, &args.pacing)?;
    let writer = CorpusWriter::create(Path::new(&args.out), args.append)?;
    let report = extract_into(
        &pipeline,
        limit(&links, args.max_items),
        &args.language,
        writer,
        args.concurrency,
    )
    .await?;

    println!("{report}");
    Ok(())
}

async fn discover_links(
    pipeline: &Pipeline,
    start_url: &Url,
    policy: DuplicatePolicy,
) -> anyhow::Result<Vec<Url>> {
    tracing::info!(url = %start_url, ?policy, "discovering talk links");
    discover::discover_all(
        pipeline.source.as_ref(),
        pipeline.limiter.as_ref(),
        &pipeline.extractors,
        start_url,
        policy,
    )
    .await
    .context("discover talk links")
}

fn checkpoint_links(path: &Path, links: &[Url]) -> anyhow::Result<()> {
    corpus::write_links(path, links).context("write link checkpoint")?;
    tracing::info!(links = links.len(), checkpoint = %path.display(), "link checkpoint written");
    Ok(())
}

async fn extract_into(
    pipeline: &Pipeline,
    links: &[Url],
    language: &str,
    mut writer: CorpusWriter,
    concurrency: usize,
) -> anyhow::Result<CrawlReport> {
    let ctx = ItemContext::new(language);

    tracing::info!(items = links.len(), language, concurrency, "extracting talks");
    let report = extract_links(pipeline, links, &ctx, &mut writer, concurrency).await?;
    let written = writer.finish()?;

    tracing::info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed(),
        detail_fetch_failed = report.detail_fetch_failed,
        missing_required_field = report.missing_required_field,
        field_format_drift = report.field_format_drift,
        transcript_unavailable = report.transcript_unavailable,
        written,
        "extraction finished"
    );
    Ok(report)
}

/// Process every link and append each successful record to `writer`.
///
/// At most `concurrency` items are in flight. This task is the only writer;
/// with `concurrency == 1` records are appended in link order, otherwise in
/// completion order. Item failures are counted, never propagated; only a
/// corpus write error ends the run early.
pub async fn extract_links(
    pipeline: &Pipeline,
    links: &[Url],
    ctx: &ItemContext,
    writer: &mut CorpusWriter,
    concurrency: usize,
) -> anyhow::Result<CrawlReport> {
    let concurrency = concurrency.max(1);
    let mut report = CrawlReport::default();
    let mut join_set = tokio::task::JoinSet::new();
    let mut next_idx = 0_usize;

    while next_idx < links.len() || !join_set.is_empty() {
        while next_idx < links.len() && join_set.len() < concurrency {
            let url = links[next_idx].clone();
            let pipeline = pipeline.clone();
            let ctx = ctx.clone();
            join_set.spawn(async move {
                pipeline.limiter.wait(RequestKind::Item).await;
                let outcome = item::process_item(
                    pipeline.source.as_ref(),
                    &pipeline.extractors,
                    &url,
                    &ctx,
                )
                .await;
                (url, outcome)
            });
            next_idx += 1;
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        let (url, outcome) = joined.context("join item task")?;
        report.attempted += 1;
        record_outcome(&mut report, writer, &url, outcome)?;
    }

    Ok(report)
}

fn record_outcome(
    report: &mut CrawlReport,
    writer: &mut CorpusWriter,
    url: &Url,
    outcome: Result<ProcessedItem, ItemFailure>,
) -> anyhow::Result<()> {
    match outcome {
        Ok(processed) => {
            writer.append(&processed.record)?;
            report.succeeded += 1;
            if !processed.transcript_available {
                report.transcript_unavailable += 1;
            }
            tracing::info!(
                url = %url,
                title = %processed.record.title,
                paragraphs = processed.record.transcript.len(),
                "talk saved"
            );
        }
        Err(failure) => {
            let kind = failure.kind();
            if kind == FailureKind::FieldFormatDrift {
                tracing::error!(url = %url, %failure, "source format changed; talk skipped");
            } else {
                tracing::warn!(url = %url, %failure, kind = kind.as_str(), "talk skipped");
            }
            report.record_failure(kind);
        }
    }
    Ok(())
}

fn parse_start_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw).context("parse --url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("--url must be http/https: {url}");
    }
    Ok(url)
}

fn duplicate_policy(dedup: bool) -> DuplicatePolicy {
    if dedup {
        DuplicatePolicy::Dedup
    } else {
        DuplicatePolicy::Keep
    }
}

fn limit(links: &[Url], max_items: Option<usize>) -> &[Url] {
    match max_items {
        Some(max) => &links[..max.min(links.len())],
        None => links,
    }
}
