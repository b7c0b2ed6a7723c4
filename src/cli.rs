use clap::{Args, Parser, Subcommand};

pub const DEFAULT_START_URL: &str = "https://www.ted.com/talks";

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover every talk, checkpoint the links, then extract the corpus.
    Crawl(CrawlArgs),
    /// Walk the listing only and write the link checkpoint.
    Discover(DiscoverArgs),
    /// Extract the corpus from an existing link checkpoint.
    Extract(ExtractArgs),
    /// List the transcript languages the catalog offers.
    Languages(LanguagesArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Per-request timeout.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Optional YAML file overriding the CSS selectors used for extraction.
    #[arg(long)]
    pub selectors: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct PacingArgs {
    /// Minimum delay between listing page requests.
    #[arg(long, default_value_t = 5000)]
    pub listing_delay_ms: u64,

    /// Minimum delay between items (each item is a detail and a transcript request).
    #[arg(long, default_value_t = 10000)]
    pub item_delay_ms: u64,

    /// Disable all delays (testing against a local mirror only).
    #[arg(long)]
    pub no_delay: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CrawlArgs {
    /// Listing start URL (must be http/https).
    #[arg(long, default_value = DEFAULT_START_URL)]
    pub url: String,

    /// Transcript language code.
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Output directory (receives `talk-links.csv` and `talk_data.jsonl`).
    #[arg(long)]
    pub out: String,

    /// Keep only the first occurrence of a talk link seen on several listing pages.
    #[arg(long)]
    pub dedup_links: bool,

    /// Items processed at once. Above 1, records land in completion order.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Stop after this many items.
    #[arg(long)]
    pub max_items: Option<usize>,

    #[command(flatten)]
    pub fetch: FetchArgs,

    #[command(flatten)]
    pub pacing: PacingArgs,
}

#[derive(Debug, Clone, Args)]
pub struct DiscoverArgs {
    /// Listing start URL (must be http/https).
    #[arg(long, default_value = DEFAULT_START_URL)]
    pub url: String,

    /// Output path for the link checkpoint CSV.
    #[arg(long)]
    pub out: String,

    /// Keep only the first occurrence of a talk link seen on several listing pages.
    #[arg(long)]
    pub dedup_links: bool,

    #[command(flatten)]
    pub fetch: FetchArgs,

    #[command(flatten)]
    pub pacing: PacingArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// Link checkpoint CSV (written by `discover` or `crawl`).
    #[arg(long)]
    pub links: String,

    /// Transcript language code.
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Output path for the corpus (`.jsonl`).
    #[arg(long)]
    pub out: String,

    /// Append to an existing corpus instead of requiring a new file.
    #[arg(long)]
    pub append: bool,

    /// Items processed at once. Above 1, records land in completion order.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Stop after this many items.
    #[arg(long)]
    pub max_items: Option<usize>,

    #[command(flatten)]
    pub fetch: FetchArgs,

    #[command(flatten)]
    pub pacing: PacingArgs,
}

#[derive(Debug, Clone, Args)]
pub struct LanguagesArgs {
    /// Language index page.
    #[arg(long, default_value = crate::languages::DEFAULT_LANGUAGES_URL)]
    pub url: String,

    #[command(flatten)]
    pub fetch: FetchArgs,
}
