use std::fs::{File, OpenOptions};
use std::io::{BufRead as _, BufReader, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use url::Url;

use crate::formats::{CorpusLine, TalkRecord};

/// Append-only JSON-lines corpus. Each record is written as one whole line and
/// flushed before `append` returns, so an interrupted run leaves a readable
/// file that is at most one record short.
#[derive(Debug)]
pub struct CorpusWriter {
    path: PathBuf,
    file: File,
    written: usize,
}

impl CorpusWriter {
    /// Open `path` for writing. Without `append` the file must not exist yet.
    pub fn create(path: &Path, append: bool) -> anyhow::Result<Self> {
        let mut options = OpenOptions::new();
        if append {
            options.create(true).append(true);
        } else {
            options.create_new(true).write(true);
        }
        let file = options
            .open(path)
            .with_context(|| format!("open corpus: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            written: 0,
        })
    }

    pub fn append(&mut self, record: &TalkRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&CorpusLine::from(record))
            .context("serialize corpus record")?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .with_context(|| format!("write corpus record: {}", self.path.display()))?;
        self.file
            .flush()
            .with_context(|| format!("flush corpus: {}", self.path.display()))?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(self) -> anyhow::Result<usize> {
        self.file
            .sync_all()
            .with_context(|| format!("sync corpus: {}", self.path.display()))?;
        Ok(self.written)
    }
}

/// Read every line of a corpus file back.
pub fn read_corpus(path: &Path) -> anyhow::Result<Vec<CorpusLine>> {
    let file = File::open(path).with_context(|| format!("open corpus: {}", path.display()))?;
    let mut lines = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("read corpus line")?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = serde_json::from_str(&line)
            .with_context(|| format!("parse corpus line {}", idx + 1))?;
        lines.push(parsed);
    }
    Ok(lines)
}

/// Write the discovered links as a CSV checkpoint (`index,link`).
pub fn write_links(path: &Path, links: &[Url]) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .with_context(|| format!("create link checkpoint: {}", path.display()))?;

    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(["index", "link"])
        .context("write link checkpoint header")?;
    for (idx, link) in links.iter().enumerate() {
        writer
            .write_record([idx.to_string().as_str(), link.as_str()])
            .with_context(|| format!("write link checkpoint row {idx}"))?;
    }

    let file = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("flush link checkpoint: {}", err.error()))?;
    file.sync_all()
        .with_context(|| format!("sync link checkpoint: {}", path.display()))?;
    Ok(())
}

/// Read a link checkpoint back, in file order.
///
/// Accepts the `index,link` layout written by [`write_links`], a single `link`
/// column, and the unnamed index column of a dataframe export (`,link`).
pub fn read_links(path: &Path) -> anyhow::Result<Vec<Url>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("read link checkpoint: {}", path.display()))?;

    let column = reader
        .headers()
        .with_context(|| format!("read link checkpoint header: {}", path.display()))?
        .iter()
        .position(|name| name.trim() == "link")
        .ok_or_else(|| anyhow::anyhow!("link checkpoint has no `link` column: {}", path.display()))?;

    let mut links = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("read link checkpoint row {}", idx + 1))?;
        let value = row
            .get(column)
            .ok_or_else(|| anyhow::anyhow!("link checkpoint row {} has no link", idx + 1))?;
        let url = Url::parse(value.trim())
            .with_context(|| format!("parse link checkpoint row {}: {value}", idx + 1))?;
        links.push(url);
    }
    Ok(links)
}
