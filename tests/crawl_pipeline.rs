use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use predicates::prelude::*;
use talkcorpus::corpus::{read_corpus, read_links};

fn detail_page(title: &str, views: u64) -> String {
    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta property="og:title" content="{title}" />
    <meta name="description" content="About {title}." />
    <meta name="author" content="Speaker of {title}" />
    <meta property="og:video:duration" content="600" />
    <meta itemprop="uploadDate" content="2018-02-14T10:00:00+00:00" />
    <meta property="og:video:tag" content="AI" />
    <meta property="og:video:tag" content="Design" />
    <meta property="og:video:tag" content="AI" />
  </head>
  <body>
    <script data-spec="q">q("talkPage.init",{{"talks":[{{"viewed_count":{views},"duration":600}}]}})</script>
  </body>
</html>
"#
    )
}

const TRANSCRIPT: &str = r#"<!doctype html>
<html><body>
  <p>Hello</p>
  <p>
	world</p>
  <p>(applause)</p>
</body></html>
"#;

fn listing_page(items: &[&str], next: Option<&str>) -> String {
    let mut html = String::from("<!doctype html><html><body>");
    for item in items {
        html.push_str(&format!(
            r#"<div class="talk-link"><div class="media"><a href="{item}">Talk</a></div></div>"#
        ));
    }
    html.push_str(r#"<div class="pagination">"#);
    if let Some(next) = next {
        html.push_str(&format!(
            r#"<a class="pagination__item" href="/talks">1</a><a class="pagination__next" href="{next}">Next</a>"#
        ));
    }
    html.push_str("</div></body></html>");
    html
}

struct Catalog {
    base_url: String,
    shutdown_tx: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl Catalog {
    fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.join();
    }
}

fn spawn_catalog_server(first_page_ok: bool) -> Catalog {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let addr = server.server_addr();
    let base_url = format!("http://{addr}");

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let url = request.url().to_string();
            let (status, body) = match url.as_str() {
                "/talks" if first_page_ok => (
                    200,
                    listing_page(&["/talks/alpha", "/talks/beta"], Some("/talks?page=2")),
                ),
                "/talks?page=2" => (
                    200,
                    listing_page(&["/talks/gamma", "/talks/alpha"], None),
                ),
                "/talks/alpha" => (200, detail_page("Alpha", 1200)),
                "/talks/alpha/transcript?language=en" => (200, TRANSCRIPT.to_owned()),
                "/talks/beta" => (200, detail_page("Beta", 34)),
                "/talks/gamma" => (500, "internal error".to_owned()),
                "/talks/gamma/transcript?language=en" => (200, TRANSCRIPT.to_owned()),
                _ => (404, "not found".to_owned()),
            };

            let mut response = tiny_http::Response::from_string(body).with_status_code(status);
            if status == 200 {
                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    &b"text/html; charset=utf-8"[..],
                )
                .expect("build header");
                response = response.with_header(header);
            }

            let _ = request.respond(response);
        }
    });

    Catalog {
        base_url,
        shutdown_tx,
        handle,
    }
}

fn talkcorpus() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("talkcorpus")
}

fn titles(corpus: &Path) -> anyhow::Result<Vec<String>> {
    Ok(read_corpus(corpus)?
        .iter()
        .filter_map(|line| line.title().map(str::to_owned))
        .collect())
}

#[test]
fn crawl_writes_checkpoint_and_corpus() -> anyhow::Result<()> {
    let catalog = spawn_catalog_server(true);
    let temp = tempfile::TempDir::new()?;
    let out_dir = temp.path().join("run");

    talkcorpus()
        .args([
            "crawl",
            "--url",
            &format!("{}/talks", catalog.base_url),
            "--language",
            "en",
            "--out",
            out_dir.to_str().expect("utf-8 path"),
            "--no-delay",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("attempted=4 succeeded=3 failed=1"))
        .stdout(predicate::str::contains("detail_fetch_failed=1"))
        .stdout(predicate::str::contains("transcript_unavailable=1"));

    let links = read_links(&out_dir.join("talk-links.csv"))?;
    let paths = links.iter().map(|url| url.path()).collect::<Vec<_>>();
    assert_eq!(
        paths,
        vec!["/talks/alpha", "/talks/beta", "/talks/gamma", "/talks/alpha"]
    );

    let corpus_path = out_dir.join("talk_data.jsonl");
    assert_eq!(titles(&corpus_path)?, vec!["Alpha", "Beta", "Alpha"]);

    let lines = read_corpus(&corpus_path)?;
    let alpha = lines[0].fields().expect("alpha fields");
    assert_eq!(alpha.talk_title, "Alpha");
    assert_eq!(alpha.talk_lang, "en");
    assert_eq!(alpha.view_count, 1200);
    assert_eq!(alpha.duration, 600);
    assert_eq!(alpha.posted_date.to_string(), "2018-02-14");
    assert_eq!(alpha.talk_topics.len(), 2);
    assert_eq!(alpha.transcript, vec!["Hello", "world"]);
    assert_eq!(alpha.speaker.as_deref(), Some("Speaker of Alpha"));
    assert!(alpha.talk_link.ends_with("/talks/alpha"));

    let beta = lines[1].fields().expect("beta fields");
    assert!(beta.transcript.is_empty());
    assert_eq!(beta.view_count, 34);

    for line in fs::read_to_string(&corpus_path)?.lines() {
        let value: serde_json::Value = serde_json::from_str(line)?;
        assert_eq!(value.as_object().map(|object| object.len()), Some(1));
    }

    catalog.stop();
    Ok(())
}

#[test]
fn crawl_can_drop_duplicate_links() -> anyhow::Result<()> {
    let catalog = spawn_catalog_server(true);
    let temp = tempfile::TempDir::new()?;
    let out_dir = temp.path().join("run");

    talkcorpus()
        .args([
            "crawl",
            "--url",
            &format!("{}/talks", catalog.base_url),
            "--out",
            out_dir.to_str().expect("utf-8 path"),
            "--no-delay",
            "--dedup-links",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("attempted=3 succeeded=2 failed=1"));

    assert_eq!(read_links(&out_dir.join("talk-links.csv"))?.len(), 3);
    assert_eq!(titles(&out_dir.join("talk_data.jsonl"))?, vec!["Alpha", "Beta"]);

    catalog.stop();
    Ok(())
}

#[test]
fn extract_restarts_from_checkpoint() -> anyhow::Result<()> {
    let catalog = spawn_catalog_server(true);
    let temp = tempfile::TempDir::new()?;
    let links_path = temp.path().join("talk-links.csv");
    let corpus_path = temp.path().join("talk_data.jsonl");

    talkcorpus()
        .args([
            "discover",
            "--url",
            &format!("{}/talks", catalog.base_url),
            "--out",
            links_path.to_str().expect("utf-8 path"),
            "--no-delay",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("links=4"));

    talkcorpus()
        .args([
            "extract",
            "--links",
            links_path.to_str().expect("utf-8 path"),
            "--out",
            corpus_path.to_str().expect("utf-8 path"),
            "--no-delay",
            "--max-items",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("attempted=2 succeeded=2 failed=0"));

    talkcorpus()
        .args([
            "extract",
            "--links",
            links_path.to_str().expect("utf-8 path"),
            "--out",
            corpus_path.to_str().expect("utf-8 path"),
            "--no-delay",
            "--max-items",
            "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("open corpus"));

    talkcorpus()
        .args([
            "extract",
            "--links",
            links_path.to_str().expect("utf-8 path"),
            "--out",
            corpus_path.to_str().expect("utf-8 path"),
            "--no-delay",
            "--max-items",
            "1",
            "--append",
        ])
        .assert()
        .success();

    assert_eq!(titles(&corpus_path)?, vec!["Alpha", "Beta", "Alpha"]);

    catalog.stop();
    Ok(())
}

#[test]
fn unreachable_first_listing_page_fails_without_leaving_output() -> anyhow::Result<()> {
    let catalog = spawn_catalog_server(false);
    let temp = tempfile::TempDir::new()?;
    let out_dir = temp.path().join("run");

    talkcorpus()
        .args([
            "crawl",
            "--url",
            &format!("{}/talks", catalog.base_url),
            "--out",
            out_dir.to_str().expect("utf-8 path"),
            "--no-delay",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("discover talk links"));

    assert!(!out_dir.exists());

    catalog.stop();
    let retry = spawn_catalog_server(true);
    talkcorpus()
        .args([
            "crawl",
            "--url",
            &format!("{}/talks", retry.base_url),
            "--out",
            out_dir.to_str().expect("utf-8 path"),
            "--no-delay",
        ])
        .assert()
        .success();
    assert!(out_dir.join("talk_data.jsonl").exists());

    retry.stop();
    Ok(())
}

#[test]
fn invalid_language_is_rejected_before_any_request() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;

    talkcorpus()
        .args([
            "crawl",
            "--url",
            "http://127.0.0.1:9/talks",
            "--language",
            "English",
            "--out",
            temp.path().join("run").to_str().expect("utf-8 path"),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid language code"));

    Ok(())
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    talkcorpus()
        .env("RUST_LOG", "debug")
        .args(["crawl", "--url", "not a url", "--out", "unused"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsed cli"));
}
