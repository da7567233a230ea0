use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::category::{Category, classify};
use crate::cli::ImportArgs;
use crate::extract::{extract_by_url_scan, truncate_chars, validate_url};
use crate::formats::{ArticleRecord, DigestRow, DigestStatus};
use crate::store::{DigestStore, DryRunStore, RestStore, SupabaseConfig};

const LINK_SUMMARY_MAX_CHARS: usize = 200;

static FILENAME_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date regex"));

pub async fn run(args: ImportArgs) -> anyhow::Result<()> {
    let dir = PathBuf::from(&args.dir);
    let store: Box<dyn DigestStore> = if args.dry_run {
        Box::new(DryRunStore)
    } else {
        Box::new(RestStore::new(
            SupabaseConfig::from_env()?,
            Duration::from_secs(args.store_timeout_secs),
        )?)
    };

    let files = archive_files(&dir)?;
    tracing::info!(dir = %dir.display(), files = files.len(), "importing email archives");

    let today = Utc::now().date_naive();
    let mut imported = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for path in &files {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;

        let Some(row) = parse_archive(&file_name, &html, today)? else {
            tracing::warn!(file = %file_name, "no articles found; skipped");
            skipped += 1;
            continue;
        };

        match store.insert_digest(&row).await {
            Ok(_) => {
                tracing::info!(
                    file = %file_name,
                    category = %row.category,
                    date = %row.published_date,
                    articles = row.content.len(),
                    "imported"
                );
                imported += 1;
            }
            Err(err) => {
                tracing::error!(file = %file_name, error = %format!("{err:#}"), "import failed");
                failed += 1;
            }
        }
    }

    tracing::info!(imported, skipped, failed, "import done");
    if failed > 0 {
        anyhow::bail!("{failed} of {} archives failed to import", files.len());
    }
    Ok(())
}

fn archive_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)
        .with_context(|| format!("read dir {}", dir.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("list {}", dir.display()))?;
    files.retain(|path| {
        path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
    });
    files.sort();
    Ok(files)
}

fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("invalid selector {css:?}: {err}"))
}

/// Turns one archived digest email into a published row. `None` when it holds no articles.
pub fn parse_archive(
    file_name: &str,
    html: &str,
    today: NaiveDate,
) -> anyhow::Result<Option<DigestRow>> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("h1")?)
        .next()
        .map(|h1| element_text(&h1))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| format!("AI News Digest - {file_name}"));

    let published_date = FILENAME_DATE
        .find(file_name)
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
        .unwrap_or(today);

    let text = visible_text(&document)?;
    let category = classify(&format!("{file_name} {text}"))
        .category()
        .unwrap_or(Category::MlMonday);

    let mut articles = linked_articles(&document)?;
    if articles.is_empty() {
        articles = extract_by_url_scan(&text);
    }
    if articles.is_empty() {
        return Ok(None);
    }

    Ok(Some(DigestRow {
        title,
        category,
        published_date,
        content: articles,
        status: DigestStatus::Published,
        linkedin_post_url: None,
    }))
}

fn linked_articles(document: &Html) -> anyhow::Result<Vec<ArticleRecord>> {
    let mut articles = Vec::new();
    for link in document.select(&selector("a[href]")?) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some((url, source)) = validate_url(href.trim()) else {
            continue;
        };
        if source
            .as_deref()
            .is_some_and(|host| host.contains("linkedin.com") || host.contains("supabase"))
        {
            continue;
        }

        let link_text = element_text(&link);
        let summary = following_paragraph(&link)
            .map(|p| truncate_chars(&element_text(&p), crate::extract::SUMMARY_MAX_CHARS))
            .filter(|summary| !summary.is_empty())
            .unwrap_or_else(|| truncate_chars(&link_text, LINK_SUMMARY_MAX_CHARS));
        let title = if link_text.is_empty() {
            format!("Article {}", articles.len() + 1)
        } else {
            link_text
        };
        articles.push(ArticleRecord::new(title, url, summary, source));
    }
    Ok(articles)
}

/// Body text without `<script>` and `<style>` contents.
fn visible_text(document: &Html) -> anyhow::Result<String> {
    let body = document
        .select(&selector("body")?)
        .next()
        .unwrap_or_else(|| document.root_element());
    let text = body
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, &**text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| matches!(el.name(), "script" | "style"))
            })
        })
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(text)
}

/// The `<p>` right after the link's parent element, if any.
fn following_paragraph<'a>(link: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let parent = link.parent()?;
    let next = parent.next_siblings().find_map(ElementRef::wrap)?;
    (next.value().name() == "p").then_some(next)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
