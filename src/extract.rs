use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::formats::ArticleRecord;

/// Hard cap on article summaries, in characters.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Characters of text before a bare URL used as its summary in the fallback scan.
pub const FALLBACK_CONTEXT_CHARS: usize = 200;

static ORDINAL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d{1,3}\.[ \t]*").expect("valid marker regex"));

static URL_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid url regex"));

/// Parses a post body into ordered article records.
///
/// Numbered items (`1. ...`) are tried first; only when they yield nothing is the
/// text scanned for bare URLs. An empty result means the post carries no digest.
pub fn extract(text: &str) -> Vec<ArticleRecord> {
    let articles = extract_numbered(text);
    if !articles.is_empty() {
        return articles;
    }
    extract_by_url_scan(text)
}

pub fn contains_url(text: &str) -> bool {
    find_urls(text).next().is_some()
}

/// Item markers: `N.` at line start, not followed by a digit (so `1.5` is plain text).
fn ordinal_markers(text: &str) -> Vec<regex::Match<'_>> {
    ORDINAL_MARKER
        .find_iter(text)
        .filter(|m| {
            m.as_str().ends_with(char::is_whitespace)
                || !text[m.end()..].starts_with(|c: char| c.is_ascii_digit())
        })
        .collect()
}

/// Whether `line` opens with an item marker.
pub fn starts_with_marker(line: &str) -> bool {
    ordinal_markers(line)
        .first()
        .is_some_and(|m| m.start() == 0)
}

fn extract_numbered(text: &str) -> Vec<ArticleRecord> {
    let markers = ordinal_markers(text);

    let mut articles = Vec::new();
    for (idx, marker) in markers.iter().enumerate() {
        let end = markers
            .get(idx + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        let block = &text[marker.end()..end];
        match parse_block(idx + 1, block) {
            Some(article) => articles.push(article),
            None => {
                tracing::debug!(item = idx + 1, "numbered item has no usable url; dropped")
            }
        }
    }
    articles
}

fn parse_block(position: usize, block: &str) -> Option<ArticleRecord> {
    let (url, source) = find_urls(block).next()?;

    let mut lines = block
        .lines()
        .map(|line| collapse_whitespace(&strip_urls(line)))
        .filter(|line| !line.is_empty());

    // A first line holding only the link leaves the next line as the title.
    let title = lines
        .next()
        .unwrap_or_else(|| format!("Article {position}"));
    let rest = lines.collect::<Vec<_>>().join(" ");
    let summary = truncate_chars(&rest, SUMMARY_MAX_CHARS);

    Some(ArticleRecord::new(title, url, summary, source))
}

/// Builds one record per distinct URL, using the text right before it as context.
pub fn extract_by_url_scan(text: &str) -> Vec<ArticleRecord> {
    let mut seen = Vec::<String>::new();
    let mut articles = Vec::new();

    for m in URL_CANDIDATE.find_iter(text) {
        let Some((url, source)) = validate_url(m.as_str()) else {
            continue;
        };
        if seen.contains(&url) {
            continue;
        }
        seen.push(url.clone());

        let before = &text[..m.start()];
        let context = tail_chars(before, FALLBACK_CONTEXT_CHARS);
        let summary = truncate_chars(
            &collapse_whitespace(&strip_urls(context)),
            SUMMARY_MAX_CHARS,
        );
        let title = format!("Article {}", articles.len() + 1);
        articles.push(ArticleRecord::new(title, url, summary, source));
    }

    articles
}

fn find_urls(text: &str) -> impl Iterator<Item = (String, Option<String>)> + '_ {
    URL_CANDIDATE
        .find_iter(text)
        .filter_map(|m| validate_url(m.as_str()))
}

/// Returns the cleaned URL and its host (without `www.`) when it is a usable absolute http(s) URL.
pub fn validate_url(candidate: &str) -> Option<(String, Option<String>)> {
    let trimmed = trim_url_punctuation(candidate);
    let parsed = Url::parse(trimmed).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    let source = host.strip_prefix("www.").unwrap_or(host).to_owned();
    Some((trimmed.to_owned(), Some(source)))
}

fn trim_url_punctuation(candidate: &str) -> &str {
    let mut out = candidate;
    loop {
        let Some(last) = out.chars().last() else {
            return out;
        };
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' | ']' | '}' => true,
            ')' => !out.contains('('),
            _ => false,
        };
        if !strip {
            return out;
        }
        out = &out[..out.len() - last.len_utf8()];
    }
}

fn strip_urls(text: &str) -> String {
    URL_CANDIDATE.replace_all(text, " ").into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `text` to at most `max` characters. No ellipsis is added.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_owned(),
        None => text.to_owned(),
    }
}

fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let skip = count - max;
    let byte_idx = text
        .char_indices()
        .nth(skip)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    &text[byte_idx..]
}
