use crate::category::Category;
use crate::extract::starts_with_marker;
use crate::formats::{ArticleRecord, DigestDraft, DigestStatus, RawPost};

/// Builds the draft for one post. Returns `None` exactly when `articles` is empty.
pub fn assemble(
    post: &RawPost,
    category: Category,
    articles: Vec<ArticleRecord>,
) -> Option<DigestDraft> {
    if articles.is_empty() {
        return None;
    }

    let published_date = post.published_at.date_naive();
    let title = headline(&post.text).unwrap_or_else(|| {
        format!(
            "{} digest {}",
            category.label(),
            published_date.format("%Y-%m-%d")
        )
    });

    Some(DigestDraft {
        title,
        category,
        published_date,
        articles,
        status: DigestStatus::Draft,
        source_post_url: post.permalink.clone(),
    })
}

/// First non-empty line, unless the post opens straight into a numbered item.
fn headline(text: &str) -> Option<String> {
    let first = text.lines().map(str::trim).find(|line| !line.is_empty())?;
    if starts_with_marker(first) {
        return None;
    }
    Some(first.to_owned())
}
