use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// A post as read from the social platform, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPost {
    pub text: String,
    pub published_at: DateTime<Utc>,
    pub permalink: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub novelty_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicability_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub significance_score: Option<f32>,
}

impl ArticleRecord {
    pub fn new(title: String, url: String, summary: String, source: Option<String>) -> Self {
        Self {
            title,
            url,
            summary,
            source,
            novelty_score: None,
            applicability_score: None,
            significance_score: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestStatus {
    Draft,
    Published,
}

/// Output of one qualifying post. Built once, never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestDraft {
    pub title: String,
    pub category: Category,
    pub published_date: NaiveDate,
    pub articles: Vec<ArticleRecord>,
    pub status: DigestStatus,
    pub source_post_url: String,
}

impl DigestDraft {
    pub fn to_row(&self) -> DigestRow {
        DigestRow {
            title: self.title.clone(),
            category: self.category,
            published_date: self.published_date,
            content: self.articles.clone(),
            status: self.status,
            linkedin_post_url: Some(self.source_post_url.clone()).filter(|url| !url.is_empty()),
        }
    }
}

/// Row shape of the `digests` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRow {
    pub title: String,
    pub category: Category,
    pub published_date: NaiveDate,
    pub content: Vec<ArticleRecord>,
    pub status: DigestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_post_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRunRecord {
    pub status: RunStatus,
    pub posts_processed: usize,
    pub error_message: Option<String>,
    pub ran_at: DateTime<Utc>,
}

impl PipelineRunRecord {
    pub fn to_row(&self) -> ScraperRunRow {
        ScraperRunRow {
            status: self.status,
            posts_scraped: self.posts_processed,
            error_message: self.error_message.clone(),
        }
    }
}

/// Row shape of the `scraper_runs` collection. `run_at` is filled by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperRunRow {
    pub status: RunStatus,
    pub posts_scraped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
