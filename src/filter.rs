use std::fmt;

use async_trait::async_trait;

use crate::category::Category;
use crate::formats::ArticleRecord;

/// Minimum weighted quality score an article needs to be kept.
pub const QUALITY_THRESHOLD: f32 = 6.0;

/// Waste scores above this veto the article.
pub const WASTE_VETO_THRESHOLD: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceVerdict {
    Relevant,
    Irrelevant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityScores {
    pub novelty: f32,
    pub applicability: f32,
    pub significance: f32,
}

impl QualityScores {
    pub fn clamped(self) -> Self {
        Self {
            novelty: clamp_score(self.novelty),
            applicability: clamp_score(self.applicability),
            significance: clamp_score(self.significance),
        }
    }

    /// 0.4 novelty, 0.3 applicability, 0.3 significance. Integer weights keep whole scores exact.
    pub fn weighted(&self) -> f32 {
        (4.0 * self.novelty + 3.0 * self.applicability + 3.0 * self.significance) / 10.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WasteScore(pub f32);

fn clamp_score(score: f32) -> f32 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 10.0)
}

#[async_trait]
pub trait ScoringAgent: Send + Sync {
    async fn relevance(
        &self,
        category: Category,
        article: &ArticleRecord,
    ) -> anyhow::Result<RelevanceVerdict>;

    async fn quality(
        &self,
        category: Category,
        article: &ArticleRecord,
    ) -> anyhow::Result<QualityScores>;

    async fn waste(&self, article: &ArticleRecord) -> anyhow::Result<WasteScore>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    Irrelevant,
    LowQuality { score: f32 },
    Wasteful { score: f32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Irrelevant => f.write_str("off-topic for the category"),
            Rejection::LowQuality { score } => {
                write!(f, "quality {score:.2} below {QUALITY_THRESHOLD}")
            }
            Rejection::Wasteful { score } => {
                write!(f, "waste score {score:.2} above {WASTE_VETO_THRESHOLD}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Review {
    Accepted(ArticleRecord),
    Rejected(Rejection),
}

/// Runs relevance, quality and waste checks over a post's articles.
pub struct ContentFilter {
    agent: Box<dyn ScoringAgent>,
}

impl ContentFilter {
    pub fn new(agent: Box<dyn ScoringAgent>) -> Self {
        Self { agent }
    }

    /// Keeps the articles that pass every check, in their original order.
    /// An agent error rejects the article.
    pub async fn apply(
        &self,
        category: Category,
        articles: Vec<ArticleRecord>,
    ) -> Vec<ArticleRecord> {
        let total = articles.len();
        let mut kept = Vec::with_capacity(total);
        for article in articles {
            let url = article.url.clone();
            match self.review(category, article).await {
                Ok(Review::Accepted(article)) => kept.push(article),
                Ok(Review::Rejected(reason)) => {
                    tracing::info!(url = %url, %reason, "article filtered out");
                }
                Err(err) => {
                    tracing::warn!(
                        url = %url,
                        error = %format!("{err:#}"),
                        "scoring failed; article filtered out"
                    );
                }
            }
        }
        tracing::info!(category = %category, kept = kept.len(), total, "content filter done");
        kept
    }

    pub async fn review(
        &self,
        category: Category,
        mut article: ArticleRecord,
    ) -> anyhow::Result<Review> {
        if self.agent.relevance(category, &article).await? == RelevanceVerdict::Irrelevant {
            return Ok(Review::Rejected(Rejection::Irrelevant));
        }

        let scores = self.agent.quality(category, &article).await?.clamped();
        let score = scores.weighted();
        if score < QUALITY_THRESHOLD {
            return Ok(Review::Rejected(Rejection::LowQuality { score }));
        }
        article.novelty_score = Some(scores.novelty);
        article.applicability_score = Some(scores.applicability);
        article.significance_score = Some(scores.significance);

        let WasteScore(waste) = self.agent.waste(&article).await?;
        if waste > WASTE_VETO_THRESHOLD {
            return Ok(Review::Rejected(Rejection::Wasteful { score: waste }));
        }

        Ok(Review::Accepted(article))
    }
}
