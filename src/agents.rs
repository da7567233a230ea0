use std::sync::LazyLock;

use anyhow::Context as _;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::category::Category;
use crate::filter::{QualityScores, RelevanceVerdict, ScoringAgent, WasteScore};
use crate::formats::ArticleRecord;
use crate::openai::OpenAiClient;

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"));

const QUALITY_INSTRUCTIONS: &str = r#"You assess articles for a technical AI newsletter.
Score the article from 0 to 10 on three axes:
- novelty: new information rather than rehashed content
- applicability: readers can put it to use right away
- significance: it will still matter in six months
Be skeptical of marketing claims.
Reply with JSON only, in exactly this shape:
{"novelty": <number>, "applicability": <number>, "significance": <number>}"#;

const WASTE_INSTRUCTIONS: &str = "You protect newsletter readers' time.
Rate how much of a waste of time this article would be, from 0 (essential reading) to 10 (hype, marketing or clickbait with no substance).
Reply with a single number.";

/// `ScoringAgent` backed by three prompts against the Responses API.
#[derive(Debug, Clone)]
pub struct OpenAiScoringAgent {
    client: OpenAiClient,
}

impl OpenAiScoringAgent {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

fn relevance_instructions(category: Category) -> String {
    format!(
        "You screen articles for the \"{}\" edition of an AI newsletter.\nEdition focus: {}.\nAnswer YES if the article fits this edition, otherwise NO. Reply with one word.",
        category.label(),
        category.focus()
    )
}

fn article_input(article: &ArticleRecord) -> String {
    format!(
        "Title: {}\nSummary: {}\nSource: {}\nURL: {}",
        article.title,
        article.summary,
        article.source.as_deref().unwrap_or("unknown"),
        article.url
    )
}

#[async_trait]
impl ScoringAgent for OpenAiScoringAgent {
    async fn relevance(
        &self,
        category: Category,
        article: &ArticleRecord,
    ) -> anyhow::Result<RelevanceVerdict> {
        let answer = self
            .client
            .complete(&relevance_instructions(category), &article_input(article))
            .await
            .context("relevance agent")?;
        parse_verdict(&answer)
    }

    async fn quality(
        &self,
        category: Category,
        article: &ArticleRecord,
    ) -> anyhow::Result<QualityScores> {
        let input = format!(
            "Newsletter edition: {}\n{}",
            category.label(),
            article_input(article)
        );
        let answer = self
            .client
            .complete(QUALITY_INSTRUCTIONS, &input)
            .await
            .context("quality agent")?;
        parse_quality(&answer)
    }

    async fn waste(&self, article: &ArticleRecord) -> anyhow::Result<WasteScore> {
        let answer = self
            .client
            .complete(WASTE_INSTRUCTIONS, &article_input(article))
            .await
            .context("waste agent")?;
        parse_score(&answer).map(WasteScore)
    }
}

pub fn parse_verdict(answer: &str) -> anyhow::Result<RelevanceVerdict> {
    let word = answer
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphabetic()))
        .unwrap_or_default()
        .to_ascii_uppercase();
    match word.as_str() {
        "YES" => Ok(RelevanceVerdict::Relevant),
        "NO" => Ok(RelevanceVerdict::Irrelevant),
        _ => anyhow::bail!("expected YES or NO, got {answer:?}"),
    }
}

#[derive(Debug, Deserialize)]
struct QualityAnswer {
    novelty: f32,
    applicability: f32,
    significance: f32,
}

/// Accepts the JSON object anywhere in the answer, e.g. inside a code fence.
pub fn parse_quality(answer: &str) -> anyhow::Result<QualityScores> {
    let start = answer.find('{');
    let end = answer.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &answer[start..=end],
        _ => anyhow::bail!("no JSON object in quality answer: {answer:?}"),
    };
    let parsed: QualityAnswer =
        serde_json::from_str(json).with_context(|| format!("parse quality answer: {json}"))?;
    Ok(QualityScores {
        novelty: parsed.novelty,
        applicability: parsed.applicability,
        significance: parsed.significance,
    }
    .clamped())
}

pub fn parse_score(answer: &str) -> anyhow::Result<f32> {
    let raw = FIRST_NUMBER
        .find(answer)
        .with_context(|| format!("no score in answer: {answer:?}"))?;
    let score: f32 = raw
        .as_str()
        .parse()
        .with_context(|| format!("invalid score: {}", raw.as_str()))?;
    Ok(score.clamp(0.0, 10.0))
}
