use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};

use crate::agents::OpenAiScoringAgent;
use crate::assemble::assemble;
use crate::category::{Category, Classification, UnclassifiedPolicy, classify};
use crate::cli::{FilterMode, ScrapeArgs};
use crate::extract::extract;
use crate::fetch::{FetchWindow, PostSource};
use crate::filter::ContentFilter;
use crate::formats::{ArticleRecord, DigestDraft, PipelineRunRecord, RawPost, RunStatus};
use crate::linkedin::{BrowserTimeouts, LinkedInCredentials, LinkedInSource};
use crate::openai::OpenAiClient;
use crate::run_log::RunLogger;
use crate::store::{DigestStore, DryRunStore, RestStore, SupabaseConfig};

pub async fn run(args: ScrapeArgs) -> anyhow::Result<()> {
    let credentials = LinkedInCredentials::from_env()?;
    let store: Box<dyn DigestStore> = if args.dry_run {
        tracing::info!("dry run: rows go to stdout");
        Box::new(DryRunStore)
    } else {
        Box::new(RestStore::new(
            SupabaseConfig::from_env()?,
            Duration::from_secs(args.store_timeout_secs),
        )?)
    };
    let filter = match args.filter {
        FilterMode::None => None,
        FilterMode::Openai => {
            let client = OpenAiClient::from_env(
                &args.openai_base_url,
                &args.openai_model,
                Duration::from_secs(args.openai_timeout_secs),
            )?;
            tracing::info!(model = client.model(), "content filter enabled");
            Some(ContentFilter::new(Box::new(OpenAiScoringAgent::new(client))))
        }
    };

    let timeouts = BrowserTimeouts {
        navigation: Duration::from_secs(args.navigation_timeout_secs),
        selector: Duration::from_secs(args.selector_timeout_secs),
        login: Duration::from_secs(args.login_timeout_secs),
    };
    let mut source = LinkedInSource::new(
        args.webdriver_url.clone(),
        args.company_url.clone(),
        credentials,
        timeouts,
    );

    let pipeline = Pipeline {
        store: store.as_ref(),
        filter: filter.as_ref(),
        policy: args.unclassified,
        window: FetchWindow {
            max_posts: args.max_posts,
            lookback_days: args.lookback_days,
            min_chars: args.min_chars,
        },
    };
    let record = pipeline.execute(&mut source, Utc::now()).await;

    if record.status == RunStatus::Failed {
        anyhow::bail!(
            "{}",
            record
                .error_message
                .unwrap_or_else(|| "run failed".to_owned())
        );
    }
    Ok(())
}

/// One scrape run: fetch, then parse and persist each post in turn, then record the run.
pub struct Pipeline<'a> {
    pub store: &'a dyn DigestStore,
    pub filter: Option<&'a ContentFilter>,
    pub policy: UnclassifiedPolicy,
    pub window: FetchWindow,
}

impl Pipeline<'_> {
    pub async fn execute(
        &self,
        source: &mut dyn PostSource,
        now: DateTime<Utc>,
    ) -> PipelineRunRecord {
        let logger = RunLogger::new(self.store);

        let posts = match source
            .fetch_posts(&self.window, now)
            .await
            .context("fetch failed")
        {
            Ok(posts) => posts,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "fetch failed");
                return logger
                    .record(RunStatus::Failed, 0, Some(format!("{err:#}")), now)
                    .await;
            }
        };
        tracing::info!(posts = posts.len(), "candidate posts");
        if posts.is_empty() {
            return logger.record(RunStatus::Skipped, 0, None, now).await;
        }

        let mut attempted = 0usize;
        let mut saved = 0usize;
        for post in &posts {
            let Some(draft) = self.draft(post).await else {
                continue;
            };
            attempted += 1;
            match self.store.insert_digest(&draft.to_row()).await {
                Ok(id) => {
                    saved += 1;
                    tracing::info!(
                        id = id.as_deref().unwrap_or("-"),
                        title = %draft.title,
                        category = %draft.category,
                        articles = draft.articles.len(),
                        "draft saved"
                    );
                }
                Err(err) => tracing::error!(
                    post = %draft.source_post_url,
                    error = %format!("{err:#}"),
                    "failed to save draft"
                ),
            }
        }

        let failed = attempted - saved;
        if failed > 0 {
            let message = format!("{failed} of {attempted} drafts failed to save");
            return logger
                .record(RunStatus::Failed, saved, Some(message), now)
                .await;
        }
        logger.record(RunStatus::Success, saved, None, now).await
    }

    async fn draft(&self, post: &RawPost) -> Option<DigestDraft> {
        let (category, mut articles) = prepare(post, self.policy)?;
        if let Some(filter) = self.filter {
            articles = filter.apply(category, articles).await;
        }
        let draft = assemble(post, category, articles);
        if draft.is_none() {
            tracing::info!(post = %post.permalink, "no articles left; post skipped");
        }
        draft
    }
}

/// Classifies a post and extracts its articles. `None` when the post is skipped.
pub fn prepare(
    post: &RawPost,
    policy: UnclassifiedPolicy,
) -> Option<(Category, Vec<ArticleRecord>)> {
    let classification = classify(&post.text);
    let Some(category) = policy.resolve(classification) else {
        tracing::warn!(post = %post.permalink, "no category matched; post skipped");
        return None;
    };
    if classification == Classification::Unclassified {
        tracing::warn!(
            post = %post.permalink,
            category = %category,
            "no category matched; using default"
        );
    }

    let articles = extract(&post.text);
    if articles.is_empty() {
        tracing::warn!(post = %post.permalink, "no articles found; post skipped");
        return None;
    }
    tracing::debug!(
        post = %post.permalink,
        category = %category,
        articles = articles.len(),
        "post parsed"
    );
    Some((category, articles))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::TimeZone as _;

    use super::*;
    use crate::filter::{QualityScores, RelevanceVerdict, ScoringAgent, WasteScore};
    use crate::formats::{DigestRow, DigestStatus, ScraperRunRow};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 28, 8, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    const ML_MONDAY: &str = "ML Monday Update\n1. GPT-5 Launches\nOpenAI released GPT-5 today. https://example.com/a\n2. New Benchmark\nResearchers published results. https://example.com/b";

    fn post(text: &str, id: u32) -> RawPost {
        RawPost {
            text: text.to_owned(),
            published_at: now() - chrono::Duration::hours(20),
            permalink: format!("https://www.linkedin.com/feed/update/urn:li:activity:{id}/"),
        }
    }

    enum FakeSource {
        Posts(Vec<RawPost>),
        Broken(&'static str),
    }

    #[async_trait]
    impl PostSource for FakeSource {
        async fn fetch_posts(
            &mut self,
            _window: &FetchWindow,
            _now: DateTime<Utc>,
        ) -> anyhow::Result<Vec<RawPost>> {
            match self {
                FakeSource::Posts(posts) => Ok(std::mem::take(posts)),
                FakeSource::Broken(message) => {
                    Err(anyhow::anyhow!(*message)).context("login failed")
                }
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        digests: Mutex<Vec<DigestRow>>,
        runs: Mutex<Vec<ScraperRunRow>>,
        reject_titles: Vec<String>,
        runs_unavailable: bool,
    }

    #[async_trait]
    impl DigestStore for MemoryStore {
        async fn insert_digest(&self, row: &DigestRow) -> anyhow::Result<Option<String>> {
            if self.reject_titles.contains(&row.title) {
                anyhow::bail!("insert into digests failed (400 Bad Request): constraint");
            }
            let mut digests = self.digests.lock().expect("lock digests");
            digests.push(row.clone());
            Ok(Some(digests.len().to_string()))
        }

        async fn insert_run(&self, row: &ScraperRunRow) -> anyhow::Result<()> {
            if self.runs_unavailable {
                anyhow::bail!("scraper_runs unavailable");
            }
            self.runs.lock().expect("lock runs").push(row.clone());
            Ok(())
        }
    }

    fn pipeline<'a>(store: &'a MemoryStore, filter: Option<&'a ContentFilter>) -> Pipeline<'a> {
        Pipeline {
            store,
            filter,
            policy: UnclassifiedPolicy::Default,
            window: FetchWindow::default(),
        }
    }

    #[tokio::test]
    async fn ml_monday_post_becomes_one_draft() {
        let store = MemoryStore::default();
        let mut source = FakeSource::Posts(vec![post(ML_MONDAY, 1)]);

        let record = pipeline(&store, None).execute(&mut source, now()).await;

        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.posts_processed, 1);
        let digests = store.digests.lock().expect("lock digests");
        assert_eq!(digests.len(), 1);
        let row = &digests[0];
        assert_eq!(row.title, "ML Monday Update");
        assert_eq!(row.category, Category::MlMonday);
        assert_eq!(row.status, DigestStatus::Draft);
        assert_eq!(row.published_date.to_string(), "2025-10-27");
        assert_eq!(row.content.len(), 2);
        assert_eq!(row.content[0].title, "GPT-5 Launches");
        assert_eq!(row.content[1].url, "https://example.com/b");
        let runs = store.runs.lock().expect("lock runs");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].posts_scraped, 1);
    }

    #[tokio::test]
    async fn empty_fetch_is_recorded_as_skipped() {
        let store = MemoryStore::default();
        let mut source = FakeSource::Posts(vec![]);
        let record = pipeline(&store, None).execute(&mut source, now()).await;
        assert_eq!(record.status, RunStatus::Skipped);
        assert_eq!(store.runs.lock().expect("lock runs")[0].status, RunStatus::Skipped);
    }

    #[tokio::test]
    async fn fetch_failure_is_recorded_with_context_chain() {
        let store = MemoryStore::default();
        let mut source = FakeSource::Broken("wrong password");
        let record = pipeline(&store, None).execute(&mut source, now()).await;

        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.posts_processed, 0);
        let message = record.error_message.expect("error message");
        assert!(message.starts_with("fetch failed"), "{message}");
        assert!(message.contains("wrong password"), "{message}");
        assert!(store.digests.lock().expect("lock digests").is_empty());
    }

    #[tokio::test]
    async fn posts_without_articles_still_count_as_success() {
        let store = MemoryStore::default();
        let mut source = FakeSource::Posts(vec![post("ML Monday: no links this week, sorry", 1)]);
        let record = pipeline(&store, None).execute(&mut source, now()).await;
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.posts_processed, 0);
    }

    #[tokio::test]
    async fn failed_inserts_fail_the_run_but_keep_the_rest() {
        let store = MemoryStore {
            reject_titles: vec!["Ethics Friday roundup".to_owned()],
            ..MemoryStore::default()
        };
        let mut source = FakeSource::Posts(vec![
            post("Ethics Friday roundup\n1. Policy https://example.com/p", 1),
            post(ML_MONDAY, 2),
        ]);

        let record = pipeline(&store, None).execute(&mut source, now()).await;

        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.posts_processed, 1);
        assert_eq!(
            record.error_message.as_deref(),
            Some("1 of 2 drafts failed to save")
        );
        assert_eq!(store.digests.lock().expect("lock digests").len(), 1);
    }

    #[tokio::test]
    async fn run_log_failure_does_not_change_outcome() {
        let store = MemoryStore {
            runs_unavailable: true,
            ..MemoryStore::default()
        };
        let mut source = FakeSource::Posts(vec![post(ML_MONDAY, 1)]);
        let record = pipeline(&store, None).execute(&mut source, now()).await;
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.posts_processed, 1);
    }

    #[tokio::test]
    async fn skip_policy_drops_unclassified_posts() {
        let store = MemoryStore::default();
        let mut source = FakeSource::Posts(vec![post(
            "Reading list\n1. Something https://example.com/x",
            1,
        )]);
        let pipeline = Pipeline {
            policy: UnclassifiedPolicy::Skip,
            ..pipeline(&store, None)
        };
        let record = pipeline.execute(&mut source, now()).await;
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.posts_processed, 0);
        assert!(store.digests.lock().expect("lock digests").is_empty());
    }

    struct RejectAll;

    #[async_trait]
    impl ScoringAgent for RejectAll {
        async fn relevance(
            &self,
            _category: Category,
            _article: &ArticleRecord,
        ) -> anyhow::Result<RelevanceVerdict> {
            Ok(RelevanceVerdict::Irrelevant)
        }

        async fn quality(
            &self,
            _category: Category,
            _article: &ArticleRecord,
        ) -> anyhow::Result<QualityScores> {
            anyhow::bail!("not reached")
        }

        async fn waste(&self, _article: &ArticleRecord) -> anyhow::Result<WasteScore> {
            anyhow::bail!("not reached")
        }
    }

    #[tokio::test]
    async fn filter_that_empties_a_post_skips_it() {
        let store = MemoryStore::default();
        let filter = ContentFilter::new(Box::new(RejectAll));
        let mut source = FakeSource::Posts(vec![post(ML_MONDAY, 1)]);
        let record = pipeline(&store, Some(&filter))
            .execute(&mut source, now())
            .await;
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.posts_processed, 0);
    }

    /// Accepts everything and notes how many drafts were stored when each article was scored.
    struct StoreWatcher {
        store: Arc<MemoryStore>,
        stored_at_scoring: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl ScoringAgent for StoreWatcher {
        async fn relevance(
            &self,
            _category: Category,
            _article: &ArticleRecord,
        ) -> anyhow::Result<RelevanceVerdict> {
            let stored = self.store.digests.lock().expect("lock digests").len();
            self.stored_at_scoring
                .lock()
                .expect("lock observations")
                .push(stored);
            Ok(RelevanceVerdict::Relevant)
        }

        async fn quality(
            &self,
            _category: Category,
            _article: &ArticleRecord,
        ) -> anyhow::Result<QualityScores> {
            Ok(QualityScores {
                novelty: 9.0,
                applicability: 9.0,
                significance: 9.0,
            })
        }

        async fn waste(&self, _article: &ArticleRecord) -> anyhow::Result<WasteScore> {
            Ok(WasteScore(0.0))
        }
    }

    #[tokio::test]
    async fn each_draft_is_stored_before_the_next_post_is_scored() {
        let store = Arc::new(MemoryStore {
            reject_titles: vec!["Ethics Friday roundup".to_owned()],
            ..MemoryStore::default()
        });
        let stored_at_scoring = Arc::new(Mutex::new(Vec::new()));
        let filter = ContentFilter::new(Box::new(StoreWatcher {
            store: Arc::clone(&store),
            stored_at_scoring: Arc::clone(&stored_at_scoring),
        }));
        let mut source = FakeSource::Posts(vec![
            post("ML Monday Update\n1. GPT-5 Launches https://example.com/a", 1),
            post("Ethics Friday roundup\n1. Policy https://example.com/p", 2),
        ]);

        let record = pipeline(&store, Some(&filter))
            .execute(&mut source, now())
            .await;

        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.posts_processed, 1);
        assert_eq!(
            *stored_at_scoring.lock().expect("lock observations"),
            vec![0, 1]
        );
        let digests = store.digests.lock().expect("lock digests");
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].title, "ML Monday Update");
    }
}
