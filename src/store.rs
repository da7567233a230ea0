use std::io::Write as _;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Serialize;

use crate::formats::{DigestRow, ScraperRunRow};

pub const DIGESTS_TABLE: &str = "digests";
pub const RUNS_TABLE: &str = "scraper_runs";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait DigestStore: Send + Sync {
    /// Inserts one digest and returns its id when the backend reports one.
    async fn insert_digest(&self, row: &DigestRow) -> anyhow::Result<Option<String>>;

    async fn insert_run(&self, row: &ScraperRunRow) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl SupabaseConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let url = env_value("SUPABASE_URL")
            .or_else(|| env_value("PUBLIC_SUPABASE_URL"))
            .ok_or_else(|| anyhow::anyhow!("SUPABASE_URL is not set"))?;
        let service_role_key = env_value("SUPABASE_SERVICE_ROLE_KEY")
            .ok_or_else(|| anyhow::anyhow!("SUPABASE_SERVICE_ROLE_KEY is not set"))?;
        Ok(Self {
            url: url.trim_end_matches('/').to_owned(),
            service_role_key,
        })
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// PostgREST-backed store.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    config: SupabaseConfig,
}

impl RestStore {
    pub fn new(config: SupabaseConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { client, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.url)
    }

    async fn post<T: Serialize + Sync>(
        &self,
        table: &str,
        row: &T,
        prefer: &str,
    ) -> anyhow::Result<String> {
        let url = self.table_url(table);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
            .header("Prefer", prefer)
            .json(row)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = backend_message(&body).unwrap_or(body);
            anyhow::bail!("insert into {table} failed ({status}): {message}");
        }
        Ok(body)
    }
}

#[async_trait]
impl DigestStore for RestStore {
    async fn insert_digest(&self, row: &DigestRow) -> anyhow::Result<Option<String>> {
        let body = self
            .post(DIGESTS_TABLE, row, "return=representation")
            .await?;
        Ok(inserted_id(&body))
    }

    async fn insert_run(&self, row: &ScraperRunRow) -> anyhow::Result<()> {
        self.post(RUNS_TABLE, row, "return=minimal").await?;
        Ok(())
    }
}

fn backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("message")?.as_str().map(str::to_owned)
}

/// Reads `id` from the first returned row; PostgREST answers with an array.
fn inserted_id(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let row = match &value {
        serde_json::Value::Array(rows) => rows.first()?,
        other => other,
    };
    match row.get("id")? {
        serde_json::Value::String(id) => Some(id.clone()),
        serde_json::Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[derive(Serialize)]
struct DryRunLine<'a, T> {
    table: &'a str,
    row: &'a T,
}

/// Writes every would-be row to stdout as one JSON line.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunStore;

impl DryRunStore {
    fn emit<T: Serialize>(&self, table: &str, row: &T) -> anyhow::Result<()> {
        let line = serde_json::to_string(&DryRunLine { table, row })
            .with_context(|| format!("serialize {table} row"))?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").context("write dry-run row")?;
        Ok(())
    }
}

#[async_trait]
impl DigestStore for DryRunStore {
    async fn insert_digest(&self, row: &DigestRow) -> anyhow::Result<Option<String>> {
        self.emit(DIGESTS_TABLE, row)?;
        Ok(None)
    }

    async fn insert_run(&self, row: &ScraperRunRow) -> anyhow::Result<()> {
        self.emit(RUNS_TABLE, row)
    }
}
