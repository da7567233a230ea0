use std::fmt;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fantoccini::{Client, ClientBuilder, Locator};
use url::Url;

use crate::fetch::{FetchWindow, PostSource, post_from_card, select_candidates};
use crate::formats::RawPost;

pub const LOGIN_URL: &str = "https://www.linkedin.com/login";
pub const DEFAULT_COMPANY_POSTS_URL: &str =
    "https://www.linkedin.com/company/nordic-raven-solutions/posts";

const POST_CARD_SELECTOR: &str = r#"[data-id*="urn:li:activity"]"#;
const POST_TEXT_SELECTOR: &str = ".feed-shared-update-v2__description";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const LOGIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct LinkedInCredentials {
    pub email: String,
    pub password: String,
}

impl LinkedInCredentials {
    pub fn from_env() -> anyhow::Result<Self> {
        let email = non_empty_env("LINKEDIN_EMAIL")?;
        let password = non_empty_env("LINKEDIN_PASSWORD")?;
        Ok(Self { email, password })
    }
}

impl fmt::Debug for LinkedInCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedInCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn non_empty_env(name: &str) -> anyhow::Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => anyhow::bail!("{name} is not set"),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BrowserTimeouts {
    pub navigation: Duration,
    pub selector: Duration,
    pub login: Duration,
}

impl Default for BrowserTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            selector: Duration::from_secs(20),
            login: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginState {
    Pending,
    Challenge,
    SignedIn,
}

fn login_state(current: &Url) -> LoginState {
    let path = current.path();
    if path.starts_with("/checkpoint") || path.contains("/challenge") {
        LoginState::Challenge
    } else if path.starts_with("/login") || path.starts_with("/uas/login") {
        LoginState::Pending
    } else {
        LoginState::SignedIn
    }
}

/// Reads company posts through a WebDriver-controlled headless Chrome.
#[derive(Debug)]
pub struct LinkedInSource {
    webdriver_url: String,
    company_url: String,
    credentials: LinkedInCredentials,
    timeouts: BrowserTimeouts,
}

impl LinkedInSource {
    pub fn new(
        webdriver_url: impl Into<String>,
        company_url: impl Into<String>,
        credentials: LinkedInCredentials,
        timeouts: BrowserTimeouts,
    ) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            company_url: company_url.into(),
            credentials,
            timeouts,
        }
    }

    async fn connect(&self) -> anyhow::Result<Client> {
        let mut capabilities = serde_json::Map::new();
        capabilities.insert(
            "goog:chromeOptions".to_owned(),
            serde_json::json!({
                "args": [
                    "--headless=new",
                    "--no-sandbox",
                    "--disable-setuid-sandbox",
                    "--window-size=1920,1080",
                    format!("--user-agent={USER_AGENT}"),
                ]
            }),
        );

        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities);
        builder
            .connect(&self.webdriver_url)
            .await
            .with_context(|| format!("start webdriver session: {}", self.webdriver_url))
    }

    async fn goto(&self, client: &Client, url: &str) -> anyhow::Result<()> {
        tokio::time::timeout(self.timeouts.navigation, client.goto(url))
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "navigation to {url} timed out after {:?}",
                    self.timeouts.navigation
                )
            })?
            .with_context(|| format!("navigate to {url}"))
    }

    async fn login(&self, client: &Client) -> anyhow::Result<()> {
        tracing::info!(email = %self.credentials.email, "logging in");
        self.goto(client, LOGIN_URL).await?;

        client
            .wait()
            .at_most(self.timeouts.selector)
            .for_element(Locator::Css("#username"))
            .await
            .context("wait for login form")?
            .send_keys(&self.credentials.email)
            .await
            .context("fill email")?;
        client
            .find(Locator::Css("#password"))
            .await
            .context("find password field")?
            .send_keys(&self.credentials.password)
            .await
            .context("fill password")?;
        client
            .find(Locator::Css(r#"button[type="submit"]"#))
            .await
            .context("find sign-in button")?
            .click()
            .await
            .context("submit login form")?;

        let deadline = tokio::time::Instant::now() + self.timeouts.login;
        loop {
            let current = client
                .current_url()
                .await
                .context("read url after login")?;
            match login_state(&current) {
                LoginState::SignedIn => {
                    tracing::info!(url = %current, "logged in");
                    return Ok(());
                }
                LoginState::Challenge => {
                    anyhow::bail!("login stopped at a security checkpoint: {current}")
                }
                LoginState::Pending => {}
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!(
                    "login did not complete within {:?} (still at {current})",
                    self.timeouts.login
                );
            }
            tokio::time::sleep(LOGIN_POLL_INTERVAL).await;
        }
    }

    async fn collect_posts(
        &self,
        client: &Client,
        window: &FetchWindow,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RawPost>> {
        self.login(client).await.context("login failed")?;

        tracing::info!(url = %self.company_url, "opening company posts");
        self.goto(client, &self.company_url).await?;
        client
            .wait()
            .at_most(self.timeouts.selector)
            .for_element(Locator::Css(POST_CARD_SELECTOR))
            .await
            .context("wait for post cards")?;

        let cards = client
            .find_all(Locator::Css(POST_CARD_SELECTOR))
            .await
            .context("list post cards")?;
        tracing::info!(cards = cards.len(), "post cards loaded");

        let mut posts = Vec::new();
        for card in cards.into_iter().take(window.max_posts) {
            let Some(urn) = card.attr("data-id").await.context("read post urn")? else {
                continue;
            };
            let text = match card.find(Locator::Css(POST_TEXT_SELECTOR)).await {
                Ok(element) => element.text().await.context("read post text")?,
                Err(err) => {
                    tracing::debug!(urn = %urn, ?err, "post card has no description; skipped");
                    continue;
                }
            };
            posts.push(post_from_card(&urn, &text, now));
        }

        Ok(select_candidates(posts, window, now))
    }
}

#[async_trait]
impl PostSource for LinkedInSource {
    async fn fetch_posts(
        &mut self,
        window: &FetchWindow,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<RawPost>> {
        let client = self.connect().await?;
        let result = self.collect_posts(&client, window, now).await;
        if let Err(err) = client.close().await {
            tracing::warn!(?err, "closing browser session failed");
        }
        result
    }
}
