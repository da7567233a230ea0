use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::category::{Category, UnclassifiedPolicy};
use crate::fetch::{DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_POSTS, DEFAULT_MIN_CHARS};
use crate::linkedin::DEFAULT_COMPANY_POSTS_URL;
use crate::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape recent company posts and store them as digest drafts.
    Scrape(ScrapeArgs),
    /// Parse one post from a file (or stdin) and print the draft row.
    Parse(ParseArgs),
    /// Import archived digest emails (HTML) as published digests.
    Import(ImportArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterMode {
    /// Keep every extracted article.
    None,
    /// Score articles with OpenAI agents (needs OPENAI_API_KEY).
    Openai,
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Print rows to stdout instead of writing to the database.
    #[arg(long)]
    pub dry_run: bool,

    /// Company posts page to read.
    #[arg(long, default_value = DEFAULT_COMPANY_POSTS_URL)]
    pub company_url: String,

    /// WebDriver endpoint (chromedriver or selenium).
    #[arg(long, default_value = "http://localhost:4444")]
    pub webdriver_url: String,

    /// Maximum posts considered per run.
    #[arg(long, default_value_t = DEFAULT_MAX_POSTS)]
    pub max_posts: usize,

    /// Ignore posts older than this many days.
    #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
    pub lookback_days: i64,

    /// Ignore posts shorter than this many characters.
    #[arg(long, default_value_t = DEFAULT_MIN_CHARS)]
    pub min_chars: usize,

    #[arg(long, value_enum, default_value_t = FilterMode::None)]
    pub filter: FilterMode,

    /// What to do with posts that match no category.
    #[arg(long, value_enum, default_value_t = UnclassifiedPolicy::Default)]
    pub unclassified: UnclassifiedPolicy,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub openai_model: String,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Per-request timeout for OpenAI calls.
    #[arg(long, default_value_t = crate::openai::DEFAULT_TIMEOUT_SECS)]
    pub openai_timeout_secs: u64,

    /// Per-request timeout for database writes.
    #[arg(long, default_value_t = crate::store::DEFAULT_TIMEOUT_SECS)]
    pub store_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub login_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub navigation_timeout_secs: u64,

    #[arg(long, default_value_t = 20)]
    pub selector_timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Post text file, or `-` for stdin.
    #[arg(long)]
    pub input: String,

    /// Publication time (RFC 3339). Defaults to now.
    #[arg(long)]
    pub published_at: Option<String>,

    #[arg(long, default_value = "")]
    pub permalink: String,

    #[arg(long, value_enum, default_value_t = UnclassifiedPolicy::Default)]
    pub unclassified: UnclassifiedPolicy,

    /// Use this category instead of classifying the text.
    #[arg(long, value_parser = parse_category)]
    pub category: Option<Category>,
}

fn parse_category(raw: &str) -> Result<Category, String> {
    raw.parse::<Category>().map_err(|err| err.to_string())
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Directory holding archived `*.html` digest emails.
    #[arg(long)]
    pub dir: String,

    /// Print rows to stdout instead of writing to the database.
    #[arg(long)]
    pub dry_run: bool,

    /// Per-request timeout for database writes.
    #[arg(long, default_value_t = crate::store::DEFAULT_TIMEOUT_SECS)]
    pub store_timeout_secs: u64,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scrape_defaults() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["digestify", "scrape", "--dry-run"])?;
        let Command::Scrape(args) = cli.command else {
            anyhow::bail!("expected scrape command");
        };
        assert!(args.dry_run);
        assert_eq!(args.max_posts, 7);
        assert_eq!(args.lookback_days, 7);
        assert_eq!(args.min_chars, 100);
        assert_eq!(args.filter, FilterMode::None);
        assert_eq!(args.unclassified, UnclassifiedPolicy::Default);
        assert_eq!(args.webdriver_url, "http://localhost:4444");
        assert_eq!(args.openai_timeout_secs, 120);
        assert_eq!(args.store_timeout_secs, 30);
        Ok(())
    }

    #[test]
    fn parse_category_accepts_stored_labels_only() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "digestify",
            "parse",
            "--input",
            "-",
            "--category",
            "Ethics_Friday",
        ])?;
        let Command::Parse(args) = cli.command else {
            anyhow::bail!("expected parse command");
        };
        assert_eq!(args.category, Some(Category::EthicsFriday));

        let err = Cli::try_parse_from([
            "digestify",
            "parse",
            "--input",
            "-",
            "--category",
            "tech_tuesday",
        ])
        .expect_err("five-day label is rejected");
        assert!(err.to_string().contains("unknown digest category"), "{err}");
        Ok(())
    }

    #[test]
    fn unclassified_and_filter_values_parse() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "digestify",
            "scrape",
            "--unclassified",
            "skip",
            "--filter",
            "openai",
        ])?;
        let Command::Scrape(args) = cli.command else {
            anyhow::bail!("expected scrape command");
        };
        assert_eq!(args.unclassified, UnclassifiedPolicy::Skip);
        assert_eq!(args.filter, FilterMode::Openai);
        Ok(())
    }
}
