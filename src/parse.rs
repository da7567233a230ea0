use std::io::Read as _;

use anyhow::Context as _;
use chrono::{DateTime, Utc};

use crate::assemble::assemble;
use crate::cli::ParseArgs;
use crate::extract::extract;
use crate::formats::RawPost;
use crate::pipeline::prepare;

pub fn run(args: ParseArgs) -> anyhow::Result<()> {
    let text = if args.input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read post from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&args.input).with_context(|| format!("read {}", args.input))?
    };

    let published_at = match args.published_at.as_deref() {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --published-at: {raw}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let post = RawPost {
        text: text.trim().to_owned(),
        published_at,
        permalink: args.permalink,
    };

    let prepared = match args.category {
        Some(category) => Some((category, extract(&post.text))),
        None => prepare(&post, args.unclassified),
    };
    let draft = prepared
        .and_then(|(category, articles)| assemble(&post, category, articles))
        .ok_or_else(|| anyhow::anyhow!("post yields no digest"))?;

    let json = serde_json::to_string_pretty(&draft.to_row()).context("serialize draft row")?;
    println!("{json}");
    Ok(())
}
