use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MlMonday,
    BusinessWednesday,
    EthicsFriday,
    DataSaturday,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::MlMonday,
        Category::BusinessWednesday,
        Category::EthicsFriday,
        Category::DataSaturday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::MlMonday => "ml_monday",
            Category::BusinessWednesday => "business_wednesday",
            Category::EthicsFriday => "ethics_friday",
            Category::DataSaturday => "data_saturday",
        }
    }

    /// Display name of the weekly theme.
    pub fn label(self) -> &'static str {
        match self {
            Category::MlMonday => "ML Monday",
            Category::BusinessWednesday => "ML Business Briefing",
            Category::EthicsFriday => "Ethics Friday",
            Category::DataSaturday => "Data Science Saturday",
        }
    }

    /// Editorial focus, used when prompting the scoring agents.
    pub fn focus(self) -> &'static str {
        match self {
            Category::MlMonday => "Latest ML research, papers, and technical breakthroughs",
            Category::BusinessWednesday => {
                "AI startups, funding, products, and industry moves"
            }
            Category::EthicsFriday => {
                "AI safety, regulation, societal impact, and policy debates"
            }
            Category::DataSaturday => {
                "Data science, analytics, SQL, statistics, and practical data insights"
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| {
                let known = Category::ALL
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                anyhow::anyhow!("unknown digest category {s:?} (expected one of: {known})")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Matched(Category),
    Unclassified,
}

impl Classification {
    pub fn category(self) -> Option<Category> {
        match self {
            Classification::Matched(category) => Some(category),
            Classification::Unclassified => None,
        }
    }
}

/// Ordered rules; the first pattern found in the lowercased text wins.
/// Theme names come before bare weekday names, which come before topic words.
const RULES: &[(&str, Category)] = &[
    ("ml monday", Category::MlMonday),
    ("business briefing", Category::BusinessWednesday),
    ("business wednesday", Category::BusinessWednesday),
    ("ethics friday", Category::EthicsFriday),
    ("data science saturday", Category::DataSaturday),
    ("data saturday", Category::DataSaturday),
    ("ml_monday", Category::MlMonday),
    ("business_wednesday", Category::BusinessWednesday),
    ("ethics_friday", Category::EthicsFriday),
    ("data_saturday", Category::DataSaturday),
    ("monday", Category::MlMonday),
    ("wednesday", Category::BusinessWednesday),
    ("friday", Category::EthicsFriday),
    ("saturday", Category::DataSaturday),
    ("business", Category::BusinessWednesday),
    ("ethics", Category::EthicsFriday),
    ("data science", Category::DataSaturday),
];

pub fn classify(text: &str) -> Classification {
    let lower = text.to_lowercase();
    RULES
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, category)| Classification::Matched(*category))
        .unwrap_or(Classification::Unclassified)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum UnclassifiedPolicy {
    /// Fall back to ML Monday.
    Default,
    /// Skip the post.
    Skip,
}

impl UnclassifiedPolicy {
    pub fn resolve(self, classification: Classification) -> Option<Category> {
        match (classification, self) {
            (Classification::Matched(category), _) => Some(category),
            (Classification::Unclassified, UnclassifiedPolicy::Default) => {
                Some(Category::MlMonday)
            }
            (Classification::Unclassified, UnclassifiedPolicy::Skip) => None,
        }
    }
}
