//! Keyword vote over recent headlines

use market_data::{Headline, NewsSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Headlines requested from the provider; only the first few are scored
const NEWS_FETCH_LIMIT: usize = 20;

/// Headlines echoed back in the summary
const RECENT_HEADLINES: usize = 3;

static POSITIVE_KEYWORDS: phf::Set<&'static str> = phf::phf_set! {
    "surge", "jump", "gain", "rally", "soar", "beat", "exceed", "upgrade", "buy",
};

static NEGATIVE_KEYWORDS: phf::Set<&'static str> = phf::phf_set! {
    "plunge", "drop", "fall", "decline", "miss", "downgrade", "sell", "warning",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub sentiment: Sentiment,
    /// Positive keyword hits minus negative keyword hits
    pub score: i32,
    /// Headlines the provider returned
    pub news_count: usize,
    pub recent_headlines: Vec<String>,
}

impl SentimentSummary {
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Net keyword hits in one title, case-insensitive substring match
fn title_score(title: &str) -> i32 {
    let title = title.to_lowercase();
    let positive = POSITIVE_KEYWORDS
        .iter()
        .filter(|word| title.contains(**word))
        .count() as i32;
    let negative = NEGATIVE_KEYWORDS
        .iter()
        .filter(|word| title.contains(**word))
        .count() as i32;
    positive - negative
}

/// Vote over the first `vote_limit` headlines
pub fn score_headlines(headlines: &[Headline], vote_limit: usize) -> SentimentSummary {
    if headlines.is_empty() {
        return SentimentSummary::neutral();
    }

    let score: i32 = headlines
        .iter()
        .take(vote_limit)
        .map(|h| title_score(&h.title))
        .sum();

    let sentiment = match score {
        s if s > 0 => Sentiment::Positive,
        s if s < 0 => Sentiment::Negative,
        _ => Sentiment::Neutral,
    };

    SentimentSummary {
        sentiment,
        score,
        news_count: headlines.len(),
        recent_headlines: headlines
            .iter()
            .take(RECENT_HEADLINES)
            .map(|h| h.title.clone())
            .collect(),
    }
}

/// Fetch and score headlines. A missing or failing provider reads as neutral.
pub async fn fetch_sentiment(
    news: Option<&dyn NewsSource>,
    symbol: &str,
    vote_limit: usize,
) -> SentimentSummary {
    let Some(news) = news else {
        return SentimentSummary::neutral();
    };

    match news.get_headlines(symbol, NEWS_FETCH_LIMIT.max(vote_limit)).await {
        Ok(headlines) => score_headlines(&headlines, vote_limit),
        Err(e) => {
            debug!("No headlines for {}: {}", symbol, e);
            SentimentSummary::neutral()
        }
    }
}
