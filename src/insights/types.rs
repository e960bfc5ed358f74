//! Insight data types and the cached insight set.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Topic of an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    MacroBalance,
    Protein,
    Consistency,
    Hydration,
    Onboarding,
    General,
}

impl InsightCategory {
    pub const ALL: [InsightCategory; 6] = [
        InsightCategory::MacroBalance,
        InsightCategory::Protein,
        InsightCategory::Consistency,
        InsightCategory::Hydration,
        InsightCategory::Onboarding,
        InsightCategory::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InsightCategory::MacroBalance => "macro_balance",
            InsightCategory::Protein => "protein",
            InsightCategory::Consistency => "consistency",
            InsightCategory::Hydration => "hydration",
            InsightCategory::Onboarding => "onboarding",
            InsightCategory::General => "general",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }

    /// Default card title.
    pub fn title(self) -> &'static str {
        match self {
            InsightCategory::MacroBalance => "Macro balance",
            InsightCategory::Protein => "Protein",
            InsightCategory::Consistency => "Consistency",
            InsightCategory::Hydration => "Hydration",
            InsightCategory::Onboarding => "Getting started",
            InsightCategory::General => "Today",
        }
    }
}

/// Where an insight set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSource {
    Model,
    Fallback,
}

impl InsightSource {
    pub fn as_str(self) -> &'static str {
        match self {
            InsightSource::Model => "model",
            InsightSource::Fallback => "fallback",
        }
    }
}

/// One user-facing observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub id: String,
    pub category: InsightCategory,
    pub icon: String,
    pub title: String,
    pub body: String,
    pub source: InsightSource,
}

/// Category-scoped generation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightRequest {
    /// Preferred topic; `None` asks for a general summary.
    pub focus: Option<InsightCategory>,
}

impl InsightRequest {
    pub fn general() -> Self {
        Self { focus: None }
    }

    pub fn focused(category: InsightCategory) -> Self {
        Self { focus: Some(category) }
    }
}

/// Last computed insights with their validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedInsightSet {
    pub insights: Vec<Insight>,
    pub source: InsightSource,
    pub generated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Calendar day (`YYYY-MM-DD`) the insights describe.
    pub date: String,
}

impl CachedInsightSet {
    pub fn new(
        insights: Vec<Insight>,
        source: InsightSource,
        generated_at: DateTime<Utc>,
        ttl: Duration,
        date: String,
    ) -> Self {
        Self {
            insights,
            source,
            generated_at,
            valid_until: generated_at + ttl,
            date,
        }
    }

    /// Stale once past `valid_until` or once the calendar day changed.
    pub fn is_stale(&self, now: DateTime<Utc>, today: &str) -> bool {
        now > self.valid_until || self.date != today
    }
}

/// Process-wide generation flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationState {
    pub is_generating: bool,
    pub generation_error: Option<String>,
}
