//! Insight generation: sanitizing, rule-based fallback, caching and the
//! coordinator tying them to the inference provider.

pub mod cache;
pub mod fallback;
pub mod nutrition;
pub mod prompt;
pub mod sanitizer;
pub mod service;
pub mod store;
pub mod types;

pub use cache::{Clock, GenerationGuard, InsightCache, ManualClock, SystemClock, CACHE_TTL_HOURS};
pub use nutrition::{MacroGoals, MacroTotals, NutritionSnapshot, NutritionSource};
pub use sanitizer::{ParsedInsightResponse, ResponseSanitizer, SanitizerPolicy, ToneRule, DEFAULT_GLYPH};
pub use service::{FallbackReason, InsightService, InsightStatus, ServiceConfig};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use types::{
    CachedInsightSet, GenerationState, Insight, InsightCategory, InsightRequest, InsightSource,
};
