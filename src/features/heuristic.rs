//! Character-count heuristics for feature extraction

use super::{FeatureExtractor, FeatureSummary, RequestDescriptor};
use crate::policy::{Complexity, LanguageClass, SizeClass};

/// Thresholds and trigger phrases used by [`HeuristicExtractor`]
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// Characters per estimated token
    pub chars_per_token: usize,
    /// Token counts below this are `small`
    pub small_below: usize,
    /// Token counts below this (and not small) are `medium`
    pub medium_below: usize,
    /// Share of ASCII characters above which text counts as `en`
    pub ascii_ratio: f64,
    /// Text longer than this (in characters) is `medium` complexity
    pub medium_length: usize,
    /// Text longer than this (in characters) is `high` complexity
    pub high_length: usize,
    /// Lower-case phrases that force `high` complexity
    pub high_triggers: Vec<String>,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            small_below: 256,
            medium_below: 2048,
            ascii_ratio: 0.8,
            medium_length: 300,
            high_length: 1000,
            high_triggers: vec!["explain in detail".to_string(), "architecture".to_string()],
        }
    }
}

/// Default extractor: approximates tokens from character counts
#[derive(Debug, Clone, Default)]
pub struct HeuristicExtractor {
    settings: ExtractorSettings,
}

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: ExtractorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Estimate token count (never below 1, monotonic in length)
    pub fn estimate_tokens(&self, text: &str) -> usize {
        (text.chars().count() / self.settings.chars_per_token.max(1)).max(1)
    }

    pub fn classify_size(&self, token_count: usize) -> SizeClass {
        if token_count < self.settings.small_below {
            SizeClass::Small
        } else if token_count < self.settings.medium_below {
            SizeClass::Medium
        } else {
            SizeClass::Large
        }
    }

    pub fn detect_language(&self, text: &str) -> LanguageClass {
        let total = text.chars().count();
        if total == 0 {
            return LanguageClass::En;
        }
        let ascii = text.chars().filter(char::is_ascii).count();
        if ascii as f64 / total as f64 > self.settings.ascii_ratio {
            LanguageClass::En
        } else {
            LanguageClass::Multi
        }
    }

    pub fn estimate_complexity(&self, text: &str) -> Complexity {
        let lowered = text.to_lowercase();
        if self
            .settings
            .high_triggers
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
        {
            return Complexity::High;
        }

        let length = text.chars().count();
        if length > self.settings.high_length {
            Complexity::High
        } else if length > self.settings.medium_length {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }
}

impl FeatureExtractor for HeuristicExtractor {
    fn extract(&self, request: &RequestDescriptor) -> FeatureSummary {
        let token_count = self.estimate_tokens(&request.text);
        FeatureSummary {
            task: request.task,
            token_count,
            size_class: self.classify_size(token_count),
            language: self.detect_language(&request.text),
            complexity: self.estimate_complexity(&request.text),
            context_tokens: request.context_tokens.unwrap_or(0),
            tenant_tier: request.tenant_tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{TaskKind, TenantTier};

    #[test]
    fn test_estimate_tokens() {
        let extractor = HeuristicExtractor::new();
        // "Hello, world!" = 13 chars / 4 = 3 tokens
        assert_eq!(extractor.estimate_tokens("Hello, world!"), 3);
        assert_eq!(extractor.estimate_tokens(&"a".repeat(1000)), 250);
        // Never below one token, even for empty input
        assert_eq!(extractor.estimate_tokens(""), 1);
        assert_eq!(extractor.estimate_tokens("abc"), 1);
    }

    #[test]
    fn test_estimate_tokens_counts_chars_not_bytes() {
        let extractor = HeuristicExtractor::new();
        // 8 CJK characters are 24 bytes but 8 chars
        assert_eq!(extractor.estimate_tokens("日本語の文章です"), 2);
    }

    #[test]
    fn test_size_thresholds() {
        let extractor = HeuristicExtractor::new();
        assert_eq!(extractor.classify_size(255), SizeClass::Small);
        assert_eq!(extractor.classify_size(256), SizeClass::Medium);
        assert_eq!(extractor.classify_size(2047), SizeClass::Medium);
        assert_eq!(extractor.classify_size(2048), SizeClass::Large);
    }

    #[test]
    fn test_language_detection() {
        let extractor = HeuristicExtractor::new();
        assert_eq!(
            extractor.detect_language("What is the capital of France?"),
            LanguageClass::En
        );
        assert_eq!(
            extractor.detect_language("フランスの首都はどこですか"),
            LanguageClass::Multi
        );
        assert_eq!(extractor.detect_language(""), LanguageClass::En);
    }

    #[test]
    fn test_language_ratio_is_strict() {
        let extractor = HeuristicExtractor::new();
        assert_eq!(extractor.detect_language("abcdéééé"), LanguageClass::Multi);
        assert_eq!(extractor.detect_language("aaaaaaaaé"), LanguageClass::En);
        // Exactly 80% ASCII is not above the threshold
        assert_eq!(extractor.detect_language("aaaaé"), LanguageClass::Multi);
    }

    #[test]
    fn test_complexity_triggers_are_case_insensitive() {
        let extractor = HeuristicExtractor::new();
        assert_eq!(
            extractor.estimate_complexity("Please EXPLAIN IN DETAIL how this works"),
            Complexity::High
        );
        assert_eq!(
            extractor.estimate_complexity("Review our Architecture"),
            Complexity::High
        );
    }

    #[test]
    fn test_complexity_length_thresholds() {
        let extractor = HeuristicExtractor::new();
        assert_eq!(extractor.estimate_complexity(&"a".repeat(300)), Complexity::Low);
        assert_eq!(
            extractor.estimate_complexity(&"a".repeat(301)),
            Complexity::Medium
        );
        assert_eq!(
            extractor.estimate_complexity(&"a".repeat(1000)),
            Complexity::Medium
        );
        assert_eq!(
            extractor.estimate_complexity(&"a".repeat(1001)),
            Complexity::High
        );
    }

    #[test]
    fn test_extract_builds_summary() {
        let extractor = HeuristicExtractor::new();
        let req = RequestDescriptor::new(
            "Explain in detail how these 20 pages of architecture docs affect our deployment pipeline.",
        )
        .with_tier(TenantTier::Premium)
        .with_context_tokens(900);

        let summary = extractor.extract(&req);
        assert_eq!(summary.task, TaskKind::Chat);
        assert_eq!(summary.complexity, Complexity::High);
        assert_eq!(summary.language, LanguageClass::En);
        assert_eq!(summary.size_class, SizeClass::Small);
        assert_eq!(summary.context_tokens, 900);
        assert_eq!(summary.tenant_tier, TenantTier::Premium);
    }

    #[test]
    fn test_missing_context_tokens_become_zero() {
        let summary = HeuristicExtractor::new().extract(&RequestDescriptor::new("hi"));
        assert_eq!(summary.context_tokens, 0);
    }

    #[test]
    fn test_custom_settings() {
        let extractor = HeuristicExtractor::with_settings(ExtractorSettings {
            high_triggers: vec!["postmortem".to_string()],
            ..ExtractorSettings::default()
        });
        assert_eq!(
            extractor.estimate_complexity("Write the POSTMORTEM"),
            Complexity::High
        );
        assert_eq!(
            extractor.estimate_complexity("describe the architecture"),
            Complexity::Low
        );
    }
}
