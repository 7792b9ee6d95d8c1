//! Property-based tests for extraction and selection

use modelroute::features::{FeatureExtractor, FeatureSummary, HeuristicExtractor, RequestDescriptor};
use modelroute::policy::{
    Complexity, DefaultTargets, LanguageClass, ModelTarget, PolicyTable, RoutingRule,
    RuleCondition, SizeClass, TaskKind, TenantTier, TokenRange,
};
use modelroute::router::{condition_matches, ensure_capacity, select};
use proptest::prelude::*;

fn task() -> impl Strategy<Value = TaskKind> {
    prop_oneof![Just(TaskKind::Chat), Just(TaskKind::Embedding)]
}

fn tier() -> impl Strategy<Value = TenantTier> {
    prop_oneof![
        Just(TenantTier::Free),
        Just(TenantTier::Standard),
        Just(TenantTier::Premium),
        Just(TenantTier::Internal),
    ]
}

fn complexity() -> impl Strategy<Value = Complexity> {
    prop_oneof![
        Just(Complexity::Low),
        Just(Complexity::Medium),
        Just(Complexity::High)
    ]
}

fn summary() -> impl Strategy<Value = FeatureSummary> {
    (
        task(),
        0usize..100_000,
        complexity(),
        any::<bool>(),
        0usize..1_000_000,
        tier(),
    )
        .prop_map(|(task, token_count, complexity, multi, context_tokens, tenant_tier)| {
            FeatureSummary {
                task,
                token_count,
                size_class: SizeClass::Small,
                language: if multi {
                    LanguageClass::Multi
                } else {
                    LanguageClass::En
                },
                complexity,
                context_tokens,
                tenant_tier,
            }
        })
}

fn chat(id: &str) -> ModelTarget {
    ModelTarget::new(id, "anthropic", "m", TaskKind::Chat)
}

fn embed(id: &str) -> ModelTarget {
    ModelTarget::new(id, "bedrock", "e", TaskKind::Embedding)
}

proptest! {
    #[test]
    fn test_extraction_is_idempotent(text in "\\PC{0,600}", tokens in proptest::option::of(0usize..50_000), tier in tier()) {
        let extractor = HeuristicExtractor::new();
        let mut request = RequestDescriptor::new(text).with_tier(tier);
        request.context_tokens = tokens;
        prop_assert_eq!(extractor.extract(&request), extractor.extract(&request));
    }

    #[test]
    fn test_token_estimate_is_monotonic(text in "\\PC{0,400}", extra in "\\PC{0,400}") {
        let extractor = HeuristicExtractor::new();
        let longer = format!("{}{}", text, extra);
        prop_assert!(extractor.estimate_tokens(&text) <= extractor.estimate_tokens(&longer));
        prop_assert!(extractor.estimate_tokens(&text) >= 1);
    }

    #[test]
    fn test_wildcard_rule_matches_every_summary(features in summary()) {
        prop_assert!(condition_matches(&RuleCondition::any(), &features));
        prop_assert!(condition_matches(&RuleCondition::any().tiers([]), &features));
    }

    #[test]
    fn test_appending_unset_field_condition_changes_nothing(features in summary(), level in complexity()) {
        let base = RuleCondition::any().complexity(level);
        let widened = RuleCondition {
            tenant_tier: Some(vec![]),
            ..base.clone()
        };
        prop_assert_eq!(condition_matches(&base, &features), condition_matches(&widened, &features));
    }

    #[test]
    fn test_selection_follows_rule_order(features in summary(), swap in any::<bool>()) {
        let rules = if swap {
            vec![
                RoutingRule::new("second", RuleCondition::any(), "b"),
                RoutingRule::new("first", RuleCondition::any(), "a"),
            ]
        } else {
            vec![
                RoutingRule::new("first", RuleCondition::any(), "a"),
                RoutingRule::new("second", RuleCondition::any(), "b"),
            ]
        };
        let table = PolicyTable::new(vec![chat("a"), chat("b")], rules, DefaultTargets::default()).unwrap();
        let expected = if swap { "b" } else { "a" };
        let selection = select(&features, &table).unwrap();
        prop_assert_eq!(selection.target().id(), expected);
    }

    #[test]
    fn test_capacity_boundary(limit in 1usize..100_000, requested in 0usize..200_000) {
        let target = chat("c").with_max_context_tokens(limit);
        let features = FeatureSummary {
            task: TaskKind::Chat,
            token_count: 1,
            size_class: SizeClass::Small,
            language: LanguageClass::En,
            complexity: Complexity::Low,
            context_tokens: requested,
            tenant_tier: TenantTier::Standard,
        };
        prop_assert_eq!(ensure_capacity(&target, &features).is_ok(), requested <= limit);
    }

    #[test]
    fn test_half_open_ranges(lo in 0usize..1000, width in 1usize..1000, value in 0usize..3000) {
        let range = TokenRange::new(Some(lo), Some(lo + width));
        prop_assert_eq!(range.contains(value), value >= lo && value < lo + width);
    }

    #[test]
    fn test_default_is_used_only_without_match(features in summary()) {
        let table = PolicyTable::new(
            vec![chat("premium-chat"), chat("chat-default"), embed("embed-default")],
            vec![RoutingRule::new(
                "premium",
                RuleCondition::any().task(TaskKind::Chat).tiers([TenantTier::Premium]),
                "premium-chat",
            )],
            DefaultTargets::new(Some("chat-default"), Some("embed-default")),
        )
        .unwrap();

        let selection = select(&features, &table).unwrap();
        let expected = match (features.task, features.tenant_tier) {
            (TaskKind::Chat, TenantTier::Premium) => "premium-chat",
            (TaskKind::Chat, _) => "chat-default",
            (TaskKind::Embedding, _) => "embed-default",
        };
        prop_assert_eq!(selection.target().id(), expected);
    }
}
