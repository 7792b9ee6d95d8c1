//! Routing performance benchmarks
//!
//! Measures the non-I/O parts of a routed call: feature extraction, rule
//! matching, policy parsing, and the invoker's overhead around an in-memory
//! backend.
//!
//! ## Expected Performance Characteristics
//!
//! - Feature extraction: sub-microsecond for short prompts, linear in text length
//! - Selection: linear in the number of rules tried before a match
//! - Policy parsing: tens of microseconds (startup and reload only)
//!
//! Run with: `cargo bench`

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use modelroute::error::{AppResult, BackendError};
use modelroute::features::{FeatureExtractor, HeuristicExtractor, RequestDescriptor};
use modelroute::policy::{
    CallParams, DefaultTargets, ModelTarget, ModelsDocument, PolicyTable, RoutingRule,
    RuleCondition, RulesDocument, TaskKind, TenantTier, TokenRange,
};
use modelroute::providers::{Backend, ChatReply, ChatTurn, Dispatcher, EmbedReply};
use modelroute::router::{ModelRouter, select};
use std::hint::black_box;
use std::sync::Arc;

const PROMPTS: [(&str, &str); 3] = [
    ("short", "What is Rust?"),
    (
        "medium",
        "Explain how ownership and borrowing work in Rust, and why they prevent data races at compile time.",
    ),
    (
        "long",
        "Write a comprehensive tutorial on async programming in Rust, covering futures, tokio, async/await syntax, pinning, and common patterns. Include code examples and explain the relationship between Future, Poll, and Waker. Then explain in detail how the architecture of a multi-threaded runtime schedules tasks across worker threads.",
    ),
];

struct Instant;

#[async_trait]
impl Backend for Instant {
    fn provider(&self) -> &str {
        "bench"
    }

    async fn chat(&self, _turns: &[ChatTurn]) -> Result<ChatReply, BackendError> {
        Ok(ChatReply {
            text: String::new(),
            raw: serde_json::Value::Null,
        })
    }

    async fn embed(&self, _text: &str) -> Result<EmbedReply, BackendError> {
        Ok(EmbedReply {
            vector: Vec::new(),
            raw: serde_json::Value::Null,
        })
    }
}

struct InstantDispatcher;

impl Dispatcher for InstantDispatcher {
    fn resolve(&self, _: &ModelTarget, _: &CallParams) -> AppResult<Arc<dyn Backend>> {
        Ok(Arc::new(Instant))
    }
}

/// Table with `rule_count` rules that never match premium-tier chat,
/// followed by a catch-all
fn table(rule_count: usize) -> PolicyTable {
    let mut targets = vec![
        ModelTarget::new("default", "anthropic", "claude-3-5-haiku", TaskKind::Chat),
        ModelTarget::new("catch-all", "gemini", "gemini-2.0-flash", TaskKind::Chat),
    ];
    let mut rules = Vec::with_capacity(rule_count + 1);
    for i in 0..rule_count {
        let id = format!("t{}", i);
        targets.push(ModelTarget::new(&id, "bedrock", "m", TaskKind::Chat));
        rules.push(RoutingRule::new(
            format!("r{}", i),
            RuleCondition::any()
                .task(TaskKind::Chat)
                .tiers([TenantTier::Free])
                .context_tokens(TokenRange::at_least(i * 100)),
            id,
        ));
    }
    rules.push(RoutingRule::new("catch-all", RuleCondition::any(), "catch-all"));
    PolicyTable::new(targets, rules, DefaultTargets::new(Some("default"), None))
        .expect("bench policy should be valid")
}

fn bench_feature_extraction(c: &mut Criterion) {
    let extractor = HeuristicExtractor::new();
    let mut group = c.benchmark_group("feature_extraction");

    for (name, prompt) in PROMPTS {
        let request = RequestDescriptor::new(prompt).with_tier(TenantTier::Premium);
        group.bench_with_input(BenchmarkId::from_parameter(name), &request, |b, r| {
            b.iter(|| extractor.extract(black_box(r)));
        });
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let extractor = HeuristicExtractor::new();
    let features = extractor.extract(&RequestDescriptor::new(PROMPTS[1].1).with_tier(TenantTier::Premium));
    let mut group = c.benchmark_group("selection");

    for rule_count in [0, 10, 100] {
        let table = table(rule_count);
        group.bench_with_input(BenchmarkId::from_parameter(rule_count), &table, |b, t| {
            b.iter(|| select(black_box(&features), t));
        });
    }

    group.finish();
}

fn bench_policy_parsing(c: &mut Criterion) {
    let models = serde_json::to_string(&ModelsDocument {
        models: (0..20)
            .map(|i| {
                ModelTarget::new(format!("m{}", i), "anthropic", "claude", TaskKind::Chat)
                    .with_max_context_tokens(200_000)
            })
            .collect(),
    })
    .expect("models should serialize");
    let rules = serde_json::to_string(&RulesDocument {
        rules: (0..20)
            .map(|i| {
                RoutingRule::new(
                    format!("r{}", i),
                    RuleCondition::any().context_tokens(TokenRange::at_least(i * 1000)),
                    format!("m{}", i),
                )
            })
            .collect(),
        defaults: DefaultTargets::new(Some("m0"), None),
    })
    .expect("rules should serialize");

    c.bench_function("policy_parsing", |b| {
        b.iter(|| {
            let models: ModelsDocument = serde_json::from_str(black_box(&models)).unwrap();
            let rules: RulesDocument = serde_json::from_str(black_box(&rules)).unwrap();
            PolicyTable::from_documents(models, rules).unwrap()
        });
    });
}

fn bench_routed_call(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let router = ModelRouter::new(table(10), Arc::new(InstantDispatcher));
    let request = RequestDescriptor::new(PROMPTS[0].1);

    c.bench_function("routed_call", |b| {
        b.to_async(&runtime).iter(|| async {
            let handle = router.select_target(&request).unwrap();
            handle.chat(vec![ChatTurn::user(PROMPTS[0].1)]).await.unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_feature_extraction,
    bench_selection,
    bench_policy_parsing,
    bench_routed_call,
);
criterion_main!(benches);
