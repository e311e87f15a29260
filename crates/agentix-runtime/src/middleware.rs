use async_trait::async_trait;

use agentix_config::RuntimeConfig;
use agentix_types::Usage;

use crate::message_store::MessageStore;

/// What a middleware wants the loop to do after a hook runs.
#[derive(Debug, Clone, PartialEq)]
pub enum MiddlewareAction {
    /// No objection; proceed as normal.
    Continue,
    /// Inject a system message into the conversation before continuing.
    InjectMessage(String),
    /// Stop the loop after this hook (used for turn/cost limits).
    Stop,
    /// Compact the conversation before continuing this turn. Only
    /// meaningful as a `before_turn` result.
    Compact,
}

/// A hook that runs before and after each turn of the agent loop.
///
/// Implementations hold their own mutable state (turn counters, spend
/// accumulators); the pipeline calls them in registration order and
/// stops at the first non-[`MiddlewareAction::Continue`] result.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name, used in logs.
    fn name(&self) -> &str;

    /// Run before a turn's backend request.
    async fn before_turn(&mut self, store: &MessageStore, config: &RuntimeConfig) -> MiddlewareAction;

    /// Run after a turn's tool dispatch completes.
    async fn after_turn(&mut self, store: &MessageStore, config: &RuntimeConfig, usage: Usage) -> MiddlewareAction {
        let _ = (store, config, usage);
        MiddlewareAction::Continue
    }
}

/// Runs a sequence of [`Middleware`]s in order, short-circuiting at
/// the first one that doesn't return [`MiddlewareAction::Continue`].
#[derive(Default)]
pub struct MiddlewarePipeline {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewarePipeline {
    /// An empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The four middlewares every agent loop runs, in a fixed order:
    /// turn limit, cost limit, auto-compact, then the plan-agent
    /// reminder.
    #[must_use]
    pub fn with_required(is_plan_agent: bool) -> Self {
        let mut pipeline = Self::new();
        pipeline.register(Box::new(TurnLimitMiddleware::default()));
        pipeline.register(Box::new(CostLimitMiddleware::default()));
        pipeline.register(Box::new(AutoCompactMiddleware::default()));
        pipeline.register(Box::new(PlanAgentReminderMiddleware::new(is_plan_agent)));
        pipeline
    }

    /// Add a middleware to the end of the pipeline.
    pub fn register(&mut self, middleware: Box<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Run every middleware's `before_turn` in order.
    pub async fn before_turn(&mut self, store: &MessageStore, config: &RuntimeConfig) -> MiddlewareAction {
        for middleware in &mut self.middlewares {
            let action = middleware.before_turn(store, config).await;
            if action != MiddlewareAction::Continue {
                return action;
            }
        }
        MiddlewareAction::Continue
    }

    /// Run every middleware's `after_turn` in order.
    pub async fn after_turn(&mut self, store: &MessageStore, config: &RuntimeConfig, usage: Usage) -> MiddlewareAction {
        for middleware in &mut self.middlewares {
            let action = middleware.after_turn(store, config, usage).await;
            if action != MiddlewareAction::Continue {
                return action;
            }
        }
        MiddlewareAction::Continue
    }
}

/// Stops the loop once it has run `config.max_turns` turns.
#[derive(Default)]
pub struct TurnLimitMiddleware {
    turns_run: u32,
}

#[async_trait]
impl Middleware for TurnLimitMiddleware {
    fn name(&self) -> &str {
        "turn_limit"
    }

    async fn before_turn(&mut self, _store: &MessageStore, config: &RuntimeConfig) -> MiddlewareAction {
        if self.turns_run >= config.max_turns {
            return MiddlewareAction::InjectMessage(TURN_LIMIT_NOTICE.to_string());
        }
        self.turns_run += 1;
        MiddlewareAction::Continue
    }
}

const TURN_LIMIT_NOTICE: &str = "Turn limit reached. Stopping here; let me know if you'd like to continue.";
const COST_LIMIT_NOTICE: &str = "Cost limit reached. Stopping here; let me know if you'd like to continue.";

/// Stops the loop once cumulative spend reaches `config.max_price_usd`.
#[derive(Default)]
pub struct CostLimitMiddleware {
    spent_usd: f64,
}

#[async_trait]
impl Middleware for CostLimitMiddleware {
    fn name(&self) -> &str {
        "cost_limit"
    }

    async fn before_turn(&mut self, _store: &MessageStore, config: &RuntimeConfig) -> MiddlewareAction {
        if self.spent_usd >= config.max_price_usd {
            return MiddlewareAction::InjectMessage(COST_LIMIT_NOTICE.to_string());
        }
        MiddlewareAction::Continue
    }

    async fn after_turn(&mut self, _store: &MessageStore, config: &RuntimeConfig, usage: Usage) -> MiddlewareAction {
        self.spent_usd += (usage.total_tokens as f64 / 1000.0) * config.price_per_1k_tokens_usd;
        if self.spent_usd >= config.max_price_usd {
            return MiddlewareAction::InjectMessage(COST_LIMIT_NOTICE.to_string());
        }
        MiddlewareAction::Continue
    }
}

/// The number of most-recent messages auto-compaction keeps verbatim.
const COMPACT_KEEP_RECENT: usize = 10;

/// Requests compaction once the conversation's estimated token count
/// crosses `config.auto_compact_threshold` of the model's context
/// window.
pub struct AutoCompactMiddleware {
    max_context_tokens: u64,
}

impl Default for AutoCompactMiddleware {
    fn default() -> Self {
        Self { max_context_tokens: 128_000 }
    }
}

impl AutoCompactMiddleware {
    /// Build with an explicit context window size, matching the
    /// backend actually in use.
    #[must_use]
    pub fn with_context_window(max_context_tokens: u64) -> Self {
        Self { max_context_tokens }
    }

    /// Number of most-recent messages kept verbatim across a compaction.
    #[must_use]
    pub fn keep_recent() -> usize {
        COMPACT_KEEP_RECENT
    }
}

#[async_trait]
impl Middleware for AutoCompactMiddleware {
    fn name(&self) -> &str {
        "auto_compact"
    }

    async fn before_turn(&mut self, store: &MessageStore, config: &RuntimeConfig) -> MiddlewareAction {
        let threshold_tokens = (self.max_context_tokens as f64 * config.auto_compact_threshold) as u64;
        if store.estimated_tokens() >= threshold_tokens {
            return MiddlewareAction::Compact;
        }
        MiddlewareAction::Continue
    }
}

/// A fixed reminder injected whenever the active profile is the
/// builtin `plan` agent, so the model doesn't forget it's read-only
/// partway through a long turn.
pub struct PlanAgentReminderMiddleware {
    is_plan_agent: bool,
}

impl PlanAgentReminderMiddleware {
    /// Build the middleware for the given profile.
    #[must_use]
    pub fn new(is_plan_agent: bool) -> Self {
        Self { is_plan_agent }
    }
}

const PLAN_REMINDER: &str =
    "Reminder: you are in plan mode. Investigate and describe a plan; do not modify any files.";

#[async_trait]
impl Middleware for PlanAgentReminderMiddleware {
    fn name(&self) -> &str {
        "plan_agent_reminder"
    }

    async fn before_turn(&mut self, _store: &MessageStore, _config: &RuntimeConfig) -> MiddlewareAction {
        if self.is_plan_agent {
            return MiddlewareAction::InjectMessage(PLAN_REMINDER.to_string());
        }
        MiddlewareAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn turn_limit_stops_after_max_turns() {
        let mut middleware = TurnLimitMiddleware::default();
        let store = MessageStore::new();
        let config = RuntimeConfig { max_turns: 2, ..RuntimeConfig::default() };
        assert_eq!(middleware.before_turn(&store, &config).await, MiddlewareAction::Continue);
        assert_eq!(middleware.before_turn(&store, &config).await, MiddlewareAction::Continue);
        assert_eq!(
            middleware.before_turn(&store, &config).await,
            MiddlewareAction::InjectMessage(TURN_LIMIT_NOTICE.to_string())
        );
    }

    #[tokio::test]
    async fn cost_limit_stops_once_spend_reaches_max() {
        let mut middleware = CostLimitMiddleware::default();
        let store = MessageStore::new();
        let config = RuntimeConfig { max_price_usd: 0.01, price_per_1k_tokens_usd: 1.0, ..RuntimeConfig::default() };
        let action = middleware
            .after_turn(&store, &config, Usage { total_tokens: 100, ..Usage::default() })
            .await;
        assert_eq!(action, MiddlewareAction::InjectMessage(COST_LIMIT_NOTICE.to_string()));
    }

    #[tokio::test]
    async fn cost_limit_zero_stops_before_the_first_backend_call() {
        let mut middleware = CostLimitMiddleware::default();
        let store = MessageStore::new();
        let config = RuntimeConfig { max_price_usd: 0.0, ..RuntimeConfig::default() };
        assert_eq!(
            middleware.before_turn(&store, &config).await,
            MiddlewareAction::InjectMessage(COST_LIMIT_NOTICE.to_string())
        );
    }

    #[tokio::test]
    async fn auto_compact_requests_compaction_past_threshold() {
        let mut middleware = AutoCompactMiddleware::with_context_window(1000);
        let mut store = MessageStore::new();
        store.push(agentix_types::Message::user("x".repeat(4000)));
        let config = RuntimeConfig { auto_compact_threshold: 0.5, ..RuntimeConfig::default() };
        assert_eq!(middleware.before_turn(&store, &config).await, MiddlewareAction::Compact);
    }

    #[tokio::test]
    async fn auto_compact_does_nothing_below_threshold() {
        let mut middleware = AutoCompactMiddleware::with_context_window(1_000_000);
        let store = MessageStore::new();
        let config = RuntimeConfig::default();
        assert_eq!(middleware.before_turn(&store, &config).await, MiddlewareAction::Continue);
    }

    #[tokio::test]
    async fn plan_reminder_only_fires_for_plan_agent() {
        let store = MessageStore::new();
        let config = RuntimeConfig::default();
        let mut off = PlanAgentReminderMiddleware::new(false);
        assert_eq!(off.before_turn(&store, &config).await, MiddlewareAction::Continue);
        let mut on = PlanAgentReminderMiddleware::new(true);
        assert_eq!(on.before_turn(&store, &config).await, MiddlewareAction::InjectMessage(PLAN_REMINDER.to_string()));
    }

    #[tokio::test]
    async fn pipeline_short_circuits_at_first_stop() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.register(Box::new(TurnLimitMiddleware { turns_run: 100 }));
        pipeline.register(Box::new(PlanAgentReminderMiddleware::new(true)));
        let store = MessageStore::new();
        let config = RuntimeConfig { max_turns: 1, ..RuntimeConfig::default() };
        assert_eq!(
            pipeline.before_turn(&store, &config).await,
            MiddlewareAction::InjectMessage(TURN_LIMIT_NOTICE.to_string())
        );
    }
}
