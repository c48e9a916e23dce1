//! Agent configuration surface
//!
//! Every knob has a safe default so the engine runs with zero
//! configuration; `from_env` layers named overrides on top.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Keyword a fixed-criterion provider requires in the order text.
    pub item_keyword: String,
    /// Quantity used when the order text carries no integer literal.
    pub default_quantity: u32,
    /// Simulated processing delay between AGREE and INFORM.
    pub processing_delay: Duration,
    /// Most history entries handed to the reasoning prompt.
    pub history_limit: usize,
    /// Hard overall deadline for a requester conversation.
    pub reply_deadline: Duration,
    /// Bounded wait on the transport per loop iteration.
    pub poll_timeout: Duration,
    /// `None` = accept unknown senders. An empty list also passes
    /// (fail-open default); otherwise membership is required.
    pub authorized_senders: Option<Vec<String>>,
    /// Delegate undecided messages to the reasoning backend.
    pub delegate_to_llm: bool,
    /// Reply-by deadlines earlier than now + this are clamped forward.
    pub reply_by_min_lead: Duration,
    /// Reply-by deadline applied when a plan carries none.
    pub reply_by_default_lead: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            item_keyword: "rolls".to_string(),
            default_quantity: 6,
            processing_delay: Duration::from_millis(500),
            history_limit: 20,
            reply_deadline: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(1),
            authorized_senders: None,
            delegate_to_llm: false,
            reply_by_min_lead: Duration::from_secs(5),
            reply_by_default_lead: Duration::from_secs(30),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    Some(matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    ))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

impl AgentSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            item_keyword: std::env::var("PARLEY_ITEM_KEYWORD")
                .unwrap_or(defaults.item_keyword),
            default_quantity: env_parse("PARLEY_DEFAULT_QTY")
                .unwrap_or(defaults.default_quantity),
            processing_delay: env_parse("PARLEY_PROCESSING_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.processing_delay),
            history_limit: env_parse("PARLEY_HISTORY_LIMIT").unwrap_or(defaults.history_limit),
            reply_deadline: env_parse("PARLEY_REPLY_DEADLINE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reply_deadline),
            poll_timeout: env_parse("PARLEY_POLL_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_timeout),
            authorized_senders: std::env::var("PARLEY_AUTHORIZED_SENDERS").ok().map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            delegate_to_llm: env_flag("PARLEY_DELEGATE_LLM").unwrap_or(defaults.delegate_to_llm),
            reply_by_min_lead: defaults.reply_by_min_lead,
            reply_by_default_lead: defaults.reply_by_default_lead,
        }
    }
}

/// Persona lookup: `PARLEY_PERSONA_<ALIAS>`, then the global
/// `PARLEY_PERSONA`, then a plain default.
pub fn persona_from_env(alias: &str) -> String {
    std::env::var(format!("PARLEY_PERSONA_{}", alias.to_uppercase()))
        .or_else(|_| std::env::var("PARLEY_PERSONA"))
        .unwrap_or_else(|_| "Traditional, matter-of-fact style; general role.".to_string())
        .trim()
        .to_string()
}
