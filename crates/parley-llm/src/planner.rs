//! Prompt construction and reply planning

use std::collections::HashMap;

use async_trait::async_trait;

use parley_acl::AclMessage;
use parley_directory::{PeerDescriptor, PeerPicker};

use crate::plan::Plan;
use crate::router::LlmRouter;
use crate::types::{ChatMessage, CompletionRequest, LlmError, Result};

/// Turns an incoming envelope plus context into a candidate `Plan`.
pub struct Planner {
    router: LlmRouter,
}

impl Planner {
    pub fn new(router: LlmRouter) -> Self {
        Self { router }
    }

    pub fn from_env() -> Self {
        Self::new(LlmRouter::from_env())
    }

    pub fn router(&self) -> &LlmRouter {
        &self.router
    }

    fn system_prompt(agent_name: &str, persona: &str, peers_excerpt: &str) -> String {
        format!(
            r#"You are an autonomous agent speaking FIPA-ACL via JSON.
STRICT RULES:
- Output MUST be a single JSON object with keys: performative, payload, text (no extra prose).
- Keep the conversation inside the incoming conversation_id and protocol; the runtime re-stamps them.
- Choose 'performative' according to minimal FIPA transitions:
  REQUEST -> AGREE or REFUSE; after AGREE -> INFORM or FAILURE.
- Do not invent sender/receiver: the runtime sets them.
- 'text' is the main natural-language answer.
- Be concise, factual, and actionable. No roleplay fluff.

Agent identity:
- name: {agent_name}
- persona: {persona}

Known peers (alias, persona, address):
{peers_excerpt}
"#
        )
    }

    /// Call the backend once and parse its answer into an untrusted
    /// `Plan`. Callers must run the plan through pipeline validation
    /// before realizing it into an envelope.
    pub async fn plan_reply(
        &self,
        agent_name: &str,
        persona: &str,
        peers_excerpt: &str,
        history_json: &str,
        knowledge: Option<&str>,
        incoming: &AclMessage,
    ) -> Result<Plan> {
        let incoming_json =
            serde_json::to_string_pretty(incoming).map_err(|e| LlmError::RequestFailed {
                message: e.to_string(),
            })?;

        let mut messages = vec![ChatMessage::user(format!(
            "HISTORY (recent messages for this agent):\n{history_json}"
        ))];
        if let Some(knowledge) = knowledge {
            messages.push(ChatMessage::user(format!("KNOWLEDGE:\n{knowledge}")));
        }
        messages.push(ChatMessage::user(format!(
            "INCOMING FIPA-ACL JSON:\n{incoming_json}"
        )));
        messages.push(ChatMessage::user("Respond with EXACTLY one JSON object."));

        let request = CompletionRequest::new(messages)
            .with_system(Self::system_prompt(agent_name, persona, peers_excerpt))
            .with_temperature(0.1)
            .with_max_tokens(700)
            .with_json_mode();

        let response = self.router.complete(request).await?;
        Plan::from_json(&response.content).map_err(|e| LlmError::InvalidResponse {
            message: format!("backend returned non-plan JSON: {e}"),
        })
    }
}

/// Render a registry snapshot for the prompt (alias order is sorted so
/// prompts are stable across runs).
pub fn peers_excerpt(snapshot: &HashMap<String, PeerDescriptor>) -> String {
    let mut rows: Vec<String> = snapshot
        .values()
        .map(|peer| format!("- {} | {} | {}", peer.alias, peer.persona, peer.address))
        .collect();
    rows.sort();
    rows.join("\n")
}

/// Backend-assisted peer choice: asks the router to pick one alias from
/// the candidate set. Any failure means `None`, which sends the router
/// fallback heuristic into action.
pub struct LlmPeerPicker {
    router: LlmRouter,
}

impl LlmPeerPicker {
    pub fn new(router: LlmRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl PeerPicker for LlmPeerPicker {
    async fn pick(
        &self,
        need: &str,
        candidates: &HashMap<String, PeerDescriptor>,
    ) -> Option<String> {
        let excerpt = peers_excerpt(candidates);
        let request = CompletionRequest::new(vec![ChatMessage::user(format!(
            "NEED:\n{need}\n\nCANDIDATES (alias | persona | address):\n{excerpt}\n\n\
             Pick the single best alias. Respond with one JSON object: {{\"alias\": \"...\"}}"
        ))])
        .with_system("You route work to the best-matching agent. JSON only.")
        .with_temperature(0.0)
        .with_max_tokens(64)
        .with_json_mode();

        let response = match self.router.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "peer picker call failed, using heuristic");
                return None;
            }
        };

        #[derive(serde::Deserialize)]
        struct Choice {
            alias: String,
        }

        match serde_json::from_str::<Choice>(&response.content) {
            Ok(choice) if !choice.alias.trim().is_empty() => Some(choice.alias),
            _ => {
                tracing::debug!(content = %response.content, "unusable picker reply");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_acl::Performative;

    use crate::types::ProviderKind;

    fn snapshot() -> HashMap<String, PeerDescriptor> {
        let mut out = HashMap::new();
        for (alias, persona) in [("provider", "bakery orders"), ("reporter", "audit trail")] {
            out.insert(
                alias.to_string(),
                PeerDescriptor {
                    alias: alias.to_string(),
                    address: format!("{alias}@office"),
                    role: "generic".to_string(),
                    persona: persona.to_string(),
                    registered_at: Utc::now(),
                },
            );
        }
        out
    }

    #[test]
    fn peers_excerpt_is_sorted_and_complete() {
        let excerpt = peers_excerpt(&snapshot());
        let lines: Vec<&str> = excerpt.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("- provider"));
        assert!(lines[1].starts_with("- reporter"));
    }

    #[tokio::test]
    async fn deterministic_planner_yields_a_parsable_plan() {
        let planner = Planner::new(LlmRouter::from_kind(ProviderKind::Deterministic));
        let incoming = AclMessage::build(Performative::Request)
            .conversation("conv-1")
            .text("six rolls please")
            .finish()
            .unwrap();

        let plan = planner
            .plan_reply("provider", "bakery clerk", "", "[]", None, &incoming)
            .await
            .unwrap();
        assert_eq!(plan.performative, "AGREE");
    }
}
