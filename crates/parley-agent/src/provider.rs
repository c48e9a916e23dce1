//! Fixed-criterion provider role
//!
//! Services a REQUEST only when the order text mentions the configured
//! item keyword: REFUSE with an explanation otherwise, else AGREE,
//! simulate processing, pull the first integer literal out of the text
//! (or fall back to the default quantity) and INFORM with the result.

use async_trait::async_trait;
use serde_json::json;

use parley_acl::{AclMessage, Performative};

use crate::role::{Outbound, RoleCx, RoleLogic};

#[derive(Debug, Default)]
pub struct ProviderRole;

impl ProviderRole {
    pub fn new() -> Self {
        Self
    }
}

fn first_integer(text: &str) -> Option<u32> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if !digits.is_empty() {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[async_trait]
impl RoleLogic for ProviderRole {
    async fn decide(
        &self,
        cx: &RoleCx<'_>,
        incoming: &AclMessage,
        sender: &str,
    ) -> Option<Vec<Outbound>> {
        if incoming.performative != Performative::Request {
            return Some(vec![]);
        }

        let text = incoming.text().unwrap_or("").to_string();
        let keyword = &cx.settings.item_keyword;
        tracing::info!(
            conversation_id = %incoming.conversation_id,
            from = %sender,
            order = %text,
            "provider received a request"
        );

        if !text.contains(keyword.as_str()) {
            let refuse = incoming
                .reply(Performative::Refuse)
                .text(format!("cannot service this request: no '{keyword}' in the order"))
                .finish()
                .ok()?;
            return Some(vec![Outbound::reply(refuse)]);
        }

        let agree = incoming
            .reply(Performative::Agree)
            .text("ok, processing the order")
            .finish()
            .ok()?;

        let quantity = first_integer(&text).unwrap_or(cx.settings.default_quantity);
        let inform = incoming
            .reply(Performative::Inform)
            .entry("quantity", json!(quantity))
            .text(format!("order completed: {quantity} {keyword}"))
            .finish()
            .ok()?;

        Some(vec![
            Outbound::reply(agree),
            Outbound::reply(inform).delayed(cx.settings.processing_delay),
        ])
    }
}
