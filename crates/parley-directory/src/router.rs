//! Persona-based capability routing
//!
//! Picks the peer whose declared persona best matches a natural-language
//! need. A configured `PeerPicker` (usually backed by the reasoning
//! service) gets the first word; the lexical-overlap heuristic is the
//! deterministic fallback and must behave identically on repeated runs.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::directory::PeerDescriptor;

/// Optional delegated chooser. Its answer is honored only when it names
/// a member of the candidate set.
#[async_trait]
pub trait PeerPicker: Send + Sync {
    async fn pick(
        &self,
        need: &str,
        candidates: &HashMap<String, PeerDescriptor>,
    ) -> Option<String>;
}

fn tokens(text: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    let mut current = String::new();
    for ch in text.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() {
            current.push(ch);
        } else {
            if current.len() >= 3 {
                out.insert(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() >= 3 {
        out.insert(current);
    }
    out
}

/// Count of shared lowercase alphanumeric tokens of length >= 3.
pub fn lexical_overlap(need: &str, persona: &str) -> usize {
    tokens(need).intersection(&tokens(persona)).count()
}

/// Choose the best-matching peer alias for `need`.
///
/// Candidates are the snapshot minus `self_alias` (unless
/// `include_self`), intersected with the optional allow-list. Ties in
/// the heuristic break to the lexically smallest alias; `None` means
/// there was nothing to choose from.
pub async fn choose(
    need: &str,
    snapshot: &HashMap<String, PeerDescriptor>,
    self_alias: &str,
    include_self: bool,
    allowed: Option<&[String]>,
    picker: Option<&dyn PeerPicker>,
) -> Option<String> {
    let candidates: HashMap<String, PeerDescriptor> = snapshot
        .iter()
        .filter(|(alias, _)| include_self || alias.as_str() != self_alias)
        .filter(|(alias, _)| allowed.map_or(true, |list| list.iter().any(|a| a == *alias)))
        .map(|(alias, descriptor)| (alias.clone(), descriptor.clone()))
        .collect();

    if candidates.is_empty() {
        return None;
    }

    if let Some(picker) = picker {
        match picker.pick(need, &candidates).await {
            Some(choice) if candidates.contains_key(&choice) => return Some(choice),
            Some(choice) => {
                tracing::debug!(%choice, "picker named a non-candidate, falling back");
            }
            None => {}
        }
    }

    let mut scored: Vec<(usize, &String)> = candidates
        .iter()
        .map(|(alias, descriptor)| {
            let persona = format!("{} {}", descriptor.persona, descriptor.role);
            (lexical_overlap(need, &persona), alias)
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.first().map(|(_, alias)| (*alias).clone())
}
