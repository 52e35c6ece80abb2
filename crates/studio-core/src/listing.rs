//! Filtering and ordering for agent lists.

use std::collections::HashSet;

use crate::agent::{Agent, AgentWithOwner};

/// Criteria applied to an agent list before display.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentFilter {
    /// Case-insensitive substring matched against name and description.
    pub query: Option<String>,
    /// Case-insensitive exact tag name.
    pub tag: Option<String>,
    /// Drop agents that have been toggled off.
    pub active_only: bool,
}

impl AgentFilter {
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn active_only(mut self, active_only: bool) -> Self {
        self.active_only = active_only;
        self
    }

    pub fn matches(&self, agent: &Agent) -> bool {
        if self.active_only && !agent.is_active() {
            return false;
        }
        if let Some(query) = self
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
        {
            let needle = query.to_lowercase();
            if !agent.name.to_lowercase().contains(&needle)
                && !agent.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(tag) = self.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if !agent
                .params
                .tags
                .iter()
                .any(|t| t.name.trim().eq_ignore_ascii_case(tag))
            {
                return false;
            }
        }
        true
    }

    /// Filters and sorts newest-updated first.
    pub fn apply(&self, agents: Vec<AgentWithOwner>) -> Vec<AgentWithOwner> {
        let mut kept: Vec<AgentWithOwner> = agents
            .into_iter()
            .filter(|entry| self.matches(&entry.agent))
            .collect();
        sort_by_updated_desc(&mut kept);
        kept
    }
}

/// Newest first; ties keep their original order.
pub fn sort_by_updated_desc(agents: &mut [AgentWithOwner]) {
    agents.sort_by(|a, b| b.agent.updated_at.cmp(&a.agent.updated_at));
}

/// Distinct tag names across all agents, sorted case-insensitively.
///
/// Tags differing only by case collapse onto the first spelling seen.
pub fn collect_tags<'a>(agents: impl IntoIterator<Item = &'a Agent>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for agent in agents {
        for tag in &agent.params.tags {
            let name = tag.name.trim();
            if name.is_empty() {
                continue;
            }
            if seen.insert(name.to_lowercase()) {
                tags.push(name.to_string());
            }
        }
    }
    tags.sort_by_key(|t| t.to_lowercase());
    tags
}
