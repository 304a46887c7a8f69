//! Request metadata: repository, service, tool, agent and platform attributes
//!
//! A [`MetadataRecord`] accumulates what is known about the current unit of
//! work as it becomes available. Updates are merged leaf by leaf so a later
//! partial update never erases a value learned earlier.
//!
//! A leaf counts as *set* when it holds a non-empty string. Merge only applies
//! set leaves and projection only emits set leaves. Projected keys are
//! snake_case for both log fields and span attributes.

use super::field::Field;
use serde::{Deserialize, Serialize};

fn is_set(leaf: &Option<String>) -> bool {
    leaf.as_deref().is_some_and(|s| !s.is_empty())
}

fn merge_leaf(dst: &mut Option<String>, src: &Option<String>) {
    if is_set(src) {
        dst.clone_from(src);
    }
}

fn push_leaf<'a>(out: &mut Vec<(&'static str, &'a str)>, key: &'static str, leaf: &'a Option<String>) {
    if let Some(value) = leaf.as_deref() {
        if !value.is_empty() {
            out.push((key, value));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_url: Option<String>,
}

impl Repository {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    fn merge_from(&mut self, other: &Repository) {
        merge_leaf(&mut self.name, &other.name);
        merge_leaf(&mut self.owner, &other.owner);
        merge_leaf(&mut self.platform, &other.platform);
        merge_leaf(&mut self.id, &other.id);
        merge_leaf(&mut self.commit_id, &other.commit_id);
        merge_leaf(&mut self.pr_number, &other.pr_number);
        merge_leaf(&mut self.branch_id, &other.branch_id);
        merge_leaf(&mut self.branch_name, &other.branch_name);
        merge_leaf(&mut self.installation_id, &other.installation_id);
        merge_leaf(&mut self.app_id, &other.app_id);
        merge_leaf(&mut self.action, &other.action);
        merge_leaf(&mut self.project_id, &other.project_id);
        merge_leaf(&mut self.organization_id, &other.organization_id);
        merge_leaf(&mut self.start_commit_sha, &other.start_commit_sha);
        merge_leaf(&mut self.end_commit_sha, &other.end_commit_sha);
        merge_leaf(&mut self.clone_url, &other.clone_url);
    }

    fn project_into<'a>(&'a self, out: &mut Vec<(&'static str, &'a str)>) {
        push_leaf(out, "repository_name", &self.name);
        push_leaf(out, "repository_owner", &self.owner);
        push_leaf(out, "repository_platform", &self.platform);
        push_leaf(out, "repository_id", &self.id);
        push_leaf(out, "commit_id", &self.commit_id);
        push_leaf(out, "pr_number", &self.pr_number);
        push_leaf(out, "branch_id", &self.branch_id);
        push_leaf(out, "branch_name", &self.branch_name);
        push_leaf(out, "installation_id", &self.installation_id);
        push_leaf(out, "app_id", &self.app_id);
        push_leaf(out, "action", &self.action);
        push_leaf(out, "project_id", &self.project_id);
        push_leaf(out, "organization_id", &self.organization_id);
        push_leaf(out, "start_commit_sha", &self.start_commit_sha);
        push_leaf(out, "end_commit_sha", &self.end_commit_sha);
        push_leaf(out, "clone_url", &self.clone_url);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl Service {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    fn merge_from(&mut self, other: &Service) {
        merge_leaf(&mut self.name, &other.name);
        merge_leaf(&mut self.category, &other.category);
        merge_leaf(&mut self.event, &other.event);
    }

    fn project_into<'a>(&'a self, out: &mut Vec<(&'static str, &'a str)>) {
        push_leaf(out, "service_name", &self.name);
        push_leaf(out, "service_category", &self.category);
        push_leaf(out, "service_event", &self.event);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Tool {
    fn merge_from(&mut self, other: &Tool) {
        merge_leaf(&mut self.name, &other.name);
        merge_leaf(&mut self.status, &other.status);
    }

    fn project_into<'a>(&'a self, out: &mut Vec<(&'static str, &'a str)>) {
        push_leaf(out, "tool_name", &self.name);
        push_leaf(out, "tool_status", &self.status);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Agent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl Agent {
    fn merge_from(&mut self, other: &Agent) {
        merge_leaf(&mut self.name, &other.name);
        merge_leaf(&mut self.status, &other.status);
        merge_leaf(&mut self.trace_id, &other.trace_id);
    }

    fn project_into<'a>(&'a self, out: &mut Vec<(&'static str, &'a str)>) {
        push_leaf(out, "agent_name", &self.name);
        push_leaf(out, "agent_status", &self.status);
        push_leaf(out, "agent_trace_id", &self.trace_id);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platform {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

impl Platform {
    fn merge_from(&mut self, other: &Platform) {
        merge_leaf(&mut self.name, &other.name);
        merge_leaf(&mut self.component, &other.component);
    }

    fn project_into<'a>(&'a self, out: &mut Vec<(&'static str, &'a str)>) {
        push_leaf(out, "platform_name", &self.name);
        push_leaf(out, "platform_component", &self.component);
    }
}

/// Accumulated description of the current request
///
/// # Example
///
/// ```
/// use rust_correlated_logger::core::metadata::{merge, MetadataRecord, Repository, Service};
///
/// let first = merge(&MetadataRecord::default(), &MetadataRecord::default().with_repository(Repository::named("r")));
/// let both = merge(&first, &MetadataRecord::default().with_service(Service::named("s")));
///
/// let keys: Vec<_> = both.leaves().into_iter().map(|(k, _)| k).collect();
/// assert_eq!(keys, vec!["repository_name", "service_name"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

fn merge_group<T: Clone>(dst: &mut Option<T>, src: &Option<T>, merge: impl FnOnce(&mut T, &T)) {
    let Some(incoming) = src else {
        return;
    };
    match dst {
        Some(existing) => merge(existing, incoming),
        None => *dst = Some(incoming.clone()),
    }
}

impl MetadataRecord {
    #[must_use]
    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repository = Some(repository);
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }

    #[must_use]
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tool = Some(tool);
        self
    }

    #[must_use]
    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// True when no leaf is set
    pub fn is_empty(&self) -> bool {
        self.leaves().is_empty()
    }

    /// Merge `incoming` into `self`, leaf by leaf
    pub fn merge_from(&mut self, incoming: &MetadataRecord) {
        if self.is_empty() {
            *self = incoming.clone();
            return;
        }
        merge_group(&mut self.repository, &incoming.repository, Repository::merge_from);
        merge_group(&mut self.service, &incoming.service, Service::merge_from);
        merge_group(&mut self.tool, &incoming.tool, Tool::merge_from);
        merge_group(&mut self.agent, &incoming.agent, Agent::merge_from);
        merge_group(&mut self.platform, &incoming.platform, Platform::merge_from);
    }

    /// Set leaves as `(key, value)` pairs in a stable order
    pub fn leaves(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        if let Some(repository) = &self.repository {
            repository.project_into(&mut out);
        }
        if let Some(service) = &self.service {
            service.project_into(&mut out);
        }
        if let Some(tool) = &self.tool {
            tool.project_into(&mut out);
        }
        if let Some(agent) = &self.agent {
            agent.project_into(&mut out);
        }
        if let Some(platform) = &self.platform {
            platform.project_into(&mut out);
        }
        out
    }
}

/// Merge `incoming` over `existing` without clearing anything `existing` knows
pub fn merge(existing: &MetadataRecord, incoming: &MetadataRecord) -> MetadataRecord {
    let mut merged = existing.clone();
    merged.merge_from(incoming);
    merged
}

/// One string field per set leaf
pub fn project(metadata: &MetadataRecord) -> Vec<Field> {
    metadata
        .leaves()
        .into_iter()
        .map(|(key, value)| Field::string(key, value))
        .collect()
}

/// One span attribute per set leaf, using the same keys as [`project`]
pub fn span_attributes(metadata: &MetadataRecord) -> Vec<(String, String)> {
    metadata
        .leaves()
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
