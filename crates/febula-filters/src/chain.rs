//! Chain resolution and rule-text rendering.
//!
//! A [`ChainSnapshot`] loads the catalog and both tables once, then
//! resolves purely. Broken chains never fail a render: the row degrades to
//! [`SYNC_RULE_ERROR`].

use std::collections::{HashMap, HashSet};

use febula_core::error::FebulaResult;
use febula_core::models::filter_object::{FilterObject, FilterObjectQuery};
use febula_core::models::filter_rule::{EmployeeType, FilterRule, FilterRuleQuery, PermissionSet};
use febula_core::models::resource::Resource;
use febula_core::repository::{ResourceCatalog, TableRepository};
use serde::Serialize;
use tracing::debug;

use crate::catalog::CatalogAdapter;
use crate::error::ChainError;

/// Text shown in place of a chain that cannot be resolved.
pub const SYNC_RULE_ERROR: &str = "ERROR in filter chain";

pub struct ChainSnapshot {
    resources: Vec<Resource>,
    rules: Vec<FilterRule>,
    objects: HashMap<String, FilterObject>,
}

/// A reference field of a row's resource and the rule governing its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedField {
    #[serde(rename = "Field")]
    pub field: String,
    #[serde(rename = "Resource")]
    pub referenced_resource: String,
    #[serde(rename = "Rule")]
    pub rule_key: String,
}

/// Lineage of one matched rule: a head line, then one line per hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleBlock {
    #[serde(rename = "Resource")]
    pub resource: String,
    #[serde(rename = "FilterName")]
    pub filter_name: String,
    #[serde(rename = "Hops")]
    pub hops: Vec<String>,
}

impl RuleBlock {
    pub fn head(&self) -> String {
        format!("Field {} in filter {}", self.resource, self.filter_name)
    }

    fn head_html(&self) -> String {
        format!(
            "Field <b><i>{}</i></b> in filter <b><i>{}</i></b>",
            escape_html(&self.resource),
            escape_html(&self.filter_name)
        )
    }
}

/// How the rows of one resource are scoped for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRuleRow {
    #[serde(rename = "Resource")]
    pub resource: String,
    #[serde(rename = "EmployeeType")]
    pub employee_type: EmployeeType,
    #[serde(rename = "Fields")]
    pub fields: Vec<MatchedField>,
    /// `None` when any matched chain is broken.
    #[serde(rename = "Blocks")]
    pub blocks: Option<Vec<RuleBlock>>,
}

impl SyncRuleRow {
    pub fn is_broken(&self) -> bool {
        self.blocks.is_none()
    }

    /// Plain text, each hop indented one step deeper than the line above.
    pub fn render_text(&self) -> String {
        let Some(blocks) = &self.blocks else {
            return SYNC_RULE_ERROR.to_string();
        };
        let mut lines = Vec::new();
        for block in blocks {
            lines.push(block.head());
            for (depth, hop) in block.hops.iter().enumerate() {
                lines.push(format!("{}{hop}", "  ".repeat(depth + 1)));
            }
        }
        lines.join("\n")
    }

    /// Nested lists, each hop inside the list of the line above.
    pub fn render_html(&self) -> String {
        let Some(blocks) = &self.blocks else {
            return SYNC_RULE_ERROR.to_string();
        };
        let mut html = String::new();
        for block in blocks {
            html.push_str("<ul><li>");
            html.push_str(&block.head_html());
            html.push_str("</li>");
            for hop in &block.hops {
                html.push_str("<ul><li>");
                html.push_str(&escape_html(hop));
                html.push_str("</li>");
            }
            html.push_str(&"</ul>".repeat(block.hops.len() + 1));
        }
        html
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl ChainSnapshot {
    /// Resources are sorted by name; only live rules and objects are kept.
    pub fn new(
        mut resources: Vec<Resource>,
        rules: Vec<FilterRule>,
        objects: impl IntoIterator<Item = FilterObject>,
    ) -> Self {
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            resources,
            rules: rules
                .into_iter()
                .filter(|r| r.lifecycle.is_active())
                .collect(),
            objects: objects
                .into_iter()
                .filter(|o| o.lifecycle.is_active())
                .map(|o| (o.key.clone(), o))
                .collect(),
        }
    }

    /// Reads the catalog, the live rules of `permission_set` and every live
    /// filter object.
    pub async fn load<C, O, R>(
        catalog: &CatalogAdapter<'_, C>,
        objects: &O,
        rules: &R,
        permission_set: PermissionSet,
    ) -> FebulaResult<Self>
    where
        C: ResourceCatalog,
        O: TableRepository<FilterObject>,
        R: TableRepository<FilterRule>,
    {
        let resources = catalog.list_resources().await?.to_vec();
        let rules = rules
            .find(&FilterRuleQuery::in_permission_set(permission_set))
            .await?;
        let objects = objects.find(&FilterObjectQuery::default()).await?;
        Ok(Self::new(resources, rules, objects))
    }

    pub fn object(&self, key: &str) -> Option<&FilterObject> {
        self.objects.get(key)
    }

    /// Nodes from `key` back to the chain's anchor, starting with `key`.
    ///
    /// The walk ends at a locked node or one without predecessor.
    pub fn resolve_chain(&self, key: &str) -> Result<Vec<&FilterObject>, ChainError> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = key;
        loop {
            if !visited.insert(current) {
                return Err(ChainError::Cycle {
                    key: current.to_string(),
                });
            }
            let node = self.object(current).ok_or_else(|| ChainError::MissingFilter {
                key: current.to_string(),
            })?;
            chain.push(node);
            match node.previous() {
                Some((_, previous)) if !node.is_locked() => current = previous,
                _ => return Ok(chain),
            }
        }
    }

    /// One line per non-terminal hop of the chain starting at `key`.
    pub fn hop_lines(&self, key: &str) -> Result<Vec<String>, ChainError> {
        let chain = self.resolve_chain(key)?;
        let mut lines = Vec::with_capacity(chain.len().saturating_sub(1));
        for pair in chain.windows(2) {
            let (node, predecessor) = (pair[0], pair[1]);
            lines.push(format!(
                "{} = all {} from {} where {} in filter {}",
                node.name,
                node.field,
                node.resource,
                node.previous_field.as_deref().unwrap_or_default(),
                predecessor.name
            ));
        }
        Ok(lines)
    }

    /// Hop lines of the chain at `key` as indented text, or the sentinel.
    pub fn sync_rule_text(&self, key: &str) -> String {
        match self.hop_lines(key) {
            Ok(lines) => lines
                .iter()
                .enumerate()
                .map(|(depth, line)| format!("{}{line}", "  ".repeat(depth)))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(err) => {
                debug!(key, error = %err, "Filter chain broken");
                SYNC_RULE_ERROR.to_string()
            }
        }
    }

    fn rule_for(&self, resource: &str, employee_type: EmployeeType) -> Option<&FilterRule> {
        self.rules
            .iter()
            .find(|r| r.resource == resource && r.employee_type == employee_type)
    }

    fn has_rules(&self, resource: &str) -> bool {
        self.rules.iter().any(|r| r.resource == resource)
    }

    fn block(&self, rule: &FilterRule) -> Result<RuleBlock, ChainError> {
        let head = self
            .object(&rule.filter)
            .ok_or_else(|| ChainError::MissingFilter {
                key: rule.filter.clone(),
            })?;
        Ok(RuleBlock {
            resource: rule.resource.clone(),
            filter_name: head.name.clone(),
            hops: self.hop_lines(&rule.filter)?,
        })
    }

    /// Every resource × role pair with at least one system-filtered
    /// reference field whose target has a rule for that role. Resources in
    /// name order (narrowed by a case-insensitive `search`), roles in
    /// enumeration order.
    pub fn sync_rule_rows(&self, search: Option<&str>) -> Vec<SyncRuleRow> {
        let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());
        let mut rows = Vec::new();

        for resource in &self.resources {
            if needle
                .as_deref()
                .is_some_and(|n| !resource.name.to_lowercase().contains(n))
            {
                continue;
            }
            let candidates: Vec<(&str, &str)> = resource
                .reference_fields()
                .filter(|(_, field)| field.apply_system_filter)
                .filter_map(|(name, field)| field.reference_target().map(|t| (name, t)))
                .filter(|(_, target)| self.has_rules(target))
                .collect();
            if candidates.is_empty() {
                continue;
            }

            for employee_type in EmployeeType::ALL {
                let matched: Vec<(&str, &FilterRule)> = candidates
                    .iter()
                    .filter_map(|(field, target)| {
                        self.rule_for(target, employee_type).map(|rule| (*field, rule))
                    })
                    .collect();
                if matched.is_empty() {
                    continue;
                }

                let blocks: Result<Vec<RuleBlock>, ChainError> =
                    matched.iter().map(|(_, rule)| self.block(rule)).collect();
                let blocks = match blocks {
                    Ok(blocks) => Some(blocks),
                    Err(err) => {
                        debug!(
                            resource = %resource.name,
                            %employee_type,
                            error = %err,
                            "Filter chain broken"
                        );
                        None
                    }
                };

                rows.push(SyncRuleRow {
                    resource: resource.name.clone(),
                    employee_type,
                    fields: matched
                        .iter()
                        .map(|(field, rule)| MatchedField {
                            field: field.to_string(),
                            referenced_resource: rule.resource.clone(),
                            rule_key: rule.key.clone(),
                        })
                        .collect(),
                    blocks,
                });
            }
        }
        rows
    }
}
