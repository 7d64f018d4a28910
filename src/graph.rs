// Lifecycle graph of one ticket type, as induced by the rule table

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::catalog::{Action, Code, Status};
use crate::rules::TransitionRule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusNode {
    pub code: Code,
    pub label: String,
    pub is_terminal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionEdge {
    pub from: Code,
    pub action: Code,
    pub to: Code,
    pub description: String,
}

/// Nodes are active statuses, edges are active rules whose action is active too.
/// Cycles and self-loops are kept as-is.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleGraph {
    pub ticket_type: Code,
    nodes: BTreeMap<Code, StatusNode>,
    edges: Vec<TransitionEdge>,
}

impl LifecycleGraph {
    pub(crate) fn build(
        ticket_type: Code,
        statuses: &[Status],
        actions: &[Action],
        rules: &[TransitionRule],
    ) -> Self {
        let status_codes: BTreeMap<_, _> = statuses
            .iter()
            .filter(|s| s.is_active)
            .map(|s| (s.id, s))
            .collect();
        let action_codes: BTreeMap<_, _> = actions
            .iter()
            .filter(|a| a.is_active)
            .map(|a| (a.id, &a.code))
            .collect();

        let nodes = status_codes
            .values()
            .map(|s| {
                (
                    s.code.clone(),
                    StatusNode {
                        code: s.code.clone(),
                        label: s.label.clone(),
                        is_terminal: s.is_terminal,
                    },
                )
            })
            .collect();

        let mut edges: Vec<TransitionEdge> = rules
            .iter()
            .filter(|rule| rule.is_active)
            .filter_map(|rule| {
                let from = status_codes.get(&rule.from_status)?;
                let to = status_codes.get(&rule.to_status)?;
                let action = action_codes.get(&rule.action)?;
                Some(TransitionEdge {
                    from: from.code.clone(),
                    action: (*action).clone(),
                    to: to.code.clone(),
                    description: rule.description.clone(),
                })
            })
            .collect();
        edges.sort_by(|a, b| (&a.from, &a.action).cmp(&(&b.from, &b.action)));

        Self {
            ticket_type,
            nodes,
            edges,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &StatusNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[TransitionEdge] {
        &self.edges
    }

    pub fn contains(&self, status: &Code) -> bool {
        self.nodes.contains_key(status)
    }

    /// `(action, target)` pairs leaving `status`, ordered by action code
    pub fn successors(&self, status: &Code) -> Vec<(&Code, &Code)> {
        self.edges
            .iter()
            .filter(|edge| &edge.from == status)
            .map(|edge| (&edge.action, &edge.to))
            .collect()
    }

    /// Every status reachable from `status`, including itself
    pub fn reachable_from(&self, status: &Code) -> BTreeSet<Code> {
        let mut seen = BTreeSet::new();
        if !self.contains(status) {
            return seen;
        }

        let mut queue = VecDeque::from([status.clone()]);
        seen.insert(status.clone());
        while let Some(current) = queue.pop_front() {
            for (_, next) in self.successors(&current) {
                if seen.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
        seen
    }

    /// Statuses without outgoing edges; terminal statuses are always among them
    pub fn sinks(&self) -> Vec<&Code> {
        self.nodes
            .keys()
            .filter(|code| !self.edges.iter().any(|edge| &edge.from == *code))
            .collect()
    }

    /// Sinks that are not terminal: tickets reaching them can never close
    pub fn dead_ends(&self) -> Vec<&Code> {
        self.sinks()
            .into_iter()
            .filter(|code| self.nodes.get(*code).is_some_and(|node| !node.is_terminal))
            .collect()
    }
}

impl fmt::Display for LifecycleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lifecycle {}", self.ticket_type)?;
        for node in self.nodes.values() {
            let marker = if node.is_terminal { " (terminal)" } else { "" };
            writeln!(f, "  {}{}", node.code, marker)?;
            for (action, to) in self.successors(&node.code) {
                writeln!(f, "    --{action}--> {to}")?;
            }
        }
        Ok(())
    }
}
