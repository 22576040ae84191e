use crate::node::Node;
use crate::style::Style;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Tracks how many items of each static list have been written to
/// scrollback. Items are identified by `(key, index)`.
///
/// Planning is read-only; state only changes in [`GraduationState::commit`],
/// so a frame that fails to render never marks its items as flushed.
#[derive(Debug, Default)]
pub struct GraduationState {
    flushed: HashMap<String, usize>,
    warned: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem {
    pub key: String,
    pub index: usize,
    pub node: Node,
    /// Style inherited from the boxes enclosing the list.
    pub style: Style,
}

impl PendingItem {
    pub fn id(&self) -> String {
        format!("{}#{}", self.key, self.index)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraduationPlan {
    pub pending: Vec<PendingItem>,
    /// Lists whose end fell below their flushed count: `(key, flushed, end)`.
    pub shrunk: Vec<(String, usize, usize)>,
    /// Keys seen more than once in the same tree; later occurrences are ignored.
    pub duplicates: Vec<String>,
}

impl GraduationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flushed_count(&self, key: &str) -> usize {
        self.flushed.get(key).copied().unwrap_or(0)
    }

    pub fn total_flushed(&self) -> usize {
        self.flushed.values().sum()
    }

    pub fn plan(&self, node: &Node) -> GraduationPlan {
        let mut plan = GraduationPlan::default();
        let mut seen = HashSet::new();
        self.collect(node, Style::default(), &mut plan, &mut seen);
        plan
    }

    pub fn commit(&mut self, plan: &GraduationPlan) {
        for item in &plan.pending {
            let count = self.flushed.entry(item.key.clone()).or_insert(0);
            *count = (*count).max(item.index + 1);
            self.warned.remove(&item.key);
        }

        for (key, flushed, len) in &plan.shrunk {
            if self.warned.insert(key.clone()) {
                warn!(
                    key = %key,
                    flushed = *flushed,
                    len = *len,
                    "static list shrank below its flushed count; items are never re-emitted"
                );
            }
        }

        for key in &plan.duplicates {
            if self.warned.insert(format!("dup:{key}")) {
                warn!(key = %key, "static list key used more than once; ignoring repeats");
            }
        }
    }

    fn collect(
        &self,
        node: &Node,
        inherited: Style,
        plan: &mut GraduationPlan,
        seen: &mut HashSet<String>,
    ) {
        match node {
            Node::Static(list) => {
                if !seen.insert(list.key.clone()) {
                    plan.duplicates.push(list.key.clone());
                    return;
                }
                let flushed = self.flushed_count(&list.key);
                let end = list.offset + list.items.len();
                if end < flushed {
                    plan.shrunk.push((list.key.clone(), flushed, end));
                    return;
                }
                plan.pending.extend(
                    list.items
                        .iter()
                        .enumerate()
                        .skip(flushed.saturating_sub(list.offset))
                        .map(|(i, item)| PendingItem {
                            key: list.key.clone(),
                            index: list.offset + i,
                            node: item.clone(),
                            style: inherited,
                        }),
                );
            }
            Node::Box(b) => {
                let style = b.style.inherit(inherited);
                for child in &b.children {
                    self.collect(child, style, plan, seen);
                }
            }
            Node::Fragment(children) => {
                for child in children {
                    self.collect(child, inherited, plan, seen);
                }
            }
            Node::Empty | Node::Text(_) => {}
        }
    }
}
