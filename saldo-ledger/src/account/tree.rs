//! In-memory view of the chart of accounts used to order header recomputation.
//!
//! Headers aggregate their direct live children. Aggregation is performed deepest
//! level first so every child is final before its parent is summed, for any depth.
use rust_decimal::Decimal;
use thiserror::Error;

use std::collections::{HashMap, HashSet};

use saldo_types::{account::AccountValues, primitives::AccountId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ChartCycle - account '{0}' is part of a parent cycle")]
pub struct ChartCycle(pub AccountId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartNode {
    pub id: AccountId,
    pub parent_id: Option<AccountId>,
    pub is_header: bool,
    pub is_deleted: bool,
}

impl From<&AccountValues> for ChartNode {
    fn from(values: &AccountValues) -> Self {
        Self {
            id: values.id,
            parent_id: values.parent_id,
            is_header: values.is_header,
            is_deleted: values.is_deleted(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChartTree {
    nodes: HashMap<AccountId, ChartNode>,
    children: HashMap<AccountId, Vec<AccountId>>,
    depths: HashMap<AccountId, usize>,
}

impl ChartTree {
    /// Builds the tree. Parents missing from `nodes` are treated as roots so an
    /// upward-closed subset (an account plus its ancestors) forms a valid tree.
    pub fn new(nodes: impl IntoIterator<Item = ChartNode>) -> Result<Self, ChartCycle> {
        let nodes: HashMap<AccountId, ChartNode> = nodes.into_iter().map(|n| (n.id, n)).collect();
        let mut children: HashMap<AccountId, Vec<AccountId>> = HashMap::new();
        for node in nodes.values().filter(|n| !n.is_deleted) {
            if let Some(parent_id) = node.parent_id {
                children.entry(parent_id).or_default().push(node.id);
            }
        }
        for ids in children.values_mut() {
            ids.sort();
        }

        let mut depths = HashMap::with_capacity(nodes.len());
        for id in nodes.keys() {
            Self::resolve_depth(&nodes, &mut depths, *id)?;
        }

        Ok(Self {
            nodes,
            children,
            depths,
        })
    }

    pub fn from_accounts<'a>(
        accounts: impl IntoIterator<Item = &'a AccountValues>,
    ) -> Result<Self, ChartCycle> {
        Self::new(accounts.into_iter().map(ChartNode::from))
    }

    fn resolve_depth(
        nodes: &HashMap<AccountId, ChartNode>,
        depths: &mut HashMap<AccountId, usize>,
        id: AccountId,
    ) -> Result<(), ChartCycle> {
        if depths.contains_key(&id) {
            return Ok(());
        }
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);
        let top_depth = loop {
            let Some(current_id) = current else {
                break 0;
            };
            if let Some(depth) = depths.get(&current_id) {
                break depth + 1;
            }
            if !seen.insert(current_id) {
                return Err(ChartCycle(current_id));
            }
            path.push(current_id);
            current = nodes
                .get(&current_id)
                .and_then(|n| n.parent_id)
                .filter(|parent_id| nodes.contains_key(parent_id));
        };
        for (offset, node_id) in path.iter().rev().enumerate() {
            depths.insert(*node_id, top_depth + offset);
        }
        Ok(())
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: AccountId) -> Option<&ChartNode> {
        self.nodes.get(&id)
    }

    /// Roots have depth 0.
    pub fn depth(&self, id: AccountId) -> Option<usize> {
        self.depths.get(&id).copied()
    }

    pub fn max_depth(&self) -> usize {
        self.live_nodes()
            .filter_map(|n| self.depth(n.id))
            .max()
            .unwrap_or(0)
    }

    pub fn children(&self, id: AccountId) -> &[AccountId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_live_children(&self, id: AccountId) -> bool {
        !self.children(id).is_empty()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: AccountId) -> Vec<AccountId> {
        let mut ret = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(parent_id) = current {
            if ret.contains(&parent_id) || parent_id == id {
                break;
            }
            ret.push(parent_id);
            current = self.nodes.get(&parent_id).and_then(|n| n.parent_id);
        }
        ret
    }

    /// Whether making `new_parent` the parent of `account` would close a cycle.
    pub fn would_create_cycle(&self, account: AccountId, new_parent: AccountId) -> bool {
        account == new_parent || self.ancestors(new_parent).contains(&account)
    }

    /// Live headers among `ids` grouped by depth, deepest level first.
    pub fn header_levels(&self, ids: impl IntoIterator<Item = AccountId>) -> Vec<Vec<AccountId>> {
        let mut by_depth: HashMap<usize, Vec<AccountId>> = HashMap::new();
        for id in ids.into_iter().collect::<HashSet<_>>() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.is_header || node.is_deleted {
                continue;
            }
            if let Some(depth) = self.depth(id) {
                by_depth.entry(depth).or_default().push(id);
            }
        }
        let mut levels: Vec<_> = by_depth.into_iter().collect();
        levels.sort_by(|(a, _), (b, _)| b.cmp(a));
        levels
            .into_iter()
            .map(|(_, mut ids)| {
                ids.sort();
                ids
            })
            .collect()
    }

    /// Every live header, deepest level first.
    pub fn all_header_levels(&self) -> Vec<Vec<AccountId>> {
        self.header_levels(self.nodes.keys().copied())
    }

    /// Folds leaf values up through the headers.
    ///
    /// Non-header accounts take `leaf(id)`. Headers take the `combine` of their
    /// live direct children, starting from `T::default()`.
    pub fn aggregate<T, F, C>(&self, leaf: F, combine: C) -> HashMap<AccountId, T>
    where
        T: Clone + Default,
        F: Fn(AccountId) -> T,
        C: Fn(T, &T) -> T,
    {
        let mut ordered: Vec<&ChartNode> = self.live_nodes().collect();
        ordered.sort_by_key(|n| std::cmp::Reverse(self.depth(n.id).unwrap_or(0)));

        let mut ret: HashMap<AccountId, T> = HashMap::with_capacity(ordered.len());
        for node in ordered {
            let value = if node.is_header {
                self.children(node.id)
                    .iter()
                    .filter_map(|child| ret.get(child))
                    .fold(T::default(), &combine)
            } else {
                leaf(node.id)
            };
            ret.insert(node.id, value);
        }
        ret
    }

    pub fn aggregate_balances(
        &self,
        leaf_balances: &HashMap<AccountId, Decimal>,
    ) -> HashMap<AccountId, Decimal> {
        self.aggregate(
            |id| leaf_balances.get(&id).copied().unwrap_or_default(),
            |acc, child| acc + child,
        )
    }

    fn live_nodes(&self) -> impl Iterator<Item = &ChartNode> {
        self.nodes.values().filter(|n| !n.is_deleted)
    }
}
