use std::collections::{HashMap, HashSet};

use super::{ReferenceNode, ReferenceResult};

/// One line of a rendered reference tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TreeRow {
    /// Distance from the queried object.
    pub depth: usize,
    /// Object address.
    pub address: u64,
    /// Type name, if the resolver returned the object.
    pub type_name: Option<String>,
    /// The object already appears higher up on this path.
    pub cycle: bool,
    /// The object has referrers below `max_depth` that were not expanded.
    pub truncated: bool,
}

/// Referrer tree built from a reference result.
///
/// Roots are the queried addresses; each node's children are the objects
/// referencing it. The underlying graph may contain cycles.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTree {
    roots: Vec<u64>,
    nodes: HashMap<u64, ReferenceNode>,
    error: Option<String>,
}

impl ReferenceTree {
    /// Tree rooted at `queried` over the nodes in `result`.
    pub fn new(queried: &[u64], result: &ReferenceResult) -> Self {
        let nodes = result
            .nodes
            .iter()
            .map(|node| (node.address, node.clone()))
            .collect();
        Self {
            roots: queried.to_vec(),
            nodes,
            error: result.error.clone(),
        }
    }

    /// Queried addresses.
    pub fn roots(&self) -> &[u64] {
        &self.roots
    }

    /// Resolver error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Node for `address`.
    pub fn node(&self, address: u64) -> Option<&ReferenceNode> {
        self.nodes.get(&address)
    }

    /// Objects referencing `address`.
    pub fn referrers(&self, address: u64) -> &[u64] {
        self.nodes
            .get(&address)
            .map(|node| node.parent_addresses.as_slice())
            .unwrap_or(&[])
    }

    /// Depth-first rows from every root, expanding at most `max_depth` levels.
    pub fn walk(&self, max_depth: usize) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        for &root in &self.roots {
            self.walk_from(root, max_depth, &mut rows);
        }
        rows
    }

    fn walk_from(&self, root: u64, max_depth: usize, rows: &mut Vec<TreeRow>) {
        // Expanded ancestors of the next row, each with the index of its
        // next referrer to visit.
        let mut path: Vec<(u64, usize)> = Vec::new();
        let mut on_path = HashSet::new();
        let mut next = Some(root);

        loop {
            if let Some(address) = next.take() {
                let depth = path.len();
                let node = self.node(address);
                let has_referrers = node.is_some_and(|node| !node.is_root());
                let cycle = on_path.contains(&address);
                let expand = !cycle && depth < max_depth;
                rows.push(TreeRow {
                    depth,
                    address,
                    type_name: node.map(|node| node.type_name.clone()),
                    cycle,
                    truncated: !cycle && !expand && has_referrers,
                });
                if expand && has_referrers {
                    on_path.insert(address);
                    path.push((address, 0));
                }
            }

            let Some(frame) = path.last_mut() else {
                break;
            };
            let address = frame.0;
            match self.referrers(address).get(frame.1) {
                Some(&parent) => {
                    frame.1 += 1;
                    next = Some(parent);
                }
                None => {
                    path.pop();
                    on_path.remove(&address);
                }
            }
        }
    }

    /// Every distinct address reachable from `address` within `max_depth`
    /// levels, including `address` itself, in visit order.
    pub fn addresses_below(&self, address: u64, max_depth: usize) -> Vec<u64> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![(address, 0usize)];
        while let Some((current, depth)) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            if depth < max_depth {
                for &parent in self.referrers(current).iter().rev() {
                    stack.push((parent, depth + 1));
                }
            }
        }
        out
    }
}
