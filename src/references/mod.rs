//! Reference-graph queries.
//!
//! Each query gets a fresh request id; results come back asynchronously from
//! the resolver and are matched to the query that caused them. Only the
//! newest query's result is handed to views.

mod correlator;
mod tree;

pub use correlator::{QueryOrigin, ReferenceCorrelator, ReferenceDelivery, ReferenceQuery};
pub use tree::{ReferenceTree, TreeRow};

/// Unique id of a reference query.
pub type RequestId = u64;

/// One object in a reference graph together with the objects referencing it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReferenceNode {
    /// Object address.
    pub address: u64,
    /// Type name of the object.
    pub type_name: String,
    /// Objects holding a reference to this one. Empty for roots.
    pub parent_addresses: Vec<u64>,
}

impl ReferenceNode {
    /// Node with the given referrers.
    pub fn new(address: u64, type_name: impl Into<String>, parent_addresses: Vec<u64>) -> Self {
        Self {
            address,
            type_name: type_name.into(),
            parent_addresses,
        }
    }

    /// Whether nothing references this object.
    pub fn is_root(&self) -> bool {
        self.parent_addresses.is_empty()
    }
}

/// Terminal answer to one reference query.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReferenceResult {
    /// Query this result answers.
    pub request_id: RequestId,
    /// Resolver error; `nodes` is empty when set.
    pub error: Option<String>,
    /// Resolved graph, possibly cyclic.
    pub nodes: Vec<ReferenceNode>,
}

impl ReferenceResult {
    /// Whether the resolver reported an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
