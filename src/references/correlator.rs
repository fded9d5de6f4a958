use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info};

use super::{ReferenceResult, RequestId};
use crate::source::{CallstackId, ReferenceResolver, TypeId};

/// What the user acted on when issuing a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOrigin {
    /// "Find references" on a callstack row of a type.
    Callstack {
        /// Selected type.
        type_id: TypeId,
        /// Selected callstack.
        callstack_id: CallstackId,
    },
    /// Explicit address list.
    Addresses,
}

/// A query as issued to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceQuery {
    /// Id assigned at issue time.
    pub request_id: RequestId,
    /// Addresses sent, deduplicated and truncated.
    pub addresses: Vec<u64>,
}

/// Outcome of matching a result to its query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceDelivery {
    /// Result of the most recent query.
    Current {
        /// The result.
        result: ReferenceResult,
        /// What triggered the query.
        origin: QueryOrigin,
        /// Addresses that were queried.
        queried: Vec<u64>,
    },
    /// Result of a query that has since been superseded.
    Stale {
        /// Id of the superseded query.
        request_id: RequestId,
    },
}

#[derive(Debug)]
struct PendingQuery {
    origin: QueryOrigin,
    addresses: Vec<u64>,
}

/// Issues reference queries and correlates their results.
///
/// Queries are not serialized: a new one may be issued while older ones are
/// still resolving. Results are keyed by request id and everything but the
/// latest query's result is discarded. There are no retries; callers issue a
/// fresh query instead.
pub struct ReferenceCorrelator {
    resolver: Arc<dyn ReferenceResolver>,
    address_limit: Option<usize>,
    next_id: RequestId,
    latest: Option<RequestId>,
    pending: HashMap<RequestId, PendingQuery>,
    results_tx: Sender<ReferenceResult>,
    results_rx: Receiver<ReferenceResult>,
}

impl std::fmt::Debug for ReferenceCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCorrelator")
            .field("address_limit", &self.address_limit)
            .field("latest", &self.latest)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ReferenceCorrelator {
    /// Correlator sending at most `address_limit` addresses per query.
    pub fn new(resolver: Arc<dyn ReferenceResolver>, address_limit: Option<usize>) -> Self {
        let (results_tx, results_rx) = unbounded();
        Self {
            resolver,
            address_limit,
            next_id: 1,
            latest: None,
            pending: HashMap::new(),
            results_tx,
            results_rx,
        }
    }

    /// Most recently issued request id.
    pub fn latest(&self) -> Option<RequestId> {
        self.latest
    }

    /// Queries issued but not yet answered.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Issue a query for `addresses`.
    pub fn query(&mut self, addresses: &[u64], origin: QueryOrigin) -> ReferenceQuery {
        let request_id = self.next_id;
        self.next_id += 1;

        let mut seen = HashSet::with_capacity(addresses.len());
        let mut unique: Vec<u64> = addresses
            .iter()
            .copied()
            .filter(|address| seen.insert(*address))
            .collect();
        if let Some(limit) = self.address_limit {
            if unique.len() > limit {
                debug!(request_id, requested = unique.len(), limit, "truncating reference query");
                unique.truncate(limit);
            }
        }

        self.latest = Some(request_id);
        self.pending.insert(
            request_id,
            PendingQuery {
                origin,
                addresses: unique.clone(),
            },
        );
        info!(request_id, addresses = unique.len(), "reference query issued");

        let tx = self.results_tx.clone();
        self.resolver.resolve(
            unique.clone(),
            Box::new(move |outcome| {
                let result = match outcome {
                    Ok(nodes) => ReferenceResult {
                        request_id,
                        error: None,
                        nodes,
                    },
                    Err(error) => ReferenceResult {
                        request_id,
                        error: Some(error),
                        nodes: Vec::new(),
                    },
                };
                let _ = tx.send(result);
            }),
        );

        ReferenceQuery {
            request_id,
            addresses: unique,
        }
    }

    /// Match every result received so far.
    pub fn poll(&mut self) -> Vec<ReferenceDelivery> {
        let received: Vec<_> = self.results_rx.try_iter().collect();
        received
            .into_iter()
            .map(|result| self.correlate(result))
            .collect()
    }

    /// Wait up to `timeout` for the next result.
    pub fn next_delivery(&mut self, timeout: Duration) -> Option<ReferenceDelivery> {
        let result = self.results_rx.recv_timeout(timeout).ok()?;
        Some(self.correlate(result))
    }

    fn correlate(&mut self, result: ReferenceResult) -> ReferenceDelivery {
        let request_id = result.request_id;
        let query = self.pending.remove(&request_id);
        match query {
            Some(query) if self.latest == Some(request_id) => ReferenceDelivery::Current {
                result,
                origin: query.origin,
                queried: query.addresses,
            },
            _ => {
                debug!(request_id, latest = ?self.latest, "discarding stale reference result");
                ReferenceDelivery::Stale { request_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::ReferenceNode;
    use crate::source::ResolveCallback;
    use std::sync::Mutex;

    #[derive(Default)]
    struct DeferredResolver {
        calls: Mutex<Vec<(Vec<u64>, ResolveCallback)>>,
    }

    impl DeferredResolver {
        fn answer(&self, index: usize, outcome: Result<Vec<ReferenceNode>, String>) {
            let (_, callback) = self.calls.lock().unwrap().remove(index);
            callback(outcome);
        }

        fn sent(&self, index: usize) -> Vec<u64> {
            self.calls.lock().unwrap()[index].0.clone()
        }
    }

    impl ReferenceResolver for DeferredResolver {
        fn resolve(&self, addresses: Vec<u64>, on_result: ResolveCallback) {
            self.calls.lock().unwrap().push((addresses, on_result));
        }
    }

    #[test]
    fn error_results_carry_no_nodes() {
        let resolver = Arc::new(DeferredResolver::default());
        let mut correlator = ReferenceCorrelator::new(resolver.clone(), None);
        let query = correlator.query(&[1, 2], QueryOrigin::Addresses);
        resolver.answer(0, Err("heap walk failed".to_string()));

        match correlator.poll().as_slice() {
            [ReferenceDelivery::Current { result, .. }] => {
                assert_eq!(result.request_id, query.request_id);
                assert_eq!(result.error.as_deref(), Some("heap walk failed"));
                assert!(result.nodes.is_empty());
            }
            other => panic!("unexpected deliveries {other:?}"),
        }
        assert_eq!(correlator.pending(), 0);
    }

    #[test]
    fn addresses_are_deduplicated_and_truncated() {
        let resolver = Arc::new(DeferredResolver::default());
        let mut correlator = ReferenceCorrelator::new(resolver.clone(), Some(3));
        let query = correlator.query(&[9, 9, 4, 7, 4, 1, 2], QueryOrigin::Addresses);
        assert_eq!(query.addresses, vec![9, 4, 7]);
        assert_eq!(resolver.sent(0), vec![9, 4, 7]);
    }
}
