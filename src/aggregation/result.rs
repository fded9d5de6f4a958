use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use crate::source::{CallstackId, LiveObjectRecord, TypeId};
use crate::timeline::FrameRange;
use crate::util::format_size;

/// Monotonic id of an aggregation request.
pub type Generation = u64;

/// Object count and byte total of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Totals {
    /// Number of live objects.
    pub count: u64,
    /// Sum of their sizes in bytes.
    pub total_size: u64,
}

impl Totals {
    fn add(&mut self, size: u64) {
        self.count += 1;
        self.total_size += size;
    }
}

/// Objects of one type allocated from one callstack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LiveGroup {
    /// Totals of the group.
    pub totals: Totals,
    /// Addresses of the objects, in scan order.
    pub addresses: Vec<u64>,
    /// Sizes of the objects, parallel to `addresses`.
    pub sizes: Vec<u64>,
}

/// Live-object totals over a frame range.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AggregationResult {
    /// Request this result answers.
    pub generation: Generation,
    /// Frames that were scanned.
    pub range: FrameRange,
    /// Totals per type.
    pub by_type: BTreeMap<TypeId, Totals>,
    /// Totals per allocation callstack.
    pub by_callstack: BTreeMap<CallstackId, Totals>,
    by_type_callstack: BTreeMap<(TypeId, CallstackId), LiveGroup>,
}

impl AggregationResult {
    /// Empty result for a request.
    pub fn new(generation: Generation, range: FrameRange) -> Self {
        Self {
            generation,
            range,
            by_type: BTreeMap::new(),
            by_callstack: BTreeMap::new(),
            by_type_callstack: BTreeMap::new(),
        }
    }

    /// Fold one record in.
    pub fn add(&mut self, record: &LiveObjectRecord) {
        self.by_type.entry(record.type_id).or_default().add(record.size);
        self.by_callstack
            .entry(record.callstack_id)
            .or_default()
            .add(record.size);
        let group = self
            .by_type_callstack
            .entry((record.type_id, record.callstack_id))
            .or_default();
        group.totals.add(record.size);
        group.addresses.push(record.address);
        group.sizes.push(record.size);
    }

    /// Number of live objects.
    pub fn total_count(&self) -> u64 {
        self.by_type.values().map(|t| t.count).sum()
    }

    /// Bytes held by live objects.
    pub fn total_size(&self) -> u64 {
        self.by_type.values().map(|t| t.total_size).sum()
    }

    /// Bytes held by the given types.
    pub fn selected_size(&self, types: &[TypeId]) -> u64 {
        types
            .iter()
            .filter_map(|type_id| self.by_type.get(type_id))
            .map(|t| t.total_size)
            .sum()
    }

    /// Types ordered by total size, largest first.
    pub fn types_by_size(&self) -> Vec<(TypeId, Totals)> {
        let mut types: Vec<_> = self.by_type.iter().map(|(&id, &t)| (id, t)).collect();
        types.sort_by(|a, b| b.1.total_size.cmp(&a.1.total_size).then(a.0.cmp(&b.0)));
        types
    }

    /// Callstacks that allocated live objects of `type_id`, largest first.
    pub fn callstacks_for_type(&self, type_id: TypeId) -> Vec<(CallstackId, &LiveGroup)> {
        let mut groups: Vec<_> = self
            .by_type_callstack
            .range((type_id, CallstackId::MIN)..=(type_id, CallstackId::MAX))
            .map(|(&(_, callstack_id), group)| (callstack_id, group))
            .collect();
        groups.sort_by(|a, b| {
            b.1.totals
                .total_size
                .cmp(&a.1.totals.total_size)
                .then(a.0.cmp(&b.0))
        });
        groups
    }

    /// Addresses of the objects of `type_id` allocated from `callstack_id`.
    pub fn addresses_for(&self, type_id: TypeId, callstack_id: CallstackId) -> Option<&[u64]> {
        self.by_type_callstack
            .get(&(type_id, callstack_id))
            .map(|group| group.addresses.as_slice())
    }

    /// Objects of this result whose address is in `addresses`, regrouped by
    /// type and callstack. Addresses not in this result are ignored.
    pub fn search_addresses(&self, addresses: &[u64]) -> AggregationResult {
        let wanted: HashSet<u64> = addresses.iter().copied().collect();
        let mut found = AggregationResult::new(self.generation, self.range);
        for (&(type_id, callstack_id), group) in &self.by_type_callstack {
            for (&address, &size) in group.addresses.iter().zip(&group.sizes) {
                if wanted.contains(&address) {
                    found.add(&LiveObjectRecord {
                        address,
                        type_id,
                        callstack_id,
                        size,
                    });
                }
            }
        }
        found
    }
}

/// Render a per-type table, largest types first.
///
/// `type_name` resolves display names; unknown types print as `#<id>`.
pub fn render_type_report(
    result: &AggregationResult,
    type_name: impl Fn(TypeId) -> Option<String>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "live objects in {}: {} objects, {}",
        result.range,
        result.total_count(),
        format_size(result.total_size())
    );
    let _ = writeln!(out, "{:<32} {:>8} {:>10}", "type", "count", "size");
    for (type_id, totals) in result.types_by_size() {
        let name = type_name(type_id).unwrap_or_else(|| format!("#{type_id}"));
        let _ = writeln!(
            out,
            "{:<32} {:>8} {:>10}",
            name,
            totals.count,
            format_size(totals.total_size)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: u64, type_id: u64, callstack_id: u64, size: u64) -> LiveObjectRecord {
        LiveObjectRecord {
            address,
            type_id,
            callstack_id,
            size,
        }
    }

    #[test]
    fn groups_by_type_and_callstack() {
        let mut result = AggregationResult::new(1, FrameRange::new(0, 10));
        result.add(&record(0x10, 1, 7, 100));
        result.add(&record(0x20, 1, 8, 300));
        result.add(&record(0x30, 2, 7, 50));
        result.add(&record(0x40, 1, 8, 20));

        assert_eq!(result.total_count(), 4);
        assert_eq!(result.total_size(), 470);
        assert_eq!(result.by_callstack[&7], Totals { count: 2, total_size: 150 });
        assert_eq!(result.selected_size(&[2, 99]), 50);

        let stacks = result.callstacks_for_type(1);
        assert_eq!(stacks.len(), 2);
        assert_eq!(stacks[0].0, 8);
        assert_eq!(stacks[0].1.totals, Totals { count: 2, total_size: 320 });
        assert_eq!(result.addresses_for(1, 8), Some(&[0x20, 0x40][..]));
        assert_eq!(result.addresses_for(2, 8), None);
    }

    #[test]
    fn address_search_regroups_matching_objects() {
        let mut result = AggregationResult::new(3, FrameRange::new(0, 10));
        result.add(&record(0x10, 1, 7, 100));
        result.add(&record(0x20, 1, 8, 300));
        result.add(&record(0x30, 2, 7, 50));

        let found = result.search_addresses(&[0x30, 0x20, 0x99]);
        assert_eq!(found.generation, 3);
        assert_eq!(found.total_count(), 2);
        assert_eq!(found.total_size(), 350);
        assert_eq!(found.by_callstack[&7], Totals { count: 1, total_size: 50 });
        assert_eq!(found.addresses_for(1, 8), Some(&[0x20][..]));
        assert_eq!(found.addresses_for(1, 7), None);
        assert_eq!(result.search_addresses(&[]).total_count(), 0);
    }

    #[test]
    fn types_sort_by_size() {
        let mut result = AggregationResult::new(1, FrameRange::new(0, 1));
        result.add(&record(1, 5, 1, 10));
        result.add(&record(2, 6, 1, 90));
        let order: Vec<_> = result.types_by_size().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![6, 5]);
    }
}
