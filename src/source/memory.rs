//! In-memory trace store.
//!
//! Entries live in fixed-size segments behind `Arc`s. Readers clone the
//! segment list, so an aggregation keeps scanning a stable snapshot while
//! capture continues, and an append only copies the segment it touches when
//! a snapshot still shares it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use super::{
    LiveObjectRecord, MarkerIndex, RecordIter, SnapDirection, TraceError, TraceEvent, TraceSource,
    TypeId,
};
use crate::aggregation::CancelToken;
use crate::timeline::{Boundaries, FrameRange, FrameStats};

/// Entries per segment.
const SEGMENT_LEN: usize = 4096;

/// Entries examined between cancellation checks while scanning.
const CANCEL_CHECK_STRIDE: usize = 256;

#[derive(Debug, Clone)]
struct TraceObject {
    address: u64,
    type_id: TypeId,
    callstack_id: u64,
    size: u64,
    alloc_frame: u64,
    free_frame: Option<u64>,
}

impl TraceObject {
    fn alive_at(&self, frame: u64) -> bool {
        self.alloc_frame <= frame && self.free_frame.map_or(true, |freed| freed > frame)
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Object(TraceObject),
    Malformed { frame: u64, reason: String },
}

impl Entry {
    fn frame(&self) -> u64 {
        match self {
            Entry::Object(object) => object.alloc_frame,
            Entry::Malformed { frame, .. } => *frame,
        }
    }

    fn is_candidate(&self, range: FrameRange) -> bool {
        match self {
            Entry::Object(object) => range.contains(object.alloc_frame) && object.alive_at(range.end),
            Entry::Malformed { frame, .. } => range.contains(*frame),
        }
    }

    fn to_record(&self) -> Result<LiveObjectRecord, TraceError> {
        match self {
            Entry::Object(object) => Ok(LiveObjectRecord {
                address: object.address,
                type_id: object.type_id,
                callstack_id: object.callstack_id,
                size: object.size,
            }),
            Entry::Malformed { frame, reason } => Err(TraceError::MalformedRecord {
                frame: *frame,
                reason: reason.clone(),
            }),
        }
    }
}

/// Run of entries in append order, with the frame span they cover.
#[derive(Debug, Clone, Default)]
struct Segment {
    entries: Vec<Entry>,
    first_frame: u64,
    last_frame: u64,
}

impl Segment {
    fn push(&mut self, entry: Entry) {
        let frame = entry.frame();
        if self.entries.is_empty() {
            self.first_frame = frame;
            self.last_frame = frame;
        } else {
            self.first_frame = self.first_frame.min(frame);
            self.last_frame = self.last_frame.max(frame);
        }
        self.entries.push(entry);
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= SEGMENT_LEN
    }

    fn overlaps(&self, range: FrameRange) -> bool {
        !self.entries.is_empty() && self.first_frame <= range.end && self.last_frame >= range.start
    }
}

/// Position of an entry: segment index and offset inside it.
type EntryPos = (usize, usize);

/// What readers see. Cloning it copies `Arc`s only.
#[derive(Debug, Clone, Default)]
struct TraceData {
    segments: Vec<Arc<Segment>>,
    markers: Arc<BTreeSet<u64>>,
    type_names: Arc<BTreeMap<TypeId, String>>,
    min_frame: Option<u64>,
    max_frame: u64,
}

impl TraceData {
    fn observe_frame(&mut self, frame: u64) {
        self.min_frame = Some(self.min_frame.map_or(frame, |min| min.min(frame)));
        self.max_frame = self.max_frame.max(frame);
    }

    fn push_entry(&mut self, entry: Entry) -> EntryPos {
        if self.segments.last().map_or(true, |segment| segment.is_full()) {
            self.segments.push(Arc::default());
        }
        let index = self.segments.len() - 1;
        let segment = Arc::make_mut(&mut self.segments[index]);
        segment.push(entry);
        (index, segment.entries.len() - 1)
    }

    fn object_mut(&mut self, (segment, offset): EntryPos) -> Option<&mut TraceObject> {
        let segment = Arc::make_mut(self.segments.get_mut(segment)?);
        match segment.entries.get_mut(offset)? {
            Entry::Object(object) => Some(object),
            Entry::Malformed { .. } => None,
        }
    }

    fn apply(&mut self, live_by_address: &mut HashMap<u64, EntryPos>, event: TraceEvent) {
        match event {
            TraceEvent::TypeName { type_id, name } => {
                Arc::make_mut(&mut self.type_names).insert(type_id, name);
            }
            TraceEvent::Alloc {
                frame,
                address,
                type_id,
                callstack_id,
                size,
            } => {
                let pos = self.push_entry(Entry::Object(TraceObject {
                    address,
                    type_id,
                    callstack_id,
                    size,
                    alloc_frame: frame,
                    free_frame: None,
                }));
                live_by_address.insert(address, pos);
                self.observe_frame(frame);
            }
            TraceEvent::Free { frame, address } => {
                if let Some(pos) = live_by_address.remove(&address) {
                    if let Some(object) = self.object_mut(pos) {
                        object.free_frame = Some(frame);
                    }
                }
                self.observe_frame(frame);
            }
            TraceEvent::Marker { frame } => {
                Arc::make_mut(&mut self.markers).insert(frame);
                self.observe_frame(frame);
            }
            TraceEvent::Malformed { frame, reason } => {
                self.push_entry(Entry::Malformed { frame, reason });
                self.observe_frame(frame);
            }
            TraceEvent::Frame { frame } => self.observe_frame(frame),
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    data: Arc<TraceData>,
    // Writer-side index of objects not yet freed.
    live_by_address: HashMap<u64, EntryPos>,
}

/// Trace store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryTrace {
    store: RwLock<Store>,
}

impl InMemoryTrace {
    /// Create an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a trace from a sequence of events.
    pub fn from_events(events: impl IntoIterator<Item = TraceEvent>) -> Self {
        let trace = Self::new();
        trace.extend(events);
        trace
    }

    /// Append a single event.
    pub fn push(&self, event: TraceEvent) {
        self.extend(std::iter::once(event));
    }

    /// Append events in order.
    pub fn extend(&self, events: impl IntoIterator<Item = TraceEvent>) {
        let mut guard = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let store = &mut *guard;
        let data = Arc::make_mut(&mut store.data);
        for event in events {
            data.apply(&mut store.live_by_address, event);
        }
    }

    /// Drop all recorded data.
    pub fn clear(&self) {
        let mut guard = self.store.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Store::default();
    }

    fn snapshot(&self) -> Arc<TraceData> {
        let guard = self.store.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard.data)
    }
}

/// Walks candidate entries of a range, skipping segments outside it and
/// giving up once the token is cancelled.
#[derive(Debug, Default)]
struct Cursor {
    segment: usize,
    offset: usize,
    examined: usize,
}

impl Cursor {
    fn next_candidate<'a>(
        &mut self,
        data: &'a TraceData,
        range: FrameRange,
        cancel: &CancelToken,
    ) -> Option<&'a Entry> {
        loop {
            let segment = data.segments.get(self.segment)?;
            if self.offset == 0 && !segment.overlaps(range) {
                self.segment += 1;
                continue;
            }
            let Some(entry) = segment.entries.get(self.offset) else {
                self.segment += 1;
                self.offset = 0;
                continue;
            };
            self.offset += 1;
            self.examined += 1;
            if self.examined % CANCEL_CHECK_STRIDE == 0 && cancel.is_cancelled() {
                self.segment = data.segments.len();
                return None;
            }
            if entry.is_candidate(range) {
                return Some(entry);
            }
        }
    }
}

struct SnapshotRecords {
    data: Arc<TraceData>,
    range: FrameRange,
    cancel: CancelToken,
    cursor: Cursor,
}

impl Iterator for SnapshotRecords {
    type Item = Result<LiveObjectRecord, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor
            .next_candidate(&self.data, self.range, &self.cancel)
            .map(Entry::to_record)
    }
}

impl MarkerIndex for InMemoryTrace {
    fn closest_marker_frame(&self, frame: u64, direction: SnapDirection) -> Option<u64> {
        let data = self.snapshot();
        match direction {
            SnapDirection::AtOrBefore => data.markers.range(..=frame).next_back().copied(),
            SnapDirection::AtOrAfter => data.markers.range(frame..).next().copied(),
        }
    }
}

impl TraceSource for InMemoryTrace {
    fn boundaries(&self) -> Boundaries {
        let data = self.snapshot();
        Boundaries::new(data.min_frame.unwrap_or(0), data.max_frame)
    }

    fn record_count_in_range(&self, range: FrameRange, cancel: &CancelToken) -> Option<usize> {
        let data = self.snapshot();
        let mut cursor = Cursor::default();
        let mut count = 0;
        while cursor.next_candidate(&data, range, cancel).is_some() {
            count += 1;
        }
        (!cancel.is_cancelled()).then_some(count)
    }

    fn records_in_range(&self, range: FrameRange, cancel: &CancelToken) -> RecordIter<'_> {
        Box::new(SnapshotRecords {
            data: self.snapshot(),
            range,
            cancel: cancel.clone(),
            cursor: Cursor::default(),
        })
    }

    fn frame_stats(&self, range: FrameRange) -> Vec<FrameStats> {
        let data = self.snapshot();
        if data.segments.is_empty() || range.start > data.max_frame {
            return Vec::new();
        }
        let range = FrameRange::new(range.start, range.end.min(data.max_frame));
        let width = range.len() as usize;

        let mut stats: Vec<FrameStats> = range.frames().map(FrameStats::empty).collect();
        let mut deltas = vec![0i64; width];
        let mut base = 0u64;

        let objects = data
            .segments
            .iter()
            .filter(|segment| segment.first_frame <= range.end)
            .flat_map(|segment| segment.entries.iter())
            .filter_map(|entry| match entry {
                Entry::Object(object) => Some(object),
                Entry::Malformed { .. } => None,
            });
        for object in objects {
            if range.contains(object.alloc_frame) {
                let slot = (object.alloc_frame - range.start) as usize;
                stats[slot].allocations += 1;
                deltas[slot] += object.size as i64;
            } else if object.alloc_frame < range.start
                && object.free_frame.map_or(true, |freed| freed >= range.start)
            {
                base += object.size;
            }
            if let Some(freed) = object.free_frame {
                if range.contains(freed) && object.alloc_frame <= freed {
                    let slot = (freed - range.start) as usize;
                    stats[slot].frees += 1;
                    deltas[slot] -= object.size as i64;
                }
            }
        }

        let mut live = base as i64;
        for (stat, delta) in stats.iter_mut().zip(deltas) {
            live += delta;
            stat.live_size = live.max(0) as u64;
        }
        stats
    }

    fn type_name(&self, type_id: TypeId) -> Option<String> {
        self.snapshot().type_names.get(&type_id).cloned()
    }
}
