//! Line-oriented trace text format.
//!
//! ```text
//! # comment
//! type   <type_id> <name...>
//! alloc  <frame> <address> <type_id> <callstack_id> <size>
//! free   <frame> <address>
//! marker <frame>
//! frame  <frame>
//! bad    <frame> <reason...>
//! ```
//!
//! Addresses accept a `0x` prefix. Everything else is decimal.

use super::{TraceError, TypeId};

/// One decoded line of a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// Display name for a type id.
    TypeName {
        /// Type being named.
        type_id: TypeId,
        /// Human-readable name.
        name: String,
    },
    /// Object allocation.
    Alloc {
        /// Frame of the allocation.
        frame: u64,
        /// Object address.
        address: u64,
        /// Object type.
        type_id: TypeId,
        /// Allocation callstack.
        callstack_id: u64,
        /// Size in bytes.
        size: u64,
    },
    /// Object release.
    Free {
        /// Frame of the release.
        frame: u64,
        /// Released address.
        address: u64,
    },
    /// Garbage-collection marker.
    Marker {
        /// Frame of the collection.
        frame: u64,
    },
    /// Frame tick without any activity.
    Frame {
        /// Frame reached.
        frame: u64,
    },
    /// Record that could not be decoded by the capture side.
    Malformed {
        /// Frame of the record.
        frame: u64,
        /// Decoder diagnostic.
        reason: String,
    },
}

impl TraceEvent {
    /// Frame the event belongs to; type names are frameless.
    pub fn frame(&self) -> Option<u64> {
        match self {
            TraceEvent::TypeName { .. } => None,
            TraceEvent::Alloc { frame, .. }
            | TraceEvent::Free { frame, .. }
            | TraceEvent::Marker { frame }
            | TraceEvent::Frame { frame }
            | TraceEvent::Malformed { frame, .. } => Some(*frame),
        }
    }
}

/// Parse a whole trace text.
pub fn parse_trace(text: &str) -> Result<Vec<TraceEvent>, TraceError> {
    let mut events = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        events.push(parse_line(idx + 1, line)?);
    }
    Ok(events)
}

fn parse_line(line_no: usize, line: &str) -> Result<TraceEvent, TraceError> {
    let mut fields = line.split_whitespace();
    let keyword = fields.next().unwrap_or_default();
    let mut next = |what: &str| {
        fields.next().ok_or_else(|| TraceError::Parse {
            line: line_no,
            message: format!("missing {what}"),
        })
    };

    let event = match keyword {
        "type" => {
            let type_id = parse_number(line_no, "type id", next("type id")?)?;
            let name = rest_after(line, 2);
            if name.is_empty() {
                return Err(parse_error(line_no, "missing type name"));
            }
            TraceEvent::TypeName { type_id, name }
        }
        "alloc" => TraceEvent::Alloc {
            frame: parse_number(line_no, "frame", next("frame")?)?,
            address: parse_address(line_no, next("address")?)?,
            type_id: parse_number(line_no, "type id", next("type id")?)?,
            callstack_id: parse_number(line_no, "callstack id", next("callstack id")?)?,
            size: parse_number(line_no, "size", next("size")?)?,
        },
        "free" => TraceEvent::Free {
            frame: parse_number(line_no, "frame", next("frame")?)?,
            address: parse_address(line_no, next("address")?)?,
        },
        "marker" => TraceEvent::Marker {
            frame: parse_number(line_no, "frame", next("frame")?)?,
        },
        "frame" => TraceEvent::Frame {
            frame: parse_number(line_no, "frame", next("frame")?)?,
        },
        "bad" => TraceEvent::Malformed {
            frame: parse_number(line_no, "frame", next("frame")?)?,
            reason: rest_after(line, 2),
        },
        other => return Err(parse_error(line_no, &format!("unknown record '{other}'"))),
    };
    Ok(event)
}

fn rest_after(line: &str, skip: usize) -> String {
    line.split_whitespace()
        .skip(skip)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_error(line: usize, message: &str) -> TraceError {
    TraceError::Parse {
        line,
        message: message.to_string(),
    }
}

fn parse_number(line: usize, what: &str, token: &str) -> Result<u64, TraceError> {
    token
        .parse()
        .map_err(|_| parse_error(line, &format!("invalid {what} '{token}'")))
}

fn parse_address(line: usize, token: &str) -> Result<u64, TraceError> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| parse_error(line, &format!("invalid address '{token}'")))
}
