//! Utility functions

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Human-readable byte count: `b` below 1 KiB, otherwise `Kb`/`Mb` with two
/// decimals.
pub fn format_size(bytes: u64) -> String {
    if bytes < KIB {
        format!("{bytes}b")
    } else if bytes < MIB {
        format!("{:.2}Kb", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2}Mb", bytes as f64 / MIB as f64)
    }
}

/// "Selected X out of Y" label for a type selection.
pub fn selection_label(selected: u64, total: u64) -> String {
    format!("Selected {} out of {}", format_size(selected), format_size(total))
}
