//! Parsing for Kubernetes resource-quantity strings
//!
//! The metrics APIs report CPU as nanocore/microcore/millicore strings
//! (`"250m"`, `"1500000n"`) and memory with binary suffixes (`"512Mi"`).
//! Everything here normalizes those into nanocores and bytes. Unrecognized
//! input degrades to 0 instead of erroring so that one malformed payload
//! cannot abort a collection pass.

/// Assumed per-node CPU capacity used for percent calculations.
///
/// This is a static approximation, not a discovered value. Changing it
/// shifts every derived health threshold.
pub const ASSUMED_NODE_CORES: i64 = 4;

/// Assumed per-node memory capacity (8 GiB), same caveat as above.
pub const ASSUMED_NODE_MEMORY_BYTES: i64 = 8 * 1024 * 1024 * 1024;

/// Parse a CPU quantity string into nanocores.
///
/// Suffixes: `n` (nanocores), `u` (microcores), `m` (millicores); a bare
/// number is whole cores. Empty or unparsable input yields 0.
pub fn parse_cpu(quantity: &str) -> i64 {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return 0;
    }

    if let Some(stripped) = quantity.strip_suffix('n') {
        stripped.parse::<i64>().unwrap_or(0)
    } else if let Some(stripped) = quantity.strip_suffix('u') {
        stripped
            .parse::<i64>()
            .map(|v| v.saturating_mul(1_000))
            .unwrap_or(0)
    } else if let Some(stripped) = quantity.strip_suffix('m') {
        stripped
            .parse::<i64>()
            .map(|v| v.saturating_mul(1_000_000))
            .unwrap_or(0)
    } else if let Ok(cores) = quantity.parse::<i64>() {
        cores.saturating_mul(1_000_000_000)
    } else if let Ok(cores) = quantity.parse::<f64>() {
        // fractional whole-core form, e.g. "2.5"; "inf"/"nan" parse as
        // floats but are not quantities
        if cores.is_finite() {
            (cores * 1_000_000_000.0).round() as i64
        } else {
            0
        }
    } else {
        0
    }
}

/// Parse a memory quantity string into bytes.
///
/// Suffixes: `Ki`, `Mi`, `Gi`; a bare number is bytes. Empty or unparsable
/// input yields 0.
pub fn parse_memory(quantity: &str) -> i64 {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return 0;
    }

    const BINARY_UNITS: &[(&str, i64)] = &[
        ("Ki", 1024),
        ("Mi", 1024 * 1024),
        ("Gi", 1024 * 1024 * 1024),
    ];

    for (suffix, multiplier) in BINARY_UNITS {
        if let Some(stripped) = quantity.strip_suffix(suffix) {
            return stripped
                .parse::<i64>()
                .map(|v| v.saturating_mul(*multiplier))
                .unwrap_or(0);
        }
    }

    quantity.parse::<i64>().unwrap_or(0)
}

/// CPU usage as a percentage of `total_cores`, rounded to 2 decimals.
pub fn cpu_percent(nanocores: i64, total_cores: i64) -> f64 {
    if total_cores <= 0 {
        return 0.0;
    }
    round2(nanocores as f64 / (total_cores as f64 * 1_000_000_000.0) * 100.0)
}

/// Memory usage as a percentage of `total_bytes`, rounded to 2 decimals.
pub fn memory_percent(bytes: i64, total_bytes: i64) -> f64 {
    if total_bytes <= 0 {
        return 0.0;
    }
    round2(bytes as f64 / total_bytes as f64 * 100.0)
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
