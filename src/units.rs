//! Resource unit conversion
//!
//! Converts Kubernetes quantity strings (`"600m"`, `"512Mi"`, `"250000000n"`)
//! into one canonical numeric scale so that usage and limits can be compared.
//!
//! The grammar is deliberately narrow: a run of ASCII digits followed by a
//! unit suffix. Signs, decimal points and exponents are not understood, and any
//! string whose suffix is not in the unit table converts to `0.0`. Callers must
//! treat `0.0` as "could not be compared", never as a real measurement.

/// Base for the byte-scale units (`KB`, `MB`, ... `EB`).
pub const BYTE_BASE: f64 = 1024.0;

/// Canonical multiplier for nanocores (CPU values are expressed in cores).
pub const NANO: f64 = 1e-9;

/// Canonical multiplier for millicores.
pub const MILLI: f64 = 1e-3;

/// Byte-scale units in increasing order of magnitude.
pub const BYTE_UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];

/// Kubernetes binary suffixes and their display equivalents.
const DISPLAY_SUFFIXES: [(&str, &str); 6] = [
    ("Ki", "KB"),
    ("Mi", "MB"),
    ("Gi", "GB"),
    ("Ti", "TB"),
    ("Pi", "PB"),
    ("Ei", "EB"),
];

/// Split `raw` into its leading digit run and the trailing suffix.
///
/// `"512Mi"` becomes `("512", "Mi")`, `"Mi"` becomes `("", "Mi")` and
/// `"4"` becomes `("4", "")`.
pub fn parse_value_and_unit(raw: &str) -> (&str, &str) {
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    raw.split_at(split)
}

fn unit_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "n" => Some(NANO),
        "m" => Some(MILLI),
        "B" => Some(1.0),
        _ => BYTE_UNITS
            .iter()
            .position(|u| *u == unit)
            .map(|exp| BYTE_BASE.powi(exp as i32 + 1)),
    }
}

/// Convert `raw` into the canonical numeric scale.
///
/// Unknown or empty units, and strings without a leading number, return `0.0`.
pub fn to_canonical_numeric(raw: &str) -> f64 {
    let (value, unit) = parse_value_and_unit(raw);
    let Some(multiplier) = unit_multiplier(unit) else {
        return 0.0;
    };
    match value.parse::<f64>() {
        Ok(v) => v * multiplier,
        Err(_) => 0.0,
    }
}

/// Rewrite Kubernetes binary suffixes into display units (`"512Mi"` -> `"512MB"`).
///
/// Anything with an unrecognized suffix is returned unchanged.
pub fn to_human_readable(raw: &str) -> String {
    let (value, unit) = parse_value_and_unit(raw);
    DISPLAY_SUFFIXES
        .iter()
        .find(|(source, _)| *source == unit)
        .map(|(_, display)| format!("{}{}", value, display))
        .unwrap_or_else(|| raw.to_string())
}

/// Canonical value of a raw cluster quantity, going through the display form first
/// so that both `"512Mi"` and `"512MB"` land on the same number.
pub fn to_comparable(raw: &str) -> f64 {
    to_canonical_numeric(&to_human_readable(raw))
}

fn is_bare_number(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Whole-core CPU counts (`"4"`) become millicores (`"4000m"`); other values pass through.
pub fn normalize_cpu_quantity(raw: &str) -> String {
    if is_bare_number(raw) {
        format!("{}000m", raw)
    } else {
        raw.to_string()
    }
}

/// Plain byte counts (`"1073741824"`) gain an explicit `B` unit; other values pass through.
pub fn normalize_byte_quantity(raw: &str) -> String {
    if is_bare_number(raw) {
        format!("{}B", raw)
    } else {
        raw.to_string()
    }
}
