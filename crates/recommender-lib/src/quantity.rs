//! Kubernetes resource quantities
//!
//! Parses quantity strings such as `"250m"`, `"1.5"`, `"512Mi"` or `"1e3"`
//! into base units (cores for cpu, bytes for memory) and formats recommended
//! values back into canonical quantity strings.

use crate::error::{RecommenderError, Result};

pub const CPU: &str = "cpu";
pub const MEMORY: &str = "memory";

/// Standard resources tracked by the usage histograms
pub const TRACKED_RESOURCES: [&str; 2] = [CPU, MEMORY];

const MIB: f64 = 1024.0 * 1024.0;

/// Binary suffixes must be checked before their single-letter decimal prefixes.
/// The milli suffix divides by its factor instead of multiplying.
const SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", MIB),
    ("Gi", 1024.0 * MIB),
    ("Ti", 1024.0 * 1024.0 * MIB),
    ("Pi", 1024.0 * 1024.0 * 1024.0 * MIB),
    ("Ei", 1024.0 * 1024.0 * 1024.0 * 1024.0 * MIB),
    ("m", 1e3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Returns true for resources outside the standard cpu/memory pair
pub fn is_extended_resource(name: &str) -> bool {
    !TRACKED_RESOURCES.contains(&name)
}

/// Parse a quantity string into its base-unit value
pub fn parse_quantity(resource: &str, value: &str) -> Result<f64> {
    let malformed = || RecommenderError::MalformedQuantity {
        resource: resource.to_string(),
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let (number, suffix, factor) = SUFFIXES
        .iter()
        .find_map(|(suffix, factor)| {
            trimmed
                .strip_suffix(suffix)
                .map(|number| (number, *suffix, *factor))
        })
        .unwrap_or((trimmed, "", 1.0));

    if number.is_empty()
        || !number
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return Err(malformed());
    }

    let parsed: f64 = number.parse().map_err(|_| malformed())?;
    let base = if suffix == "m" {
        parsed / factor
    } else {
        parsed * factor
    };
    if !base.is_finite() || base < 0.0 {
        return Err(malformed());
    }
    Ok(base)
}

/// Format cores as a canonical cpu quantity, rounding up to whole millicores
pub fn format_cpu(cores: f64) -> String {
    let millis = (cores * 1000.0 - 1e-9).ceil().max(0.0) as u64;
    if millis % 1000 == 0 {
        format!("{}", millis / 1000)
    } else {
        format!("{}m", millis)
    }
}

/// Format bytes as a canonical memory quantity, rounding up to whole MiB
pub fn format_memory(bytes: f64) -> String {
    if bytes >= MIB {
        format!("{}Mi", (bytes / MIB - 1e-9).ceil() as u64)
    } else {
        format!("{}", bytes.ceil().max(0.0) as u64)
    }
}

/// Format a base-unit value for one of the tracked resources
pub fn format_quantity(resource: &str, value: f64) -> String {
    match resource {
        CPU => format_cpu(value),
        _ => format_memory(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_quantities() {
        assert_eq!(parse_quantity(CPU, "1").unwrap(), 1.0);
        assert!((parse_quantity(CPU, "500m").unwrap() - 0.5).abs() < 1e-12);
        assert!((parse_quantity(CPU, "0.25").unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(parse_quantity(CPU, "1e3").unwrap(), 1000.0);
    }

    #[test]
    fn test_parse_memory_quantities() {
        assert_eq!(parse_quantity(MEMORY, "1Gi").unwrap(), 1024.0 * MIB);
        assert_eq!(parse_quantity(MEMORY, "512Mi").unwrap(), 512.0 * MIB);
        assert_eq!(parse_quantity(MEMORY, "128M").unwrap(), 128e6);
        assert_eq!(parse_quantity(MEMORY, "2E").unwrap(), 2e18);
        assert_eq!(parse_quantity(MEMORY, " 1024 ").unwrap(), 1024.0);
    }

    #[test]
    fn test_malformed_quantities_rejected() {
        for bad in ["", "Mi", "lots", "1.5xx", "-1", "NaN", "inf"] {
            let err = parse_quantity(MEMORY, bad).unwrap_err();
            assert!(
                matches!(err, RecommenderError::MalformedQuantity { .. }),
                "{:?} should be malformed",
                bad
            );
        }
    }

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(1.0), "1");
        assert_eq!(format_cpu(0.25), "250m");
        assert_eq!(format_cpu(0.0251), "26m");
        assert_eq!(format_cpu(2.0), "2");
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(256.0 * MIB), "256Mi");
        assert_eq!(format_memory(256.5 * MIB), "257Mi");
        assert_eq!(format_memory(1000.0), "1000");
    }

    #[test]
    fn test_extended_resources() {
        assert!(!is_extended_resource(CPU));
        assert!(!is_extended_resource(MEMORY));
        assert!(is_extended_resource("nvidia.com/gpu"));
        assert!(is_extended_resource("ephemeral-storage"));
    }
}
