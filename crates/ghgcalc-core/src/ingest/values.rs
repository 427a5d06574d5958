use crate::error::GhgError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a decimal number as typed into a spreadsheet or edit field.
///
/// Handles formats like:
/// - "1239138" -> 1239138
/// - "2.1622" -> 2.1622
/// - "2,1622" -> 2.1622 (decimal comma)
/// - "1,239,138" / "1,239,138.5" -> thousands separators dropped
/// - "1 239 138" -> inner spaces dropped
///
/// A lone comma followed by exactly three digits ("1,239") could be either
/// separator and is rejected.
pub fn parse_decimal(s: &str) -> Result<Decimal, GhgError> {
    let trimmed = s.trim();
    let compact: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect();

    let commas = compact.matches(',').count();
    let normalized = if commas == 0 {
        compact
    } else if compact.contains('.') || commas > 1 {
        compact.replace(',', "")
    } else {
        let after = compact.rsplit(',').next().unwrap_or_default();
        if after.len() == 3 && after.chars().all(|c| c.is_ascii_digit()) {
            return Err(GhgError::MalformedInput(format!(
                "ambiguous number '{trimmed}': write it without the comma or with a decimal point"
            )));
        }
        compact.replace(',', ".")
    };

    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|e| GhgError::MalformedInput(format!("invalid number '{}': {}", trimmed, e)))
}

/// Parse an activity quantity cell. Blank-like markers yield `None`.
pub fn parse_quantity(s: &str) -> Result<Option<Decimal>, GhgError> {
    let s = s.trim();
    if s.is_empty() || s == "-" || s == "—" || s.eq_ignore_ascii_case("n/a") {
        return Ok(None);
    }
    parse_decimal(s).map(Some)
}

/// Convert f64 to Decimal, preserving reasonable precision.
///
/// Uses string round-trip to avoid floating-point artifacts
/// (e.g., 0.0035_f64 becoming 0.00349999...).
pub fn f64_to_decimal(f: f64) -> Option<Decimal> {
    let s = format!("{f}");
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::try_from(f).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_integer() {
        assert_eq!(parse_decimal("1239138").unwrap(), dec!(1239138));
    }

    #[test]
    fn test_decimal_point() {
        assert_eq!(parse_decimal("2.1622").unwrap(), dec!(2.1622));
    }

    #[test]
    fn test_decimal_comma() {
        assert_eq!(parse_decimal("3,15").unwrap(), dec!(3.15));
    }

    #[test]
    fn test_lone_comma_before_three_digits_is_ambiguous() {
        for text in ["1,239", "-1,239", " 12,500 "] {
            let err = parse_decimal(text).unwrap_err();
            assert!(matches!(err, GhgError::MalformedInput(ref m) if m.contains("ambiguous")), "{text}");
        }
        assert_eq!(parse_decimal("2,1622").unwrap(), dec!(2.1622));
        assert_eq!(parse_decimal("1,239.0").unwrap(), dec!(1239.0));
    }

    #[test]
    fn test_thousands_separators() {
        assert_eq!(parse_decimal("1,239,138").unwrap(), dec!(1239138));
        assert_eq!(parse_decimal("1,500,000.25").unwrap(), dec!(1500000.25));
        assert_eq!(parse_decimal("1 500 000").unwrap(), dec!(1500000));
    }

    #[test]
    fn test_scientific() {
        assert_eq!(parse_decimal("1.5e3").unwrap(), dec!(1500));
    }

    #[test]
    fn test_whitespace_trimming() {
        assert_eq!(parse_decimal("  68  ").unwrap(), dec!(68));
    }

    #[test]
    fn test_invalid_returns_error() {
        assert!(matches!(parse_decimal("abc"), Err(GhgError::MalformedInput(_))));
    }

    #[test]
    fn test_quantity_blank_markers() {
        assert!(parse_quantity("").unwrap().is_none());
        assert!(parse_quantity("-").unwrap().is_none());
        assert!(parse_quantity("N/A").unwrap().is_none());
        assert_eq!(parse_quantity("792").unwrap(), Some(dec!(792)));
    }

    #[test]
    fn f64_to_decimal_preserves_precision() {
        assert_eq!(f64_to_decimal(0.0035), Some(dec!(0.0035)));
        assert_eq!(f64_to_decimal(1239138.0), Some(dec!(1239138)));
        assert_eq!(f64_to_decimal(3.15), Some(dec!(3.15)));
        assert_eq!(f64_to_decimal(f64::NAN), None);
    }
}
