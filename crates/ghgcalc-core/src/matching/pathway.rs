//! Rule-code dispatch: subcategory rule code -> emission pathway.

/// A source rewrite applied within one pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCollapse {
    /// Case-insensitive substrings of the activity source; any one triggers it.
    pub source_contains: &'static [&'static str],
    /// Source segment of the canonical key used instead.
    pub canonical_source: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pathway {
    pub code: &'static str,
    pub name: &'static str,
    pub collapse: Option<SourceCollapse>,
}

/// Evaluated in order, first match wins.
pub const PATHWAYS: &[Pathway] = &[
    Pathway {
        code: "1.1",
        name: "Stationary combustion",
        collapse: None,
    },
    Pathway {
        code: "1.2",
        name: "Mobile combustion",
        collapse: None,
    },
    Pathway {
        code: "1.3",
        name: "Process emissions",
        collapse: None,
    },
    Pathway {
        code: "1.4",
        name: "Fugitive emissions",
        collapse: None,
    },
    Pathway {
        code: "2.1",
        name: "Purchased electricity",
        collapse: Some(SourceCollapse {
            source_contains: &["electricity", "电"],
            canonical_source: "national grid average",
        }),
    },
    Pathway {
        code: "2.2",
        name: "Purchased heat",
        collapse: None,
    },
];

/// Find the pathway whose rule code appears in `subcategory`.
pub fn find_pathway(subcategory: &str) -> Option<&'static Pathway> {
    PATHWAYS.iter().find(|p| contains_code(subcategory, p.code))
}

impl Pathway {
    /// Build the `<pathway>-<source>` factor key for a trimmed source.
    pub fn candidate_key(&self, source: &str) -> String {
        let source = source.trim();
        if let Some(collapse) = self.collapse {
            let lower = source.to_lowercase();
            if collapse.source_contains.iter().any(|t| lower.contains(t)) {
                return format!("{}-{}", self.name, collapse.canonical_source);
            }
        }
        format!("{}-{}", self.name, source)
    }
}

/// True if `code` occurs as a standalone rule code: not preceded by a digit
/// or '.', not followed by a digit. Keeps "2.1.1" from matching "1.1".
fn contains_code(haystack: &str, code: &str) -> bool {
    haystack.match_indices(code).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + code.len()..].chars().next();
        let clean_before = !matches!(before, Some(c) if c.is_ascii_digit() || c == '.');
        let clean_after = !matches!(after, Some(c) if c.is_ascii_digit());
        clean_before && clean_after
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_each_pathway() {
        assert_eq!(find_pathway("1.1 stationary combustion").unwrap().name, "Stationary combustion");
        assert_eq!(find_pathway("1.2 mobile").unwrap().name, "Mobile combustion");
        assert_eq!(find_pathway("1.3").unwrap().name, "Process emissions");
        assert_eq!(find_pathway("Category 1.4 fugitive").unwrap().name, "Fugitive emissions");
        assert_eq!(find_pathway("2.1 purchased electricity").unwrap().name, "Purchased electricity");
        assert_eq!(find_pathway("2.2 purchased heat").unwrap().name, "Purchased heat");
    }

    #[test]
    fn test_no_code() {
        assert!(find_pathway("stationary combustion").is_none());
        assert!(find_pathway("").is_none());
        assert!(find_pathway("3.1 business travel").is_none());
    }

    #[test]
    fn test_code_boundaries() {
        assert!(find_pathway("11.1 other").is_none());
        assert!(find_pathway("1.12 other").is_none());
        // "2.1.1" is a sub-code of 2.1, never of 1.1
        assert_eq!(find_pathway("2.1.1 grid").unwrap().code, "2.1");
    }

    #[test]
    fn test_candidate_key() {
        let stationary = find_pathway("1.1").unwrap();
        assert_eq!(
            stationary.candidate_key(" natural gas "),
            "Stationary combustion-natural gas"
        );
    }

    #[test]
    fn test_electricity_collapse() {
        let electricity = find_pathway("2.1").unwrap();
        assert_eq!(
            electricity.candidate_key("Municipal Electricity"),
            "Purchased electricity-national grid average"
        );
        assert_eq!(
            electricity.candidate_key("east China grid"),
            "Purchased electricity-east China grid"
        );
        assert_eq!(
            electricity.candidate_key("外购市政电"),
            "Purchased electricity-national grid average"
        );
    }

    #[test]
    fn test_collapse_only_under_electricity() {
        let heat = find_pathway("2.2").unwrap();
        assert_eq!(heat.candidate_key("electricity"), "Purchased heat-electricity");
    }
}
