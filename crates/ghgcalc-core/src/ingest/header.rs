use crate::error::GhgError;

/// The six required columns of an activity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Category,
    Subcategory,
    Source,
    FacilityOrProcess,
    ActivityQuantity,
    Unit,
}

impl Column {
    pub const REQUIRED: [Column; 6] = [
        Column::Category,
        Column::Subcategory,
        Column::Source,
        Column::FacilityOrProcess,
        Column::ActivityQuantity,
        Column::Unit,
    ];

    /// Canonical header text, as written into templates and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Column::Category => "Category",
            Column::Subcategory => "Subcategory",
            Column::Source => "Source",
            Column::FacilityOrProcess => "Facility/Process",
            Column::ActivityQuantity => "Activity Quantity",
            Column::Unit => "Unit",
        }
    }

    /// Accepted header spellings, already folded by [`fold_header`].
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::Category => &["category", "类别"],
            Column::Subcategory => &["subcategory", "sub-category", "子类别"],
            Column::Source => &["source", "emissionsource", "排放源"],
            Column::FacilityOrProcess => &["facility/process", "facility", "process", "设施/过程"],
            Column::ActivityQuantity => &["activityquantity", "activitydata", "quantity", "活动数据"],
            Column::Unit => &["unit", "unitofmeasure", "计量单位", "单位"],
        }
    }
}

/// Column positions of the required fields within a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub category: usize,
    pub subcategory: usize,
    pub source: usize,
    pub facility_or_process: usize,
    pub activity_quantity: usize,
    pub unit: usize,
}

/// Locate every required column in a header row.
///
/// Any missing column rejects the whole table; the error names all of them.
pub fn locate_columns(headers: &[String]) -> Result<ColumnMap, GhgError> {
    let folded: Vec<String> = headers.iter().map(|h| fold_header(h)).collect();
    let find = |col: Column| {
        folded
            .iter()
            .position(|h| col.aliases().contains(&h.as_str()))
    };

    let positions: Vec<Option<usize>> = Column::REQUIRED.iter().map(|c| find(*c)).collect();
    let missing: Vec<&str> = Column::REQUIRED
        .iter()
        .zip(&positions)
        .filter(|(_, p)| p.is_none())
        .map(|(c, _)| c.label())
        .collect();

    if !missing.is_empty() {
        return Err(GhgError::MalformedInput(format!(
            "missing required column(s): {}. Required: {}",
            missing.join(", "),
            Column::REQUIRED
                .iter()
                .map(|c| c.label())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    let at = |i: usize| positions[i].unwrap_or_default();
    Ok(ColumnMap {
        category: at(0),
        subcategory: at(1),
        source: at(2),
        facility_or_process: at(3),
        activity_quantity: at(4),
        unit: at(5),
    })
}

/// Lowercase and drop whitespace and underscores: "Activity Quantity" -> "activityquantity".
fn fold_header(h: &str) -> String {
    h.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_english_headers() {
        let map = locate_columns(&headers(&[
            "Category",
            "Subcategory",
            "Source",
            "Facility/Process",
            "Activity Quantity",
            "Unit",
        ]))
        .unwrap();
        assert_eq!(map.category, 0);
        assert_eq!(map.unit, 5);
    }

    #[test]
    fn test_reordered_and_extra_columns() {
        let map = locate_columns(&headers(&[
            "Notes",
            "unit",
            "activity_quantity",
            "facility / process",
            "SOURCE",
            "sub-category",
            "category",
        ]))
        .unwrap();
        assert_eq!(map.unit, 1);
        assert_eq!(map.activity_quantity, 2);
        assert_eq!(map.facility_or_process, 3);
        assert_eq!(map.source, 4);
        assert_eq!(map.subcategory, 5);
        assert_eq!(map.category, 6);
    }

    #[test]
    fn test_template_headers() {
        let map = locate_columns(&headers(&[
            "类别", "子类别", "排放源", "设施/过程", "活动数据", "计量单位",
        ]))
        .unwrap();
        assert_eq!(map.activity_quantity, 4);

        let short = locate_columns(&headers(&[
            "类别", "子类别", "排放源", "设施/过程", "活动数据", "单位",
        ]))
        .unwrap();
        assert_eq!(short.unit, 5);
    }

    #[test]
    fn test_missing_columns_named() {
        let err = locate_columns(&headers(&["Category", "Source", "Unit"])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Subcategory"));
        assert!(msg.contains("Facility/Process"));
        assert!(msg.contains("Activity Quantity"));
        assert!(matches!(err, GhgError::MalformedInput(_)));
    }
}
