//! End-to-end tests: activity table -> match -> reconcile -> report -> xlsx.
//!
//! Exported workbooks are read back with calamine and every formula is
//! re-evaluated against the cell values stored in the file.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Range, Reader, Xlsx};
use ghgcalc_core::error::GhgError;
use ghgcalc_core::export::formula::{CellSource, CellValue, Formula};
use ghgcalc_core::export::layout::{DETAIL_SHEET, GHG_SHEET, SUMMARY_SHEET};
use ghgcalc_core::export::workbook::{CellStyle, Sheet, Workbook};
use ghgcalc_core::export::{write_workbook, xlsx::write_xlsx};
use ghgcalc_core::factors::FactorLibrary;
use ghgcalc_core::ingest::values::f64_to_decimal;
use ghgcalc_core::matching::{MatchStatus, Provenance};
use ghgcalc_core::model::{ActivityRecord, ActivityTable, GhgType, Scope};
use ghgcalc_core::reconcile::{apply_factor_edit, reconcile};
use ghgcalc_core::{build_report, export_report, load_activity_table, match_activities};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn activity(category: &str, subcategory: &str, source: &str, qty: Decimal, unit: &str) -> ActivityRecord {
    ActivityRecord {
        category: category.into(),
        subcategory: subcategory.into(),
        source: source.into(),
        facility_or_process: "site A".into(),
        activity_quantity: qty,
        unit_of_measure: unit.into(),
    }
}

fn sample_table() -> ActivityTable {
    ActivityTable {
        rows: vec![
            activity("Scope 1: direct", "1.1 stationary combustion", "natural gas", dec!(1239138), "m3"),
            activity("Scope 1: direct", "1.1 stationary combustion", "biomass", dec!(5000), "kg"),
            activity("Scope 1: direct", "1.4 fugitive emissions", "R410A", dec!(3.15), "kg"),
            activity("Scope 2: indirect", "2.1 purchased electricity", "municipal electricity", dec!(1500000), "kWh"),
            activity("Scope 2: indirect", "2.2 purchased heat", "steam", dec!(0), "GJ"),
        ],
    }
}

/// A workbook read back from xlsx bytes: stored values per sheet.
struct ReadBack {
    values: HashMap<String, Range<Data>>,
    formulas: HashMap<String, Range<String>>,
}

impl ReadBack {
    fn open(bytes: &[u8]) -> Self {
        let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes.to_vec())).unwrap();
        let mut values = HashMap::new();
        let mut formulas = HashMap::new();
        for name in workbook.sheet_names() {
            values.insert(name.clone(), workbook.worksheet_range(&name).unwrap());
            formulas.insert(name.clone(), workbook.worksheet_formula(&name).unwrap());
        }
        Self { values, formulas }
    }

    fn number(&self, sheet: &str, cell: &str) -> Decimal {
        let c: ghgcalc_core::export::CellRef = cell.parse().unwrap();
        match self.value(sheet, c.row, c.col).unwrap() {
            CellValue::Number(n) => n,
            other => panic!("{sheet}!{cell} is not a number: {other:?}"),
        }
    }

    fn formula(&self, sheet: &str, cell: &str) -> String {
        let c: ghgcalc_core::export::CellRef = cell.parse().unwrap();
        self.formulas[sheet]
            .get_value((c.row, c.col))
            .cloned()
            .unwrap_or_default()
    }

    /// Absolute (row, col, text) of every formula cell on a sheet.
    fn formula_cells(&self, sheet: &str) -> Vec<(u32, u32, String)> {
        let range = &self.formulas[sheet];
        let Some((r0, c0)) = range.start() else {
            return Vec::new();
        };
        range
            .used_cells()
            .filter(|(_, _, f)| !f.is_empty())
            .map(|(r, c, f)| (r0 + r as u32, c0 + c as u32, f.clone()))
            .collect()
    }
}

impl CellSource for ReadBack {
    fn value(&self, sheet: &str, row: u32, col: u32) -> Result<CellValue, GhgError> {
        let range = self
            .values
            .get(sheet)
            .ok_or_else(|| GhgError::Formula(format!("no sheet {sheet}")))?;
        Ok(match range.get_value((row, col)) {
            None | Some(Data::Empty) => CellValue::Empty,
            Some(Data::Float(f)) => CellValue::Number(f64_to_decimal(*f).unwrap()),
            Some(Data::Int(i)) => CellValue::Number(Decimal::from(*i)),
            Some(Data::String(s)) => CellValue::Text(s.clone()),
            Some(other) => CellValue::Text(other.to_string()),
        })
    }
}

fn assert_close(actual: Decimal, expected: Decimal, what: &str) {
    assert!(
        (actual - expected).abs() < dec!(0.0001),
        "{what}: {actual} != {expected}"
    );
}

/// Every formula in the file evaluates to the value cached beside it.
fn assert_formulas_consistent(book: &ReadBack) {
    let mut checked = 0;
    for sheet in [DETAIL_SHEET, SUMMARY_SHEET, GHG_SHEET] {
        for (row, col, text) in book.formula_cells(sheet) {
            let formula: Formula = text.parse().unwrap();
            let evaluated = formula.evaluate(book, sheet).unwrap();
            let cached = match book.value(sheet, row, col).unwrap() {
                CellValue::Number(n) => n,
                other => panic!("{sheet} ({row},{col}) cached {other:?}"),
            };
            assert_close(evaluated, cached, &format!("{sheet}!{text}"));
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn natural_gas_scenario_end_to_end() {
    let library = FactorLibrary::builtin().unwrap();
    let outcome = match_activities(&sample_table(), &library);

    let gas = &outcome.rows[0];
    assert_eq!(gas.suggested_factor_key, "Stationary combustion-natural gas");
    assert_eq!(gas.factor.value, dec!(2.1622));
    assert_eq!(outcome.rows[1].status, MatchStatus::Unmatched);
    assert_eq!(outcome.rows[1].factor.value, Decimal::ZERO);
    assert_eq!(
        outcome.unmatched_keys,
        vec!["Stationary combustion-biomass".to_string()]
    );

    let report = build_report(&outcome.rows, &[]).unwrap();
    let gas = &report.rows[0].emission;
    assert_eq!(gas.emission_kg, dec!(2679264.1836));
    assert_eq!(gas.emission_tonnes.round_dp(2), dec!(2679.26));
    assert_eq!(gas.scope, Scope::ScopeOne);

    let s = &report.summary;
    assert_eq!(s.row_count, 5);
    assert_eq!(s.unmatched_count, 1);
    assert!(report.rows[1].emission.emission_tonnes.is_zero());
    assert!(report.rows[4].emission.emission_tonnes.is_zero());
    // 2679.2641836 + 6.5772 (R410A) ; 855.45 (grid)
    assert_eq!(s.scope_tonnes(Scope::ScopeOne), dec!(2685.8413836));
    assert_eq!(s.scope_tonnes(Scope::ScopeTwo), dec!(855.45));
    assert_eq!(s.total_tonnes, dec!(3541.2913836));
    assert_eq!(s.by_ghg[0].key, GhgType::CO2);
    assert_eq!(s.ghg_tonnes(GhgType::HFCs), dec!(6.5772));

    let sum = |b: &[Decimal]| b.iter().copied().sum::<Decimal>();
    let scope: Vec<_> = s.by_scope.iter().map(|b| b.tonnes).collect();
    let ghg: Vec<_> = s.by_ghg.iter().map(|b| b.tonnes).collect();
    let sub: Vec<_> = s.by_subcategory.iter().map(|b| b.tonnes).collect();
    assert_eq!(sum(&scope), s.total_tonnes);
    assert_eq!(sum(&ghg), s.total_tonnes);
    assert_eq!(sum(&sub), s.total_tonnes);
}

#[test]
fn exported_formulas_reproduce_in_memory_values() {
    let library = FactorLibrary::builtin().unwrap();
    let outcome = match_activities(&sample_table(), &library);
    let report = build_report(&outcome.rows, &[]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xlsx");
    write_workbook(&path, &export_report(&report).unwrap()).unwrap();
    let book = ReadBack::open(&std::fs::read(&path).unwrap());

    assert_formulas_consistent(&book);

    assert_eq!(book.formula(DETAIL_SHEET, "L2"), "E2*H2");
    assert_eq!(book.formula(DETAIL_SHEET, "M6"), "L6/1000");
    for (idx, row) in report.rows.iter().enumerate() {
        let r = idx + 2;
        assert_close(
            book.number(DETAIL_SHEET, &format!("L{r}")),
            row.emission.emission_kg,
            "kg",
        );
        assert_close(
            book.number(DETAIL_SHEET, &format!("M{r}")),
            row.emission.emission_tonnes,
            "tonnes",
        );
        // Inputs stored unrounded.
        assert_eq!(
            book.number(DETAIL_SHEET, &format!("H{r}")),
            row.row.factor.value
        );
    }

    let s = &report.summary;
    assert!(book.formula(SUMMARY_SHEET, "B4").starts_with("SUMIFS(Detail!$M$2:$M$6,"));
    assert_eq!(book.formula(SUMMARY_SHEET, "B5"), "SUM(Detail!$M$2:$M$6)-B4");
    assert_close(book.number(SUMMARY_SHEET, "B4"), s.scope_tonnes(Scope::ScopeOne), "scope 1");
    assert_close(book.number(SUMMARY_SHEET, "B5"), s.scope_tonnes(Scope::ScopeTwo), "scope 2");
    assert_close(book.number(SUMMARY_SHEET, "B6"), s.total_tonnes, "total");
    let scope_one_share = s
        .by_scope
        .iter()
        .find(|b| b.key == Scope::ScopeOne)
        .unwrap()
        .percent;
    assert_eq!(
        book.number(SUMMARY_SHEET, "C4").round_dp(2),
        scope_one_share.round_dp(2)
    );

    for (idx, bucket) in s.by_ghg.iter().enumerate() {
        let r = idx + 4;
        assert_eq!(
            book.value(GHG_SHEET, r as u32 - 1, 0).unwrap(),
            CellValue::Text(bucket.key.as_str().to_string())
        );
        assert_close(book.number(GHG_SHEET, &format!("B{r}")), bucket.tonnes, "gas tonnes");
        assert_eq!(
            book.number(GHG_SHEET, &format!("C{r}")).round_dp(2),
            bucket.percent.round_dp(2)
        );
    }
}

#[test]
fn manual_override_flows_into_export() {
    let library = FactorLibrary::builtin().unwrap();
    let baseline = match_activities(&sample_table(), &library).rows;

    let mut edited = baseline.clone();
    apply_factor_edit(&mut edited, 0, "2.5").unwrap();
    apply_factor_edit(&mut edited, 1, "0.112").unwrap();
    assert!(apply_factor_edit(&mut edited, 2, "lots").is_err());

    let outcome = reconcile(&baseline, edited).unwrap();
    assert_eq!(outcome.overridden, vec![0, 1]);
    assert_eq!(outcome.rows[0].provenance, Provenance::ManualOverride);
    assert_eq!(outcome.rows[0].status, MatchStatus::ManuallyOverridden);
    assert_eq!(outcome.rows[2].status, MatchStatus::Matched);

    let report = build_report(&outcome.rows, &outcome.rejected).unwrap();
    assert_eq!(report.rows[0].emission.emission_kg, dec!(3097845));
    assert_eq!(report.rows[1].emission.emission_kg, dec!(560));
    assert_eq!(report.summary.overridden_count, 2);
    assert_eq!(report.summary.unmatched_count, 0);

    let book = ReadBack::open(&export_report(&report).unwrap());
    assert_formulas_consistent(&book);
    assert_eq!(book.number(DETAIL_SHEET, "H2"), dec!(2.5));
    assert_close(book.number(DETAIL_SHEET, "M2"), dec!(3097.845), "override tonnes");
    assert_close(
        book.number(SUMMARY_SHEET, "B6"),
        report.summary.total_tonnes,
        "total",
    );
}

#[test]
fn out_of_range_emissions_fail_the_report() {
    let library = FactorLibrary::builtin().unwrap();
    let refrigerant = |qty| activity("Scope 1: direct", "1.4 fugitive emissions", "R410A", qty, "kg");

    // Each product alone overflows.
    let table = ActivityTable {
        rows: vec![
            refrigerant(dec!(40000000000000000000000000)),
            refrigerant(dec!(40000000000000000000000000)),
        ],
    };
    let outcome = match_activities(&table, &library);
    assert_eq!(outcome.matched_count(), 2);
    match build_report(&outcome.rows, &[]) {
        Err(GhgError::MalformedInput(msg)) => assert!(msg.starts_with("row 0:"), "{msg}"),
        other => panic!("expected MalformedInput, got {other:?}"),
    }

    // Each product fits, their sum does not.
    let table = ActivityTable {
        rows: vec![
            refrigerant(dec!(20000000000000000000000000)),
            refrigerant(dec!(20000000000000000000000000)),
        ],
    };
    let outcome = match_activities(&table, &library);
    assert!(matches!(
        build_report(&outcome.rows, &[]),
        Err(GhgError::MalformedInput(_))
    ));
}

#[test]
fn empty_table_exports_valid_workbook() {
    let report = build_report(&[], &[]).unwrap();
    let book = ReadBack::open(&export_report(&report).unwrap());
    assert_formulas_consistent(&book);
    assert!(book.number(SUMMARY_SHEET, "B6").is_zero());
    assert!(book.number(SUMMARY_SHEET, "C4").is_zero());
}

fn activity_upload(path: &Path, headers: &[&str]) {
    let mut sheet = Sheet::new("Activity Data");
    for (col, h) in headers.iter().enumerate() {
        sheet.set_text(0, col as u32, h, CellStyle::Header);
    }
    let rows = [
        ("范围一：直接排放", "1.1 固定燃烧", "natural gas", dec!(1239138), "m3"),
        ("Scope 2: indirect", "2.1 purchased electricity", "grid electricity", dec!(2000), "kWh"),
    ];
    for (idx, (cat, sub, src, qty, unit)) in rows.iter().enumerate() {
        let r = idx as u32 + 2; // leave row 2 blank
        sheet.set_text(r, 0, cat, CellStyle::Text);
        sheet.set_text(r, 1, sub, CellStyle::Text);
        sheet.set_text(r, 2, src, CellStyle::Text);
        sheet.set_text(r, 3, "boiler house", CellStyle::Text);
        sheet.set_number(r, 4, *qty, CellStyle::Amount4);
        if headers.len() > 5 {
            sheet.set_text(r, 5, unit, CellStyle::Text);
        }
    }
    let bytes = write_xlsx(&Workbook { sheets: vec![sheet] }).unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn xlsx_upload_with_template_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activities.xlsx");
    activity_upload(&path, &["类别", "子类别", "排放源", "设施/过程", "活动数据", "计量单位"]);

    let table = load_activity_table(&path).unwrap();
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0].activity_quantity, dec!(1239138));
    assert_eq!(table.rows[0].facility_or_process, "boiler house");
    assert_eq!(table.rows[1].unit_of_measure, "kWh");

    let library = FactorLibrary::builtin().unwrap();
    let outcome = match_activities(&table, &library);
    assert_eq!(outcome.matched_count(), 2);
    assert_eq!(
        outcome.rows[1].suggested_factor_key,
        "Purchased electricity-national grid average"
    );
}

#[test]
fn xlsx_upload_missing_column_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activities.xlsx");
    activity_upload(
        &path,
        &["Category", "Subcategory", "Source", "Facility/Process", "Activity Quantity"],
    );

    match load_activity_table(&path) {
        Err(GhgError::MalformedInput(msg)) => assert!(msg.contains("Unit"), "{msg}"),
        other => panic!("expected MalformedInput, got {other:?}"),
    }
}

#[test]
fn library_put_between_passes_does_not_affect_earlier_snapshot() {
    let mut library = FactorLibrary::builtin().unwrap();
    let before = match_activities(&sample_table(), &library);
    library
        .put(ghgcalc_core::factors::schema::EmissionFactor {
            key: "Stationary combustion-biomass".into(),
            factor: dec!(0.112),
            unit: "kgCO2/kg".into(),
            ghg_type: GhgType::CO2,
            note: None,
        })
        .unwrap();
    let after = match_activities(&sample_table(), &library);

    assert_eq!(before.rows[1].status, MatchStatus::Unmatched);
    assert_eq!(after.rows[1].status, MatchStatus::Matched);
    assert!(after.library_version > before.library_version);
}

/// The six rows of the blank upload template, with its Chinese headers.
fn template_upload(path: &Path) {
    let mut sheet = Sheet::new("Activity Data");
    for (col, h) in ["类别", "子类别", "排放源", "设施/过程", "活动数据", "单位"]
        .iter()
        .enumerate()
    {
        sheet.set_text(0, col as u32, h, CellStyle::Header);
    }
    let direct = "范围一：直接温室气体排放";
    let indirect = "范围二：间接温室气体排放";
    let rows = [
        (direct, "1.1 固定燃烧", "天然气", "燃气锅炉", dec!(1239138), "m³"),
        (direct, "1.2 移动燃烧", "汽油", "公务车", dec!(11010), "kg"),
        (direct, "1.3 工艺排放", "丙烷", "焊接", dec!(792), "kg"),
        (direct, "1.4 无组织排放", "R410A", "空调", dec!(3.15), "kg"),
        (indirect, "2.1 外购电力", "外购市政电", "用电", dec!(1500000), "kWh"),
        (indirect, "2.2 外购热力", "蒸汽", "供暖设备", dec!(500), "GJ"),
    ];
    for (idx, (cat, sub, src, facility, qty, unit)) in rows.iter().enumerate() {
        let r = idx as u32 + 1;
        sheet.set_text(r, 0, cat, CellStyle::Text);
        sheet.set_text(r, 1, sub, CellStyle::Text);
        sheet.set_text(r, 2, src, CellStyle::Text);
        sheet.set_text(r, 3, facility, CellStyle::Text);
        sheet.set_number(r, 4, *qty, CellStyle::Amount4);
        sheet.set_text(r, 5, unit, CellStyle::Text);
    }
    let bytes = write_xlsx(&Workbook { sheets: vec![sheet] }).unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn template_rows_match_and_split_by_scope() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("template.xlsx");
    template_upload(&path);

    let table = load_activity_table(&path).unwrap();
    assert_eq!(table.rows.len(), 6);

    let library = FactorLibrary::builtin().unwrap();
    let outcome = match_activities(&table, &library);
    assert_eq!(outcome.matched_count(), 6);
    assert_eq!(outcome.rows[0].suggested_factor_key, "Stationary combustion-天然气");
    assert_eq!(
        outcome.rows[4].suggested_factor_key,
        "Purchased electricity-national grid average"
    );
    assert_eq!(outcome.rows[4].factor.value, dec!(0.5703));

    let report = build_report(&outcome.rows, &[]).unwrap();
    assert_eq!(report.rows[0].emission.scope, Scope::ScopeOne);
    assert_eq!(report.rows[0].emission.emission_tonnes, dec!(2679.2641836));
    assert_eq!(report.rows[5].emission.scope, Scope::ScopeTwo);

    let s = &report.summary;
    assert_eq!(s.scope_tonnes(Scope::ScopeOne), dec!(2720.4038058));
    assert_eq!(s.scope_tonnes(Scope::ScopeTwo), dec!(910.45));

    let book = ReadBack::open(&export_report(&report).unwrap());
    assert_formulas_consistent(&book);
    assert_close(book.number(SUMMARY_SHEET, "B4"), dec!(2720.4038058), "scope 1");
    assert_close(book.number(SUMMARY_SHEET, "B5"), dec!(910.45), "scope 2");
    assert_close(book.number(SUMMARY_SHEET, "B6"), s.total_tonnes, "total");
}
