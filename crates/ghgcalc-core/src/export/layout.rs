//! Sheet layout of the exported report.
//!
//! The detail sheet holds inputs as values and emissions as row formulas.
//! Summary sheets only ever reference detail columns by absolute range, so
//! editing a quantity or factor in the exported file recomputes everything
//! downstream.

use crate::aggregate::AggregateSummary;
use crate::calculate::CalculatedRow;
use crate::error::GhgError;
use crate::export::formula::{BinOp, CellRef, Formula, Range};
use crate::export::workbook::{CellStyle, Sheet, Workbook};
use crate::model::{DIRECT_TOKENS, INDIRECT_TOKENS};
use rust_decimal::Decimal;

pub const DETAIL_SHEET: &str = "Detail";
pub const SUMMARY_SHEET: &str = "Scope Summary";
pub const GHG_SHEET: &str = "GHG Analysis";
pub const INSTRUCTIONS_SHEET: &str = "Instructions";

pub const DETAIL_HEADERS: [&str; 13] = [
    "Category",
    "Subcategory",
    "Source",
    "Facility/Process",
    "Activity Quantity",
    "Unit",
    "Suggested Factor Key",
    "Emission Factor",
    "Factor Unit",
    "GHG Type",
    "Provenance",
    "Emissions (kgCO2e)",
    "Emissions (tCO2e)",
];

// Zero-based detail columns referenced by formulas.
pub const COL_CATEGORY: u32 = 0;
pub const COL_QUANTITY: u32 = 4;
pub const COL_FACTOR: u32 = 7;
pub const COL_GHG: u32 = 9;
pub const COL_KG: u32 = 11;
pub const COL_TONNES: u32 = 12;

/// First summary data row (zero-based; spreadsheet row 4).
pub const SUMMARY_FIRST_ROW: u32 = 3;
/// Spreadsheet `B6`: grand total on the scope summary.
pub const TOTAL_CELL: CellRef = CellRef {
    row: 5,
    col: 1,
    abs_row: true,
    abs_col: true,
};

const DETAIL_WIDTHS: [f64; 13] = [
    28.0, 18.0, 15.0, 20.0, 15.0, 12.0, 22.0, 15.0, 15.0, 15.0, 12.0, 18.0, 18.0,
];

const INSTRUCTIONS: &[(&str, &str)] = &[
    ("1. Formulas", ""),
    ("", "Emissions (kgCO2e) = Activity Quantity x Emission Factor"),
    ("", "Emissions (tCO2e) = Emissions (kgCO2e) / 1000"),
    ("", "All summary figures are formulas over the Detail sheet"),
    ("", "Scope 1: category contains direct or 直接, but not indirect or 间接"),
    ("", "Scope 2: total emissions minus Scope 1"),
    ("", ""),
    ("2. Editing", ""),
    ("", "Activity quantities and emission factors on Detail can be edited"),
    ("", "Emissions recalculate automatically after an edit"),
    ("", "Scope Summary and GHG Analysis update with them"),
    ("", ""),
    ("3. Provenance", ""),
    ("", "Factor library: value taken from the built-in factor library"),
    ("", "Manual override: value entered or adjusted by a user"),
    ("", "Pending manual entry: no factor found, the row contributes 0"),
    ("", ""),
    ("4. Notes", ""),
    ("", "Do not delete the header row"),
    ("", "Keep quantities and factors numeric"),
    ("", "Save a copy before editing"),
];

/// Lay out the four report sheets and compute every formula's cached value.
pub fn build_workbook(
    rows: &[CalculatedRow],
    summary: &AggregateSummary,
) -> Result<Workbook, GhgError> {
    let last_row = last_detail_row(rows.len());
    let mut book = Workbook {
        sheets: vec![
            detail_sheet(rows),
            scope_summary_sheet(last_row),
            ghg_sheet(last_row, summary),
            instructions_sheet(),
        ],
    };
    book.recalculate()?;
    Ok(book)
}

/// Zero-based last row of the detail data range. The range always spans at
/// least one row so an empty report still yields valid formulas.
pub fn last_detail_row(row_count: usize) -> u32 {
    row_count.max(1) as u32
}

fn detail_column(col: u32, last_row: u32) -> Range {
    Range {
        sheet: Some(DETAIL_SHEET.to_string()),
        start: CellRef::absolute(1, col),
        end: CellRef::absolute(last_row, col),
    }
}

fn total_cell() -> Formula {
    Formula::cell(Some(SUMMARY_SHEET), TOTAL_CELL)
}

fn share_of_total(value: Formula, total: Formula) -> Formula {
    Formula::if_positive(
        total.clone(),
        Formula::binary(
            BinOp::Mul,
            Formula::binary(BinOp::Div, value, total),
            Formula::Number(Decimal::ONE_HUNDRED),
        ),
    )
}

/// Scope 1 and scope 2 totals.
///
/// Scope 1 takes rows whose category carries a direct token and no
/// indirect token, one disjoint `SUMIFS` per direct token. Scope 2 is the
/// rest of the detail total, so the two always add up to it.
pub fn scope_formulas(last_row: u32) -> (Formula, Formula) {
    let cat = detail_column(COL_CATEGORY, last_row);
    let t = detail_column(COL_TONNES, last_row);
    let excluded: Vec<String> = INDIRECT_TOKENS.iter().map(|tok| format!("<>*{tok}*")).collect();

    let mut terms = DIRECT_TOKENS.iter().enumerate().map(|(i, tok)| {
        let wanted = format!("*{tok}*");
        let earlier: Vec<String> = DIRECT_TOKENS[..i]
            .iter()
            .map(|prev| format!("<>*{prev}*"))
            .collect();
        let mut criteria: Vec<(Range, &str)> = vec![(cat.clone(), wanted.as_str())];
        criteria.extend(earlier.iter().map(|c| (cat.clone(), c.as_str())));
        criteria.extend(excluded.iter().map(|c| (cat.clone(), c.as_str())));
        Formula::sum_ifs(t.clone(), &criteria)
    });
    let first = match terms.next() {
        Some(f) => f,
        None => Formula::Number(Decimal::ZERO),
    };
    let scope_one = terms.fold(first, |acc, f| Formula::binary(BinOp::Add, acc, f));

    let scope_two = Formula::binary(
        BinOp::Sub,
        Formula::Sum(t),
        Formula::cell(None, CellRef::new(SUMMARY_FIRST_ROW, 1)),
    );
    (scope_one, scope_two)
}

fn detail_sheet(rows: &[CalculatedRow]) -> Sheet {
    let mut sheet = Sheet::new(DETAIL_SHEET);
    for (col, header) in DETAIL_HEADERS.iter().enumerate() {
        sheet.set_text(0, col as u32, header, CellStyle::Header);
    }

    for (idx, calc) in rows.iter().enumerate() {
        let r = idx as u32 + 1;
        let row = &calc.row;
        let a = &row.activity;

        sheet.set_text(r, 0, &a.category, CellStyle::Text);
        sheet.set_text(r, 1, &a.subcategory, CellStyle::Text);
        sheet.set_text(r, 2, &a.source, CellStyle::Text);
        sheet.set_text(r, 3, &a.facility_or_process, CellStyle::Text);
        sheet.set_number(r, COL_QUANTITY, a.activity_quantity, CellStyle::Amount4);
        sheet.set_text(r, 5, &a.unit_of_measure, CellStyle::Text);
        sheet.set_text(r, 6, &row.suggested_factor_key, CellStyle::Text);
        sheet.set_number(r, COL_FACTOR, row.factor.value, CellStyle::Amount4);
        sheet.set_text(r, 8, &row.factor.unit, CellStyle::Text);
        sheet.set_text(r, COL_GHG, row.factor.ghg_type.as_str(), CellStyle::Text);
        sheet.set_text(r, 10, &row.provenance.to_string(), CellStyle::Text);

        sheet.set_formula(
            r,
            COL_KG,
            Formula::binary(
                BinOp::Mul,
                Formula::cell(None, CellRef::new(r, COL_QUANTITY)),
                Formula::cell(None, CellRef::new(r, COL_FACTOR)),
            ),
            CellStyle::Amount4,
        );
        sheet.set_formula(
            r,
            COL_TONNES,
            Formula::binary(
                BinOp::Div,
                Formula::cell(None, CellRef::new(r, COL_KG)),
                Formula::Number(Decimal::ONE_THOUSAND),
            ),
            CellStyle::Amount2,
        );
    }

    sheet.set_column_widths(&DETAIL_WIDTHS);
    sheet
}

fn scope_summary_sheet(last_row: u32) -> Sheet {
    let mut sheet = Sheet::new(SUMMARY_SHEET);
    sheet.set_text(0, 0, "Emissions Summary", CellStyle::Title);
    sheet.merge(CellRef::new(0, 0), CellRef::new(0, 3));

    for (col, header) in ["Scope", "Emissions (tCO2e)", "Share (%)", "Notes"]
        .iter()
        .enumerate()
    {
        sheet.set_text(2, col as u32, header, CellStyle::Header);
    }

    let (scope_one, scope_two) = scope_formulas(last_row);
    let total_local = || Formula::cell(None, CellRef::new(TOTAL_CELL.row, TOTAL_CELL.col));
    let rows = [
        (
            "Scope 1: direct emissions",
            scope_one,
            "Stationary and mobile combustion, process and fugitive emissions",
        ),
        (
            "Scope 2: indirect emissions",
            scope_two,
            "Purchased electricity and purchased heat",
        ),
    ];

    for (offset, (label, formula, note)) in rows.into_iter().enumerate() {
        let r = SUMMARY_FIRST_ROW + offset as u32;
        sheet.set_text(r, 0, label, CellStyle::Text);
        sheet.set_formula(r, 1, formula, CellStyle::Amount2);
        sheet.set_formula(
            r,
            2,
            share_of_total(Formula::cell(None, CellRef::new(r, 1)), total_local()),
            CellStyle::Amount2,
        );
        sheet.set_text(r, 3, note, CellStyle::Text);
    }

    let total_row = TOTAL_CELL.row;
    sheet.set_text(total_row, 0, "Total emissions", CellStyle::Bold);
    sheet.set_formula(
        total_row,
        1,
        Formula::binary(
            BinOp::Add,
            Formula::cell(None, CellRef::new(SUMMARY_FIRST_ROW, 1)),
            Formula::cell(None, CellRef::new(SUMMARY_FIRST_ROW + 1, 1)),
        ),
        CellStyle::TotalAmount2,
    );
    sheet.set_formula(
        total_row,
        2,
        share_of_total(total_local(), total_local()),
        CellStyle::TotalAmount2,
    );
    sheet.set_text(total_row, 3, "Organization total GHG emissions", CellStyle::Text);

    sheet.set_column_widths(&[25.0, 20.0, 15.0, 35.0]);
    sheet
}

fn ghg_sheet(last_row: u32, summary: &AggregateSummary) -> Sheet {
    let mut sheet = Sheet::new(GHG_SHEET);
    sheet.set_text(0, 0, "GHG Emissions Analysis", CellStyle::Title);
    sheet.merge(CellRef::new(0, 0), CellRef::new(0, 2));

    for (col, header) in ["GHG Type", "Emissions (tCO2e)", "Share (%)"]
        .iter()
        .enumerate()
    {
        sheet.set_text(2, col as u32, header, CellStyle::Header);
    }

    let gas = detail_column(COL_GHG, last_row);
    let t = detail_column(COL_TONNES, last_row);
    for (offset, bucket) in summary.by_ghg.iter().enumerate() {
        let r = SUMMARY_FIRST_ROW + offset as u32;
        sheet.set_text(r, 0, bucket.key.as_str(), CellStyle::Text);
        sheet.set_formula(
            r,
            1,
            Formula::sum_if(gas.clone(), bucket.key.as_str(), t.clone()),
            CellStyle::Amount2,
        );
        sheet.set_formula(
            r,
            2,
            share_of_total(Formula::cell(None, CellRef::new(r, 1)), total_cell()),
            CellStyle::Amount2,
        );
    }

    sheet.set_column_widths(&[20.0, 20.0, 15.0]);
    sheet
}

fn instructions_sheet() -> Sheet {
    let mut sheet = Sheet::new(INSTRUCTIONS_SHEET);
    sheet.set_text(0, 0, "How to use this report", CellStyle::Title);
    sheet.merge(CellRef::new(0, 0), CellRef::new(0, 1));

    for (offset, (section, text)) in INSTRUCTIONS.iter().enumerate() {
        let r = 2 + offset as u32;
        if !section.is_empty() {
            sheet.set_text(r, 0, section, CellStyle::Bold);
        }
        if !text.is_empty() {
            sheet.set_text(r, 1, text, CellStyle::Default);
        }
    }

    sheet.set_column_widths(&[20.0, 60.0]);
    sheet
}
