use crate::error::GhgError;
use crate::export::formula::{CellRef, CellSource, CellValue, Formula};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Visual style of a cell. Each variant maps to one `cellXfs` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellStyle {
    #[default]
    Default,
    /// White bold text on the accent fill, bordered.
    Header,
    /// Large accent-coloured title.
    Title,
    Bold,
    /// Bordered text.
    Text,
    /// Bordered, `0.0000`.
    Amount4,
    /// Bordered, `0.00`.
    Amount2,
    /// Bold, bordered, `0.00`.
    TotalAmount2,
}

impl CellStyle {
    pub const ALL: [CellStyle; 8] = [
        CellStyle::Default,
        CellStyle::Header,
        CellStyle::Title,
        CellStyle::Bold,
        CellStyle::Text,
        CellStyle::Amount4,
        CellStyle::Amount2,
        CellStyle::TotalAmount2,
    ];

    pub fn xf_index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Text(String),
    Number(Decimal),
    /// `cached` is filled by [`Workbook::recalculate`].
    Formula {
        formula: Formula,
        cached: Option<Decimal>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub content: CellContent,
    pub style: CellStyle,
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    /// Keyed by zero-based `(row, col)`, so iteration is row-major.
    pub cells: BTreeMap<(u32, u32), Cell>,
    pub column_widths: Vec<(u32, f64)>,
    pub merges: Vec<(CellRef, CellRef)>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: BTreeMap::new(),
            column_widths: Vec::new(),
            merges: Vec::new(),
        }
    }

    pub fn set_text(&mut self, row: u32, col: u32, text: &str, style: CellStyle) {
        self.put(row, col, CellContent::Text(text.to_string()), style);
    }

    pub fn set_number(&mut self, row: u32, col: u32, value: Decimal, style: CellStyle) {
        self.put(row, col, CellContent::Number(value), style);
    }

    pub fn set_formula(&mut self, row: u32, col: u32, formula: Formula, style: CellStyle) {
        self.put(
            row,
            col,
            CellContent::Formula {
                formula,
                cached: None,
            },
            style,
        );
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Widths for consecutive columns starting at A.
    pub fn set_column_widths(&mut self, widths: &[f64]) {
        self.column_widths = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| (i as u32, w))
            .collect();
    }

    pub fn merge(&mut self, from: CellRef, to: CellRef) {
        self.merges.push((from, to));
    }

    /// Last used row and column, if the sheet has any cell.
    pub fn extent(&self) -> Option<(u32, u32)> {
        let last_row = self.cells.keys().map(|&(r, _)| r).max()?;
        let last_col = self.cells.keys().map(|&(_, c)| c).max()?;
        Some((last_row, last_col))
    }

    fn put(&mut self, row: u32, col: u32, content: CellContent, style: CellStyle) {
        self.cells.insert((row, col), Cell { content, style });
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Evaluate every formula against the model and store the result as the
    /// cell's cached value.
    pub fn recalculate(&mut self) -> Result<(), GhgError> {
        let results = {
            let eval = Evaluator::new(self);
            let mut results = Vec::new();
            for (sheet_idx, sheet) in self.sheets.iter().enumerate() {
                for (&(row, col), cell) in &sheet.cells {
                    if let CellContent::Formula { .. } = cell.content {
                        results.push((sheet_idx, row, col, eval.formula_cell(sheet_idx, row, col)?));
                    }
                }
            }
            results
        };

        for (sheet_idx, row, col, value) in results {
            if let Some(Cell {
                content: CellContent::Formula { cached, .. },
                ..
            }) = self.sheets[sheet_idx].cells.get_mut(&(row, col))
            {
                *cached = Some(value);
            }
        }
        Ok(())
    }
}

/// Resolves formula cells on demand, memoized, with cycle detection.
struct Evaluator<'a> {
    book: &'a Workbook,
    memo: RefCell<HashMap<(usize, u32, u32), Decimal>>,
    active: RefCell<HashSet<(usize, u32, u32)>>,
}

impl<'a> Evaluator<'a> {
    fn new(book: &'a Workbook) -> Self {
        Self {
            book,
            memo: RefCell::new(HashMap::new()),
            active: RefCell::new(HashSet::new()),
        }
    }

    fn formula_cell(&self, sheet_idx: usize, row: u32, col: u32) -> Result<Decimal, GhgError> {
        let key = (sheet_idx, row, col);
        if let Some(v) = self.memo.borrow().get(&key) {
            return Ok(*v);
        }

        let sheet = &self.book.sheets[sheet_idx];
        let Some(Cell {
            content: CellContent::Formula { formula, .. },
            ..
        }) = sheet.get(row, col)
        else {
            return Ok(Decimal::ZERO);
        };

        if !self.active.borrow_mut().insert(key) {
            return Err(GhgError::Formula(format!(
                "circular reference at {}!{}",
                sheet.name,
                CellRef::new(row, col)
            )));
        }
        let value = formula.evaluate(self, &sheet.name);
        self.active.borrow_mut().remove(&key);

        let value = value?;
        self.memo.borrow_mut().insert(key, value);
        Ok(value)
    }
}

impl CellSource for Evaluator<'_> {
    fn value(&self, sheet: &str, row: u32, col: u32) -> Result<CellValue, GhgError> {
        let sheet_idx = self
            .book
            .sheets
            .iter()
            .position(|s| s.name == sheet)
            .ok_or_else(|| GhgError::Formula(format!("unknown sheet '{sheet}'")))?;

        Ok(match self.book.sheets[sheet_idx].get(row, col) {
            None => CellValue::Empty,
            Some(cell) => match &cell.content {
                CellContent::Text(t) => CellValue::Text(t.clone()),
                CellContent::Number(n) => CellValue::Number(*n),
                CellContent::Formula { .. } => {
                    CellValue::Number(self.formula_cell(sheet_idx, row, col)?)
                }
            },
        })
    }
}
