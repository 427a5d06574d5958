//! The spreadsheet formula subset written into exported workbooks.
//!
//! Formulas are built as a small AST, rendered to spreadsheet text with
//! `Display`, read back with `FromStr`, and evaluated with decimal
//! arithmetic over any [`CellSource`]. The grammar covers exactly what the
//! exporter emits: numbers, cell references, `+ - * /`, `SUM`, `SUMIF`
//! and `IF` with a single comparison.

use crate::error::GhgError;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

pub const MAX_ROW: u32 = 1_048_575;
pub const MAX_COLUMN: u32 = 16_383;

/// Zero-based cell position with optional `$` anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
    pub abs_row: bool,
    pub abs_col: bool,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            abs_row: false,
            abs_col: false,
        }
    }

    pub fn absolute(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            abs_row: true,
            abs_col: true,
        }
    }
}

/// Column letters for a zero-based index: 0 -> A, 26 -> AA.
pub fn column_name(col: u32) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.abs_col {
            f.write_str("$")?;
        }
        f.write_str(&column_name(self.col))?;
        if self.abs_row {
            f.write_str("$")?;
        }
        write!(f, "{}", self.row + 1)
    }
}

impl FromStr for CellRef {
    type Err = GhgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_cell_ref(s).ok_or_else(|| GhgError::Formula(format!("invalid cell reference '{s}'")))
    }
}

fn parse_cell_ref(s: &str) -> Option<CellRef> {
    let (abs_col, rest) = match s.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let letters = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if letters == 0 || letters > 3 {
        return None;
    }
    let (col_part, tail) = rest.split_at(letters);
    let (abs_row, digits) = match tail.strip_prefix('$') {
        Some(digits) => (true, digits),
        None => (false, tail),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let row: u32 = digits.parse().ok()?;
    if row == 0 || row - 1 > MAX_ROW {
        return None;
    }
    let col = col_part
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1))
        - 1;
    if col > MAX_COLUMN {
        return None;
    }

    Some(CellRef {
        row: row - 1,
        col,
        abs_row,
        abs_col,
    })
}

/// A single cell, optionally on another sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub sheet: Option<String>,
    pub cell: CellRef,
}

/// A rectangular block of cells, optionally on another sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub sheet: Option<String>,
    pub start: CellRef,
    pub end: CellRef,
}

impl Range {
    fn bounds(&self) -> (u32, u32, u32, u32) {
        (
            self.start.row.min(self.end.row),
            self.start.col.min(self.end.col),
            self.start.row.max(self.end.row),
            self.start.col.max(self.end.col),
        )
    }

    /// Positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = (u32, u32)> {
        let (r0, c0, r1, c1) = self.bounds();
        (r0..=r1).flat_map(move |r| (c0..=c1).map(move |c| (r, c)))
    }

    fn top_left(&self) -> (u32, u32) {
        let (r0, c0, _, _) = self.bounds();
        (r0, c0)
    }
}

fn write_sheet_prefix(f: &mut fmt::Formatter<'_>, sheet: &Option<String>) -> fmt::Result {
    let Some(name) = sheet else {
        return Ok(());
    };
    let bare = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare {
        write!(f, "{name}!")
    } else {
        write!(f, "'{}'!", name.replace('\'', "''"))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet_prefix(f, &self.sheet)?;
        write!(f, "{}", self.cell)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet_prefix(f, &self.sheet)?;
        write!(f, "{}:{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
        }
    }

    fn holds(self, a: Decimal, b: Decimal) -> bool {
        match self {
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: Formula,
    pub op: CompareOp,
    pub rhs: Formula,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    Number(Decimal),
    Ref(Reference),
    Neg(Box<Formula>),
    Binary {
        op: BinOp,
        lhs: Box<Formula>,
        rhs: Box<Formula>,
    },
    Sum(Range),
    SumIf {
        range: Range,
        criterion: String,
        sum_range: Range,
    },
    /// All criteria must hold. Each criteria range is aligned with
    /// `sum_range` by offset from its top-left cell.
    SumIfs {
        sum_range: Range,
        criteria: Vec<(Range, String)>,
    },
    If {
        condition: Box<Condition>,
        then: Box<Formula>,
        otherwise: Box<Formula>,
    },
}

impl Formula {
    pub fn cell(sheet: Option<&str>, cell: CellRef) -> Self {
        Formula::Ref(Reference {
            sheet: sheet.map(str::to_string),
            cell,
        })
    }

    pub fn binary(op: BinOp, lhs: Formula, rhs: Formula) -> Self {
        Formula::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn sum_if(range: Range, criterion: &str, sum_range: Range) -> Self {
        Formula::SumIf {
            range,
            criterion: criterion.to_string(),
            sum_range,
        }
    }

    pub fn sum_ifs(sum_range: Range, criteria: &[(Range, &str)]) -> Self {
        Formula::SumIfs {
            sum_range,
            criteria: criteria
                .iter()
                .map(|(range, c)| (range.clone(), c.to_string()))
                .collect(),
        }
    }

    /// `IF(guard > 0, value, 0)`.
    pub fn if_positive(guard: Formula, value: Formula) -> Self {
        Formula::If {
            condition: Box::new(Condition {
                lhs: guard,
                op: CompareOp::Gt,
                rhs: Formula::Number(Decimal::ZERO),
            }),
            then: Box::new(value),
            otherwise: Box::new(Formula::Number(Decimal::ZERO)),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Formula::Binary { op, .. } => op.precedence(),
            Formula::Neg(_) => 3,
            _ => 4,
        }
    }

    /// Evaluate against `source`. Unqualified references resolve on `sheet`.
    pub fn evaluate(&self, source: &dyn CellSource, sheet: &str) -> Result<Decimal, GhgError> {
        match self {
            Formula::Number(n) => Ok(*n),
            Formula::Ref(r) => {
                let on = r.sheet.as_deref().unwrap_or(sheet);
                match source.value(on, r.cell.row, r.cell.col)? {
                    CellValue::Empty => Ok(Decimal::ZERO),
                    CellValue::Number(n) => Ok(n),
                    CellValue::Text(t) => Err(GhgError::Formula(format!(
                        "{r} on '{on}' holds text '{t}', expected a number"
                    ))),
                }
            }
            Formula::Neg(inner) => Ok(-inner.evaluate(source, sheet)?),
            Formula::Binary { op, lhs, rhs } => {
                let a = lhs.evaluate(source, sheet)?;
                let b = rhs.evaluate(source, sheet)?;
                let result = match op {
                    BinOp::Add => a.checked_add(b),
                    BinOp::Sub => a.checked_sub(b),
                    BinOp::Mul => a.checked_mul(b),
                    BinOp::Div if b.is_zero() => {
                        return Err(GhgError::Formula(format!("division by zero in {self}")));
                    }
                    BinOp::Div => a.checked_div(b),
                };
                result.ok_or_else(|| GhgError::Formula(format!("arithmetic overflow in {self}")))
            }
            Formula::Sum(range) => {
                let on = range.sheet.as_deref().unwrap_or(sheet);
                let mut total = Decimal::ZERO;
                for (row, col) in range.positions() {
                    if let CellValue::Number(n) = source.value(on, row, col)? {
                        total = self.accumulate(total, n)?;
                    }
                }
                Ok(total)
            }
            Formula::SumIf {
                range,
                criterion,
                sum_range,
            } => {
                let criterion = Criterion::parse(criterion);
                let on = range.sheet.as_deref().unwrap_or(sheet);
                let sum_on = sum_range.sheet.as_deref().unwrap_or(sheet);
                let (r0, c0) = range.top_left();
                let (s0, t0) = sum_range.top_left();

                let mut total = Decimal::ZERO;
                for (row, col) in range.positions() {
                    if !criterion.matches(&source.value(on, row, col)?) {
                        continue;
                    }
                    let target = source.value(sum_on, s0 + (row - r0), t0 + (col - c0))?;
                    if let CellValue::Number(n) = target {
                        total = self.accumulate(total, n)?;
                    }
                }
                Ok(total)
            }
            Formula::SumIfs {
                sum_range,
                criteria,
            } => {
                let sum_on = sum_range.sheet.as_deref().unwrap_or(sheet);
                let (s0, t0) = sum_range.top_left();
                let criteria: Vec<_> = criteria
                    .iter()
                    .map(|(range, c)| {
                        (
                            range.sheet.as_deref().unwrap_or(sheet),
                            range.top_left(),
                            Criterion::parse(c),
                        )
                    })
                    .collect();

                let mut total = Decimal::ZERO;
                'cells: for (row, col) in sum_range.positions() {
                    let (dr, dc) = (row - s0, col - t0);
                    for (on, (r0, c0), criterion) in &criteria {
                        if !criterion.matches(&source.value(on, r0 + dr, c0 + dc)?) {
                            continue 'cells;
                        }
                    }
                    if let CellValue::Number(n) = source.value(sum_on, row, col)? {
                        total = self.accumulate(total, n)?;
                    }
                }
                Ok(total)
            }
            Formula::If {
                condition,
                then,
                otherwise,
            } => {
                let a = condition.lhs.evaluate(source, sheet)?;
                let b = condition.rhs.evaluate(source, sheet)?;
                if condition.op.holds(a, b) {
                    then.evaluate(source, sheet)
                } else {
                    otherwise.evaluate(source, sheet)
                }
            }
        }
    }
}

impl Formula {
    fn accumulate(&self, total: Decimal, n: Decimal) -> Result<Decimal, GhgError> {
        total
            .checked_add(n)
            .ok_or_else(|| GhgError::Formula(format!("arithmetic overflow in {self}")))
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Formula, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Number(n) => write!(f, "{n}"),
            Formula::Ref(r) => write!(f, "{r}"),
            Formula::Neg(inner) => {
                f.write_str("-")?;
                write_operand(f, inner, inner.precedence() < 4)
            }
            Formula::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                write_operand(f, lhs, lhs.precedence() < p)?;
                write!(f, "{}", op.symbol())?;
                write_operand(f, rhs, rhs.precedence() <= p)
            }
            Formula::Sum(range) => write!(f, "SUM({range})"),
            Formula::SumIf {
                range,
                criterion,
                sum_range,
            } => write!(
                f,
                "SUMIF({range},\"{}\",{sum_range})",
                criterion.replace('"', "\"\"")
            ),
            Formula::SumIfs {
                sum_range,
                criteria,
            } => {
                write!(f, "SUMIFS({sum_range}")?;
                for (range, criterion) in criteria {
                    write!(f, ",{range},\"{}\"", criterion.replace('"', "\"\""))?;
                }
                f.write_str(")")
            }
            Formula::If {
                condition,
                then,
                otherwise,
            } => write!(
                f,
                "IF({}{}{},{then},{otherwise})",
                condition.lhs,
                condition.op.as_str(),
                condition.rhs
            ),
        }
    }
}

impl FromStr for Formula {
    type Err = GhgError;

    /// Parse formula text, with or without the leading `=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let text = text.strip_prefix('=').unwrap_or(text);
        let mut parser = Parser {
            tokens: tokenize(text)?,
            pos: 0,
        };
        let formula = parser.expr()?;
        if let Some(tok) = parser.tokens.get(parser.pos) {
            return Err(GhgError::Formula(format!(
                "unexpected {tok:?} after complete formula in '{s}'"
            )));
        }
        Ok(formula)
    }
}

/// Value of one cell as a formula sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(Decimal),
    Text(String),
}

/// Anything formulas can read cells from: the in-memory workbook model or a
/// workbook read back from disk.
pub trait CellSource {
    fn value(&self, sheet: &str, row: u32, col: u32) -> Result<CellValue, GhgError>;
}

/// A `SUMIF` criterion: case-insensitive, `*` and `?` wildcards with `~`
/// escapes, optional `=` or `<>` prefix.
struct Criterion {
    pattern: Vec<char>,
    negate: bool,
}

impl Criterion {
    fn parse(raw: &str) -> Self {
        let (negate, body) = match raw.strip_prefix("<>") {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('=').unwrap_or(raw)),
        };
        Self {
            pattern: body.to_lowercase().chars().collect(),
            negate,
        }
    }

    fn matches(&self, value: &CellValue) -> bool {
        let text = match value {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => n.normalize().to_string(),
            CellValue::Text(t) => t.to_lowercase(),
        };
        let chars: Vec<char> = text.chars().collect();
        wildcard_match(&self.pattern, &chars) != self.negate
    }
}

fn wildcard_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('~') if p + 1 < pattern.len() => {
                if pattern[p + 1] == text[t] {
                    p += 2;
                    t += 1;
                    continue;
                }
            }
            Some('*') => {
                star = Some((p, t));
                p += 1;
                continue;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }
        match star {
            Some((sp, st)) => {
                p = sp + 1;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Text(String),
    Sheet(String),
    Word(String),
    Punct(char),
    Compare(CompareOp),
}

fn tokenize(src: &str) -> Result<Vec<Token>, GhgError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' | '-' | '*' | '/' | '(' | ')' | ',' | ':' => {
                tokens.push(Token::Punct(c));
                i += 1;
            }
            '>' | '<' | '=' => {
                let (op, len) = match (c, chars.get(i + 1)) {
                    ('>', Some('=')) => (CompareOp::Ge, 2),
                    ('<', Some('=')) => (CompareOp::Le, 2),
                    ('<', Some('>')) => (CompareOp::Ne, 2),
                    ('>', _) => (CompareOp::Gt, 1),
                    ('<', _) => (CompareOp::Lt, 1),
                    _ => (CompareOp::Eq, 1),
                };
                tokens.push(Token::Compare(op));
                i += len;
            }
            '"' | '\'' => {
                let (text, next) = read_quoted(&chars, i, c)
                    .ok_or_else(|| GhgError::Formula(format!("unterminated {c} quote in '{src}'")))?;
                i = next;
                if c == '"' {
                    tokens.push(Token::Text(text));
                } else if chars.get(i) == Some(&'!') {
                    tokens.push(Token::Sheet(text));
                    i += 1;
                } else {
                    return Err(GhgError::Formula(format!(
                        "quoted sheet name '{text}' must be followed by '!'"
                    )));
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let n = Decimal::from_str(&literal)
                    .map_err(|_| GhgError::Formula(format!("invalid number '{literal}'")))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '$' || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '$' || chars[i] == '_')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if chars.get(i) == Some(&'!') {
                    tokens.push(Token::Sheet(word));
                    i += 1;
                } else {
                    tokens.push(Token::Word(word));
                }
            }
            other => {
                return Err(GhgError::Formula(format!(
                    "unexpected character '{other}' in '{src}'"
                )));
            }
        }
    }

    Ok(tokens)
}

/// Read a quoted literal starting at `open`, where a doubled quote is an
/// escaped quote. Returns the text and the index just past the close.
fn read_quoted(chars: &[char], open: usize, quote: char) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut i = open + 1;
    loop {
        let c = *chars.get(i)?;
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
            } else {
                return Some((text, i + 1));
            }
        } else {
            text.push(c);
            i += 1;
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek_punct(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Token::Punct(c)) => Some(*c),
            _ => None,
        }
    }

    fn next(&mut self) -> Result<Token, GhgError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| GhgError::Formula("formula ends unexpectedly".into()))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect_punct(&mut self, want: char) -> Result<(), GhgError> {
        match self.next()? {
            Token::Punct(c) if c == want => Ok(()),
            other => Err(GhgError::Formula(format!("expected '{want}', found {other:?}"))),
        }
    }

    fn expr(&mut self) -> Result<Formula, GhgError> {
        let mut lhs = self.term()?;
        while let Some(c @ ('+' | '-')) = self.peek_punct() {
            self.pos += 1;
            let op = if c == '+' { BinOp::Add } else { BinOp::Sub };
            lhs = Formula::binary(op, lhs, self.term()?);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Formula, GhgError> {
        let mut lhs = self.unary()?;
        while let Some(c @ ('*' | '/')) = self.peek_punct() {
            self.pos += 1;
            let op = if c == '*' { BinOp::Mul } else { BinOp::Div };
            lhs = Formula::binary(op, lhs, self.unary()?);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Formula, GhgError> {
        match self.peek_punct() {
            Some('-') => {
                self.pos += 1;
                Ok(match self.unary()? {
                    Formula::Number(n) => Formula::Number(-n),
                    other => Formula::Neg(Box::new(other)),
                })
            }
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Formula, GhgError> {
        match self.next()? {
            Token::Number(n) => Ok(Formula::Number(n)),
            Token::Punct('(') => {
                let inner = self.expr()?;
                self.expect_punct(')')?;
                Ok(inner)
            }
            Token::Sheet(sheet) => {
                let cell = self.cell_ref()?;
                Ok(Formula::Ref(Reference {
                    sheet: Some(sheet),
                    cell,
                }))
            }
            Token::Word(word) if self.peek_punct() == Some('(') => {
                self.pos += 1;
                let call = self.function(&word)?;
                self.expect_punct(')')?;
                Ok(call)
            }
            Token::Word(word) => Ok(Formula::Ref(Reference {
                sheet: None,
                cell: word.parse()?,
            })),
            other => Err(GhgError::Formula(format!("unexpected {other:?}"))),
        }
    }

    fn function(&mut self, name: &str) -> Result<Formula, GhgError> {
        match name.to_ascii_uppercase().as_str() {
            "SUM" => Ok(Formula::Sum(self.range()?)),
            "SUMIF" => {
                let range = self.range()?;
                self.expect_punct(',')?;
                let criterion = self.criterion("SUMIF")?;
                self.expect_punct(',')?;
                let sum_range = self.range()?;
                Ok(Formula::SumIf {
                    range,
                    criterion,
                    sum_range,
                })
            }
            "SUMIFS" => {
                let sum_range = self.range()?;
                let mut criteria = Vec::new();
                while self.peek_punct() == Some(',') {
                    self.pos += 1;
                    let range = self.range()?;
                    self.expect_punct(',')?;
                    criteria.push((range, self.criterion("SUMIFS")?));
                }
                if criteria.is_empty() {
                    return Err(GhgError::Formula("SUMIFS needs at least one criterion".into()));
                }
                Ok(Formula::SumIfs {
                    sum_range,
                    criteria,
                })
            }
            "IF" => {
                let lhs = self.expr()?;
                let op = match self.next()? {
                    Token::Compare(op) => op,
                    other => {
                        return Err(GhgError::Formula(format!(
                            "IF needs a comparison, found {other:?}"
                        )));
                    }
                };
                let rhs = self.expr()?;
                self.expect_punct(',')?;
                let then = self.expr()?;
                self.expect_punct(',')?;
                let otherwise = self.expr()?;
                Ok(Formula::If {
                    condition: Box::new(Condition { lhs, op, rhs }),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                })
            }
            other => Err(GhgError::Formula(format!("unsupported function {other}"))),
        }
    }

    fn criterion(&mut self, function: &str) -> Result<String, GhgError> {
        match self.next()? {
            Token::Text(t) => Ok(t),
            Token::Number(n) => Ok(n.to_string()),
            other => Err(GhgError::Formula(format!(
                "{function} criterion must be a literal, found {other:?}"
            ))),
        }
    }

    fn cell_ref(&mut self) -> Result<CellRef, GhgError> {
        match self.next()? {
            Token::Word(word) => word.parse(),
            other => Err(GhgError::Formula(format!(
                "expected a cell reference, found {other:?}"
            ))),
        }
    }

    fn range(&mut self) -> Result<Range, GhgError> {
        let sheet = match self.tokens.get(self.pos) {
            Some(Token::Sheet(name)) => {
                let name = name.clone();
                self.pos += 1;
                Some(name)
            }
            _ => None,
        };
        let start = self.cell_ref()?;
        let end = if self.peek_punct() == Some(':') {
            self.pos += 1;
            self.cell_ref()?
        } else {
            start
        };
        Ok(Range { sheet, start, end })
    }
}
