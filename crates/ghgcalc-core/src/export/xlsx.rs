use crate::error::GhgError;
use crate::export::formula::{column_name, CellRef};
use crate::export::workbook::{Cell, CellContent, CellStyle, Sheet, Workbook};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt::Display;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_DOC_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const CT_WORKBOOK: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_WORKSHEET: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";

/// Custom number format id for `0.0000`; `0.00` is built-in id 2.
const FMT_FOUR_DP: u32 = 164;
const FMT_TWO_DP: u32 = 2;

fn failed<E: Display>(part: &str) -> impl FnOnce(E) -> GhgError + '_ {
    move |e| GhgError::Export {
        part: part.to_string(),
        reason: e.to_string(),
    }
}

/// One XML part being written.
struct Part {
    name: String,
    writer: Writer<Cursor<Vec<u8>>>,
}

impl Part {
    fn new(name: &str) -> Result<Self, GhgError> {
        let mut part = Self {
            name: name.to_string(),
            writer: Writer::new(Cursor::new(Vec::new())),
        };
        part.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(part)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), GhgError> {
        self.writer.write_event(event).map_err(failed(&self.name))
    }

    fn start(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), GhgError> {
        let el = BytesStart::new(tag).with_attributes(attrs.iter().copied());
        self.event(Event::Start(el))
    }

    fn end(&mut self, tag: &str) -> Result<(), GhgError> {
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), GhgError> {
        let el = BytesStart::new(tag).with_attributes(attrs.iter().copied());
        self.event(Event::Empty(el))
    }

    fn text_elem(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), GhgError> {
        self.start(tag, attrs)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(tag)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }
}

/// Serialize a workbook model as xlsx bytes.
///
/// The archive is assembled in an in-memory buffer that is dropped on any
/// error, so callers never see a partial workbook.
pub fn write_xlsx(book: &Workbook) -> Result<Vec<u8>, GhgError> {
    let mut parts: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".into(), content_types(book.sheets.len())?),
        ("_rels/.rels".into(), package_rels()?),
        ("xl/workbook.xml".into(), workbook_xml(book)?),
        ("xl/_rels/workbook.xml.rels".into(), workbook_rels(book.sheets.len())?),
        ("xl/styles.xml".into(), styles_xml()?),
    ];
    for (idx, sheet) in book.sheets.iter().enumerate() {
        let name = format!("xl/worksheets/sheet{}.xml", idx + 1);
        let xml = sheet_xml(&name, sheet)?;
        parts.push((name, xml));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in &parts {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name.as_str(), options)
            .map_err(failed(name))?;
        zip.write_all(bytes).map_err(failed(name))?;
    }
    let cursor = zip.finish().map_err(failed("zip archive"))?;

    tracing::debug!(
        sheets = book.sheets.len(),
        parts = parts.len(),
        "workbook serialized"
    );
    Ok(cursor.into_inner())
}

fn content_types(sheet_count: usize) -> Result<Vec<u8>, GhgError> {
    let mut p = Part::new("[Content_Types].xml")?;
    p.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    p.empty("Default", &[("Extension", "rels"), ("ContentType", CT_RELS)])?;
    p.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    p.empty(
        "Override",
        &[("PartName", "/xl/workbook.xml"), ("ContentType", CT_WORKBOOK)],
    )?;
    for n in 1..=sheet_count {
        let part_name = format!("/xl/worksheets/sheet{n}.xml");
        p.empty(
            "Override",
            &[("PartName", part_name.as_str()), ("ContentType", CT_WORKSHEET)],
        )?;
    }
    p.empty(
        "Override",
        &[("PartName", "/xl/styles.xml"), ("ContentType", CT_STYLES)],
    )?;
    p.end("Types")?;
    Ok(p.finish())
}

fn package_rels() -> Result<Vec<u8>, GhgError> {
    let mut p = Part::new("_rels/.rels")?;
    p.start("Relationships", &[("xmlns", NS_PKG_REL)])?;
    let office_document = format!("{NS_DOC_REL}/officeDocument");
    p.empty(
        "Relationship",
        &[
            ("Id", "rId1"),
            ("Type", office_document.as_str()),
            ("Target", "xl/workbook.xml"),
        ],
    )?;
    p.end("Relationships")?;
    Ok(p.finish())
}

fn workbook_xml(book: &Workbook) -> Result<Vec<u8>, GhgError> {
    let mut p = Part::new("xl/workbook.xml")?;
    p.start("workbook", &[("xmlns", NS_MAIN), ("xmlns:r", NS_DOC_REL)])?;
    p.start("sheets", &[])?;
    for (idx, sheet) in book.sheets.iter().enumerate() {
        let sheet_id = (idx + 1).to_string();
        let rel_id = format!("rId{}", idx + 1);
        p.empty(
            "sheet",
            &[
                ("name", sheet.name.as_str()),
                ("sheetId", sheet_id.as_str()),
                ("r:id", rel_id.as_str()),
            ],
        )?;
    }
    p.end("sheets")?;
    // Cached values are provided, but ask the application to recompute.
    p.empty("calcPr", &[("calcId", "0"), ("fullCalcOnLoad", "1")])?;
    p.end("workbook")?;
    Ok(p.finish())
}

fn workbook_rels(sheet_count: usize) -> Result<Vec<u8>, GhgError> {
    let mut p = Part::new("xl/_rels/workbook.xml.rels")?;
    p.start("Relationships", &[("xmlns", NS_PKG_REL)])?;
    let worksheet_type = format!("{NS_DOC_REL}/worksheet");
    for n in 1..=sheet_count {
        let id = format!("rId{n}");
        let target = format!("worksheets/sheet{n}.xml");
        p.empty(
            "Relationship",
            &[
                ("Id", id.as_str()),
                ("Type", worksheet_type.as_str()),
                ("Target", target.as_str()),
            ],
        )?;
    }
    let styles_id = format!("rId{}", sheet_count + 1);
    let styles_type = format!("{NS_DOC_REL}/styles");
    p.empty(
        "Relationship",
        &[
            ("Id", styles_id.as_str()),
            ("Type", styles_type.as_str()),
            ("Target", "styles.xml"),
        ],
    )?;
    p.end("Relationships")?;
    Ok(p.finish())
}

struct XfSpec {
    num_fmt: u32,
    font: u32,
    fill: u32,
    border: u32,
    centered: bool,
}

fn xf_spec(style: CellStyle) -> XfSpec {
    let (num_fmt, font, fill, border, centered) = match style {
        CellStyle::Default => (0, 0, 0, 0, false),
        CellStyle::Header => (0, 1, 2, 1, true),
        CellStyle::Title => (0, 2, 0, 0, true),
        CellStyle::Bold => (0, 3, 0, 0, false),
        CellStyle::Text => (0, 0, 0, 1, false),
        CellStyle::Amount4 => (FMT_FOUR_DP, 0, 0, 1, false),
        CellStyle::Amount2 => (FMT_TWO_DP, 0, 0, 1, false),
        CellStyle::TotalAmount2 => (FMT_TWO_DP, 3, 0, 1, false),
    };
    XfSpec {
        num_fmt,
        font,
        fill,
        border,
        centered,
    }
}

fn write_font(p: &mut Part, bold: bool, size: &str, color: Option<&str>) -> Result<(), GhgError> {
    p.start("font", &[])?;
    if bold {
        p.empty("b", &[])?;
    }
    p.empty("sz", &[("val", size)])?;
    if let Some(rgb) = color {
        p.empty("color", &[("rgb", rgb)])?;
    }
    p.empty("name", &[("val", "Calibri")])?;
    p.end("font")
}

fn styles_xml() -> Result<Vec<u8>, GhgError> {
    let mut p = Part::new("xl/styles.xml")?;
    p.start("styleSheet", &[("xmlns", NS_MAIN)])?;

    p.start("numFmts", &[("count", "1")])?;
    let four_dp = FMT_FOUR_DP.to_string();
    p.empty(
        "numFmt",
        &[("numFmtId", four_dp.as_str()), ("formatCode", "0.0000")],
    )?;
    p.end("numFmts")?;

    p.start("fonts", &[("count", "4")])?;
    write_font(&mut p, false, "11", None)?;
    write_font(&mut p, true, "11", Some("FFFFFFFF"))?;
    write_font(&mut p, true, "16", Some("FFE74C3C"))?;
    write_font(&mut p, true, "12", None)?;
    p.end("fonts")?;

    p.start("fills", &[("count", "3")])?;
    for pattern in ["none", "gray125"] {
        p.start("fill", &[])?;
        p.empty("patternFill", &[("patternType", pattern)])?;
        p.end("fill")?;
    }
    p.start("fill", &[])?;
    p.start("patternFill", &[("patternType", "solid")])?;
    p.empty("fgColor", &[("rgb", "FFE74C3C")])?;
    p.empty("bgColor", &[("indexed", "64")])?;
    p.end("patternFill")?;
    p.end("fill")?;
    p.end("fills")?;

    p.start("borders", &[("count", "2")])?;
    p.start("border", &[])?;
    for side in ["left", "right", "top", "bottom", "diagonal"] {
        p.empty(side, &[])?;
    }
    p.end("border")?;
    p.start("border", &[])?;
    for side in ["left", "right", "top", "bottom"] {
        p.start(side, &[("style", "thin")])?;
        p.empty("color", &[("indexed", "64")])?;
        p.end(side)?;
    }
    p.empty("diagonal", &[])?;
    p.end("border")?;
    p.end("borders")?;

    p.start("cellStyleXfs", &[("count", "1")])?;
    p.empty(
        "xf",
        &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0")],
    )?;
    p.end("cellStyleXfs")?;

    let count = CellStyle::ALL.len().to_string();
    p.start("cellXfs", &[("count", count.as_str())])?;
    for style in CellStyle::ALL {
        let xf = xf_spec(style);
        let (num_fmt, font, fill, border) = (
            xf.num_fmt.to_string(),
            xf.font.to_string(),
            xf.fill.to_string(),
            xf.border.to_string(),
        );
        let mut attrs = vec![
            ("numFmtId", num_fmt.as_str()),
            ("fontId", font.as_str()),
            ("fillId", fill.as_str()),
            ("borderId", border.as_str()),
            ("xfId", "0"),
        ];
        for (flag, set) in [
            ("applyNumberFormat", xf.num_fmt != 0),
            ("applyFont", xf.font != 0),
            ("applyFill", xf.fill != 0),
            ("applyBorder", xf.border != 0),
            ("applyAlignment", xf.centered),
        ] {
            if set {
                attrs.push((flag, "1"));
            }
        }
        if xf.centered {
            p.start("xf", &attrs)?;
            p.empty("alignment", &[("horizontal", "center"), ("vertical", "center")])?;
            p.end("xf")?;
        } else {
            p.empty("xf", &attrs)?;
        }
    }
    p.end("cellXfs")?;

    p.start("cellStyles", &[("count", "1")])?;
    p.empty(
        "cellStyle",
        &[("name", "Normal"), ("xfId", "0"), ("builtinId", "0")],
    )?;
    p.end("cellStyles")?;

    p.end("styleSheet")?;
    Ok(p.finish())
}

fn sheet_xml(part_name: &str, sheet: &Sheet) -> Result<Vec<u8>, GhgError> {
    let mut p = Part::new(part_name)?;
    p.start("worksheet", &[("xmlns", NS_MAIN), ("xmlns:r", NS_DOC_REL)])?;

    let dimension = match sheet.extent() {
        Some((row, col)) => format!("A1:{}", CellRef::new(row, col)),
        None => "A1".to_string(),
    };
    p.empty("dimension", &[("ref", dimension.as_str())])?;

    if !sheet.column_widths.is_empty() {
        p.start("cols", &[])?;
        for &(col, width) in &sheet.column_widths {
            let n = (col + 1).to_string();
            let width = width.to_string();
            p.empty(
                "col",
                &[
                    ("min", n.as_str()),
                    ("max", n.as_str()),
                    ("width", width.as_str()),
                    ("customWidth", "1"),
                ],
            )?;
        }
        p.end("cols")?;
    }

    p.start("sheetData", &[])?;
    let mut open_row: Option<u32> = None;
    for (&(row, col), cell) in &sheet.cells {
        if open_row != Some(row) {
            if open_row.is_some() {
                p.end("row")?;
            }
            let r = (row + 1).to_string();
            p.start("row", &[("r", r.as_str())])?;
            open_row = Some(row);
        }
        write_cell(&mut p, row, col, cell)?;
    }
    if open_row.is_some() {
        p.end("row")?;
    }
    p.end("sheetData")?;

    if !sheet.merges.is_empty() {
        let count = sheet.merges.len().to_string();
        p.start("mergeCells", &[("count", count.as_str())])?;
        for (from, to) in &sheet.merges {
            let range = format!("{from}:{to}");
            p.empty("mergeCell", &[("ref", range.as_str())])?;
        }
        p.end("mergeCells")?;
    }

    p.end("worksheet")?;
    Ok(p.finish())
}

fn write_cell(p: &mut Part, row: u32, col: u32, cell: &Cell) -> Result<(), GhgError> {
    let reference = format!("{}{}", column_name(col), row + 1);
    let style = cell.style.xf_index().to_string();

    match &cell.content {
        CellContent::Text(text) => {
            p.start(
                "c",
                &[
                    ("r", reference.as_str()),
                    ("s", style.as_str()),
                    ("t", "inlineStr"),
                ],
            )?;
            p.start("is", &[])?;
            if text.trim() != text {
                p.text_elem("t", &[("xml:space", "preserve")], text)?;
            } else {
                p.text_elem("t", &[], text)?;
            }
            p.end("is")?;
            p.end("c")
        }
        CellContent::Number(n) => {
            p.start("c", &[("r", reference.as_str()), ("s", style.as_str())])?;
            p.text_elem("v", &[], &n.to_string())?;
            p.end("c")
        }
        CellContent::Formula { formula, cached } => {
            p.start("c", &[("r", reference.as_str()), ("s", style.as_str())])?;
            p.text_elem("f", &[], &formula.to_string())?;
            if let Some(value) = cached {
                p.text_elem("v", &[], &value.to_string())?;
            }
            p.end("c")
        }
    }
}
