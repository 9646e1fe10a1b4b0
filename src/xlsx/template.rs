use std::io::Cursor;
use std::path::Path;

use anyhow::Context;

use crate::import::{template_rows, TableRow};
use crate::xlsx::package::write_package;
use crate::xlsx::sheet::{WORKBOOK_PART, WORKBOOK_RELS_PART};
use crate::xlsx::xml::{write_xml_part, XmlEvent, XmlPart};

pub const TEMPLATE_SHEET_NAME: &str = "Flashcard Template";
pub const TEMPLATE_FILE_NAME: &str = "Flashcard_Template.xlsx";

const SHEET_PART: &str = "xl/worksheets/sheet1.xml";
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const REL_OFFICE_DOC: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

fn decl() -> XmlEvent {
    XmlEvent::Decl {
        version: "1.0".to_string(),
        encoding: Some("UTF-8".to_string()),
        standalone: Some("yes".to_string()),
    }
}

fn part(name: &str, events: Vec<XmlEvent>) -> (String, Vec<u8>) {
    let bytes = write_xml_part(&XmlPart {
        name: name.to_string(),
        events,
    });
    (name.to_string(), bytes)
}

fn content_types() -> (String, Vec<u8>) {
    part(
        "[Content_Types].xml",
        vec![
            decl(),
            XmlEvent::start("Types", &[("xmlns", NS_TYPES)]),
            XmlEvent::empty(
                "Default",
                &[
                    ("Extension", "rels"),
                    ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
                ],
            ),
            XmlEvent::empty(
                "Default",
                &[("Extension", "xml"), ("ContentType", "application/xml")],
            ),
            XmlEvent::empty(
                "Override",
                &[
                    ("PartName", "/xl/workbook.xml"),
                    (
                        "ContentType",
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
                    ),
                ],
            ),
            XmlEvent::empty(
                "Override",
                &[
                    ("PartName", "/xl/worksheets/sheet1.xml"),
                    (
                        "ContentType",
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
                    ),
                ],
            ),
            XmlEvent::end("Types"),
        ],
    )
}

fn relationships(name: &str, rel_type: &str, target: &str) -> (String, Vec<u8>) {
    part(
        name,
        vec![
            decl(),
            XmlEvent::start("Relationships", &[("xmlns", NS_PKG_REL)]),
            XmlEvent::empty(
                "Relationship",
                &[("Id", "rId1"), ("Type", rel_type), ("Target", target)],
            ),
            XmlEvent::end("Relationships"),
        ],
    )
}

fn workbook(sheet_name: &str) -> (String, Vec<u8>) {
    part(
        WORKBOOK_PART,
        vec![
            decl(),
            XmlEvent::start("workbook", &[("xmlns", NS_MAIN), ("xmlns:r", NS_REL)]),
            XmlEvent::start("sheets", &[]),
            XmlEvent::empty(
                "sheet",
                &[("name", sheet_name), ("sheetId", "1"), ("r:id", "rId1")],
            ),
            XmlEvent::end("sheets"),
            XmlEvent::end("workbook"),
        ],
    )
}

fn worksheet(rows: &[TableRow]) -> (String, Vec<u8>) {
    let mut events = vec![
        decl(),
        XmlEvent::start("worksheet", &[("xmlns", NS_MAIN)]),
        XmlEvent::start("sheetData", &[]),
    ];
    for (i, row) in rows.iter().enumerate() {
        let row_num = (i + 1).to_string();
        events.push(XmlEvent::start("row", &[("r", row_num.as_str())]));
        for (column, value) in [("A", &row.category), ("B", &row.leaf)] {
            let Some(value) = value else {
                continue;
            };
            let cell_ref = format!("{column}{row_num}");
            events.push(XmlEvent::start(
                "c",
                &[("r", cell_ref.as_str()), ("t", "inlineStr")],
            ));
            events.push(XmlEvent::start("is", &[]));
            events.push(XmlEvent::start("t", &[("xml:space", "preserve")]));
            events.push(XmlEvent::text(value));
            events.push(XmlEvent::end("t"));
            events.push(XmlEvent::end("is"));
            events.push(XmlEvent::end("c"));
        }
        events.push(XmlEvent::end("row"));
    }
    events.push(XmlEvent::end("sheetData"));
    events.push(XmlEvent::end("worksheet"));
    part(SHEET_PART, events)
}

/// Builds a one-sheet `.xlsx` holding `rows` in columns A and B, using inline strings.
pub fn workbook_bytes_from_rows(sheet_name: &str, rows: &[TableRow]) -> anyhow::Result<Vec<u8>> {
    let parts = vec![
        content_types(),
        relationships("_rels/.rels", REL_OFFICE_DOC, "xl/workbook.xml"),
        workbook(sheet_name),
        relationships(WORKBOOK_RELS_PART, REL_WORKSHEET, "worksheets/sheet1.xml"),
        worksheet(rows),
    ];
    let out = write_package(Cursor::new(Vec::new()), &parts).context("build workbook")?;
    Ok(out.into_inner())
}

pub fn template_workbook_bytes() -> anyhow::Result<Vec<u8>> {
    workbook_bytes_from_rows(TEMPLATE_SHEET_NAME, &template_rows())
}

pub fn write_template_workbook(path: &Path) -> anyhow::Result<()> {
    let bytes = template_workbook_bytes()?;
    std::fs::write(path, bytes)
        .with_context(|| format!("write template workbook: {}", path.display()))?;
    Ok(())
}
