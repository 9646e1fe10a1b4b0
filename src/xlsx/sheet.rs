use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ImportError;
use crate::import::TableRow;
use crate::xlsx::package::WorkbookPackage;
use crate::xlsx::xml::{find_attr, local_name, parse_xml_part, XmlEvent};

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
pub const FIRST_SHEET_FALLBACK: &str = "xl/worksheets/sheet1.xml";

static CELL_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?(\d+)$").expect("cell ref regex"));

// Excel escapes control characters in strings as `_xHHHH_`.
static ESCAPED_CHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_x([0-9A-Fa-f]{4})_").expect("escaped char regex"));

/// Zero-based column index of a reference such as `B12` (`1`).
pub fn column_index(cell_ref: &str) -> Option<usize> {
    let caps = CELL_REF_RE.captures(cell_ref.trim())?;
    let letters = caps.get(1)?.as_str();
    let mut col = 0usize;
    for ch in letters.chars() {
        col = col * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(col - 1)
}

fn decode_escaped_chars(text: &str) -> String {
    if !text.contains("_x") {
        return text.to_string();
    }
    ESCAPED_CHAR_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Returns the package path of the first sheet listed in the workbook.
pub fn first_sheet_part(pkg: &WorkbookPackage) -> Result<String, ImportError> {
    let workbook = parse_xml_part(WORKBOOK_PART, pkg.require(WORKBOOK_PART)?)?;
    let rel_id = workbook
        .events
        .iter()
        .find_map(|ev| match ev {
            XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs }
                if local_name(name) == "sheet" =>
            {
                Some(
                    attrs
                        .iter()
                        .find(|(k, _)| local_name(k) == "id" && k.contains(':'))
                        .map(|(_, v)| v.clone()),
                )
            }
            _ => None,
        })
        .ok_or(ImportError::NoSheet)?;

    let Some(rel_id) = rel_id else {
        return Ok(FIRST_SHEET_FALLBACK.to_string());
    };
    let Some(rels_bytes) = pkg.part(WORKBOOK_RELS_PART) else {
        return Ok(FIRST_SHEET_FALLBACK.to_string());
    };
    let rels = parse_xml_part(WORKBOOK_RELS_PART, rels_bytes)?;
    let target = rels.events.iter().find_map(|ev| match ev {
        XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs }
            if local_name(name) == "Relationship" && find_attr(attrs, "Id") == Some(rel_id.as_str()) =>
        {
            find_attr(attrs, "Target").map(str::to_string)
        }
        _ => None,
    });
    Ok(match target {
        Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
        Some(t) => format!("xl/{}", t.trim_start_matches("./")),
        None => FIRST_SHEET_FALLBACK.to_string(),
    })
}

pub fn read_shared_strings(pkg: &WorkbookPackage) -> Result<Vec<String>, ImportError> {
    let Some(bytes) = pkg.part(SHARED_STRINGS_PART) else {
        return Ok(Vec::new());
    };
    let part = parse_xml_part(SHARED_STRINGS_PART, bytes)?;

    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    // Phonetic runs (`rPh`) carry furigana, not cell text.
    let mut phonetic_depth = 0usize;
    for ev in &part.events {
        match ev {
            XmlEvent::Start { name, .. } => match local_name(name) {
                "si" => current = Some(String::new()),
                "rPh" => phonetic_depth += 1,
                "t" => in_t = phonetic_depth == 0,
                _ => {}
            },
            XmlEvent::Empty { name, .. } if local_name(name) == "si" => out.push(String::new()),
            XmlEvent::End { name } => match local_name(name) {
                "si" => out.push(decode_escaped_chars(&current.take().unwrap_or_default())),
                "rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                "t" => in_t = false,
                _ => {}
            },
            XmlEvent::Text { text } if in_t => {
                if let Some(cur) = current.as_mut() {
                    cur.push_str(text);
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

#[derive(Default)]
struct CellState {
    column: usize,
    kind: String,
    value: String,
    inline: String,
}

impl CellState {
    fn resolve(self, shared: &[String], part: &str) -> Result<String, ImportError> {
        let text = match self.kind.as_str() {
            "s" => {
                let index = self.value.trim();
                index
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| shared.get(i).cloned())
                    .ok_or_else(|| ImportError::Xml {
                        part: part.to_string(),
                        message: format!(
                            "shared string index \"{index}\" is outside the {} shared strings",
                            shared.len()
                        ),
                    })?
            }
            "inlineStr" => self.inline,
            "b" => match self.value.trim() {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                other => other.to_string(),
            },
            _ => self.value,
        };
        Ok(decode_escaped_chars(&text))
    }
}

/// Reads the first two columns of every row of the first sheet, in document order.
pub fn read_first_sheet_rows(pkg: &WorkbookPackage) -> Result<Vec<TableRow>, ImportError> {
    let sheet_name = first_sheet_part(pkg)?;
    let shared = read_shared_strings(pkg)?;
    let part = parse_xml_part(&sheet_name, pkg.require(&sheet_name)?)?;

    let mut rows = Vec::new();
    let mut cells: [Option<String>; 2] = [None, None];
    let mut next_column = 0usize;
    let mut cell: Option<CellState> = None;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut phonetic_depth = 0usize;

    for ev in &part.events {
        match ev {
            XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs } => {
                let is_empty = matches!(ev, XmlEvent::Empty { .. });
                match local_name(name) {
                    "row" => {
                        cells = [None, None];
                        next_column = 0;
                        if is_empty {
                            rows.push(TableRow::default());
                        }
                    }
                    "c" => {
                        let column = find_attr(attrs, "r")
                            .and_then(column_index)
                            .unwrap_or(next_column);
                        next_column = column + 1;
                        if !is_empty {
                            cell = Some(CellState {
                                column,
                                kind: find_attr(attrs, "t").unwrap_or("n").to_string(),
                                ..CellState::default()
                            });
                        }
                    }
                    "v" if !is_empty => in_value = true,
                    "rPh" if !is_empty => phonetic_depth += 1,
                    "t" if !is_empty => in_inline_text = phonetic_depth == 0,
                    _ => {}
                }
            }
            XmlEvent::End { name } => match local_name(name) {
                "v" => in_value = false,
                "t" => in_inline_text = false,
                "rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                "c" => {
                    if let Some(done) = cell.take() {
                        let column = done.column;
                        if column < cells.len() {
                            cells[column] = Some(done.resolve(&shared, &sheet_name)?);
                        }
                    }
                }
                "row" => {
                    let [category, leaf] = std::mem::take(&mut cells);
                    rows.push(TableRow::from_cells(category, leaf));
                }
                _ => {}
            },
            XmlEvent::Text { text } => {
                if let Some(c) = cell.as_mut() {
                    if in_value {
                        c.value.push_str(text);
                    } else if in_inline_text {
                        c.inline.push_str(text);
                    }
                }
            }
            XmlEvent::Decl { .. } => {}
        }
    }
    Ok(rows)
}
