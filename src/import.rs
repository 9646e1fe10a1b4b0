use std::path::Path;

use crate::error::ImportError;
use crate::model::{mark_uploaded, GroupModel, GroupTree, Node};
use crate::xlsx::package::WorkbookPackage;
use crate::xlsx::sheet::read_first_sheet_rows;

/// A first-column value that switches the rest of the table to function groups.
pub const FUNCTIONS_MARKER: &str = "Functions";

/// One spreadsheet row, reduced to its first two columns. Cells are trimmed and empty cells are
/// `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableRow {
    pub category: Option<String>,
    pub leaf: Option<String>,
}

impl TableRow {
    pub fn new(category: &str, leaf: &str) -> Self {
        Self::from_cells(Some(category.to_string()), Some(leaf.to_string()))
    }

    pub fn from_cells(category: Option<String>, leaf: Option<String>) -> Self {
        Self {
            category: normalize_cell(category),
            leaf: normalize_cell(leaf),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.category.is_none() && self.leaf.is_none()
    }
}

fn normalize_cell(cell: Option<String>) -> Option<String> {
    let cell = cell?;
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == cell.len() {
        Some(cell)
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Content,
    Function,
}

/// Turns a two-column table into an uploaded group fragment.
///
/// A row with only a first cell opens a category, rows with a second cell add that cell to the
/// open category (whatever the first cell holds), and a `Functions` row moves every later
/// category to the function axis. Blank rows and items with no open category are ignored, which
/// drops the header rows since they sit at the top and right after `Functions`.
pub fn parse_rows<I>(rows: I) -> GroupModel
where
    I: IntoIterator<Item = TableRow>,
{
    let mut content = GroupTree::new();
    let mut function = GroupTree::new();
    let mut section = Section::Content;
    let mut current: Option<String> = None;

    for row in rows {
        if row.is_blank() {
            continue;
        }
        if row.category.as_deref() == Some(FUNCTIONS_MARKER) {
            section = Section::Function;
            current = None;
            continue;
        }
        let tree = match section {
            Section::Content => &mut content,
            Section::Function => &mut function,
        };
        match (row.category, row.leaf) {
            (Some(category), None) => {
                let name = mark_uploaded(&category);
                tree.insert(name.clone(), Node::Leaves(Vec::new()));
                current = Some(name);
            }
            (_, Some(leaf)) => {
                if let Some(items) = current.as_deref().and_then(|name| tree.leaves_mut(name)) {
                    items.push(leaf);
                }
            }
            (None, None) => {}
        }
    }

    GroupModel::from_trees(content, function)
}

/// Reads the first sheet of an `.xlsx` workbook into an uploaded group fragment.
///
/// A workbook that parses but yields no categories at all is rejected, so a wrong file never
/// reaches the merge step.
pub fn import_workbook_bytes(bytes: &[u8]) -> Result<GroupModel, ImportError> {
    let pkg = WorkbookPackage::from_bytes(bytes)?;
    let rows = read_first_sheet_rows(&pkg)?;
    let fragment = parse_rows(rows);
    if fragment.is_empty() {
        return Err(ImportError::NoCategories);
    }
    fragment.validate()?;
    Ok(fragment)
}

pub fn import_workbook(path: &Path) -> Result<GroupModel, ImportError> {
    let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    import_workbook_bytes(&bytes)
}

/// The example table offered for download. Importing it yields two content categories with two
/// topics each and one function category with two instructions.
pub fn template_rows() -> Vec<TableRow> {
    let r = TableRow::new;
    vec![
        r("Content Group", "Topic"),
        r("Greek History", ""),
        r("", "The Battle of Marathon"),
        r("", "The Battle of Salamis"),
        r("Roman History", ""),
        r("", "Caesar\u{2019}s Assassination"),
        r("", "Augustus\u{2019} Reforms"),
        r(FUNCTIONS_MARKER, ""),
        r("Function Group", "Function Instruction"),
        r("Summarisation", ""),
        r("", "Summarise in 3 bullet points"),
        r("", "Write a 5-minute paragraph"),
    ]
}
