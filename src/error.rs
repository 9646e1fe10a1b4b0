use std::path::PathBuf;

use thiserror::Error;

use crate::model::Axis;

/// The dataset document could not be read or did not have the expected shape.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("read dataset {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset {} has an invalid shape: {source}", path.display())]
    Shape {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("dataset {} is malformed: {source}", path.display())]
    Model {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
}

/// A spreadsheet upload could not be turned into groups.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("read workbook {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a readable workbook archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("workbook part missing: {0}")]
    MissingPart(String),
    #[error("invalid xml in {part}: {message}")]
    Xml { part: String, message: String },
    #[error("workbook part {part} is larger than {limit} bytes once decompressed")]
    TooLarge { part: String, limit: u64 },
    #[error("workbook has no sheets")]
    NoSheet,
    #[error("first sheet has no categories (expected a category row followed by topic rows)")]
    NoCategories,
    #[error("imported groups are malformed: {0}")]
    Model(#[from] ModelError),
}

/// A draw or a toggle could not be applied to the current selection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("{}", no_items_message(.0))]
    NoEligibleItems(Axis),
    #[error("no {axis} category or item at \"{path}\"")]
    UnknownPath { axis: Axis, path: String },
}

fn no_items_message(axis: &Axis) -> &'static str {
    match axis {
        Axis::Content => "Please select at least one content card.",
        Axis::Function => "Please select at least one instruction card.",
    }
}

/// A group fragment violates the tree invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("empty category name under \"{parent}\"")]
    EmptyCategoryName { parent: String },
}
