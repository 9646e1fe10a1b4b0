pub mod config;
pub mod console;
pub mod dataset;
pub mod draw;
pub mod error;
pub mod ffi;
pub mod import;
pub mod merge;
pub mod model;
pub mod prefs;
pub mod selection;
pub mod session;
pub mod xlsx;
