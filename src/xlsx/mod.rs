pub mod package;
pub mod sheet;
pub mod template;
pub mod xml;
