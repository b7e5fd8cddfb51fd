//! Messages exchanged across threads and systems.
//!
//! Submodules:
//! - [`sheetload`] – commands and results of the background sheet loader
pub mod sheetload;
