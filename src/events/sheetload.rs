//! Messages exchanged with the background sheet loader thread.

use std::path::PathBuf;

use crate::resources::spriteappearances::SheetError;

/// Commands sent *to* the loader thread.
#[derive(Debug, Clone)]
pub enum SheetLoadCmd {
    Load { index: usize, path: PathBuf },
    Shutdown,
}

/// Results sent *back* from the loader thread.
#[derive(Clone)]
pub enum SheetLoadMessage {
    Decoded { index: usize, data: Vec<u8> },
    Failed { index: usize, error: SheetError },
}

impl std::fmt::Debug for SheetLoadMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetLoadMessage::Decoded { index, data } => f
                .debug_struct("Decoded")
                .field("index", index)
                .field("bytes", &data.len())
                .finish(),
            SheetLoadMessage::Failed { index, error } => f
                .debug_struct("Failed")
                .field("index", index)
                .field("error", error)
                .finish(),
        }
    }
}
