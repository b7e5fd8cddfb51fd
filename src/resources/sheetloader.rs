//! Bridge between the owning thread and the background sheet decoder.
//!
//! Use [`setup_sheet_loader`] once during initialization to spawn the loader
//! thread and insert the [`SheetLoader`] resource. Call
//! [`shutdown_sheet_loader`] during teardown to stop and join it.
//!
//! The thread only reads and decodes; decoded atlases come back over a
//! channel and are installed into [`SpriteAppearances`] by
//! [`SheetLoader::drain_into`] on the owning thread.

use std::path::PathBuf;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};
use rustc_hash::FxHashSet;

use crate::events::sheetload::{SheetLoadCmd, SheetLoadMessage};
use crate::resources::graphicmanager::GraphicManager;
use crate::resources::spriteappearances::{SheetSource, SpriteAppearances};
use crate::systems::sheetloader::sheet_loader_thread;

/// Channels and join handle of the loader thread.
#[derive(Resource)]
pub struct SheetLoader {
    tx_cmd: Sender<SheetLoadCmd>,
    rx_msg: Receiver<SheetLoadMessage>,
    handle: Option<std::thread::JoinHandle<()>>,
    pending: FxHashSet<usize>,
}

impl SheetLoader {
    /// Start a loader thread reading through `source`.
    pub fn spawn(source: Arc<dyn SheetSource>) -> Self {
        let (tx_cmd, rx_cmd) = unbounded::<SheetLoadCmd>();
        let (tx_msg, rx_msg) = unbounded::<SheetLoadMessage>();

        let handle = std::thread::spawn(move || sheet_loader_thread(source, rx_cmd, tx_msg));

        Self {
            tx_cmd,
            rx_msg,
            handle: Some(handle),
            pending: FxHashSet::default(),
        }
    }

    /// Queue a decode of sheet `index`. Returns false if it is already queued.
    pub fn request(&mut self, index: usize, path: PathBuf) -> bool {
        if !self.pending.insert(index) {
            return false;
        }
        if self.tx_cmd.send(SheetLoadCmd::Load { index, path }).is_err() {
            warn!("Sheet loader thread is gone, dropping request for sheet {}", index);
            self.pending.remove(&index);
            return false;
        }
        true
    }

    /// Queue the sheet holding `sprite_id` unless it is already decoded.
    pub fn request_sprite(&mut self, appearances: &SpriteAppearances, sprite_id: u32) -> bool {
        let Some(index) = appearances.sheet_index(sprite_id) else {
            return false;
        };
        let sheet = &appearances.sheets()[index];
        if sheet.is_loaded() {
            return false;
        }
        self.request(index, sheet.path.clone())
    }

    /// Number of requests still in flight.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn install(&mut self, msg: SheetLoadMessage, appearances: &mut SpriteAppearances) -> bool {
        match msg {
            SheetLoadMessage::Decoded { index, data } => {
                self.pending.remove(&index);
                let installed = appearances.install_decoded_sheet(index, data);
                if installed {
                    debug!("Installed background decode of sheet {}", index);
                }
                installed
            }
            SheetLoadMessage::Failed { index, error } => {
                self.pending.remove(&index);
                warn!("Background decode of sheet {} failed: {}", index, error);
                false
            }
        }
    }

    /// Install every finished decode. Returns how many sheets were installed.
    pub fn drain_into(&mut self, appearances: &mut SpriteAppearances) -> usize {
        let messages: Vec<_> = self.rx_msg.try_iter().collect();
        let mut installed = 0;
        for msg in messages {
            if self.install(msg, appearances) {
                installed += 1;
            }
        }
        installed
    }

    /// Like [`drain_into`](Self::drain_into) but blocks until nothing is
    /// pending.
    pub fn wait_into(&mut self, appearances: &mut SpriteAppearances) -> usize {
        let mut installed = self.drain_into(appearances);
        while !self.pending.is_empty() {
            let Ok(msg) = self.rx_msg.recv() else {
                self.pending.clear();
                break;
            };
            if self.install(msg, appearances) {
                installed += 1;
            }
        }
        installed
    }

    /// Stop the thread and wait for it.
    pub fn shutdown(&mut self) {
        let _ = self.tx_cmd.send(SheetLoadCmd::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SheetLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the loader thread using the manager's sheet source and register
/// the [`SheetLoader`] resource.
pub fn setup_sheet_loader(world: &mut World) {
    let source = world
        .non_send_resource::<GraphicManager>()
        .appearances()
        .source();
    world.insert_resource(SheetLoader::spawn(source));
}

/// Stop the loader thread and remove the resource.
pub fn shutdown_sheet_loader(world: &mut World) {
    if let Some(mut loader) = world.remove_resource::<SheetLoader>() {
        loader.shutdown();
    }
}
