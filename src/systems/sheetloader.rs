//! Background sheet decoding.
//!
//! - [`sheet_loader_thread`] runs on its own OS thread, reads sheet files
//!   through the shared [`SheetSource`] and decodes them, answering every
//!   [`SheetLoadCmd::Load`] with a [`SheetLoadMessage`].
//! - [`poll_sheet_loader`] drains finished decodes into the
//!   [`GraphicManager`]'s sprite appearances each tick.
//!
//! Decoded buffers never touch the manager from the loader thread.
//!
//! See also: [`crate::events::sheetload`] and [`crate::resources::sheetloader`].

use std::sync::Arc;

use bevy_ecs::prelude::*;
use crossbeam_channel::{Receiver, Sender};
use log::debug;

use crate::events::sheetload::{SheetLoadCmd, SheetLoadMessage};
use crate::resources::graphicmanager::GraphicManager;
use crate::resources::sheetloader::SheetLoader;
use crate::resources::spriteappearances::{SheetError, SheetSource, decode_sheet};

/// Entry point of the loader thread. Blocks on the command channel and
/// returns on [`SheetLoadCmd::Shutdown`] or when every sender is gone.
pub fn sheet_loader_thread(
    source: Arc<dyn SheetSource>,
    rx_cmd: Receiver<SheetLoadCmd>,
    tx_msg: Sender<SheetLoadMessage>,
) {
    debug!(
        "Sheet loader thread starting (id={:?})",
        std::thread::current().id()
    );
    while let Ok(cmd) = rx_cmd.recv() {
        match cmd {
            SheetLoadCmd::Load { index, path } => {
                let result = source
                    .read(&path)
                    .map_err(|e| SheetError::Io {
                        path: path.clone(),
                        message: e.to_string(),
                    })
                    .and_then(|bytes| decode_sheet(&bytes));
                let msg = match result {
                    Ok(data) => SheetLoadMessage::Decoded { index, data },
                    Err(error) => SheetLoadMessage::Failed { index, error },
                };
                if tx_msg.send(msg).is_err() {
                    break;
                }
            }
            SheetLoadCmd::Shutdown => break,
        }
    }
    debug!("Sheet loader thread exiting");
}

/// Install finished background decodes into the graphic manager.
pub fn poll_sheet_loader(mut loader: ResMut<SheetLoader>, mut gm: NonSendMut<GraphicManager>) {
    loader.drain_into(gm.appearances_mut());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::spriteappearances::{
        MemorySheetSource, SPRITE_SHEET_BYTES, SpriteAppearances, SpriteLayout, SpriteSheet,
        encode_sheet,
    };

    fn appearances() -> SpriteAppearances {
        let mut source = MemorySheetSource::new();
        let mut sheet = vec![0u8; SPRITE_SHEET_BYTES];
        sheet[..4].copy_from_slice(&[1, 2, 3, 255]);
        source.insert("good.bmp", encode_sheet(&sheet).unwrap());
        source.insert("bad.bmp", vec![0; 8]);
        let mut appearances = SpriteAppearances::new(Arc::new(source));
        appearances
            .set_sheets(vec![
                SpriteSheet::new(1, 10, SpriteLayout::OneByOne, "good.bmp"),
                SpriteSheet::new(11, 20, SpriteLayout::OneByOne, "bad.bmp"),
            ])
            .unwrap();
        appearances
    }

    #[test]
    fn decodes_in_background() {
        let mut appearances = appearances();
        let mut loader = SheetLoader::spawn(appearances.source());
        assert!(loader.request_sprite(&appearances, 3));
        // already queued
        assert!(!loader.request_sprite(&appearances, 4));
        assert!(loader.request_sprite(&appearances, 15));
        assert!(!loader.request_sprite(&appearances, 99));

        assert_eq!(loader.wait_into(&mut appearances), 1);
        assert_eq!(loader.pending(), 0);
        assert!(appearances.sheets()[0].is_loaded());
        assert!(!appearances.sheets()[1].is_loaded());
        assert_eq!(&appearances.get_sprite(1).unwrap().pixels[..4], &[1, 2, 3, 255]);
        // loaded sheets are not requested again
        assert!(!loader.request_sprite(&appearances, 3));
        loader.shutdown();
    }

    #[test]
    fn poll_system_installs_into_manager() {
        let mut world = World::new();
        world.insert_non_send_resource(GraphicManager::new(Default::default(), appearances()));
        crate::resources::sheetloader::setup_sheet_loader(&mut world);

        let path = world.non_send_resource::<GraphicManager>().appearances().sheets()[0]
            .path
            .clone();
        assert!(world.resource_mut::<SheetLoader>().request(0, path));

        let mut schedule = Schedule::default();
        schedule.add_systems(poll_sheet_loader);
        for _ in 0..200 {
            schedule.run(&mut world);
            if world.resource::<SheetLoader>().pending() == 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(world.non_send_resource::<GraphicManager>().appearances().sheets()[0].is_loaded());
        crate::resources::sheetloader::shutdown_sheet_loader(&mut world);
        assert!(!world.contains_resource::<SheetLoader>());
    }
}
