//! `mapsprites` command line tool.
//!
//! Inspects a sprite catalog, exports single sprites or whole sheets as PNG
//! and, with the `raylib` feature, opens a preview window that animates a
//! handful of sprites through the same cache the editor uses.
//!
//! ```sh
//! mapsprites --catalog ./assets info
//! mapsprites export-sprite --id 1234 --out sprite.png --fix-magenta
//! mapsprites view --metadata items.json 100 101 102
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use mapsprites::resources::graphicmanager::GraphicManager;
use mapsprites::resources::metadata::SpriteRecord;
use mapsprites::resources::spriteappearances::SpriteAppearances;
use mapsprites::resources::spriteconfig::SpriteConfig;

#[derive(Parser, Debug)]
#[command(name = "mapsprites", version, about = "Sprite catalog tool for the map editor")]
struct Cli {
    /// INI file with cache settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Catalog directory; overrides the configured one.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the sheets of the catalog.
    Info,
    /// Export one sprite as PNG.
    ExportSprite {
        #[arg(long)]
        id: u32,
        #[arg(long)]
        out: PathBuf,
        /// Turn magenta background pixels transparent.
        #[arg(long)]
        fix_magenta: bool,
    },
    /// Export the sheet containing a sprite as PNG.
    ExportSheet {
        #[arg(long)]
        id: u32,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        fix_magenta: bool,
    },
    /// Write the current settings to the config file.
    SaveConfig,
    /// Validate a JSON file of item records.
    CheckMetadata { path: PathBuf },
    /// Open a window showing the given item sprites.
    #[cfg(all(feature = "raylib", any(target_os = "linux", target_os = "windows")))]
    View {
        /// JSON file of item records.
        #[arg(long)]
        metadata: PathBuf,
        ids: Vec<i32>,
    },
}

fn load_config(cli: &Cli) -> SpriteConfig {
    let mut config = match &cli.config {
        Some(path) => SpriteConfig::with_path(path.clone()),
        None => SpriteConfig::new(),
    };
    if let Err(e) = config.load_from_file() {
        info!("{}, using defaults", e);
    }
    if let Some(dir) = &cli.catalog {
        config.catalog_dir = dir.clone();
    }
    config
}

fn load_appearances(config: &SpriteConfig) -> Result<SpriteAppearances, String> {
    let mut appearances = SpriteAppearances::default();
    appearances
        .load_catalog_content(&config.catalog_dir, false)
        .map_err(|e| e.to_string())?;
    Ok(appearances)
}

fn load_records(path: &PathBuf) -> Result<Vec<SpriteRecord>, String> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    SpriteRecord::list_from_json(&json).map_err(|e| format!("{}: {}", path.display(), e))
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = load_config(cli);
    match &cli.command {
        Command::Info => {
            let appearances = load_appearances(&config)?;
            println!("appearances: {}", appearances.appearance_file_name());
            println!("sprites: {}", appearances.sprites_count());
            for sheet in appearances.sheets() {
                let size = sheet.sprite_size();
                println!(
                    "{:>7}..={:<7} {}x{} {}",
                    sheet.first_id,
                    sheet.last_id,
                    size.width,
                    size.height,
                    sheet.path.display()
                );
            }
            Ok(())
        }
        Command::ExportSprite {
            id,
            out,
            fix_magenta,
        } => {
            let mut appearances = load_appearances(&config)?;
            appearances
                .export_sprite_image(*id, out, *fix_magenta)
                .map_err(|e| e.to_string())?;
            info!("Exported sprite {} to {}", id, out.display());
            Ok(())
        }
        Command::ExportSheet {
            id,
            out,
            fix_magenta,
        } => {
            let mut appearances = load_appearances(&config)?;
            appearances
                .save_sheet_to_file_by_sprite(*id, out, *fix_magenta)
                .map_err(|e| e.to_string())?;
            info!("Exported sheet of sprite {} to {}", id, out.display());
            Ok(())
        }
        Command::SaveConfig => config.save_to_file(),
        Command::CheckMetadata { path } => {
            let records = load_records(path)?;
            let mut manager = GraphicManager::new(config, SpriteAppearances::default());
            let mut warnings = Vec::new();
            let result = manager.load_item_sprite_metadata(&records, &mut warnings);
            for w in &warnings {
                println!("warning: {}", w);
            }
            result.map_err(|e| e.to_string())?;
            println!("{} records ok", records.len());
            Ok(())
        }
        #[cfg(all(feature = "raylib", any(target_os = "linux", target_os = "windows")))]
        Command::View { metadata, ids } => view::run(config, metadata, ids),
    }
}

#[cfg(all(feature = "raylib", any(target_os = "linux", target_os = "windows")))]
mod view {
    use std::path::PathBuf;

    use bevy_ecs::prelude::*;
    use raylib::prelude::*;

    use mapsprites::components::spriteinstance::SpriteInstance;
    use mapsprites::resources::gpu::SpriteSize;
    use mapsprites::resources::graphicmanager::GraphicManager;
    use mapsprites::resources::sheetloader::{SheetLoader, setup_sheet_loader, shutdown_sheet_loader};
    use mapsprites::resources::spriteconfig::SpriteConfig;
    use mapsprites::resources::texturestore::{
        RaylibGpu, RaylibSurface, TextureStore, flush_raylib_uploads,
    };
    use mapsprites::resources::worldtime::WorldTime;
    use mapsprites::systems::animation::sprite_instance_animation;
    use mapsprites::systems::garbagecollection::sprite_garbage_collection;
    use mapsprites::systems::render::render_sprite_instances;
    use mapsprites::systems::sheetloader::poll_sheet_loader;
    use mapsprites::systems::time::update_world_time;

    const COLUMNS: i32 = 8;
    const CELL: i32 = 80;

    pub fn run(config: SpriteConfig, metadata: &PathBuf, ids: &[i32]) -> Result<(), String> {
        let appearances = super::load_appearances(&config)?;
        let records = super::load_records(metadata)?;
        let mut manager = GraphicManager::new(config, appearances);
        let mut warnings = Vec::new();
        manager
            .load_item_sprite_metadata(&records, &mut warnings)
            .map_err(|e| e.to_string())?;
        for w in &warnings {
            log::warn!("{}", w);
        }

        let mut world = World::new();
        world.insert_resource(WorldTime::default());
        world.insert_non_send_resource(manager);
        world.insert_non_send_resource(RaylibGpu::new());
        setup_sheet_loader(&mut world);

        for (i, &id) in ids.iter().enumerate() {
            let i = i as i32;
            let instance =
                SpriteInstance::new(id, (i % COLUMNS) * CELL + 16, (i / COLUMNS) * CELL + 16, SpriteSize::Large);
            let animator = world
                .non_send_resource_mut::<GraphicManager>()
                .instance_animator(id, 0);
            match animator {
                Some(animator) => world.spawn((instance, animator)),
                None => world.spawn(instance),
            };
            // prefetch the sheet while the window comes up
            let prefetch = {
                let gm = world.non_send_resource::<GraphicManager>();
                let appearances = gm.appearances();
                gm.sprite(id)
                    .and_then(|s| s.as_game())
                    .and_then(|s| s.sprite_list.first().copied())
                    .and_then(|first| appearances.sheet_index(first))
                    .map(|index| (index, appearances.sheets()[index].path.clone()))
            };
            if let Some((index, path)) = prefetch {
                world.resource_mut::<SheetLoader>().request(index, path);
            }
        }

        let rows = (ids.len() as i32 + COLUMNS - 1) / COLUMNS;
        let (mut rl, thread) = raylib::init()
            .size(COLUMNS * CELL + 32, rows.max(1) * CELL + 32)
            .title("mapsprites")
            .build();
        rl.set_target_fps(60);

        let mut update = Schedule::default();
        update.add_systems(poll_sheet_loader);
        update.add_systems(sprite_instance_animation);
        update.add_systems(sprite_garbage_collection::<RaylibGpu>);

        let mut store = TextureStore::new();
        while !rl.window_should_close() {
            update_world_time(&mut world, rl.get_frame_time());
            update.run(&mut world);

            // uploads queued while drawing show up on the next frame
            let mut gpu = world
                .remove_non_send_resource::<RaylibGpu>()
                .unwrap_or_default();
            {
                let mut d = rl.begin_drawing(&thread);
                d.clear_background(Color::DARKGRAY);
                let mut surface = RaylibSurface {
                    d: &mut d,
                    store: &store,
                };
                render_sprite_instances(&mut world, &mut surface, &mut gpu);
            }
            flush_raylib_uploads(&mut gpu, &mut store, &mut rl, &thread);
            world.insert_non_send_resource(gpu);
        }

        shutdown_sheet_loader(&mut world);
        store.clear();
        Ok(())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
