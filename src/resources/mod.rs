//! Long-lived data: the sprite catalog, caches, configuration and the GPU
//! seam.
//!
//! Overview
//! - `gamesprite` – item and outfit sprite definitions and their drawing
//! - `gpu` – texture upload trait, draw surface trait, headless backends
//! - `graphicmanager` – sprite registry, texture residency and eviction
//! - `image` – sheet-backed and recoloured images
//! - `metadata` – parsed appearance records and their validation
//! - `sheetloader` – background sheet decoding bridge
//! - `spriteappearances` – sheet catalog and decoded pixel cache
//! - `spriteconfig` – INI-backed cache limits
//! - `texturestore` – raylib texture backend
//! - `worldtime` – editor clock
pub mod gamesprite;
pub mod gpu;
pub mod graphicmanager;
pub mod image;
pub mod metadata;
pub mod sheetloader;
pub mod spriteappearances;
pub mod spriteconfig;
#[cfg(all(feature = "raylib", any(target_os = "linux", target_os = "windows")))]
pub mod texturestore;
pub mod worldtime;
