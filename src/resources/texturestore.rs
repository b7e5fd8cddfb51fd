//! Raylib texture backend.
//!
//! [`RaylibGpu`] implements [`GpuContext`] by queueing uploads and releases;
//! [`flush_raylib_uploads`] applies the queue to the [`TextureStore`] on the
//! thread that owns the raylib handle, before drawing. [`RaylibSurface`]
//! draws store textures inside a raylib drawing scope.
//!
//! All three are non-send: insert them with `insert_non_send_resource`.

use raylib::prelude::*;
use rustc_hash::FxHashMap;

use crate::resources::gpu::{
    DrawRect, DrawSurface, GpuContext, GpuError, PixelSource, SpriteSize, TextureId,
    check_rgba_len,
};

/// Loaded textures keyed by handle.
#[derive(Default)]
pub struct TextureStore {
    map: FxHashMap<TextureId, Texture2D>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: TextureId) -> Option<&Texture2D> {
        self.map.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

enum GpuOp {
    Upload {
        handle: TextureId,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
    Release {
        handle: TextureId,
    },
}

/// Queueing GPU context for the raylib backend.
#[derive(Default)]
pub struct RaylibGpu {
    queue: Vec<GpuOp>,
}

impl RaylibGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations waiting for the next flush.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl GpuContext for RaylibGpu {
    fn upload(
        &mut self,
        handle: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), GpuError> {
        check_rgba_len(width, height, rgba)?;
        self.queue.push(GpuOp::Upload {
            handle,
            width,
            height,
            rgba: rgba.to_vec(),
        });
        Ok(())
    }

    fn release(&mut self, handle: TextureId) {
        self.queue.push(GpuOp::Release { handle });
    }
}

fn create_texture(
    rl: &mut RaylibHandle,
    thread: &RaylibThread,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> Result<Texture2D, GpuError> {
    let image = Image::gen_image_color(width as i32, height as i32, Color::BLANK);
    let mut texture = rl
        .load_texture_from_image(thread, &image)
        .map_err(|e| GpuError::Backend(e.to_string()))?;
    texture
        .update_texture(rgba)
        .map_err(|e| GpuError::Backend(e.to_string()))?;
    Ok(texture)
}

/// Apply queued uploads and releases. Failed uploads are logged and skipped.
pub fn flush_raylib_uploads(
    gpu: &mut RaylibGpu,
    store: &mut TextureStore,
    rl: &mut RaylibHandle,
    thread: &RaylibThread,
) {
    for op in gpu.queue.drain(..) {
        match op {
            GpuOp::Upload {
                handle,
                width,
                height,
                rgba,
            } => match create_texture(rl, thread, width, height, &rgba) {
                Ok(texture) => {
                    store.map.insert(handle, texture);
                }
                Err(e) => log::warn!("Texture {:#x} upload failed: {}", handle, e),
            },
            GpuOp::Release { handle } => {
                store.map.remove(&handle);
            }
        }
    }
}

/// Draw target wrapping a raylib drawing scope.
pub struct RaylibSurface<'a, D: RaylibDraw> {
    pub d: &'a mut D,
    pub store: &'a TextureStore,
}

impl<D: RaylibDraw> DrawSurface for RaylibSurface<'_, D> {
    fn blit(&mut self, source: PixelSource<'_>, _size: SpriteSize, rect: DrawRect) {
        let dest = Rectangle {
            x: rect.x as f32,
            y: rect.y as f32,
            width: rect.width as f32,
            height: rect.height as f32,
        };
        match source {
            PixelSource::Texture(handle) => {
                let Some(tex) = self.store.get(handle) else {
                    return;
                };
                let src = Rectangle {
                    x: 0.0,
                    y: 0.0,
                    width: tex.width as f32,
                    height: tex.height as f32,
                };
                self.d
                    .draw_texture_pro(tex, src, dest, Vector2::zero(), 0.0, Color::WHITE);
            }
            PixelSource::Pixels(pixels) => {
                // editor bitmaps are small; draw them as scaled pixel quads
                let sx = dest.width / pixels.size.width.max(1) as f32;
                let sy = dest.height / pixels.size.height.max(1) as f32;
                for (i, px) in pixels.pixels.chunks_exact(4).enumerate() {
                    if px[3] == 0 {
                        continue;
                    }
                    let x = (i as u32 % pixels.size.width) as f32;
                    let y = (i as u32 / pixels.size.width) as f32;
                    self.d.draw_rectangle_rec(
                        Rectangle {
                            x: dest.x + x * sx,
                            y: dest.y + y * sy,
                            width: sx,
                            height: sy,
                        },
                        Color::new(px[0], px[1], px[2], px[3]),
                    );
                }
            }
        }
    }
}
