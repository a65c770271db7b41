//! 2D pixel canvas used as a texture
//!
//! World x/y are projected onto the canvas with the world origin at the
//! canvas center; z is ignored. Lines are drawn with a round brush.

use tracing::trace;

use crate::input::Vec3;

use super::surface::{DrawingSurface, SurfaceStats};

/// RGBA raster with a round brush
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    pixels_per_meter: f32,
    brush_width: f32,
    color: [u8; 4],
    last: Option<(f32, f32)>,
    strokes: usize,
    points: usize,
    dirty: bool,
    revision: u64,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32, pixels_per_meter: f32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            pixels_per_meter,
            brush_width: 5.0,
            color: [0xff, 0x00, 0x00, 0xff],
            last: None,
            strokes: 0,
            points: 0,
            dirty: false,
            revision: 0,
        }
    }

    pub fn with_brush(mut self, width: f32, color: [u8; 4]) -> Self {
        self.brush_width = width;
        self.color = color;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Number of pixels with non-zero alpha
    pub fn painted_pixels(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] != 0).count()
    }

    /// Canvas coordinates of a world point
    pub fn project(&self, point: Vec3) -> (f32, f32) {
        (
            self.width as f32 / 2.0 + point.x * self.pixels_per_meter,
            self.height as f32 / 2.0 - point.y * self.pixels_per_meter,
        )
    }

    fn stamp(&mut self, cx: f32, cy: f32) {
        let r = self.brush_width / 2.0;
        let x0 = (cx - r).floor().max(0.0) as i64;
        let y0 = (cy - r).floor().max(0.0) as i64;
        let x1 = ((cx + r).ceil() as i64).min(self.width as i64 - 1);
        let y1 = ((cy + r).ceil() as i64).min(self.height as i64 - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= r * r {
                    let i = (y as usize * self.width as usize + x as usize) * 4;
                    self.pixels[i..i + 4].copy_from_slice(&self.color);
                }
            }
        }
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32)) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = (dx * dx + dy * dy).sqrt();
        let steps = (len / 0.5).ceil().max(1.0) as u32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(from.0 + dx * t, from.1 + dy * t);
        }
    }
}

impl DrawingSurface for PixelCanvas {
    fn begin_stroke(&mut self, point: Vec3) {
        self.last = Some(self.project(point));
        self.strokes += 1;
        self.points += 1;
    }

    fn extend_stroke(&mut self, point: Vec3) {
        let to = self.project(point);
        let from = self.last.unwrap_or(to);
        self.line(from, to);
        self.last = Some(to);
        self.points += 1;
        self.dirty = true;
    }

    fn refresh(&mut self) {
        if self.dirty {
            self.revision += 1;
            self.dirty = false;
            trace!(revision = self.revision, "canvas texture updated");
        }
    }

    fn stats(&self) -> SurfaceStats {
        SurfaceStats {
            strokes: self.strokes,
            points: self.points,
            revision: self.revision,
        }
    }
}
