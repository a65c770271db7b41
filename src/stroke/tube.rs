//! 3D tube painter: strokes kept as polylines with a tube radius

use tracing::trace;

use crate::input::Vec3;

use super::surface::{DrawingSurface, SurfaceStats};

/// Polyline geometry for tube strokes
#[derive(Debug, Clone)]
pub struct TubePainter {
    size: f32,
    strokes: Vec<Vec<Vec3>>,
    dirty: bool,
    revision: u64,
}

impl TubePainter {
    pub fn new(size: f32) -> Self {
        Self {
            size,
            strokes: Vec::new(),
            dirty: false,
            revision: 0,
        }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Tube size applies to points added afterwards
    pub fn set_size(&mut self, size: f32) {
        self.size = size;
    }

    pub fn strokes(&self) -> &[Vec<Vec3>] {
        &self.strokes
    }

    /// Total drawn length across all strokes
    pub fn length(&self) -> f32 {
        self.strokes
            .iter()
            .flat_map(|stroke| stroke.windows(2))
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }
}

impl Default for TubePainter {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl DrawingSurface for TubePainter {
    fn begin_stroke(&mut self, point: Vec3) {
        self.strokes.push(vec![point]);
    }

    fn extend_stroke(&mut self, point: Vec3) {
        match self.strokes.last_mut() {
            Some(stroke) => stroke.push(point),
            None => self.strokes.push(vec![point]),
        }
        self.dirty = true;
    }

    fn refresh(&mut self) {
        if self.dirty {
            self.revision += 1;
            self.dirty = false;
            trace!(revision = self.revision, "tube geometry updated");
        }
    }

    fn stats(&self) -> SurfaceStats {
        SurfaceStats {
            strokes: self.strokes.len(),
            points: self.strokes.iter().map(Vec::len).sum(),
            revision: self.revision,
        }
    }
}
