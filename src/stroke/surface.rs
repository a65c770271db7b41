//! Drawing surface contract

use crate::input::Vec3;

/// Summary of what a surface holds, for logs and status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub strokes: usize,
    pub points: usize,
    /// Number of refreshes that committed new geometry
    pub revision: u64,
}

/// Target that turns stroke commands into persistent geometry
pub trait DrawingSurface {
    /// Start a new stroke at `point` without drawing anything to it yet
    fn begin_stroke(&mut self, point: Vec3);

    /// Draw from the previous point of the current stroke to `point`
    fn extend_stroke(&mut self, point: Vec3);

    /// Commit this frame's changes
    fn refresh(&mut self);

    fn stats(&self) -> SurfaceStats;
}

impl<T: DrawingSurface + ?Sized> DrawingSurface for Box<T> {
    fn begin_stroke(&mut self, point: Vec3) {
        (**self).begin_stroke(point)
    }

    fn extend_stroke(&mut self, point: Vec3) {
        (**self).extend_stroke(point)
    }

    fn refresh(&mut self) {
        (**self).refresh()
    }

    fn stats(&self) -> SurfaceStats {
        (**self).stats()
    }
}
