use prism_common::ViewportSize;

/// Something with a drawable size that may change between ticks.
pub trait Canvas {
    /// Current size in physical pixels.
    fn size(&self) -> ViewportSize;
}

impl Canvas for ViewportSize {
    fn size(&self) -> ViewportSize {
        *self
    }
}
