use crate::viewport::Viewport;

/// Host-side consumer of rendered output.
///
/// Supplied at creation time and referenced by the callback adapter for the
/// instance's lifetime; the controller never owns it. Paint buffers and
/// texture requests are delegated to it untouched.
pub trait RenderTarget: Send + Sync {
    /// The engine needs a texture of the given size before painting.
    fn create_texture(&self, width: u32, height: u32);

    /// The texture is no longer needed.
    fn destroy_texture(&self);

    /// A rendered frame is available. `data` is tightly packed BGRA,
    /// `viewport.width * viewport.height * 4` bytes.
    fn paint(&self, viewport: &Viewport, data: &[u8]);
}

/// Render target that discards everything. Useful for tests and for
/// instances whose output is temporarily unrouted.
pub struct NullRenderTarget;

impl RenderTarget for NullRenderTarget {
    fn create_texture(&self, _width: u32, _height: u32) {}
    fn destroy_texture(&self) {}
    fn paint(&self, _viewport: &Viewport, _data: &[u8]) {}
}
