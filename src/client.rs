use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::controller::InstanceShared;
use crate::engine::Frame;
use crate::render::RenderTarget;
use crate::viewport::Viewport;

/// Per-instance callback adapter between the engine and the controller's
/// collaborators.
///
/// Created fresh when a controller enters `Creating` and released only
/// after the before-close acknowledgment, so the engine can keep
/// dispatching in-flight paint/size events until close completes. Binding
/// is exclusive per instance; the controller asserts that.
pub struct BrowserClient {
    shared: Arc<InstanceShared>,
    render_target: Arc<dyn RenderTarget>,
    /// One-shot before-close acknowledgment, armed by `close_browser`.
    before_close: Mutex<Option<SyncSender<()>>>,
}

impl BrowserClient {
    pub(crate) fn new(shared: Arc<InstanceShared>, render_target: Arc<dyn RenderTarget>) -> Self {
        Self {
            shared,
            render_target,
            before_close: Mutex::new(None),
        }
    }

    /// The main content frame finished loading: inject the configured
    /// stylesheet by appending a `<link>` pointing at a base64 data URI.
    ///
    /// Runs only for the top-level frame; nested frames would duplicate the
    /// injection.
    pub fn on_load_end(&self, frame: &dyn Frame, http_status: i32) {
        if !frame.is_main() {
            return;
        }

        log::debug!("Main frame loaded (status {http_status}), injecting stylesheet");

        let encoded = BASE64.encode(self.shared.config().css.as_bytes());
        let script = format!(
            "var link = document.createElement('link');\
             link.setAttribute('rel', 'stylesheet');\
             link.setAttribute('type', 'text/css');\
             link.setAttribute('href', 'data:text/css;charset=utf-8;base64,{encoded}');\
             document.getElementsByTagName('head')[0].appendChild(link);"
        );

        frame.execute_script(&script);
    }

    /// Answer the engine's viewport-size query. Deterministic for the life
    /// of the instance; changing geometry requires a new instance.
    pub fn viewport(&self) -> Viewport {
        self.shared.viewport()
    }

    pub fn on_create_texture(&self, width: u32, height: u32) {
        self.render_target.create_texture(width, height);
    }

    pub fn on_destroy_texture(&self) {
        self.render_target.destroy_texture();
    }

    pub fn on_paint(&self, viewport: &Viewport, data: &[u8]) {
        self.render_target.paint(viewport, data);
    }

    /// Arm the one-shot before-close acknowledgment. Re-arming supersedes a
    /// stale signal left behind by a close whose wait timed out.
    pub(crate) fn arm_before_close(&self, signal: SyncSender<()>) {
        let mut slot = self.before_close.lock().unwrap();
        if slot.is_some() {
            log::warn!("Re-arming before-close; previous close was never acknowledged");
        }
        *slot = Some(signal);
    }

    /// Engine acknowledgment that the close fully completed. Consumes the
    /// armed signal; duplicate acknowledgments are ignored.
    pub fn on_before_close(&self) {
        if let Some(signal) = self.before_close.lock().unwrap().take() {
            let _ = signal.send(());
        }
    }
}
