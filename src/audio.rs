/// Audio routing for one render process.
///
/// Volume control operates at render-process granularity, not browser
/// granularity, so the process id is only known after creation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioBinding {
    pub process_id: u32,
    pub muted: bool,
    pub volume: f32,
}

/// Process-wide sink for (process, muted, volume) bindings.
///
/// The controller pushes updates and never reads back.
pub trait AudioSink: Send + Sync {
    fn bind(&self, binding: AudioBinding);
}

/// Sink that drops all bindings.
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn bind(&self, _binding: AudioBinding) {}
}
