use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SendError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, warn};

use crate::audio::{AudioBinding, AudioSink};
use crate::client::BrowserClient;
use crate::engine::{EngineThreadId, NativeBrowser, RenderEngine, TaskRunner};
use crate::errors::SourceError;
use crate::registry::{InstanceId, InstanceRegistry};
use crate::render::RenderTarget;
use crate::settings::{resolve, EffectiveConfig, SourceSettings};
use crate::viewport::Viewport;

/// Lifecycle phase of one browser instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Creating,
    Live,
    Closing,
    Closed,
}

/// Per-instance state reachable from the [`InstanceRegistry`], so engine
/// callbacks can answer queries and bind audio without going through the
/// controller's instance lock.
pub struct InstanceShared {
    config: EffectiveConfig,
    audio: Arc<dyn AudioSink>,
}

impl InstanceShared {
    pub(crate) fn new(config: EffectiveConfig, audio: Arc<dyn AudioSink>) -> Self {
        Self { config, audio }
    }

    /// The immutable configuration snapshot this instance was created with.
    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    /// Geometry answered to the engine's size query, fixed for the life of
    /// the instance.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(0, 0, self.config.width, self.config.height)
    }

    /// The renderer identified the process producing this instance's
    /// frames and audio: push the configured routing to the audio sink.
    pub fn update_render_process_id(&self, process_id: u32) {
        debug!("Binding audio routing to render process {process_id}");
        self.audio.bind(AudioBinding {
            process_id,
            muted: self.config.muted,
            volume: self.config.volume,
        });
    }
}

#[derive(Clone, Debug)]
pub struct ControllerOptions {
    /// Bound on the blocking waits for engine completion signals. `None`
    /// restores the original protocol's unbounded blocking.
    pub completion_timeout: Option<Duration>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            completion_timeout: Some(Duration::from_secs(10)),
        }
    }
}

struct Inner {
    phase: Phase,
    /// Bound callback adapter. Survives a failed creation so the next
    /// attempt can retry; released only after the before-close
    /// acknowledgment.
    client: Option<Arc<BrowserClient>>,
    /// The native browser resource, held exclusively while live.
    browser: Option<Arc<dyn NativeBrowser>>,
    shared: Option<Arc<InstanceShared>>,
}

/// Lifecycle controller for a single off-screen browser instance.
///
/// Creation and close look synchronous to the caller but execute on the
/// engine's UI thread, because the engine forbids allocating or releasing
/// browser resources anywhere else. The caller blocks on a per-operation
/// completion signal; an instance-scoped mutex serializes concurrent
/// create/close calls so a close can never reach the engine ahead of an
/// in-flight create.
pub struct BrowserController {
    engine: Arc<dyn RenderEngine>,
    tasks: Arc<dyn TaskRunner>,
    registry: Arc<InstanceRegistry>,
    audio: Arc<dyn AudioSink>,
    /// Process-wide default settings, passed in explicitly and never
    /// mutated.
    defaults: SourceSettings,
    options: ControllerOptions,
    inner: Mutex<Inner>,
}

impl BrowserController {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        tasks: Arc<dyn TaskRunner>,
        registry: Arc<InstanceRegistry>,
        audio: Arc<dyn AudioSink>,
        defaults: SourceSettings,
        options: ControllerOptions,
    ) -> Self {
        Self {
            engine,
            tasks,
            registry,
            audio,
            defaults,
            options,
            inner: Mutex::new(Inner {
                phase: Phase::Uninitialized,
                client: None,
                browser: None,
                shared: None,
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().unwrap().phase
    }

    pub fn is_live(&self) -> bool {
        self.inner.lock().unwrap().browser.is_some()
    }

    /// The effective configuration of the current instance, if one is live
    /// or closing.
    pub fn current_config(&self) -> Option<EffectiveConfig> {
        let inner = self.inner.lock().unwrap();
        inner.shared.as_ref().map(|shared| shared.config().clone())
    }

    /// Create the native browser for this instance.
    ///
    /// Resolves the effective configuration, binds a fresh callback
    /// adapter, posts the allocation to the engine's UI thread and blocks
    /// until it completes. On failure the controller reverts to
    /// `Uninitialized` with the adapter still bound, no resources leaked
    /// and nothing registered.
    ///
    /// # Panics
    ///
    /// Calling this while a native browser is live is a caller bug and
    /// panics; continuing would risk duplicating native resources.
    pub fn create_browser(
        &self,
        render_target: Arc<dyn RenderTarget>,
        overrides: &SourceSettings,
    ) -> Result<InstanceId, SourceError> {
        let mut inner = self.inner.lock().unwrap();

        assert!(
            inner.browser.is_none(),
            "create_browser called while a native browser is live"
        );
        assert!(
            matches!(inner.phase, Phase::Uninitialized | Phase::Closed),
            "create_browser called in phase {:?}",
            inner.phase
        );

        // The full merge completes before creation begins, or creation does
        // not start.
        let config = resolve(&self.defaults, overrides)?;
        let shared = Arc::new(InstanceShared::new(config, self.audio.clone()));

        // Fresh capability object per creation attempt; a stale adapter
        // from a failed attempt is replaced here.
        let client = Arc::new(BrowserClient::new(shared.clone(), render_target));
        inner.client = Some(client.clone());
        inner.phase = Phase::Creating;

        let (done_tx, done_rx) = sync_channel::<Result<Arc<dyn NativeBrowser>, SourceError>>(1);
        let engine = self.engine.clone();
        let registry = self.registry.clone();
        let task_shared = shared.clone();

        let posted = self.tasks.post(
            EngineThreadId::Ui,
            Box::new(move || {
                let result = engine.create_browser(client, task_shared.config());
                match &result {
                    Ok(browser) => {
                        registry.register(browser.id(), task_shared.clone());
                        // Volume control needs the render process behind
                        // this instance; ask for it while still on the
                        // engine thread.
                        browser.request_render_process_id();
                    }
                    Err(e) => error!("Native browser creation failed: {e}"),
                }
                if let Err(SendError(Ok(browser))) = done_tx.send(result) {
                    // The waiter gave up on this creation. Unwind it here,
                    // on the engine thread, so neither the registry entry
                    // nor the native resource outlives the abandoned
                    // operation.
                    let id = browser.id();
                    warn!("Browser {id} completed after its waiter gave up; closing it");
                    registry.unregister(id);
                    browser.close(true);
                }
            }),
        );
        if let Err(e) = posted {
            // Nothing was submitted, so nothing can complete later.
            inner.phase = Phase::Uninitialized;
            return Err(e);
        }

        // Instance lock stays held across the wait; the registry lock is
        // only ever taken for the O(1) mutations above.
        match self.wait(done_rx) {
            Ok(Ok(browser)) => {
                let id = browser.id();
                inner.browser = Some(browser);
                inner.shared = Some(shared);
                inner.phase = Phase::Live;
                debug!("Browser {id} live");
                Ok(id)
            }
            Ok(Err(e)) => {
                // Adapter stays bound; the caller may retry with corrected
                // configuration.
                inner.phase = Phase::Uninitialized;
                Err(e)
            }
            Err(e @ SourceError::EngineTimeout(_)) => {
                // The posted task cannot be recalled and may still finish;
                // stay in Creating so a later create cannot double-allocate.
                warn!("Creation wait gave up: {e}");
                Err(e)
            }
            Err(e) => {
                inner.phase = Phase::Uninitialized;
                Err(e)
            }
        }
    }

    /// Close the native browser and block until the engine acknowledges.
    ///
    /// With nothing live this completes immediately and is idempotent for
    /// any number of repeated calls. Otherwise the close request is posted
    /// to the engine's UI thread and the caller blocks for the before-close
    /// acknowledgment; unregistration and resource release then happen on
    /// the calling thread, after the wait, so the registry never holds a
    /// handle whose native resource the engine has already invalidated and
    /// the adapter is never released while the engine might still call it.
    pub fn close_browser(&self, force: bool) -> Result<(), SourceError> {
        let mut inner = self.inner.lock().unwrap();

        let browser = match inner.browser.clone() {
            Some(browser) => browser,
            // Idempotent no-op: the completion signal fires immediately.
            None => return Ok(()),
        };
        let client = inner
            .client
            .clone()
            .expect("live browser without a bound client");

        inner.phase = Phase::Closing;

        let (ack_tx, ack_rx) = sync_channel::<()>(1);
        client.arm_before_close(ack_tx);

        let task_browser = browser.clone();
        self.tasks.post(
            EngineThreadId::Ui,
            Box::new(move || {
                task_browser.close(force);
            }),
        )?;

        if let Err(e) = self.wait(ack_rx) {
            // The engine may still dispatch callbacks; release nothing.
            warn!("Close wait gave up: {e}");
            return Err(e);
        }

        // Id captured before anything is released; the unregister tolerates
        // a miss if the engine already emitted a duplicate close signal.
        let id = browser.id();
        self.registry.unregister(id);
        inner.client = None;
        inner.browser = None;
        inner.shared = None;
        inner.phase = Phase::Closed;
        debug!("Browser {id} closed");

        Ok(())
    }

    fn wait<T>(&self, rx: Receiver<T>) -> Result<T, SourceError> {
        match self.options.completion_timeout {
            None => rx.recv().map_err(|_| SourceError::EngineGone),
            Some(limit) => rx.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => SourceError::EngineTimeout(limit),
                RecvTimeoutError::Disconnected => SourceError::EngineGone,
            }),
        }
    }
}
