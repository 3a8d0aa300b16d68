use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;

use crate::client::BrowserClient;
use crate::errors::SourceError;
use crate::registry::InstanceId;
use crate::settings::EffectiveConfig;

/// A unit of work for one of the engine's serialized threads.
pub type EngineTask = Box<dyn FnOnce() + Send + 'static>;

/// The engine's serialized threads. All native lifecycle calls must run on
/// [`EngineThreadId::Ui`]; the others exist for engine-internal work.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EngineThreadId {
    Ui,
    Io,
    Renderer,
}

/// Task submission into the engine's serialized threads.
///
/// Fire-and-forget: results come back through callbacks, never a return
/// value. Tasks posted to the same thread execute in submission order.
pub trait TaskRunner: Send + Sync {
    fn post(&self, thread: EngineThreadId, task: EngineTask) -> Result<(), SourceError>;
}

/// Real [`TaskRunner`]: one named OS thread per [`EngineThreadId`], each
/// draining its own queue in order.
pub struct EngineThreads {
    ui: Worker,
    io: Worker,
    renderer: Worker,
}

struct Worker {
    tx: mpsc::UnboundedSender<EngineTask>,
    join: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn spawn(name: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineTask>();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    task();
                }
                log::debug!("Engine thread {:?} drained, exiting", thread::current().name());
            })
            .expect("Failed to spawn engine thread");

        Self { tx, join: Some(join) }
    }
}

impl EngineThreads {
    pub fn spawn() -> Self {
        Self {
            ui: Worker::spawn("engine-ui"),
            io: Worker::spawn("engine-io"),
            renderer: Worker::spawn("engine-renderer"),
        }
    }

    fn worker(&self, thread: EngineThreadId) -> &Worker {
        match thread {
            EngineThreadId::Ui => &self.ui,
            EngineThreadId::Io => &self.io,
            EngineThreadId::Renderer => &self.renderer,
        }
    }

    /// Stop accepting tasks, finish the queued ones and join the threads.
    pub fn shutdown(self) {
        for worker in [self.ui, self.io, self.renderer] {
            let Worker { tx, join } = worker;
            drop(tx);
            if let Some(join) = join {
                let _ = join.join();
            }
        }
    }
}

impl TaskRunner for EngineThreads {
    fn post(&self, thread: EngineThreadId, task: EngineTask) -> Result<(), SourceError> {
        self.worker(thread)
            .tx
            .send(task)
            .map_err(|_| SourceError::EngineGone)
    }
}

/// The native rendering engine. Creation is only legal on the engine's UI
/// thread; the controller guarantees that by posting the call through a
/// [`TaskRunner`].
pub trait RenderEngine: Send + Sync {
    fn create_browser(
        &self,
        client: Arc<BrowserClient>,
        config: &EffectiveConfig,
    ) -> Result<Arc<dyn NativeBrowser>, SourceError>;
}

/// Handle to one live native browser resource, owned exclusively by its
/// controller while live.
pub trait NativeBrowser: Send + Sync {
    fn id(&self) -> InstanceId;

    /// Ask the engine to close this browser. The engine acknowledges through
    /// the adapter's before-close callback. `force` skips cooperative
    /// shutdown (pending unload handlers); it is passed through, never
    /// interpreted locally.
    fn close(&self, force: bool);

    /// Ask the renderer for the id of the process producing this instance's
    /// frames and audio. The answer comes back asynchronously through the
    /// registry dispatch path.
    fn request_render_process_id(&self);
}

/// A document frame inside a live browser, as surfaced by engine callbacks.
pub trait Frame {
    /// Whether this is the top-level content frame.
    fn is_main(&self) -> bool;

    fn execute_script(&self, source: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use std::sync::Mutex;

    #[test]
    fn tasks_on_one_thread_run_in_submission_order() {
        let threads = EngineThreads::spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..32 {
            let seen = seen.clone();
            threads
                .post(EngineThreadId::Ui, Box::new(move || seen.lock().unwrap().push(i)))
                .unwrap();
        }

        let (done_tx, done_rx) = std_mpsc::sync_channel(1);
        threads
            .post(EngineThreadId::Ui, Box::new(move || done_tx.send(()).unwrap()))
            .unwrap();
        done_rx.recv().unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..32).collect::<Vec<_>>());
        threads.shutdown();
    }

    #[test]
    fn tasks_run_on_the_named_thread() {
        let threads = EngineThreads::spawn();
        let (tx, rx) = std_mpsc::sync_channel(1);

        threads
            .post(
                EngineThreadId::Renderer,
                Box::new(move || {
                    tx.send(thread::current().name().map(str::to_string)).unwrap();
                }),
            )
            .unwrap();

        assert_eq!(rx.recv().unwrap().as_deref(), Some("engine-renderer"));
        threads.shutdown();
    }

    #[test]
    fn shutdown_runs_already_queued_tasks() {
        let threads = EngineThreads::spawn();
        let seen = Arc::new(Mutex::new(0u32));

        for _ in 0..8 {
            let seen = seen.clone();
            threads
                .post(EngineThreadId::Io, Box::new(move || *seen.lock().unwrap() += 1))
                .unwrap();
        }

        threads.shutdown();
        assert_eq!(*seen.lock().unwrap(), 8);
    }
}
