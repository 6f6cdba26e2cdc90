//! The terminal widget: client-side lifecycle of one remote terminal.
//!
//! A widget starts [`Inert`](WidgetState::Inert). [`TerminalWidget::start`]
//! asks the backend for a process and attaches to its stream, after which
//! the widget is [`Active`](WidgetState::Active) until disposed. If the
//! server cannot spawn a process the widget ends up
//! [`Failed`](WidgetState::Failed) and never attaches.
//!
//! All methods take `&self`; share the widget behind an `Arc` between the
//! host's input, resize and lifecycle paths.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use webterm_protocol::{ProcessId, TerminalGeometry};

use crate::backend::{TerminalBackend, TerminalConnection};
use crate::debounce::Debouncer;
use crate::error::{ClientError, ClientResult};

/// Title shown once the terminal's stream has closed.
pub const TERMINATED_TITLE: &str = "<terminated>";

/// Quiet period before a burst of viewport changes reaches the server.
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Lifecycle of a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    /// Constructed, not started.
    Inert,
    /// Create or stream attach in flight.
    Starting,
    /// Attached to a process stream.
    Active,
    /// The server could not provide a process. Terminal.
    Failed,
    /// Torn down. Terminal.
    Disposed,
}

/// Source of the workspace root the terminal opens in.
#[async_trait]
pub trait WorkspaceRoot: Send + Sync {
    /// URI of the workspace root (`file:///...`), if a workspace is open.
    async fn root_uri(&self) -> Option<String>;
}

/// A workspace root known up front.
#[derive(Debug, Clone, Default)]
pub struct FixedWorkspaceRoot(pub Option<String>);

#[async_trait]
impl WorkspaceRoot for FixedWorkspaceRoot {
    async fn root_uri(&self) -> Option<String> {
        self.0.clone()
    }
}

/// The terminal emulator that renders process output.
pub trait TerminalEmulator: Send + Sync {
    /// Render bytes received from the process.
    fn write(&self, data: &[u8]);

    /// Adopt a new viewport geometry.
    fn resize(&self, _geometry: TerminalGeometry) {}

    fn focus(&self) {}

    /// Release emulator resources.
    fn dispose(&self) {}
}

/// Construction parameters of a widget.
#[derive(Debug, Clone)]
pub struct TerminalWidgetOptions {
    pub id: String,
    pub caption: String,
    /// Initial title.
    pub label: String,
    /// Geometry proposed by the host viewport, used by the first create.
    pub initial_geometry: TerminalGeometry,
    pub resize_debounce: Duration,
    /// Dispose the emulator together with the widget.
    pub destroy_on_close: bool,
}

impl TerminalWidgetOptions {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: id.into(),
            caption: label.clone(),
            label,
            initial_geometry: TerminalGeometry::default(),
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            destroy_on_close: false,
        }
    }

    pub fn with_geometry(mut self, geometry: TerminalGeometry) -> Self {
        self.initial_geometry = geometry;
        self
    }

    pub fn with_resize_debounce(mut self, delay: Duration) -> Self {
        self.resize_debounce = delay;
        self
    }

    pub fn destroy_on_close(mut self, destroy: bool) -> Self {
        self.destroy_on_close = destroy;
        self
    }
}

struct Session {
    state: WidgetState,
    title: String,
    geometry: TerminalGeometry,
    process_id: Option<ProcessId>,
    input: Option<mpsc::UnboundedSender<Bytes>>,
    pump: Option<JoinHandle<()>>,
}

/// Client handle of one remote terminal.
pub struct TerminalWidget {
    options: TerminalWidgetOptions,
    backend: Arc<dyn TerminalBackend>,
    workspace: Arc<dyn WorkspaceRoot>,
    emulator: Arc<dyn TerminalEmulator>,
    session: Arc<Mutex<Session>>,
    resizer: Debouncer<TerminalGeometry>,
    closed: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for TerminalWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session.lock();
        f.debug_struct("TerminalWidget")
            .field("id", &self.options.id)
            .field("state", &session.state)
            .field("process_id", &session.process_id)
            .field("geometry", &session.geometry)
            .finish()
    }
}

impl TerminalWidget {
    /// Build an inert widget. Must be called inside a tokio runtime.
    pub fn new(
        options: TerminalWidgetOptions,
        backend: Arc<dyn TerminalBackend>,
        workspace: Arc<dyn WorkspaceRoot>,
        emulator: Arc<dyn TerminalEmulator>,
    ) -> Self {
        let session = Arc::new(Mutex::new(Session {
            state: WidgetState::Inert,
            title: options.label.clone(),
            geometry: options.initial_geometry,
            process_id: None,
            input: None,
            pump: None,
        }));

        let resizer = {
            let backend = Arc::clone(&backend);
            let emulator = Arc::clone(&emulator);
            let session = Arc::clone(&session);
            Debouncer::new(options.resize_debounce, move |geometry: TerminalGeometry| {
                let backend = Arc::clone(&backend);
                let emulator = Arc::clone(&emulator);
                let session = Arc::clone(&session);
                async move { apply_resize(&*backend, &*emulator, &session, geometry).await }
            })
        };

        Self {
            options,
            backend,
            workspace,
            emulator,
            session,
            resizer,
            closed: Arc::new(watch::Sender::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.options.id
    }

    pub fn caption(&self) -> &str {
        &self.options.caption
    }

    pub fn title(&self) -> String {
        self.session.lock().title.clone()
    }

    pub fn state(&self) -> WidgetState {
        self.session.lock().state
    }

    /// Server id of the attached process, once create succeeded.
    pub fn process_id(&self) -> Option<ProcessId> {
        self.session.lock().process_id.clone()
    }

    pub fn geometry(&self) -> TerminalGeometry {
        self.session.lock().geometry
    }

    /// Resolve once the stream has ended or the widget was disposed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Create the remote process and attach to its stream.
    ///
    /// Only valid on an inert widget. A spawn failure reported by the server
    /// leaves the widget [`Failed`](WidgetState::Failed) and still returns
    /// `Ok`; transport errors are returned.
    pub async fn start(&self) -> ClientResult<()> {
        {
            let mut session = self.session.lock();
            if session.state != WidgetState::Inert {
                return Err(ClientError::InvalidState(session.state));
            }
            session.state = WidgetState::Starting;
        }

        let root = self.workspace.root_uri().await;
        let geometry = self.geometry();

        let outcome = match self.backend.create(root.as_deref(), geometry).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(widget_id = %self.options.id, error = %e, "Failed to create terminal");
                self.fail();
                return Err(e);
            }
        };

        let Some(id) = outcome.into_process_id() else {
            error!(
                widget_id = %self.options.id,
                "Error creating terminal widget, see the backend error log for more information"
            );
            self.fail();
            return Ok(());
        };

        let disposed = {
            let mut session = self.session.lock();
            if session.state == WidgetState::Disposed {
                true
            } else {
                session.process_id = Some(id.clone());
                false
            }
        };
        if disposed {
            debug!(widget_id = %self.options.id, terminal_id = %id, "Widget disposed during create");
            self.release_quietly(&id).await;
            return Ok(());
        }

        let connection = match self.backend.connect(&id).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(widget_id = %self.options.id, terminal_id = %id, error = %e, "Failed to open terminal stream");
                {
                    let mut session = self.session.lock();
                    if session.state != WidgetState::Disposed {
                        session.state = WidgetState::Failed;
                        session.title = TERMINATED_TITLE.to_string();
                    }
                }
                self.release_quietly(&id).await;
                return Err(e);
            }
        };

        self.attach(&id, connection);

        // Resizes that settled while Create was in flight only reached the emulator.
        let current = self.geometry();
        if current != geometry && self.state() == WidgetState::Active {
            if let Err(e) = self.backend.resize(&id, current).await {
                warn!(terminal_id = %id, error = %e, "Failed to resize terminal");
            }
        }
        Ok(())
    }

    /// Forward keystrokes or pasted text to the process.
    ///
    /// Input is dropped unless the widget is active.
    pub fn send_input(&self, data: impl Into<Bytes>) {
        let session = self.session.lock();
        match (session.state, &session.input) {
            (WidgetState::Active, Some(input)) => {
                if input.send(data.into()).is_err() {
                    debug!(widget_id = %self.options.id, "Stream closed, dropping input");
                }
            }
            (state, _) => {
                debug!(widget_id = %self.options.id, state = ?state, "Dropping input");
            }
        }
    }

    /// The host viewport changed size.
    ///
    /// The emulator and server follow once changes have been quiet for the
    /// debounce window; only the last geometry is applied.
    pub fn on_viewport_resize(&self, geometry: TerminalGeometry) {
        {
            let mut session = self.session.lock();
            if session.state == WidgetState::Disposed {
                return;
            }
            session.geometry = geometry;
        }
        self.resizer.push(geometry);
    }

    /// The emulator reported a new title (OSC 0/2).
    pub fn on_title_change(&self, title: impl Into<String>) {
        let mut session = self.session.lock();
        if session.state != WidgetState::Disposed {
            session.title = title.into();
        }
    }

    pub fn focus(&self) {
        self.emulator.focus();
    }

    /// Close the stream and stop all background work. Idempotent.
    pub fn dispose(&self) {
        let (previous, pump) = {
            let mut session = self.session.lock();
            if session.state == WidgetState::Disposed {
                return;
            }
            let previous = session.state;
            session.state = WidgetState::Disposed;
            session.input = None;
            (previous, session.pump.take())
        };

        if let Some(pump) = pump {
            pump.abort();
        }
        self.resizer.cancel();
        self.closed.send_replace(true);
        if self.options.destroy_on_close {
            self.emulator.dispose();
        }

        info!(widget_id = %self.options.id, previous = ?previous, "Terminal widget disposed");
    }

    fn fail(&self) {
        let mut session = self.session.lock();
        if session.state != WidgetState::Disposed {
            session.state = WidgetState::Failed;
        }
    }

    async fn release_quietly(&self, id: &ProcessId) {
        if let Err(e) = self.backend.release(id).await {
            warn!(widget_id = %self.options.id, terminal_id = %id, error = %e, "Failed to release terminal");
        }
    }

    fn attach(&self, id: &ProcessId, connection: TerminalConnection) {
        let TerminalConnection { input, mut output } = connection;

        let mut session = self.session.lock();
        if session.state == WidgetState::Disposed {
            // Dropping the connection closes the stream; the server releases.
            return;
        }
        session.state = WidgetState::Active;
        session.input = Some(input);

        let emulator = Arc::clone(&self.emulator);
        let pump_session = Arc::clone(&self.session);
        let closed = Arc::clone(&self.closed);
        let widget_id = self.options.id.clone();
        let terminal_id = id.clone();
        session.pump = Some(tokio::spawn(async move {
            while let Some(chunk) = output.recv().await {
                emulator.write(&chunk);
            }

            {
                let mut session = pump_session.lock();
                if session.state != WidgetState::Disposed {
                    session.title = TERMINATED_TITLE.to_string();
                }
            }
            closed.send_replace(true);
            info!(widget_id = %widget_id, terminal_id = %terminal_id, "Terminal stream ended");
        }));

        info!(widget_id = %self.options.id, terminal_id = %id, "Terminal widget active");
    }
}

impl Drop for TerminalWidget {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn apply_resize(
    backend: &dyn TerminalBackend,
    emulator: &dyn TerminalEmulator,
    session: &Mutex<Session>,
    geometry: TerminalGeometry,
) {
    let target = {
        let session = session.lock();
        match session.state {
            WidgetState::Disposed => return,
            WidgetState::Active => session.process_id.clone(),
            _ => None,
        }
    };

    emulator.resize(geometry);

    let Some(id) = target else {
        return;
    };
    if let Err(e) = backend.resize(&id, geometry).await {
        warn!(terminal_id = %id, error = %e, "Failed to resize terminal");
    }
}
