//! Session control
//!
//! A `SessionController` owns one host connection: the receive loop that
//! decodes host records into the screen and keyboard state, and the command
//! surface automation callers use (send keys, wait, read the screen).
//!
//! The receive loop is the only writer of host-driven screen content and
//! keyboard transitions. Key entry edits input fields on a copy of the
//! screen and commits it only when every key applies. Callers read the
//! screen through consistent snapshots and block only in the two keyboard
//! waits.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::codepage::{CodepageRegistry, TableConverter};
use super::datastream::{DataStreamParser, HostEvent};
use super::error::{Error, Result};
use super::handler::{DeclineHandler, RequestHandler};
use super::keyboard::{
    KeyEntry, KeyMnemonic, KeySequence, KeyToken, KeyboardLock, KeyboardMode, KeyboardTransition,
};
use super::screen::{Dimensions, InputField, ScreenSnapshot, SharedScreen};
use super::transport::{Connector, Endpoint, HostReader, HostWriter, TransportError};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Not connected
    Disconnected,
    /// Connecting in progress
    Connecting,
    /// Connected and active
    Connected,
    /// Host ended the connection; `disconnect` releases it
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Session events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// State changed
    StateChanged(SessionState),
    /// A host record changed the screen
    ScreenUpdated,
    /// Keyboard lock changed
    KeyboardChanged(KeyboardMode),
    /// Host raised an interrupt request
    InterruptRequested,
    /// Request handler answer was submitted
    ResponseSent(String),
    /// Host sounded the alarm
    Alarm,
    /// Message waiting indicator
    MessageLight(bool),
    /// Host record could not be decoded and was dropped
    RecordDiscarded(String),
}

/// What `send_keys_and_wait` blocks on after sending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitFor {
    /// Return as soon as the keys are sent
    #[default]
    Nothing,
    /// Keyboard unlocked
    Unlock,
    /// Lock followed by unlock
    LockCycle,
}

impl FromStr for WaitFor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "nothing" => Ok(Self::Nothing),
            "unlock" => Ok(Self::Unlock),
            "cycle" | "lock-cycle" | "lockcycle" => Ok(Self::LockCycle),
            other => Err(Error::Configuration(format!(
                "Unknown wait mode '{other}' (expected none, unlock or cycle)"
            ))),
        }
    }
}

/// Default deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTimeouts {
    /// `wait_for_unlock` default
    pub unlock: Duration,
    /// `wait_for_lock_cycle` default; a cycle assumes a quick round trip
    pub lock_cycle: Duration,
    /// Connect plus handshake
    pub connect: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            unlock: Duration::from_secs(30),
            lock_cycle: Duration::from_secs(5),
            connect: Duration::from_secs(10),
        }
    }
}

type SharedWriter = Arc<tokio::sync::Mutex<Box<dyn HostWriter>>>;

/// State visible to both the controller and its receive loop
struct Shared {
    id: Uuid,
    state: RwLock<SessionState>,
    handler: RwLock<Arc<dyn RequestHandler>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.read()
    }

    fn set_state(&self, new: SessionState) {
        let old = std::mem::replace(&mut *self.state.write(), new);
        if old != new {
            debug!("Session {} {} -> {}", self.id, old, new);
            self.emit(SessionEvent::StateChanged(new));
        }
    }

    /// Move to `to` only from one of `from`
    fn transition(&self, from: &[SessionState], to: SessionState) -> bool {
        let mut state = self.state.write();
        if !from.contains(&*state) {
            return false;
        }
        *state = to;
        drop(state);
        self.emit(SessionEvent::StateChanged(to));
        true
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Resources of a live connection
struct Active {
    endpoint: Endpoint,
    codepage: String,
    screen: SharedScreen,
    keyboard: Arc<KeyboardLock>,
    writer: SharedWriter,
    encoder: TableConverter,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Controller for one automated 5250 session
pub struct SessionController {
    shared: Arc<Shared>,
    registry: Arc<CodepageRegistry>,
    connector: Arc<dyn Connector>,
    timeouts: SessionTimeouts,
    active: RwLock<Option<Arc<Active>>>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.shared.id)
            .field("state", &self.shared.state())
            .field("transport", &self.connector.transport_type())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Controller that connects through `connector` and resolves code pages
    /// from `registry`
    pub fn new(connector: Arc<dyn Connector>, registry: Arc<CodepageRegistry>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                state: RwLock::new(SessionState::Disconnected),
                handler: RwLock::new(Arc::new(DeclineHandler)),
                event_tx,
            }),
            registry,
            connector,
            timeouts: SessionTimeouts::default(),
            active: RwLock::new(None),
        }
    }

    /// Set default deadlines
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Install a request handler
    #[must_use]
    pub fn with_request_handler(self, handler: impl RequestHandler + 'static) -> Self {
        self.set_request_handler(handler);
        self
    }

    /// Get session ID
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Default deadlines
    pub fn timeouts(&self) -> SessionTimeouts {
        self.timeouts
    }

    /// Host of the current connection
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.active.read().as_ref().map(|a| a.endpoint.clone())
    }

    /// Code page of the current connection
    pub fn codepage(&self) -> Option<String> {
        self.active.read().as_ref().map(|a| a.codepage.clone())
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Connect, negotiate and start the receive loop. On failure the
    /// session stays `Disconnected`.
    pub async fn connect(&self, host: &str, port: u16, dimensions: Dimensions, codepage: &str) -> Result<()> {
        {
            let mut state = self.shared.state.write();
            if *state != SessionState::Disconnected {
                return Err(Error::State(format!("connect requires a disconnected session (session is {})", *state)));
            }
            *state = SessionState::Connecting;
        }
        self.shared.emit(SessionEvent::StateChanged(SessionState::Connecting));

        match self.open(Endpoint::new(host, port), dimensions, codepage).await {
            Ok(active) => {
                *self.active.write() = Some(Arc::clone(&active));
                if !self.shared.transition(&[SessionState::Connecting], SessionState::Connected) {
                    // Host hung up, or disconnect ran, before the loop was handed over
                    let state = self.shared.state();
                    warn!("Session {} lost its connection while connecting ({})", self.shared.id, state);
                    self.discard(&active).await;
                    self.shared.set_state(SessionState::Disconnected);
                    return Err(Error::State(format!("connection ended while connecting (session is {state})")));
                }
                info!(
                    "Session {} connected to {} ({}, CCSID-{})",
                    self.shared.id,
                    active.endpoint,
                    dimensions,
                    active.codepage
                );
                Ok(())
            }
            Err(e) => {
                warn!("Session {} failed to connect to {}:{}: {}", self.shared.id, host, port, e);
                self.shared.set_state(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn open(&self, endpoint: Endpoint, dims: Dimensions, codepage: &str) -> Result<Arc<Active>> {
        // The fields are public, so a literal can skip `Dimensions::new`
        let dims = Dimensions::new(dims.rows, dims.cols)?;
        let encoder = self.registry.converter(codepage)?;
        let parser = DataStreamParser::new(encoder.clone(), dims);

        let deadline = self.timeouts.connect;
        let pair = tokio::time::timeout(deadline, self.connector.connect(&endpoint, dims))
            .await
            .map_err(|_| TransportError::Timeout(deadline))??;
        debug!("Transport ready: {}", pair.info);

        let screen = SharedScreen::new(dims);
        // Nothing is accepted until the host's first screen unlocks the keyboard
        let keyboard = Arc::new(KeyboardLock::new(KeyboardMode::Locked));
        let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(pair.writer));
        let cancel = CancellationToken::new();

        let receive = ReceiveLoop {
            shared: Arc::clone(&self.shared),
            reader: pair.reader,
            parser,
            screen: screen.clone(),
            keyboard: Arc::clone(&keyboard),
            writer: Arc::clone(&writer),
            encoder: encoder.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(receive.run());

        Ok(Arc::new(Active {
            endpoint,
            codepage: encoder.id().to_string(),
            screen,
            keyboard,
            writer,
            encoder,
            cancel,
            task: Mutex::new(Some(task)),
        }))
    }

    /// Drop resources installed by a connect that did not complete
    async fn discard(&self, active: &Arc<Active>) {
        {
            let mut slot = self.active.write();
            if slot.as_ref().is_some_and(|a| Arc::ptr_eq(a, active)) {
                *slot = None;
            }
        }
        active.cancel.cancel();
        active.keyboard.close("connection ended while connecting");
        let task = active.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Session {}: receive loop ended abnormally: {}", self.shared.id, e);
            }
        }
    }

    fn require_active(&self, operation: &str) -> Result<Arc<Active>> {
        let state = self.shared.state();
        if state != SessionState::Connected {
            return Err(Error::State(format!(
                "{operation} requires a connected session (session is {state})"
            )));
        }
        self.active
            .read()
            .clone()
            .ok_or_else(|| Error::not_connected(operation))
    }

    /// Parse a key sequence, apply it to the input fields and send one
    /// record per submit key. Nothing is sent, and the screen is left
    /// unchanged, unless the whole sequence parses, encodes and applies.
    pub async fn send_keys(&self, sequence: &str) -> Result<()> {
        let active = self.require_active("send_keys")?;
        let keys = KeySequence::parse(sequence)?;
        submit(&active.writer, &active.screen, &active.keyboard, &active.encoder, &keys).await
    }

    /// Send keys, then block as requested. `timeout` of `None` uses the
    /// session default for that wait.
    pub async fn send_keys_and_wait(&self, sequence: &str, wait: WaitFor, timeout: Option<Duration>) -> Result<()> {
        self.send_keys(sequence).await?;
        match wait {
            WaitFor::Nothing => Ok(()),
            WaitFor::Unlock => self.wait_for_unlock(timeout).await,
            WaitFor::LockCycle => self.wait_for_lock_cycle(timeout).await,
        }
    }

    /// Block until the keyboard is unlocked
    pub async fn wait_for_unlock(&self, timeout: Option<Duration>) -> Result<()> {
        let keyboard = Arc::clone(&self.require_active("wait_for_unlock")?.keyboard);
        keyboard
            .wait_for_unlock(timeout.unwrap_or(self.timeouts.unlock))
            .await
    }

    /// Block for a lock followed by an unlock
    pub async fn wait_for_lock_cycle(&self, timeout: Option<Duration>) -> Result<()> {
        let keyboard = Arc::clone(&self.require_active("wait_for_lock_cycle")?.keyboard);
        keyboard
            .wait_for_lock_cycle(timeout.unwrap_or(self.timeouts.lock_cycle))
            .await
    }

    /// Screen as newline-joined rows of exactly `cols` characters
    pub fn get_screen_text(&self) -> Result<String> {
        Ok(self.require_active("get_screen_text")?.screen.as_text())
    }

    /// Detached copy of the screen
    pub fn snapshot(&self) -> Result<ScreenSnapshot> {
        Ok(self.require_active("snapshot")?.screen.snapshot())
    }

    /// Current keyboard mode
    pub fn keyboard_mode(&self) -> Result<KeyboardMode> {
        Ok(self.require_active("keyboard_mode")?.keyboard.mode())
    }

    /// Input fields the host defined on the current screen
    pub fn input_fields(&self) -> Result<Vec<InputField>> {
        Ok(self.require_active("input_fields")?.screen.fields())
    }

    /// Recent keyboard transitions, oldest first
    pub fn keyboard_history(&self) -> Result<Vec<KeyboardTransition>> {
        Ok(self.require_active("keyboard_history")?.keyboard.history())
    }

    /// Replace the interrupt request handler
    pub fn set_request_handler(&self, handler: impl RequestHandler + 'static) {
        *self.shared.handler.write() = Arc::new(handler);
    }

    /// Tear the connection down. Safe to call any number of times; never
    /// fails, teardown problems are logged.
    pub async fn disconnect(&self) {
        let active = self.active.write().take();
        if let Some(active) = active {
            active.cancel.cancel();
            active.keyboard.close("session disconnected");

            if let Err(e) = active.writer.lock().await.shutdown().await {
                warn!("Session {}: transport shutdown failed: {}", self.shared.id, e);
            }
            let task = active.task.lock().take();
            if let Some(task) = task {
                if let Err(e) = task.await {
                    warn!("Session {}: receive loop ended abnormally: {}", self.shared.id, e);
                }
            }
            info!("Session {} disconnected from {}", self.shared.id, active.endpoint);
        }
        self.shared.set_state(SessionState::Disconnected);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.cancel.cancel();
            active.keyboard.close("session dropped");
        }
    }
}

/// Apply keys to the screen and send the resulting input records,
/// recording submissions for cycle waits
async fn submit(
    writer: &SharedWriter,
    screen: &SharedScreen,
    keyboard: &KeyboardLock,
    encoder: &TableConverter,
    keys: &KeySequence,
) -> Result<()> {
    // Reports unencodable characters with their position
    keys.encode(encoder)?;
    let records = screen.update(|buf| {
        let mut draft = buf.clone();
        let records = KeyEntry::new(&mut draft, encoder).apply(keys)?;
        *buf = draft;
        Ok::<_, Error>(records)
    })?;

    if keys.has_submit() {
        keyboard.note_submission();
    }
    let mut writer = writer.lock().await;
    let mut sent = 0;
    for record in &records {
        sent += writer.send(record).await?;
    }
    debug!("Sent {} input records, {} bytes ({} tokens)", records.len(), sent, keys.len());
    Ok(())
}

struct ReceiveLoop {
    shared: Arc<Shared>,
    reader: Box<dyn HostReader>,
    parser: DataStreamParser,
    screen: SharedScreen,
    keyboard: Arc<KeyboardLock>,
    writer: SharedWriter,
    encoder: TableConverter,
    cancel: CancellationToken,
}

impl ReceiveLoop {
    async fn run(mut self) {
        loop {
            let received = tokio::select! {
                () = self.cancel.cancelled() => break,
                r = self.reader.receive() => r,
            };

            match received {
                Ok(Some(record)) => self.process(&record).await,
                Ok(None) => {
                    info!("Session {}: host closed the connection", self.shared.id);
                    self.host_closed("host closed the connection");
                    break;
                }
                Err(e) => {
                    warn!("Session {}: receive failed: {}", self.shared.id, e);
                    self.host_closed(&format!("connection lost: {e}"));
                    break;
                }
            }
        }
        debug!("Session {}: receive loop stopped", self.shared.id);
    }

    fn host_closed(&self, reason: &str) {
        self.keyboard.close(reason);
        self.shared
            .transition(&[SessionState::Connecting, SessionState::Connected], SessionState::Closed);
    }

    async fn process(&mut self, record: &[u8]) {
        let events = match self.parser.parse(record) {
            Ok(events) => events,
            Err(e) => {
                warn!("Session {}: discarding malformed host record: {}", self.shared.id, e);
                self.shared.emit(SessionEvent::RecordDiscarded(e.to_string()));
                return;
            }
        };

        let mut batch = Vec::new();
        let mut screen_changed = false;
        let mut interrupt = false;

        for event in events {
            if event.touches_screen() {
                batch.push(event);
                continue;
            }
            // Screen changes land before the keyboard signal that follows them
            screen_changed |= self.apply(&mut batch);
            match event {
                HostEvent::Keyboard(signal) => {
                    if self.keyboard.signal(signal) {
                        self.shared.emit(SessionEvent::KeyboardChanged(self.keyboard.mode()));
                    }
                }
                HostEvent::Alarm => self.shared.emit(SessionEvent::Alarm),
                HostEvent::MessageLight(on) => self.shared.emit(SessionEvent::MessageLight(on)),
                HostEvent::InterruptRequest => interrupt = true,
                _ => {}
            }
        }
        screen_changed |= self.apply(&mut batch);

        if screen_changed {
            self.shared.emit(SessionEvent::ScreenUpdated);
        }
        if interrupt {
            self.shared.emit(SessionEvent::InterruptRequested);
            self.answer_interrupt().await;
        }
    }

    /// Apply queued screen events under one write lock
    fn apply(&self, batch: &mut Vec<HostEvent>) -> bool {
        if batch.is_empty() {
            return false;
        }
        self.screen.update(|buf| {
            for event in batch.drain(..) {
                let result = match event {
                    HostEvent::Clear => {
                        buf.clear();
                        Ok(())
                    }
                    HostEvent::Write { row, col, cells } => buf.write_run(row, col, &cells),
                    HostEvent::Roll { top, bottom, lines, down } => buf.roll(top, bottom, lines, down),
                    HostEvent::Cursor { row, col } => buf.set_cursor(row, col),
                    HostEvent::Field { row, col, length, numeric_only } => {
                        buf.define_field(row, col, length, numeric_only)
                    }
                    HostEvent::ClearFields => {
                        buf.clear_fields();
                        Ok(())
                    }
                    _ => Ok(()),
                };
                if let Err(e) = result {
                    warn!("Session {}: screen update rejected: {}", self.shared.id, e);
                }
            }
        });
        true
    }

    async fn answer_interrupt(&mut self) {
        let text = self.screen.as_text();
        let handler = Arc::clone(&*self.shared.handler.read());
        let Some(response) = handler.handle_request(&text) else {
            debug!("Session {}: request handler declined", self.shared.id);
            return;
        };

        let mut keys = match KeySequence::parse(&response) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Session {}: request handler response rejected: {}", self.shared.id, e);
                return;
            }
        };
        if !keys.has_submit() {
            keys.push(KeyToken::Key(KeyMnemonic::Enter));
        }

        match submit(&self.writer, &self.screen, &self.keyboard, &self.encoder, &keys).await {
            Ok(()) => {
                info!("Session {}: answered interrupt request", self.shared.id);
                self.shared.emit(SessionEvent::ResponseSent(keys.to_string()));
            }
            Err(e) => warn!("Session {}: failed to send interrupt response: {}", self.shared.id, e),
        }
    }
}
