//! Bridge that folds backend callbacks into view snapshots and relays view commands.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use view_core::{
    BackendChannelError, BackendChannels, BackendEvent, CallError, CommandSender, EventStream,
    PendingCall, PendingCalls, RequestId, ViewCommand,
};

use crate::{
    config::ViewConfig,
    state::{ViewSnapshot, ViewState},
};

/// Callback used to publish new UI snapshots.
pub type UiUpdateCallback = Arc<dyn Fn(ViewSnapshot) + Send + Sync + 'static>;

/// Bridges view actions and backend callbacks.
pub struct ViewBridge {
    commands: CommandSender,
    state: Arc<Mutex<ViewState>>,
    calls: PendingCalls,
    ui_update: UiUpdateCallback,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl ViewBridge {
    /// Start the backend event worker and publish the initial snapshot.
    ///
    /// The worker is the only consumer of `events` and runs until every
    /// event sender is dropped.
    pub fn spawn(
        config: ViewConfig,
        channels: &BackendChannels,
        mut events: EventStream,
        runtime_handle: tokio::runtime::Handle,
        ui_update: UiUpdateCallback,
    ) -> Arc<Self> {
        info!(
            timeline_max_entries = config.timeline_max_entries,
            echo_window = config.echo_window,
            "spawning view bridge"
        );

        let state = Arc::new(Mutex::new(ViewState::new(config)));
        let calls = PendingCalls::default();

        let state_for_events = Arc::clone(&state);
        let calls_for_events = calls.clone();
        let ui_update_for_events = Arc::clone(&ui_update);
        let event_task = runtime_handle.spawn(async move {
            debug!("view event worker started");
            while let Some(event) = events.recv().await {
                debug!(event = event.label(), "received backend event");

                if let BackendEvent::AsyncCallCompleted {
                    request_id,
                    result,
                    error,
                } = &event
                    && calls_for_events.complete(*request_id, result.clone(), error.clone())
                {
                    continue;
                }

                let snapshot = {
                    let mut state = lock_state(&state_for_events);
                    state.handle_backend_event(event);
                    state.snapshot()
                };
                (ui_update_for_events)(snapshot);
            }
            debug!("view event worker exiting: backend event stream closed");
        });

        let bridge = Arc::new(Self {
            commands: channels.command_sender(),
            state,
            calls,
            ui_update,
            event_task: Mutex::new(Some(event_task)),
        });
        bridge.publish_snapshot();
        bridge
    }

    /// Current snapshot without publishing it.
    pub fn snapshot(&self) -> ViewSnapshot {
        lock_state(&self.state).snapshot()
    }

    /// Select the room whose timeline is rendered.
    pub fn select_room(&self, room_id: impl Into<String>) {
        lock_state(&self.state).select_room(room_id);
        self.publish_snapshot();
    }

    /// Narrow the sidebar to rooms matching `filter`.
    pub fn set_room_filter(&self, filter: impl Into<String>) {
        lock_state(&self.state).set_room_filter(filter);
        self.publish_snapshot();
    }

    /// Tell the backend whether the account is typing in a room.
    pub async fn set_typing(
        &self,
        user_id: impl Into<String>,
        room_id: impl Into<String>,
        typing: bool,
    ) -> Result<(), BackendChannelError> {
        self.send_command(ViewCommand::SetTyping {
            user_id: user_id.into(),
            room_id: room_id.into(),
            typing,
        })
        .await
    }

    /// Invoke a backend method and wait for its completion callback.
    pub async fn call(
        &self,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<Value, CallError> {
        let pending = self.calls.register();
        self.send_call(pending, method, args).await
    }

    /// Register a call under a known id before it is sent, so a completion
    /// for that id is claimed even if it arrives first.
    pub fn register_call(&self, request_id: RequestId) -> PendingCall {
        self.calls.register_with(request_id)
    }

    /// Send the command for a registered call and wait for its completion.
    pub async fn send_call(
        &self,
        pending: PendingCall,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<Value, CallError> {
        let request_id = pending.request_id();
        let command = ViewCommand::Call {
            request_id,
            method: method.into(),
            args,
        };
        if self.send_command(command).await.is_err() {
            self.calls.cancel(request_id);
            return Err(CallError::CommandChannelClosed);
        }
        pending.wait().await
    }

    /// Number of backend calls still awaiting completion.
    pub fn pending_calls(&self) -> usize {
        self.calls.len()
    }

    /// Wait for the backend event stream to close and return the final snapshot.
    pub async fn shutdown(&self) -> ViewSnapshot {
        let task = self
            .event_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task
            && let Err(err) = task.await
        {
            warn!(error = %err, "view event worker failed");
        }
        self.snapshot()
    }

    async fn send_command(&self, command: ViewCommand) -> Result<(), BackendChannelError> {
        debug!(command = command.label(), "queueing view command");
        self.commands.send(command).await
    }

    fn publish_snapshot(&self) {
        let snapshot = self.snapshot();
        trace!(
            rooms = snapshot.rooms.len(),
            timeline = snapshot.timeline.len(),
            selected = snapshot.selected_room_id.as_deref().unwrap_or(""),
            "publishing snapshot"
        );
        (self.ui_update)(snapshot);
    }
}

impl Drop for ViewBridge {
    fn drop(&mut self) {
        if let Some(task) = self
            .event_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            info!("shutting down view bridge tasks");
            task.abort();
        }
    }
}

fn lock_state(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
