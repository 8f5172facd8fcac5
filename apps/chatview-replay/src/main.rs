mod bridge;
mod config;
mod logging;
mod state;

use std::{
    io::Write,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use bridge::{UiUpdateCallback, ViewBridge};
use config::{ConfigError, ViewConfig};
use serde::Deserialize;
use state::ViewSnapshot;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinSet,
};
use tracing::{debug, error, info, trace, warn};
use view_core::{BackendChannels, BackendEvent, RequestId, RoomCategory};

/// One line of replay input: a view action or a backend callback.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Action(ViewAction),
    Event(BackendEvent),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ViewAction {
    SelectRoom { room_id: String },
    SetRoomFilter { filter: String },
    SetTyping {
        user_id: String,
        room_id: String,
        typing: bool,
    },
    /// Backend call; give `request_id` to complete it from a later
    /// `async_call_completed` line.
    Call {
        method: String,
        #[serde(default)]
        args: Vec<serde_json::Value>,
        #[serde(default)]
        request_id: Option<RequestId>,
    },
}

#[derive(Debug, Error)]
enum ReplayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    info!("starting chatview-replay");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "replay failed");
            eprintln!("chatview-replay: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ReplayError> {
    let config = ViewConfig::from_env()?;
    let (channels, mut command_rx, events) =
        BackendChannels::new(config.command_buffer, config.event_buffer);

    let command_task = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            info!(command = command.label(), ?command, "view command");
        }
    });

    let published = Arc::new(AtomicUsize::new(0));
    let published_for_ui = Arc::clone(&published);
    let ui_update: UiUpdateCallback = Arc::new(move |snapshot: ViewSnapshot| {
        let count = published_for_ui.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(
            count,
            rooms = snapshot.rooms.len(),
            timeline = snapshot.timeline.len(),
            "snapshot published"
        );
    });
    let bridge = ViewBridge::spawn(
        config,
        &channels,
        events,
        tokio::runtime::Handle::current(),
        ui_update,
    );

    let mut calls = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<ReplayLine>(line) {
            Ok(ReplayLine::Event(event)) => {
                if let Err(err) = channels.emit(event).await {
                    error!(line_number, error = %err, "view stopped consuming callbacks");
                    break;
                }
            }
            Ok(ReplayLine::Action(ViewAction::SelectRoom { room_id })) => {
                bridge.select_room(room_id);
            }
            Ok(ReplayLine::Action(ViewAction::SetRoomFilter { filter })) => {
                bridge.set_room_filter(filter);
            }
            Ok(ReplayLine::Action(ViewAction::SetTyping {
                user_id,
                room_id,
                typing,
            })) => {
                if let Err(err) = bridge.set_typing(user_id, room_id, typing).await {
                    warn!(line_number, error = %err, "typing notice not sent");
                }
            }
            Ok(ReplayLine::Action(ViewAction::Call {
                method,
                args,
                request_id,
            })) => {
                let pending = bridge.register_call(request_id.unwrap_or_default());
                info!(line_number, %method, request_id = %pending.request_id(), "backend call started");
                let bridge = Arc::clone(&bridge);
                calls.spawn(async move {
                    match bridge.send_call(pending, method.clone(), args).await {
                        Ok(result) => info!(%method, %result, "backend call returned"),
                        Err(err) => warn!(%method, error = %err, "backend call failed"),
                    }
                });
            }
            Err(err) => warn!(line_number, error = %err, "skipping unreadable replay line"),
        }
    }
    debug!(lines = line_number, "replay input exhausted");

    drop(channels);
    let snapshot = bridge.shutdown().await;
    if !calls.is_empty() {
        warn!(
            pending = bridge.pending_calls(),
            "backend calls left unanswered at end of replay"
        );
        calls.abort_all();
    }
    while calls.join_next().await.is_some() {}
    drop(bridge);
    if let Err(err) = command_task.await {
        warn!(error = %err, "command drain task failed");
    }
    info!(
        snapshots = published.load(Ordering::Relaxed),
        "replay finished"
    );

    let mut stdout = std::io::stdout().lock();
    render(&snapshot, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

fn render(snapshot: &ViewSnapshot, out: &mut impl Write) -> std::io::Result<()> {
    for account in &snapshot.accounts {
        writeln!(out, "account {account}")?;
    }
    if !snapshot.room_filter.is_empty() {
        writeln!(out, "filter: {}", snapshot.room_filter)?;
    }
    for room in &snapshot.rooms {
        let marker = if room.is_selected { '>' } else { ' ' };
        writeln!(
            out,
            "{marker}[{}] {} ({})",
            category_label(room.category),
            room.display_name,
            room.room_id
        )?;
        if let Some(topic) = &room.topic {
            writeln!(out, "    topic: {topic}")?;
        }
        if !room.typing_text.is_empty() {
            writeln!(out, "    {}", room.typing_text)?;
        }
    }
    for row in &snapshot.timeline {
        let own = if row.is_own { '*' } else { ' ' };
        let echo = if row.is_local_echo { " (sending)" } else { "" };
        writeln!(
            out,
            "{own}{} {} {}{echo}",
            row.date_ms, row.event_id, row.text
        )?;
    }
    if let Some(error) = &snapshot.error_text {
        writeln!(out, "error: {error}")?;
    }
    Ok(())
}

fn category_label(category: RoomCategory) -> &'static str {
    match category {
        RoomCategory::Invites => "invite",
        RoomCategory::Rooms => "room",
        RoomCategory::Left => "left",
    }
}
