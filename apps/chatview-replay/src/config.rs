//! Environment-backed runtime configuration for `chatview-replay`.

use std::env;

use thiserror::Error;
use view_core::{
    NameStyle,
    timeline::{DEFAULT_ECHO_WINDOW, DEFAULT_MAX_ENTRIES},
};

const DEFAULT_NAME_SATURATION: f32 = 32.0;
const DEFAULT_NAME_LIGHTNESS: f32 = 75.0;
const DEFAULT_EVENT_BUFFER: usize = 256;
const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Runtime configuration used by the view layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    /// Timeline cap for in-memory entry retention.
    pub timeline_max_entries: usize,
    /// Number of recent timeline entries searched for a pending local echo.
    pub echo_window: usize,
    /// Saturation/lightness of name colors.
    pub name_style: NameStyle,
    /// Capacity of the backend callback channel.
    pub event_buffer: usize,
    /// Capacity of the view command channel.
    pub command_buffer: usize,
    /// Render join/leave/invite/kick/ban rows.
    pub show_membership_events: bool,
    /// Render display name and avatar change rows.
    pub show_profile_changes: bool,
    /// Viewing account; rows it sent are flagged as own.
    pub self_user_id: Option<String>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            timeline_max_entries: DEFAULT_MAX_ENTRIES,
            echo_window: DEFAULT_ECHO_WINDOW,
            name_style: NameStyle {
                saturation: DEFAULT_NAME_SATURATION,
                lightness: DEFAULT_NAME_LIGHTNESS,
                ..NameStyle::default()
            },
            event_buffer: DEFAULT_EVENT_BUFFER,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            show_membership_events: true,
            show_profile_changes: true,
            self_user_id: None,
        }
    }
}

impl ViewConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let timeline_max_entries = parse_or(
            "CHATVIEW_TIMELINE_MAX_ENTRIES",
            DEFAULT_MAX_ENTRIES,
            &mut lookup,
        )?;
        let echo_window = parse_or("CHATVIEW_ECHO_WINDOW", DEFAULT_ECHO_WINDOW, &mut lookup)?;
        let saturation = parse_or(
            "CHATVIEW_NAME_SATURATION",
            DEFAULT_NAME_SATURATION,
            &mut lookup,
        )?;
        let lightness = parse_or(
            "CHATVIEW_NAME_LIGHTNESS",
            DEFAULT_NAME_LIGHTNESS,
            &mut lookup,
        )?;
        let event_buffer = parse_or("CHATVIEW_EVENT_BUFFER", DEFAULT_EVENT_BUFFER, &mut lookup)?;
        let command_buffer = parse_or(
            "CHATVIEW_COMMAND_BUFFER",
            DEFAULT_COMMAND_BUFFER,
            &mut lookup,
        )?;
        let show_membership_events =
            parse_bool_or("CHATVIEW_SHOW_MEMBERSHIP_EVENTS", true, &mut lookup)?;
        let show_profile_changes =
            parse_bool_or("CHATVIEW_SHOW_PROFILE_CHANGES", true, &mut lookup)?;
        let self_user_id = optional_trimmed_env("CHATVIEW_SELF_USER", &mut lookup);

        for (key, value) in [
            ("CHATVIEW_TIMELINE_MAX_ENTRIES", timeline_max_entries),
            ("CHATVIEW_ECHO_WINDOW", echo_window),
            ("CHATVIEW_EVENT_BUFFER", event_buffer),
            ("CHATVIEW_COMMAND_BUFFER", command_buffer),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: "0".to_owned(),
                    reason: "must be at least 1".to_owned(),
                });
            }
        }
        for (key, value) in [
            ("CHATVIEW_NAME_SATURATION", saturation),
            ("CHATVIEW_NAME_LIGHTNESS", lightness),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: value.to_string(),
                    reason: "must be between 0 and 100".to_owned(),
                });
            }
        }

        Ok(Self {
            timeline_max_entries,
            echo_window,
            name_style: NameStyle {
                saturation,
                lightness,
                ..NameStyle::default()
            },
            event_buffer,
            command_buffer,
            show_membership_events,
            show_profile_changes,
            self_user_id,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_or<T, F>(key: &'static str, default: T, lookup: &mut F) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value.parse::<T>().map_err(|err| ConfigError::InvalidValue {
        key,
        value,
        reason: err.to_string(),
    })
}

fn parse_bool_or<F>(key: &'static str, default: bool, lookup: &mut F) -> Result<bool, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected a boolean (true/false)".to_owned(),
        }),
    }
}
