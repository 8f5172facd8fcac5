//! Display-name resolution and deterministic name colors.

use std::fmt;

use crate::users::UserDirectory;

/// HSL color assigned to a display name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameColor {
    /// Hue in degrees, `0..360`.
    pub hue: u16,
    /// Saturation percentage, `0..=100`.
    pub saturation: f32,
    /// Lightness percentage, `0..=100`.
    pub lightness: f32,
}

impl fmt::Display for NameColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({}, {}%, {}%)",
            self.hue, self.saturation, self.lightness
        )
    }
}

/// Fixed saturation/lightness applied to every name color, plus the error color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameStyle {
    pub saturation: f32,
    pub lightness: f32,
    /// Color forced on senders of undecryptable events.
    pub error_color: NameColor,
}

impl Default for NameStyle {
    fn default() -> Self {
        Self {
            saturation: 32.0,
            lightness: 75.0,
            error_color: NameColor {
                hue: 0,
                saturation: 90.0,
                lightness: 70.0,
            },
        }
    }
}

impl NameStyle {
    /// Color for a display name under this style.
    pub fn color_for(&self, name: &str) -> NameColor {
        NameColor {
            hue: hue_from(name),
            saturation: self.saturation,
            lightness: self.lightness,
        }
    }
}

/// Hue in `0..360` derived from the UTF-16 code units of `name`.
pub fn hue_from(name: &str) -> u16 {
    let sum = name
        .encode_utf16()
        .fold(0_u64, |acc, unit| acc.wrapping_add(u64::from(unit) * 99));
    (sum % 360) as u16
}

/// Escape characters with a meaning in the HTML-like display markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Strip the leading sigil (`@`, `!`, `#`, `$`) from a Matrix identifier.
pub fn strip_sigil(id: &str) -> &str {
    id.strip_prefix(['@', '!', '#', '$']).unwrap_or(id)
}

/// Whether every space-separated word of `filter` occurs in `text`, ignoring case.
pub fn filter_matches(filter: &str, text: &str) -> bool {
    let text = text.to_lowercase();
    filter
        .to_lowercase()
        .split(' ')
        .filter(|word| !word.is_empty())
        .all(|word| text.contains(word))
}

/// Resolves and renders user names using a directory and a color style.
pub struct NameRenderer<'a, D: UserDirectory + ?Sized> {
    directory: &'a D,
    style: &'a NameStyle,
}

impl<'a, D: UserDirectory + ?Sized> NameRenderer<'a, D> {
    pub fn new(directory: &'a D, style: &'a NameStyle) -> Self {
        Self { directory, style }
    }

    pub fn style(&self) -> &NameStyle {
        self.style
    }

    /// Display name of a user, falling back to the identifier without its sigil.
    pub fn display_name(&self, user_id: &str) -> String {
        self.directory
            .display_name(user_id)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| strip_sigil(user_id).to_owned())
    }

    /// Color of a user's name.
    pub fn color_for_user(&self, user_id: &str) -> NameColor {
        self.style.color_for(&self.display_name(user_id))
    }

    /// `<font>`-wrapped, escaped display name of a user.
    pub fn colored_name_html(&self, user_id: &str) -> String {
        let name = self.display_name(user_id);
        colored_html(&name, self.style.color_for(&name))
    }

    /// Display name of a user wrapped in an explicit color.
    pub fn colored_name_html_with(&self, user_id: &str, color: NameColor) -> String {
        colored_html(&self.display_name(user_id), color)
    }

    /// "X is typing…" line for the members typing in a room, excluding `self_id`.
    pub fn typing_text(&self, members: &[String], self_id: &str) -> String {
        let mut others = members
            .iter()
            .filter(|member| member.as_str() != self_id)
            .map(|member| (self.display_name(member), member.as_str()))
            .collect::<Vec<_>>();
        others.sort();
        others.dedup_by(|a, b| a.1 == b.1);

        let names = others
            .iter()
            .map(|(name, _)| colored_html(name, self.style.color_for(name)))
            .collect::<Vec<_>>();

        match names.as_slice() {
            [] => String::new(),
            [only] => format!("{only} is typing…"),
            [head @ .., last] => format!("{} and {last} are typing…", head.join(", ")),
        }
    }
}

fn colored_html(name: &str, color: NameColor) -> String {
    format!("<font color='{color}'>{}</font>", escape_html(name))
}
