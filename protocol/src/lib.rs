//! Shared match model and JSON text codec for the scoreboard websocket.
//!
//! This crate owns the wire representation used by both the hub server and
//! the terminal client. Every frame on the socket is a UTF-8 JSON object:
//! inbound frames are tagged by `command`, outbound frames by `type`.
//!
//! Field names follow the camelCase layout the display surfaces already
//! consume, and the half/team selectors travel as the integers `1` and `2`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Length of one half in seconds. The second half starts at this mark.
pub const HALF_DURATION: u32 = 45 * 60;

/// Length of the full match in seconds.
pub const FULL_MATCH_DURATION: u32 = 90 * 60;

/// Lower bound applied to `background.scale`.
pub const MIN_BACKGROUND_SCALE: f64 = 0.1;

/// Upper bound for `background.scale`.
pub const MAX_BACKGROUND_SCALE: f64 = 10.0;

/// Upper bound for `fontSettings[..].fontSize`.
pub const MAX_FONT_SIZE: f64 = 20.0;

/// Font family used for style entries created on demand.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Font size used for style entries created on demand.
pub const DEFAULT_FONT_SIZE: f64 = 4.0;

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by the text codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A half or team selector outside `{1, 2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("selector must be 1 or 2, got {0}")]
pub struct InvalidSelector(pub u8);

// =============================================================================
// SELECTORS
// =============================================================================

/// Which half of the match the clock is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Half {
    #[default]
    First,
    Second,
}

impl Half {
    /// Clock value at which this half starts.
    #[must_use]
    pub fn start_time(self) -> u32 {
        match self {
            Self::First => 0,
            Self::Second => HALF_DURATION,
        }
    }

    /// Clock value at which this half ends.
    #[must_use]
    pub fn end_time(self) -> u32 {
        match self {
            Self::First => HALF_DURATION,
            Self::Second => FULL_MATCH_DURATION,
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

impl TryFrom<u8> for Half {
    type Error = InvalidSelector;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => Err(InvalidSelector(other)),
        }
    }
}

impl From<Half> for u8 {
    fn from(half: Half) -> Self {
        half.as_u8()
    }
}

/// One of the two teams on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Team {
    One,
    Two,
}

impl TryFrom<u8> for Team {
    type Error = InvalidSelector;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(InvalidSelector(other)),
        }
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> Self {
        match team {
            Team::One => 1,
            Team::Two => 2,
        }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Screen coordinates of a rendered element, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Background layer behind the scoreboard elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Background {
    /// Opaque image reference, usually a data URI. `None` means no image.
    pub image: Option<String>,
    pub position: Position,
    pub scale: f64,
    pub fixed: bool,
}

impl Default for Background {
    fn default() -> Self {
        Self { image: None, position: Position::default(), scale: 1.0, fixed: false }
    }
}

/// Font styling for one element class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontSetting {
    pub font_size: f64,
    pub font_family: String,
}

impl Default for FontSetting {
    fn default() -> Self {
        Self { font_size: DEFAULT_FONT_SIZE, font_family: DEFAULT_FONT_FAMILY.to_owned() }
    }
}

/// The authoritative match snapshot.
///
/// Missing fields deserialize to their defaults, which is what lets a
/// partial backup document merge over the default state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchState {
    pub team1_score: u32,
    pub team2_score: u32,
    /// Match clock in seconds.
    pub time: u32,
    pub timer_running: bool,
    pub current_half: Half,
    pub auto_stop: bool,
    pub is_muted: bool,
    pub background: Background,
    /// Element id -> position. Keys are chosen by the control panel.
    pub positions: BTreeMap<String, Position>,
    /// Element class -> font styling.
    pub font_settings: BTreeMap<String, FontSetting>,
}

impl Default for MatchState {
    fn default() -> Self {
        let positions = BTreeMap::from([
            ("team1Score".to_owned(), Position::new(50, 50)),
            ("team2Score".to_owned(), Position::new(1100, 50)),
            ("timer".to_owned(), Position::new(550, 400)),
        ]);
        let font_settings = BTreeMap::from([
            (
                "teamScore".to_owned(),
                FontSetting { font_size: 4.0, font_family: DEFAULT_FONT_FAMILY.to_owned() },
            ),
            ("timer".to_owned(), FontSetting { font_size: 6.0, font_family: DEFAULT_FONT_FAMILY.to_owned() }),
        ]);

        Self {
            team1_score: 0,
            team2_score: 0,
            time: 0,
            timer_running: false,
            current_half: Half::First,
            auto_stop: true,
            is_muted: false,
            background: Background::default(),
            positions,
            font_settings,
        }
    }
}

impl MatchState {
    #[must_use]
    pub fn score(&self, team: Team) -> u32 {
        match team {
            Team::One => self.team1_score,
            Team::Two => self.team2_score,
        }
    }

    pub fn score_mut(&mut self, team: Team) -> &mut u32 {
        match team {
            Team::One => &mut self.team1_score,
            Team::Two => &mut self.team2_score,
        }
    }
}

/// One entry of the font catalog offered to the control panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontDescriptor {
    pub file: String,
    pub font_family: String,
    pub path: String,
}

// =============================================================================
// INBOUND COMMANDS
// =============================================================================

/// Every command the control panel can send, with typed payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    AddGoal {
        team: Team,
    },
    UndoGoal {
        team: Team,
    },
    Reset {
        half: Half,
    },
    SetCustomTime {
        time: u32,
        half: Half,
    },
    ToggleHalf {
        half: Half,
    },
    StartHalf {
        half: Half,
    },
    ToggleMute,
    ToggleAutoStop,
    UpdateElementPosition {
        element: String,
        position: Position,
    },
    UpdateFontSize {
        element: String,
        size: f64,
    },
    UpdateFontFamily {
        element: String,
        #[serde(rename = "fontFamily")]
        font_family: String,
    },
    SetBackground {
        image: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<Position>,
        #[serde(skip_serializing_if = "Option::is_none")]
        scale: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fixed: Option<bool>,
    },
    UpdateBackgroundPosition {
        x: i32,
        y: i32,
    },
    UpdateBackgroundSize {
        scale: f64,
    },
    ToggleBackgroundFixed,
    RequestState,
    ReloadFonts,
}

impl Command {
    /// Wire name of the command, as carried in the `command` field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddGoal { .. } => "add_goal",
            Self::UndoGoal { .. } => "undo_goal",
            Self::Reset { .. } => "reset",
            Self::SetCustomTime { .. } => "set_custom_time",
            Self::ToggleHalf { .. } => "toggle_half",
            Self::StartHalf { .. } => "start_half",
            Self::ToggleMute => "toggle_mute",
            Self::ToggleAutoStop => "toggle_auto_stop",
            Self::UpdateElementPosition { .. } => "update_element_position",
            Self::UpdateFontSize { .. } => "update_font_size",
            Self::UpdateFontFamily { .. } => "update_font_family",
            Self::SetBackground { .. } => "set_background",
            Self::UpdateBackgroundPosition { .. } => "update_background_position",
            Self::UpdateBackgroundSize { .. } => "update_background_size",
            Self::ToggleBackgroundFixed => "toggle_background_fixed",
            Self::RequestState => "request_state",
            Self::ReloadFonts => "reload_fonts",
        }
    }
}

// =============================================================================
// OUTBOUND EVENTS
// =============================================================================

/// Every event the hub emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    FullState {
        state: MatchState,
    },
    ScoreUpdate {
        team1: u32,
        team2: u32,
    },
    TimeUpdate {
        time: u32,
    },
    HalfChanged {
        half: Half,
    },
    TimerState {
        running: bool,
    },
    MuteState {
        muted: bool,
    },
    AutoStopUpdate {
        #[serde(rename = "autoStop")]
        auto_stop: bool,
    },
    ElementPositionUpdate {
        element: String,
        position: Position,
    },
    FontSizeUpdate {
        element: String,
        size: f64,
    },
    FontFamilyUpdate {
        element: String,
        #[serde(rename = "fontFamily")]
        font_family: String,
    },
    BackgroundUpdate {
        background: Background,
    },
    BackgroundPositionUpdate {
        position: Position,
    },
    BackgroundSizeUpdate {
        scale: f64,
    },
    BackgroundFixedUpdate {
        fixed: bool,
    },
    AvailableFonts {
        fonts: Vec<FontDescriptor>,
    },
    /// Unicast to the sender of a rejected command.
    Error {
        code: String,
        message: String,
    },
}

impl Event {
    /// Build a `full_state` event from a snapshot.
    #[must_use]
    pub fn full_state(state: &MatchState) -> Self {
        Self::FullState { state: state.clone() }
    }

    /// Build a `score_update` event from a snapshot.
    #[must_use]
    pub fn score_update(state: &MatchState) -> Self {
        Self::ScoreUpdate { team1: state.team1_score, team2: state.team2_score }
    }

    /// Wire tag of the event, as carried in the `type` field.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::FullState { .. } => "full_state",
            Self::ScoreUpdate { .. } => "score_update",
            Self::TimeUpdate { .. } => "time_update",
            Self::HalfChanged { .. } => "half_changed",
            Self::TimerState { .. } => "timer_state",
            Self::MuteState { .. } => "mute_state",
            Self::AutoStopUpdate { .. } => "auto_stop_update",
            Self::ElementPositionUpdate { .. } => "element_position_update",
            Self::FontSizeUpdate { .. } => "font_size_update",
            Self::FontFamilyUpdate { .. } => "font_family_update",
            Self::BackgroundUpdate { .. } => "background_update",
            Self::BackgroundPositionUpdate { .. } => "background_position_update",
            Self::BackgroundSizeUpdate { .. } => "background_size_update",
            Self::BackgroundFixedUpdate { .. } => "background_fixed_update",
            Self::AvailableFonts { .. } => "available_fonts",
            Self::Error { .. } => "error",
        }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode an event as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails. The model only uses
/// string map keys, so this is not expected in practice.
pub fn encode_event(event: &Event) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode a JSON text frame into an event.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed or unknown frames.
pub fn decode_event(text: &str) -> Result<Event, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a command as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_command(command: &Command) -> Result<String, CodecError> {
    Ok(serde_json::to_string(command)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
