//! Command validator — pure shape and range checks on inbound frames.
//!
//! DESIGN
//! ======
//! Inbound text is parsed into a loose JSON object first, then checked
//! field by field against the rules of the named command. A frame that
//! passes comes out as a typed [`Command`]; nothing downstream ever looks
//! at raw JSON again. Validation has no side effects and never touches
//! match state, so a rejected frame cannot leave a partial mutation behind.
//!
//! ERROR HANDLING
//! ==============
//! - Missing fields and unparseable frames → `MalformedPayload`
//! - Present but out of range/type/enum → `ValidationFailed`
//! - Unrecognized `command` → `UnknownCommand`

use protocol::{Command, Half, MAX_BACKGROUND_SCALE, MAX_FONT_SIZE, Position, Team};
use serde_json::{Map, Value};

use crate::frame::ErrorCode;

type Payload = Map<String, Value>;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("invalid `{field}`: {reason}")]
    ValidationFailed { field: &'static str, reason: String },
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl ErrorCode for CommandError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "E_MALFORMED_PAYLOAD",
            Self::ValidationFailed { .. } => "E_VALIDATION_FAILED",
            Self::UnknownCommand(_) => "E_UNKNOWN_COMMAND",
        }
    }
}

fn missing(field: &str) -> CommandError {
    CommandError::MalformedPayload(format!("missing field `{field}`"))
}

fn invalid(field: &'static str, reason: impl Into<String>) -> CommandError {
    CommandError::ValidationFailed { field, reason: reason.into() }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Parse one inbound text frame and validate it into a typed command.
///
/// # Errors
///
/// Returns [`CommandError`] describing the first rule the frame violates.
pub fn parse_frame(text: &str) -> Result<Command, CommandError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| CommandError::MalformedPayload(format!("invalid json: {e}")))?;
    let Value::Object(payload) = value else {
        return Err(CommandError::MalformedPayload("expected a JSON object".into()));
    };
    let Some(name) = payload.get("command").and_then(Value::as_str) else {
        return Err(missing("command"));
    };
    validate(name, &payload)
}

/// Validate the payload of the named command.
///
/// # Errors
///
/// Returns [`CommandError`] describing the first rule the payload violates.
pub fn validate(name: &str, payload: &Payload) -> Result<Command, CommandError> {
    let command = match name {
        "add_goal" => Command::AddGoal { team: team(payload)? },
        "undo_goal" => Command::UndoGoal { team: team(payload)? },
        "reset" => Command::Reset { half: half(payload)? },
        "set_custom_time" => Command::SetCustomTime { time: clock_time(payload)?, half: half(payload)? },
        "toggle_half" => Command::ToggleHalf { half: half(payload)? },
        "start_half" => Command::StartHalf { half: half(payload)? },
        "toggle_mute" => Command::ToggleMute,
        "toggle_auto_stop" => Command::ToggleAutoStop,
        "update_element_position" => Command::UpdateElementPosition {
            element: element(payload)?,
            position: position(required(payload, "position")?, "position")?,
        },
        "update_font_size" => Command::UpdateFontSize { element: element(payload)?, size: font_size(payload)? },
        "update_font_family" => {
            Command::UpdateFontFamily { element: element(payload)?, font_family: font_family(payload)? }
        }
        "set_background" => set_background(payload)?,
        "update_background_position" => Command::UpdateBackgroundPosition {
            x: coordinate(required(payload, "x")?, "x")?,
            y: coordinate(required(payload, "y")?, "y")?,
        },
        "update_background_size" => Command::UpdateBackgroundSize { scale: scale(required(payload, "scale")?)? },
        "toggle_background_fixed" => Command::ToggleBackgroundFixed,
        "request_state" => Command::RequestState,
        "reload_fonts" => Command::ReloadFonts,
        other => return Err(CommandError::UnknownCommand(other.to_owned())),
    };
    Ok(command)
}

// =============================================================================
// FIELD RULES
// =============================================================================

/// Fetch a field, treating `null` the same as absent.
fn required<'a>(payload: &'a Payload, field: &str) -> Result<&'a Value, CommandError> {
    match payload.get(field) {
        None | Some(Value::Null) => Err(missing(field)),
        Some(value) => Ok(value),
    }
}

fn selector(value: &Value, field: &'static str) -> Result<u8, CommandError> {
    value
        .as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| invalid(field, "must be 1 or 2"))
}

fn team(payload: &Payload) -> Result<Team, CommandError> {
    let raw = selector(required(payload, "team")?, "team")?;
    Team::try_from(raw).map_err(|_| invalid("team", "must be 1 or 2"))
}

fn half(payload: &Payload) -> Result<Half, CommandError> {
    let raw = selector(required(payload, "half")?, "half")?;
    Half::try_from(raw).map_err(|_| invalid("half", "must be 1 or 2"))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clock_time(payload: &Payload) -> Result<u32, CommandError> {
    let value = required(payload, "time")?;
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).map_err(|_| invalid("time", "out of range"));
    }
    let Some(f) = value.as_f64().filter(|f| f.is_finite()) else {
        return Err(invalid("time", "must be a number"));
    };
    if f < 0.0 {
        return Err(invalid("time", "must be non-negative"));
    }
    if f > f64::from(u32::MAX) {
        return Err(invalid("time", "out of range"));
    }
    Ok(f.floor() as u32)
}

#[allow(clippy::cast_possible_truncation)]
fn coordinate(value: &Value, field: &'static str) -> Result<i32, CommandError> {
    if let Some(n) = value.as_i64() {
        return i32::try_from(n).map_err(|_| invalid(field, "out of range"));
    }
    let Some(f) = value.as_f64().filter(|f| f.is_finite()) else {
        return Err(invalid(field, "must be a number"));
    };
    if f < f64::from(i32::MIN) || f > f64::from(i32::MAX) {
        return Err(invalid(field, "out of range"));
    }
    Ok(f.round() as i32)
}

fn position(value: &Value, field: &'static str) -> Result<Position, CommandError> {
    let Value::Object(fields) = value else {
        return Err(invalid(field, "must be an object with numeric x and y"));
    };
    let x = coordinate(required(fields, "x")?, "x")?;
    let y = coordinate(required(fields, "y")?, "y")?;
    Ok(Position::new(x, y))
}

fn element(payload: &Payload) -> Result<String, CommandError> {
    match required(payload, "element")? {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(invalid("element", "must be a non-empty string")),
    }
}

/// Numbers may arrive as JSON numbers or as numeric strings from form inputs.
fn number_like(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|f| f.is_finite())
}

fn font_size(payload: &Payload) -> Result<f64, CommandError> {
    let Some(size) = number_like(required(payload, "size")?) else {
        return Err(invalid("size", "must be a number"));
    };
    if size <= 0.0 || size > MAX_FONT_SIZE {
        return Err(invalid("size", format!("must be in (0, {MAX_FONT_SIZE}]")));
    }
    Ok(size)
}

fn font_family(payload: &Payload) -> Result<String, CommandError> {
    match required(payload, "fontFamily")? {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_owned()),
        _ => Err(invalid("fontFamily", "must be a non-empty string")),
    }
}

fn scale(value: &Value) -> Result<f64, CommandError> {
    let Some(scale) = number_like(value) else {
        return Err(invalid("scale", "must be a number"));
    };
    if scale <= 0.0 || scale > MAX_BACKGROUND_SCALE {
        return Err(invalid("scale", format!("must be in (0, {MAX_BACKGROUND_SCALE}]")));
    }
    Ok(scale)
}

/// `image` must be present; `null` clears the background image.
fn set_background(payload: &Payload) -> Result<Command, CommandError> {
    let image = match payload.get("image") {
        None => return Err(missing("image")),
        Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(invalid("image", "must be a string or null")),
    };
    let position = match payload.get("position") {
        None | Some(Value::Null) => None,
        Some(value) => Some(position(value, "position")?),
    };
    let scale = match payload.get("scale") {
        None | Some(Value::Null) => None,
        Some(value) => Some(scale(value)?),
    };
    let fixed = match payload.get("fixed") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => return Err(invalid("fixed", "must be a boolean")),
    };
    Ok(Command::SetBackground { image, position, scale, fixed })
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
