//! Command processor — maps a validated command onto match state.
//!
//! DESIGN
//! ======
//! `apply` is a plain function over `&mut MatchState`: one call is one
//! atomic mutation. It returns an `Outcome` and never sends anything
//! itself; the hub decides who receives what.
//!
//! Narrow commands emit narrow events (`score_update`, `mute_state`, ...).
//! Commands that touch several interdependent fields (reset, custom time,
//! half toggle) emit `full_state`, so every client converges on the same
//! snapshot without depending on patch ordering.

use protocol::{
    Background, Command, DEFAULT_FONT_SIZE, Event, MAX_BACKGROUND_SCALE, MAX_FONT_SIZE,
    MIN_BACKGROUND_SCALE, MatchState,
};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of applying one command. The hub owns delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// State was mutated; send these events to every live connection, in order.
    Broadcast(Vec<Event>),
    /// State is untouched; send this event to the originating connection only.
    Reply(Event),
    /// State is untouched; rescan the font directory and broadcast the catalog.
    ReloadFonts,
}

impl Outcome {
    #[must_use]
    pub fn mutates(&self) -> bool {
        matches!(self, Self::Broadcast(_))
    }
}

// =============================================================================
// APPLY
// =============================================================================

/// Apply one validated command to the match state.
pub fn apply(state: &mut MatchState, command: Command) -> Outcome {
    match command {
        Command::AddGoal { team } => {
            let score = state.score_mut(team);
            *score = score.saturating_add(1);
            Outcome::Broadcast(vec![Event::score_update(state)])
        }
        Command::UndoGoal { team } => {
            let score = state.score_mut(team);
            *score = score.saturating_sub(1);
            Outcome::Broadcast(vec![Event::score_update(state)])
        }
        Command::Reset { half } => {
            state.team1_score = 0;
            state.team2_score = 0;
            state.timer_running = false;
            state.current_half = half;
            state.time = half.start_time();
            Outcome::Broadcast(vec![Event::full_state(state)])
        }
        Command::SetCustomTime { time, half } => {
            state.time = time;
            state.current_half = half;
            // The operator has to start the clock explicitly after a manual set.
            state.timer_running = false;
            Outcome::Broadcast(vec![Event::full_state(state)])
        }
        Command::ToggleHalf { half } => {
            if state.current_half == half {
                state.timer_running = !state.timer_running;
            } else {
                state.current_half = half;
                state.timer_running = true;
                state.time = half.start_time();
            }
            Outcome::Broadcast(vec![Event::full_state(state)])
        }
        Command::StartHalf { half } => {
            state.current_half = half;
            state.timer_running = true;
            Outcome::Broadcast(vec![Event::HalfChanged { half }, Event::TimerState { running: true }])
        }
        Command::ToggleMute => {
            state.is_muted = !state.is_muted;
            Outcome::Broadcast(vec![Event::MuteState { muted: state.is_muted }])
        }
        Command::ToggleAutoStop => {
            state.auto_stop = !state.auto_stop;
            Outcome::Broadcast(vec![Event::AutoStopUpdate { auto_stop: state.auto_stop }])
        }
        Command::UpdateElementPosition { element, position } => {
            state.positions.insert(element.clone(), position);
            Outcome::Broadcast(vec![Event::ElementPositionUpdate { element, position }])
        }
        Command::UpdateFontSize { element, size } => {
            let size = clamp_font_size(size);
            state.font_settings.entry(element.clone()).or_default().font_size = size;
            Outcome::Broadcast(vec![Event::FontSizeUpdate { element, size }])
        }
        Command::UpdateFontFamily { element, font_family } => {
            let setting = state.font_settings.entry(element.clone()).or_default();
            setting.font_family.clone_from(&font_family);
            Outcome::Broadcast(vec![Event::FontFamilyUpdate { element, font_family }])
        }
        Command::SetBackground { image, position, scale, fixed } => {
            state.background = Background {
                image,
                position: position.unwrap_or_default(),
                scale: clamp_scale(scale.unwrap_or(1.0)),
                fixed: fixed.unwrap_or(false),
            };
            Outcome::Broadcast(vec![Event::BackgroundUpdate { background: state.background.clone() }])
        }
        Command::UpdateBackgroundPosition { x, y } => {
            state.background.position = protocol::Position::new(x, y);
            Outcome::Broadcast(vec![Event::BackgroundPositionUpdate { position: state.background.position }])
        }
        Command::UpdateBackgroundSize { scale } => {
            state.background.scale = clamp_scale(scale);
            Outcome::Broadcast(vec![Event::BackgroundSizeUpdate { scale: state.background.scale }])
        }
        Command::ToggleBackgroundFixed => {
            state.background.fixed = !state.background.fixed;
            Outcome::Broadcast(vec![Event::BackgroundFixedUpdate { fixed: state.background.fixed }])
        }
        Command::RequestState => Outcome::Reply(Event::full_state(state)),
        Command::ReloadFonts => Outcome::ReloadFonts,
    }
}

// =============================================================================
// CLAMPS
// =============================================================================

/// Clamp a background scale into `[0.1, 10]`. Non-finite values reset to 1.
#[must_use]
pub fn clamp_scale(scale: f64) -> f64 {
    if scale.is_finite() {
        scale.clamp(MIN_BACKGROUND_SCALE, MAX_BACKGROUND_SCALE)
    } else {
        1.0
    }
}

/// Clamp a font size into `(0, 20]`. Non-positive or non-finite values fall
/// back to the default size.
#[must_use]
pub fn clamp_font_size(size: f64) -> f64 {
    if size.is_finite() && size > 0.0 {
        size.min(MAX_FONT_SIZE)
    } else {
        DEFAULT_FONT_SIZE
    }
}

/// Re-establish the range invariants on a state that came from outside the
/// processor, e.g. a backup document.
pub fn enforce_invariants(state: &mut MatchState) {
    state.background.scale = clamp_scale(state.background.scale);
    for setting in state.font_settings.values_mut() {
        setting.font_size = clamp_font_size(setting.font_size);
    }
}

#[cfg(test)]
#[path = "command_test.rs"]
mod tests;
