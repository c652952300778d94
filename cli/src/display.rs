//! Terminal scoreboard — a local replica folded from hub events.
//!
//! The replica only ever applies what the hub says; it never guesses. A
//! `full_state` replaces everything, so a reconnect starts from a clean copy.

use protocol::{Event, FontDescriptor, Half, MatchState};

#[derive(Debug, Default)]
pub struct Scoreboard {
    state: MatchState,
    fonts: Vec<FontDescriptor>,
}

impl Scoreboard {
    #[must_use]
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    #[must_use]
    pub fn fonts(&self) -> &[FontDescriptor] {
        &self.fonts
    }

    /// Fold one event into the replica. Returns whether the headline
    /// (scores, clock, half, run state) changed and should be redrawn.
    pub fn apply(&mut self, event: Event) -> bool {
        let state = &mut self.state;
        match event {
            Event::FullState { state: full } => {
                *state = full;
                true
            }
            Event::ScoreUpdate { team1, team2 } => {
                state.team1_score = team1;
                state.team2_score = team2;
                true
            }
            Event::TimeUpdate { time } => {
                state.time = time;
                true
            }
            Event::HalfChanged { half } => {
                state.current_half = half;
                true
            }
            Event::TimerState { running } => {
                state.timer_running = running;
                true
            }
            Event::MuteState { muted } => {
                state.is_muted = muted;
                false
            }
            Event::AutoStopUpdate { auto_stop } => {
                state.auto_stop = auto_stop;
                false
            }
            Event::ElementPositionUpdate { element, position } => {
                state.positions.insert(element, position);
                false
            }
            Event::FontSizeUpdate { element, size } => {
                state.font_settings.entry(element).or_default().font_size = size;
                false
            }
            Event::FontFamilyUpdate { element, font_family } => {
                state.font_settings.entry(element).or_default().font_family = font_family;
                false
            }
            Event::BackgroundUpdate { background } => {
                state.background = background;
                false
            }
            Event::BackgroundPositionUpdate { position } => {
                state.background.position = position;
                false
            }
            Event::BackgroundSizeUpdate { scale } => {
                state.background.scale = scale;
                false
            }
            Event::BackgroundFixedUpdate { fixed } => {
                state.background.fixed = fixed;
                false
            }
            Event::AvailableFonts { fonts } => {
                self.fonts = fonts;
                false
            }
            Event::Error { .. } => false,
        }
    }

    /// One-line headline, e.g. `2 : 1  |  47:13  2nd half  running`.
    #[must_use]
    pub fn render(&self) -> String {
        let state = &self.state;
        let half = match state.current_half {
            Half::First => "1st half",
            Half::Second => "2nd half",
        };
        let run = if state.timer_running { "running" } else { "stopped" };
        format!(
            "{} : {}  |  {}  {half}  {run}",
            state.team1_score,
            state.team2_score,
            format_clock(state.time)
        )
    }
}

/// `MM:SS`, with minutes allowed past 59 (a full match reads `90:00`).
#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::Position;

    #[test]
    fn format_clock_pads_and_overflows_minutes() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(5400), "90:00");
    }

    #[test]
    fn headline_events_request_redraw() {
        let mut board = Scoreboard::default();
        assert!(board.apply(Event::ScoreUpdate { team1: 2, team2: 1 }));
        assert!(board.apply(Event::TimeUpdate { time: 2833 }));
        assert!(board.apply(Event::HalfChanged { half: Half::Second }));
        assert!(board.apply(Event::TimerState { running: true }));

        assert_eq!(board.render(), "2 : 1  |  47:13  2nd half  running");
    }

    #[test]
    fn styling_events_update_quietly() {
        let mut board = Scoreboard::default();
        assert!(!board.apply(Event::ElementPositionUpdate { element: "logo".into(), position: Position::new(3, 4) }));
        assert!(!board.apply(Event::FontSizeUpdate { element: "clock".into(), size: 9.0 }));
        assert!(!board.apply(Event::BackgroundFixedUpdate { fixed: true }));

        assert_eq!(board.state().positions["logo"], Position::new(3, 4));
        assert!((board.state().font_settings["clock"].font_size - 9.0).abs() < f64::EPSILON);
        assert_eq!(board.state().font_settings["clock"].font_family, protocol::DEFAULT_FONT_FAMILY);
        assert!(board.state().background.fixed);
    }

    #[test]
    fn full_state_replaces_replica() {
        let mut board = Scoreboard::default();
        board.apply(Event::ScoreUpdate { team1: 9, team2: 9 });

        let fresh = MatchState { team1_score: 1, ..Default::default() };
        assert!(board.apply(Event::full_state(&fresh)));
        assert_eq!(board.state(), &fresh);
    }
}
