//! Timer scheduler step — advances the match clock by one tick.
//!
//! The hub drives this from its own interval so ticks and commands share a
//! single mutation timeline. Auto-stop does not clamp: the clock holds
//! whatever value the stopping tick produced.

use protocol::{Event, MatchState};

/// Advance a running clock by one second.
///
/// Returns `None` when the clock is stopped, `full_state` when this tick
/// ended the half (so indicators resynchronize), `time_update` otherwise.
pub fn tick(state: &mut MatchState) -> Option<Event> {
    if !state.timer_running {
        return None;
    }

    state.time = state.time.saturating_add(1);

    let threshold = state.current_half.end_time();
    if state.auto_stop && state.time >= threshold {
        state.timer_running = false;
        return Some(Event::full_state(state));
    }

    Some(Event::TimeUpdate { time: state.time })
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{FULL_MATCH_DURATION, HALF_DURATION, Half};

    fn running(time: u32, half: Half, auto_stop: bool) -> MatchState {
        MatchState { time, current_half: half, timer_running: true, auto_stop, ..Default::default() }
    }

    #[test]
    fn stopped_clock_is_a_noop() {
        let mut state = MatchState { time: 10, ..Default::default() };
        assert!(tick(&mut state).is_none());
        assert_eq!(state.time, 10);
    }

    #[test]
    fn running_clock_emits_time_update() {
        let mut state = running(59, Half::First, true);
        assert_eq!(tick(&mut state), Some(Event::TimeUpdate { time: 60 }));
        assert!(state.timer_running);
    }

    #[test]
    fn first_half_boundary_stops_and_emits_full_state() {
        let mut state = running(HALF_DURATION - 1, Half::First, true);
        let event = tick(&mut state).expect("tick should emit");

        assert_eq!(state.time, HALF_DURATION);
        assert!(!state.timer_running);
        assert_eq!(event, Event::full_state(&state));
    }

    #[test]
    fn second_half_stops_at_full_match() {
        let mut state = running(FULL_MATCH_DURATION - 1, Half::Second, true);
        let event = tick(&mut state).expect("tick should emit");
        assert!(matches!(event, Event::FullState { .. }));
        assert_eq!(state.time, FULL_MATCH_DURATION);
        assert!(!state.timer_running);
    }

    #[test]
    fn second_half_runs_through_first_half_mark() {
        let mut state = running(HALF_DURATION, Half::Second, true);
        assert_eq!(tick(&mut state), Some(Event::TimeUpdate { time: HALF_DURATION + 1 }));
        assert!(state.timer_running);
    }

    #[test]
    fn auto_stop_off_keeps_running_past_boundary() {
        let mut state = running(HALF_DURATION - 1, Half::First, false);
        assert_eq!(tick(&mut state), Some(Event::TimeUpdate { time: HALF_DURATION }));
        assert!(state.timer_running);
        assert_eq!(tick(&mut state), Some(Event::TimeUpdate { time: HALF_DURATION + 1 }));
    }

    #[test]
    fn clock_already_past_boundary_stops_without_clamping() {
        let mut state = running(HALF_DURATION + 30, Half::First, true);
        tick(&mut state);
        assert_eq!(state.time, HALF_DURATION + 31);
        assert!(!state.timer_running);
    }
}
