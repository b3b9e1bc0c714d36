use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::{
    audio::SoundId,
    settings::{validation, SessionConfig},
    store::{
        read_parsed, write_logged, KeyValueStore, KEY_CYCLE_COUNT, KEY_NOTIFICATION_SOUND,
        KEY_SESSION_TYPE, KEY_TIME_LEFT,
    },
};

/// Every `LONG_BREAK_EVERY`th completed focus session earns a long break.
pub const LONG_BREAK_EVERY: u32 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionType {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub const ALL: [SessionType; 3] = [
        SessionType::Focus,
        SessionType::ShortBreak,
        SessionType::LongBreak,
    ];

    /// Stored form under `sessionType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Focus => "focus",
            SessionType::ShortBreak => "shortBreak",
            SessionType::LongBreak => "longBreak",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionType::Focus => "Focus",
            SessionType::ShortBreak => "Short Break",
            SessionType::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SessionType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "focus" | "work" | "pomodoro" => Ok(SessionType::Focus),
            "shortbreak" | "short" | "short-break" => Ok(SessionType::ShortBreak),
            "longbreak" | "long" | "long-break" => Ok(SessionType::LongBreak),
            _ => Err(anyhow!("unknown session type '{value}'")),
        }
    }
}

/// Result of the countdown reaching zero.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSwitch {
    pub completed: SessionType,
    pub next: SessionType,
    /// Completed focus sessions after the switch
    pub cycle_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer was not running; nothing changed.
    Idle,
    Counted { remaining_secs: u64 },
    Switched(SessionSwitch),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub session_type: SessionType,
    pub remaining_secs: u64,
    pub is_running: bool,
    pub cycle_count: u32,
    pub sound: SoundId,
    pub config: SessionConfig,
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new(SessionConfig::default(), SoundId::default())
    }
}

impl TimerState {
    pub fn new(config: SessionConfig, sound: SoundId) -> Self {
        Self {
            session_type: SessionType::Focus,
            remaining_secs: config.focus_secs,
            is_running: false,
            cycle_count: 0,
            sound,
            config,
        }
    }

    /// Rebuilds the state from the store. Every key falls back to its default
    /// independently. A restored timer is never running; a saved `timeLeft`
    /// larger than the session's duration is clamped, and a missing or zero
    /// one restarts the session from its full length.
    pub fn restore(store: &dyn KeyValueStore) -> Self {
        let config = SessionConfig::load(store);
        let session_type = read_parsed::<SessionType>(store, KEY_SESSION_TYPE).unwrap_or_default();
        let full = config.duration_secs(session_type);
        let remaining_secs = read_parsed::<u64>(store, KEY_TIME_LEFT)
            .filter(|secs| *secs > 0)
            .map_or(full, |secs| secs.min(full));

        Self {
            session_type,
            remaining_secs,
            is_running: false,
            cycle_count: read_parsed::<u32>(store, KEY_CYCLE_COUNT).unwrap_or(0),
            sound: read_parsed::<SoundId>(store, KEY_NOTIFICATION_SOUND).unwrap_or_default(),
            config,
        }
    }

    pub fn duration_secs(&self) -> u64 {
        self.config.duration_secs(self.session_type)
    }

    /// One elapsed second. Reaching zero switches the session and stops the timer.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running || self.remaining_secs == 0 {
            return TickOutcome::Idle;
        }

        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            TickOutcome::Switched(self.switch_session())
        } else {
            TickOutcome::Counted {
                remaining_secs: self.remaining_secs,
            }
        }
    }

    fn switch_session(&mut self) -> SessionSwitch {
        let completed = self.session_type;
        let next = match completed {
            SessionType::Focus => {
                self.cycle_count = self.cycle_count.saturating_add(1);
                if self.cycle_count % LONG_BREAK_EVERY == 0 {
                    SessionType::LongBreak
                } else {
                    SessionType::ShortBreak
                }
            }
            SessionType::ShortBreak | SessionType::LongBreak => SessionType::Focus,
        };

        self.session_type = next;
        self.remaining_secs = self.config.duration_secs(next);
        // Every boundary waits for the user to start the next session.
        self.is_running = false;

        SessionSwitch {
            completed,
            next,
            cycle_count: self.cycle_count,
        }
    }

    /// Returns whether the timer was stopped before the call.
    pub fn start(&mut self) -> Result<bool> {
        if self.remaining_secs == 0 {
            bail!("no time left in this session; select a session first");
        }
        let changed = !self.is_running;
        self.is_running = true;
        Ok(changed)
    }

    /// Returns whether the timer was running before the call.
    pub fn pause(&mut self) -> bool {
        let changed = self.is_running;
        self.is_running = false;
        changed
    }

    pub fn reset(&mut self) {
        self.is_running = false;
        self.session_type = SessionType::Focus;
        self.remaining_secs = self.config.focus_secs;
        self.cycle_count = 0;
    }

    pub fn select_session(&mut self, session_type: SessionType) {
        self.session_type = session_type;
        self.remaining_secs = self.config.duration_secs(session_type);
        self.is_running = false;
    }

    /// Rejects non-positive minutes with every field left untouched. When the
    /// edited type is the current one the countdown jumps to the new length,
    /// running or not.
    pub fn set_duration(&mut self, session_type: SessionType, minutes: i64) -> Result<()> {
        let secs = validation::minutes_to_secs(minutes)?;
        self.config.set_duration_secs(session_type, secs);
        if self.session_type == session_type {
            self.remaining_secs = secs;
        }
        Ok(())
    }

    /// Returns whether the selection changed.
    pub fn set_sound(&mut self, sound: SoundId) -> bool {
        let changed = self.sound != sound;
        self.sound = sound;
        changed
    }

    pub fn clock(&self) -> String {
        format_clock(self.remaining_secs)
    }

    pub fn persist_progress(&self, store: &dyn KeyValueStore) {
        write_logged(store, KEY_TIME_LEFT, &self.remaining_secs.to_string());
    }

    pub fn persist_session(&self, store: &dyn KeyValueStore) {
        self.persist_progress(store);
        write_logged(store, KEY_CYCLE_COUNT, &self.cycle_count.to_string());
        write_logged(store, KEY_SESSION_TYPE, self.session_type.as_str());
    }
}

/// `m:ss`, minutes unpadded (`25:00`, `4:05`, `0:09`).
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn small_config() -> SessionConfig {
        SessionConfig {
            focus_secs: 3,
            short_break_secs: 2,
            long_break_secs: 4,
        }
    }

    fn run_to_switch(state: &mut TimerState) -> (usize, SessionSwitch) {
        state.start().expect("start should succeed");
        let mut switches = 0;
        let mut last = None;
        for _ in 0..state.remaining_secs {
            if let TickOutcome::Switched(switch) = state.tick() {
                switches += 1;
                last = Some(switch);
            }
        }
        (switches, last.expect("countdown should have switched"))
    }

    #[test]
    fn test_focus_countdown_switches_exactly_once() {
        for (focus, short, long) in [(1, 1, 1), (3, 2, 4), (90, 7, 13)] {
            let config = SessionConfig {
                focus_secs: focus,
                short_break_secs: short,
                long_break_secs: long,
            };
            let mut state = TimerState::new(config, SoundId::default());
            let (switches, switch) = run_to_switch(&mut state);

            assert_eq!(switches, 1);
            assert_eq!(switch.completed, SessionType::Focus);
            assert_eq!(switch.next, SessionType::ShortBreak);
            assert_eq!(state.session_type, SessionType::ShortBreak);
            assert_eq!(state.remaining_secs, short);
            assert!(!state.is_running);
        }
    }

    #[test]
    fn test_four_cycles_end_in_long_break() {
        let mut state = TimerState::new(small_config(), SoundId::default());
        let mut sequence = vec![state.session_type];

        while sequence.len() < 8 {
            let (_, switch) = run_to_switch(&mut state);
            assert!(!state.is_running);
            sequence.push(switch.next);
        }

        use SessionType::*;
        assert_eq!(
            sequence,
            vec![Focus, ShortBreak, Focus, ShortBreak, Focus, ShortBreak, Focus, LongBreak]
        );
        assert_eq!(state.cycle_count, 4);
        assert_eq!(state.remaining_secs, 4);

        let (_, switch) = run_to_switch(&mut state);
        assert_eq!(switch.next, Focus);
        assert_eq!(state.cycle_count, 4);
    }

    #[test]
    fn test_long_break_follows_cycle_count_not_position() {
        let mut state = TimerState::new(small_config(), SoundId::default());
        state.cycle_count = 7;
        let (_, switch) = run_to_switch(&mut state);
        assert_eq!(switch.next, SessionType::LongBreak);
        assert_eq!(switch.cycle_count, 8);
    }

    #[test]
    fn test_tick_is_noop_when_paused() {
        let mut state = TimerState::default();
        assert_eq!(state.tick(), TickOutcome::Idle);
        assert_eq!(state.remaining_secs, DEFAULT_FOCUS);

        state.start().unwrap();
        assert_eq!(
            state.tick(),
            TickOutcome::Counted {
                remaining_secs: DEFAULT_FOCUS - 1
            }
        );
        assert!(state.pause());
        assert!(!state.pause());
        assert_eq!(state.tick(), TickOutcome::Idle);
        assert_eq!(state.remaining_secs, DEFAULT_FOCUS - 1);
    }

    const DEFAULT_FOCUS: u64 = crate::settings::DEFAULT_FOCUS_SECS;

    #[test]
    fn test_start_is_idempotent_and_refused_at_zero() {
        let mut state = TimerState::default();
        assert!(state.start().unwrap());
        assert!(!state.start().unwrap());

        state.is_running = false;
        state.remaining_secs = 0;
        assert!(state.start().is_err());
        assert!(!state.is_running);
        assert_eq!(state.tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut state = TimerState::new(small_config(), SoundId::Bell);
        for _ in 0..5 {
            run_to_switch(&mut state);
        }
        state.start().unwrap();
        state.tick();

        state.reset();
        assert_eq!(state.session_type, SessionType::Focus);
        assert_eq!(state.remaining_secs, 3);
        assert!(!state.is_running);
        assert_eq!(state.cycle_count, 0);
        assert_eq!(state.sound, SoundId::Bell);
        assert_eq!(state.config, small_config());
    }

    #[test]
    fn test_select_session_stops_and_refills() {
        let mut state = TimerState::default();
        state.start().unwrap();
        state.tick();

        state.select_session(SessionType::LongBreak);
        assert_eq!(state.session_type, SessionType::LongBreak);
        assert_eq!(state.remaining_secs, 15 * 60);
        assert!(!state.is_running);
        assert_eq!(state.cycle_count, 0);
    }

    #[test]
    fn test_set_duration_rejects_non_positive() {
        let mut state = TimerState::default();
        let before = state.clone();

        assert!(state.set_duration(SessionType::Focus, 0).is_err());
        assert!(state.set_duration(SessionType::Focus, -5).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_set_duration_updates_current_session_mid_countdown() {
        let mut state = TimerState::default();
        state.start().unwrap();
        state.tick();

        state.set_duration(SessionType::Focus, 10).unwrap();
        assert_eq!(state.config.focus_secs, 600);
        assert_eq!(state.remaining_secs, 600);
        assert!(state.is_running);

        state.set_duration(SessionType::ShortBreak, 3).unwrap();
        assert_eq!(state.config.short_break_secs, 180);
        assert_eq!(state.remaining_secs, 600);
    }

    #[test]
    fn test_restore_round_trip() {
        let store = MemoryStore::new();
        let mut state = TimerState::new(small_config(), SoundId::Digital);
        state.config.persist(&store);
        store.set(KEY_NOTIFICATION_SOUND, &SoundId::Digital.path()).unwrap();
        run_to_switch(&mut state);
        state.persist_session(&store);

        let restored = TimerState::restore(&store);
        assert_eq!(restored, state);
    }

    #[test]
    fn test_restore_tolerates_garbage() {
        let store = MemoryStore::new();
        store.set(KEY_SESSION_TYPE, "nap").unwrap();
        store.set(KEY_TIME_LEFT, "-1").unwrap();
        store.set(KEY_CYCLE_COUNT, "many").unwrap();
        store.set(KEY_NOTIFICATION_SOUND, "").unwrap();

        assert_eq!(TimerState::restore(&store), TimerState::default());
    }

    #[test]
    fn test_restore_clamps_time_left() {
        let store = MemoryStore::new();
        store.set(KEY_SESSION_TYPE, "shortBreak").unwrap();
        store.set(KEY_TIME_LEFT, "99999").unwrap();
        let restored = TimerState::restore(&store);
        assert_eq!(restored.remaining_secs, 5 * 60);

        store.set(KEY_TIME_LEFT, "0").unwrap();
        assert_eq!(TimerState::restore(&store).remaining_secs, 5 * 60);
    }

    #[test]
    fn test_cycle_count_saturates_at_max() {
        let store = MemoryStore::new();
        store.set(KEY_CYCLE_COUNT, &u32::MAX.to_string()).unwrap();
        store.set(crate::store::KEY_FOCUS_TIME, "1").unwrap();

        let mut state = TimerState::restore(&store);
        assert_eq!(state.cycle_count, u32::MAX);

        let (_, switch) = run_to_switch(&mut state);
        assert_eq!(switch.cycle_count, u32::MAX);
        assert_eq!(switch.next, SessionType::ShortBreak);
        assert!(!state.is_running);
    }

    #[test]
    fn test_session_type_parsing() {
        for session_type in SessionType::ALL {
            assert_eq!(session_type.as_str().parse::<SessionType>().unwrap(), session_type);
        }
        assert_eq!("short".parse::<SessionType>().unwrap(), SessionType::ShortBreak);
        assert!("nap".parse::<SessionType>().is_err());
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(245), "4:05");
        assert_eq!(format_clock(9), "0:09");
        assert_eq!(format_clock(0), "0:00");
    }
}
