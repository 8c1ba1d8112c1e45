//! Date-indexed playback state.
//!
//! Time is passed in rather than read, so the event loop drives ticks and
//! tests can step through playback deterministically. Every index change
//! produces a [`FetchTag`]; results fetched under an older tag are stale.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Deserialize;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// What playback does after the last date
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndPolicy {
    /// Stay on the last date and go idle
    #[default]
    Stop,
    /// Jump back to the first date and keep playing
    Wrap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Idle,
    Playing { next_tick: Instant },
}

/// Identifies the timeline position a request was issued for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTag {
    pub generation: u64,
    pub index: usize,
    pub date: NaiveDate,
}

#[derive(Clone, Debug)]
pub struct Timeline {
    dates: Vec<NaiveDate>,
    index: usize,
    state: PlayState,
    interval: Duration,
    end_policy: EndPolicy,
    generation: u64,
}

impl Timeline {
    pub fn new(dates: Vec<NaiveDate>, interval: Duration, end_policy: EndPolicy) -> Self {
        Self {
            dates,
            index: 0,
            state: PlayState::Idle,
            interval,
            end_policy,
            generation: 0,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.dates.get(self.index).copied()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlayState::Playing { .. })
    }

    pub fn end_policy(&self) -> EndPolicy {
        self.end_policy
    }

    /// Whether a result issued under `tag` still matches what is on screen
    pub fn is_current(&self, tag: &FetchTag) -> bool {
        tag.generation == self.generation
    }

    /// Invalidate in-flight requests and tag the current position afresh
    pub fn retag(&mut self) -> Option<FetchTag> {
        self.generation += 1;
        let date = self.current_date()?;
        Some(FetchTag {
            generation: self.generation,
            index: self.index,
            date,
        })
    }

    /// Move to `index`, clamped to the valid range
    pub fn seek(&mut self, index: usize) -> Option<FetchTag> {
        if self.dates.is_empty() {
            return None;
        }
        self.index = index.min(self.dates.len() - 1);
        self.retag()
    }

    pub fn step(&mut self, delta: isize) -> Option<FetchTag> {
        let target = self.index.saturating_add_signed(delta);
        self.seek(target)
    }

    /// Start playback. Returns false when already playing or there is nothing to play.
    pub fn play(&mut self, now: Instant) -> bool {
        if self.is_playing() || self.dates.is_empty() {
            return false;
        }
        self.state = PlayState::Playing {
            next_tick: now + self.interval,
        };
        true
    }

    /// Stop playback. Returns false when already idle.
    pub fn pause(&mut self) -> bool {
        let was_playing = self.is_playing();
        self.state = PlayState::Idle;
        was_playing
    }

    /// Advance at most one date if the playback interval has elapsed
    pub fn tick(&mut self, now: Instant) -> Option<FetchTag> {
        let PlayState::Playing { next_tick } = self.state else {
            return None;
        };
        if now < next_tick {
            return None;
        }

        if self.index + 1 < self.dates.len() {
            self.index += 1;
        } else {
            match self.end_policy {
                EndPolicy::Stop => {
                    self.state = PlayState::Idle;
                    return None;
                }
                EndPolicy::Wrap => self.index = 0,
            }
        }
        self.state = PlayState::Playing {
            next_tick: now + self.interval,
        };
        self.retag()
    }

    /// Time left before the next tick is due
    pub fn until_tick(&self, now: Instant) -> Option<Duration> {
        match self.state {
            PlayState::Playing { next_tick } => Some(next_tick.saturating_duration_since(now)),
            PlayState::Idle => None,
        }
    }

    /// Load a new date list (region switch): stop, rewind and retag
    pub fn replace_dates(&mut self, dates: Vec<NaiveDate>) -> Option<FetchTag> {
        self.pause();
        self.dates = dates;
        self.index = 0;
        self.retag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap())
            .collect()
    }

    fn timeline(n: u32, policy: EndPolicy) -> Timeline {
        Timeline::new(dates(n), DEFAULT_INTERVAL, policy)
    }

    #[test]
    fn test_initial_state() {
        let tl = timeline(3, EndPolicy::Stop);
        assert_eq!(tl.index(), 0);
        assert_eq!(tl.state(), PlayState::Idle);
    }

    #[test]
    fn test_seek_clamps() {
        let mut tl = timeline(3, EndPolicy::Stop);
        let tag = tl.seek(10).unwrap();
        assert_eq!(tl.index(), 2);
        assert_eq!(tag.index, 2);
        assert_eq!(tl.step(-5).unwrap().index, 0);
        assert_eq!(tl.step(1).unwrap().index, 1);
    }

    #[test]
    fn test_seek_on_empty_is_noop() {
        let mut tl = Timeline::new(Vec::new(), DEFAULT_INTERVAL, EndPolicy::Stop);
        assert!(tl.seek(0).is_none());
        assert!(!tl.play(Instant::now()));
    }

    #[test]
    fn test_play_stops_at_last_index() {
        let mut tl = timeline(3, EndPolicy::Stop);
        let start = Instant::now();
        assert!(tl.play(start));

        let mut now = start;
        for _ in 0..3 {
            now += DEFAULT_INTERVAL;
            tl.tick(now);
        }
        assert_eq!(tl.state(), PlayState::Idle);
        assert_eq!(tl.index(), 2);
    }

    #[test]
    fn test_play_wraps_when_configured() {
        let mut tl = timeline(3, EndPolicy::Wrap);
        let mut now = Instant::now();
        tl.play(now);
        for _ in 0..3 {
            now += DEFAULT_INTERVAL;
            tl.tick(now);
        }
        assert!(tl.is_playing());
        assert_eq!(tl.index(), 0);
    }

    #[test]
    fn test_tick_waits_for_interval() {
        let mut tl = timeline(3, EndPolicy::Stop);
        let start = Instant::now();
        tl.play(start);
        assert!(tl.tick(start + Duration::from_millis(1999)).is_none());
        assert_eq!(tl.index(), 0);
        assert!(tl.tick(start + DEFAULT_INTERVAL).is_some());
        assert_eq!(tl.index(), 1);
        // A long stall still advances only one date
        assert!(tl.tick(start + DEFAULT_INTERVAL * 10).is_some());
        assert_eq!(tl.index(), 2);
    }

    #[test]
    fn test_play_twice_keeps_single_timer() {
        let mut tl = timeline(3, EndPolicy::Stop);
        let start = Instant::now();
        assert!(tl.play(start));
        assert!(!tl.play(start + Duration::from_millis(500)));
        assert_eq!(
            tl.state(),
            PlayState::Playing {
                next_tick: start + DEFAULT_INTERVAL
            }
        );
    }

    #[test]
    fn test_pause_idempotent() {
        let mut tl = timeline(3, EndPolicy::Stop);
        assert!(!tl.pause());
        tl.play(Instant::now());
        assert!(tl.pause());
        assert!(!tl.pause());
        assert!(tl.tick(Instant::now() + DEFAULT_INTERVAL * 2).is_none());
    }

    #[test]
    fn test_tags_go_stale() {
        let mut tl = timeline(2, EndPolicy::Stop);
        let one = tl.seek(1).unwrap();
        let zero = tl.seek(0).unwrap();
        assert!(!tl.is_current(&one));
        assert!(tl.is_current(&zero));
    }

    #[test]
    fn test_replace_dates_resets() {
        let mut tl = timeline(3, EndPolicy::Stop);
        tl.seek(2);
        tl.play(Instant::now());
        let tag = tl.replace_dates(dates(5)).unwrap();
        assert_eq!(tag.index, 0);
        assert!(!tl.is_playing());
        assert_eq!(tl.len(), 5);
    }
}
