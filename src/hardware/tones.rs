//! Status tones.
//!
//! Patterns are strings of duration symbols: `1`..`4` are notes of 120, 240,
//! 360 and 480 ms, a space is a 60 ms rest.

use std::sync::{Arc, Mutex};

use crate::time::elapsed_ms;

/// Named status tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    PowerOn,
    FlagUp,
    FlagDown,
    Stall,
    Timeout,
    Half,
    Full,
    Stop,
    Startup,
    OnStation,
    Calibration,
    LidOpen,
    FaultRecovery,
}

impl Tone {
    pub fn pattern(self) -> &'static str {
        match self {
            Tone::PowerOn | Tone::Startup => "1212124",
            Tone::FlagUp | Tone::FlagDown => "1113",
            Tone::Stall => "111111111",
            Tone::Timeout => "444",
            Tone::Half | Tone::Full => "344",
            Tone::Stop => "2224",
            Tone::OnStation => "11",
            Tone::Calibration => "1 1",
            Tone::LidOpen => "2 2",
            Tone::FaultRecovery => "4444",
        }
    }

    /// Nominal playback length of the pattern.
    pub fn duration_ms(self) -> u32 {
        self.pattern()
            .chars()
            .map(|symbol| match symbol {
                '1' => 120,
                '2' => 240,
                '3' => 360,
                '4' => 480,
                _ => 60,
            })
            .sum()
    }
}

/// Tone sink. Playback is non-blocking; callers poll [`Annunciator::update`]
/// and [`Annunciator::is_finished`].
pub trait Annunciator: Send {
    fn play(&mut self, tone: Tone, now_ms: u32);

    fn update(&mut self, now_ms: u32);

    fn is_finished(&self) -> bool;
}

/// Discards every tone.
#[derive(Debug, Default)]
pub struct SilentAnnunciator;

impl Annunciator for SilentAnnunciator {
    fn play(&mut self, _tone: Tone, _now_ms: u32) {}

    fn update(&mut self, _now_ms: u32) {}

    fn is_finished(&self) -> bool {
        true
    }
}

/// Logs each tone and reports it finished after the pattern's duration.
///
/// Clones share the play history, so a caller can keep one to inspect what a
/// boxed instance played.
#[derive(Debug, Default, Clone)]
pub struct LoggingAnnunciator {
    playing: Option<(Tone, u32)>,
    history: Arc<Mutex<Vec<Tone>>>,
}

impl LoggingAnnunciator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tone played so far, oldest first.
    pub fn history(&self) -> Vec<Tone> {
        self.history.lock().unwrap().clone()
    }
}

impl Annunciator for LoggingAnnunciator {
    fn play(&mut self, tone: Tone, now_ms: u32) {
        log_indented!("♪ {tone:?}");
        self.history.lock().unwrap().push(tone);
        self.playing = Some((tone, now_ms));
    }

    fn update(&mut self, now_ms: u32) {
        if let Some((tone, started)) = self.playing {
            if elapsed_ms(now_ms, started) >= tone.duration_ms() {
                self.playing = None;
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.playing.is_none()
    }
}
