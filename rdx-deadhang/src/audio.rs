//! The audio collaborator contract.
//!
//! The timer core never depends on audio working. Every cue goes through
//! [`AudioSink::play`], and the coordinator logs and swallows any failure.

use serde::Deserialize;
use std::fmt;
use std::sync::Mutex;

/// Discrete audio events requested by the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCue {
    /// Workout begins.
    Start,
    /// Workout completed.
    End,
    /// Transition between start, hang and rest.
    PhaseChange,
    /// One of the last few seconds of a phase.
    Countdown,
    Error,
    Notification,
}

impl AudioCue {
    /// Stable event name, e.g. `"phase_change"`.
    pub fn as_str(self) -> &'static str {
        match self {
            AudioCue::Start => "start",
            AudioCue::End => "end",
            AudioCue::PhaseChange => "phase_change",
            AudioCue::Countdown => "countdown",
            AudioCue::Error => "error",
            AudioCue::Notification => "notification",
        }
    }
}

impl fmt::Display for AudioCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can play an audio cue.
pub trait AudioSink: Send + Sync {
    fn play(&self, cue: AudioCue) -> anyhow::Result<()>;
}

/// Degraded mode: audio is unavailable and every cue is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play(&self, _cue: AudioCue) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Records every cue it is asked to play. Useful for tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingAudio {
    played: Mutex<Vec<AudioCue>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<AudioCue> {
        self.played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl AudioSink for RecordingAudio {
    fn play(&self, cue: AudioCue) -> anyhow::Result<()> {
        self.played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(cue);
        Ok(())
    }
}

/// User preferences for which cues are played.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Master switch.
    pub enabled: bool,
    /// How many seconds before the end of a phase the countdown cue starts.
    pub countdown_seconds: u32,
    pub enable_countdown: bool,
    pub enable_phase_transitions: bool,
    pub enable_start_end: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            countdown_seconds: 3,
            enable_countdown: true,
            enable_phase_transitions: true,
            enable_start_end: true,
        }
    }
}

impl AudioSettings {
    /// Whether the given cue should be played at all.
    pub fn allows(&self, cue: AudioCue) -> bool {
        if !self.enabled {
            return false;
        }
        match cue {
            AudioCue::Start | AudioCue::End => self.enable_start_end,
            AudioCue::PhaseChange => self.enable_phase_transitions,
            AudioCue::Countdown => self.enable_countdown && self.countdown_seconds > 0,
            AudioCue::Error | AudioCue::Notification => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_names_are_stable() {
        assert_eq!(AudioCue::PhaseChange.as_str(), "phase_change");
        assert_eq!(AudioCue::Start.to_string(), "start");
    }

    #[test]
    fn settings_gate_cues() {
        let mut settings = AudioSettings::default();
        assert!(settings.allows(AudioCue::Countdown));

        settings.enable_start_end = false;
        assert!(!settings.allows(AudioCue::Start));
        assert!(settings.allows(AudioCue::PhaseChange));

        settings.countdown_seconds = 0;
        assert!(!settings.allows(AudioCue::Countdown));

        settings.enabled = false;
        assert!(!settings.allows(AudioCue::Error));
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingAudio::new();
        sink.play(AudioCue::Start).unwrap();
        sink.play(AudioCue::End).unwrap();
        assert_eq!(sink.played(), vec![AudioCue::Start, AudioCue::End]);
    }
}
