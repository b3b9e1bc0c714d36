use std::f32::consts::PI;
use std::time::Duration;

use super::SoundId;

const SAMPLE_RATE: u32 = 44100;

/// One decaying sine partial inside a chime.
#[derive(Debug, Clone, Copy)]
struct Note {
    freq: f32,
    start_ms: u32,
    len_ms: u32,
    /// Exponential decay rate per second
    decay: f32,
}

const fn note(freq: f32, start_ms: u32, len_ms: u32, decay: f32) -> Note {
    Note {
        freq,
        start_ms,
        len_ms,
        decay,
    }
}

const ALARM1: &[Note] = &[
    note(880.0, 0, 160, 6.0),
    note(880.0, 260, 160, 6.0),
    note(880.0, 520, 160, 6.0),
];

const ALARM2: &[Note] = &[
    note(660.0, 0, 200, 4.0),
    note(880.0, 220, 200, 4.0),
    note(660.0, 440, 200, 4.0),
    note(880.0, 660, 200, 4.0),
];

const BELL: &[Note] = &[
    note(523.25, 0, 1800, 2.5),
    note(1046.5, 0, 1200, 4.0),
    note(1568.0, 0, 700, 7.0),
];

const DIGITAL: &[Note] = &[
    note(1000.0, 0, 60, 0.0),
    note(1000.0, 120, 60, 0.0),
    note(1000.0, 240, 60, 0.0),
    note(1000.0, 360, 60, 0.0),
];

/// Synthesized notification chime for one of the built-in sounds.
/// Mono, finite, amplitude kept under 0.5.
#[derive(Debug, Clone)]
pub struct Chime {
    notes: &'static [Note],
    sample_rate: u32,
    num_sample: usize,
    total_samples: usize,
}

impl Chime {
    pub fn new(sound: SoundId) -> Self {
        let notes = match sound {
            SoundId::Alarm1 => ALARM1,
            SoundId::Alarm2 => ALARM2,
            SoundId::Bell => BELL,
            SoundId::Digital => DIGITAL,
        };

        let end_ms = notes
            .iter()
            .map(|n| n.start_ms + n.len_ms)
            .max()
            .unwrap_or(0);

        Self {
            notes,
            sample_rate: SAMPLE_RATE,
            num_sample: 0,
            total_samples: (end_ms as u64 * SAMPLE_RATE as u64 / 1000) as usize,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_samples as f64 / self.sample_rate as f64)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn remaining_samples(&self) -> usize {
        self.total_samples - self.num_sample
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / self.sample_rate as f32;
        self.num_sample += 1;

        let mut sample = 0.0;
        for n in self.notes {
            let start = n.start_ms as f32 / 1000.0;
            let len = n.len_ms as f32 / 1000.0;
            let local = t - start;
            if local < 0.0 || local >= len {
                continue;
            }
            // Short linear fade at both ends avoids clicks
            let fade = (local / 0.005).min((len - local) / 0.005).min(1.0);
            let envelope = (-n.decay * local).exp() * fade;
            sample += (2.0 * PI * n.freq * local).sin() * envelope;
        }

        Some((sample * 0.15).clamp(-0.45, 0.45))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining_samples();
        (remaining, Some(remaining))
    }
}

#[cfg(feature = "audio")]
impl rodio::Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.remaining_samples())
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.duration())
    }
}
