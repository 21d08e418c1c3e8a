//! Live level summary for UI feedback
//!
//! Derives a small set of bars from the raw captured frames, independent
//! of the encoder and its tick. Snapshots are published on a `watch`
//! channel so readers only ever see the latest one; a slow or absent
//! reader costs nothing. The "voice" weighting applied when noise
//! cancellation is requested only changes how the bars look.

use serde::Serialize;
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::backend::AudioFrame;

/// Samples analysed per snapshot
const WINDOW: usize = 1024;
const LOWEST_HZ: f32 = 80.0;
const HIGHEST_HZ: f32 = 8000.0;
const VOICE_BAND_HZ: (f32, f32) = (300.0, 3400.0);
const VOICE_BOOST: f32 = 1.5;
const OFF_BAND_DAMPING: f32 = 0.6;

/// Latest visualization state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSnapshot {
    /// Bar heights in `0.0..=1.0`, lowest frequency first
    pub bars: Vec<f32>,
    /// False while paused, stopped or idle
    pub active: bool,
    /// Whether the cosmetic voice-band weighting was applied
    pub noise_weighted: bool,
}

impl LevelSnapshot {
    pub fn silent(bars: usize) -> Self {
        Self {
            bars: vec![0.0; bars],
            active: false,
            noise_weighted: false,
        }
    }
}

/// Sender shared between the session and its pipeline
pub type LevelSender = Arc<watch::Sender<LevelSnapshot>>;

pub fn level_channel(bars: usize) -> LevelSender {
    let (tx, _rx) = watch::channel(LevelSnapshot::silent(bars));
    Arc::new(tx)
}

/// Producer side of the feed, owned by the encoding pipeline
pub struct LevelFeed {
    tx: LevelSender,
    bars: usize,
    interval: Duration,
    noise_weighted: bool,
    window: VecDeque<f32>,
    last_emit: Option<Instant>,
}

impl LevelFeed {
    pub fn new(tx: LevelSender, bars: usize, interval: Duration, noise_weighted: bool) -> Self {
        Self {
            tx,
            bars: bars.max(1),
            interval,
            noise_weighted,
            window: VecDeque::with_capacity(WINDOW),
            last_emit: None,
        }
    }

    /// Feed raw frame data; publishes at most once per refresh interval
    pub fn observe(&mut self, frame: &AudioFrame) {
        let channels = frame.channels.max(1) as usize;
        for samples in frame.samples.chunks_exact(channels) {
            let mono: f32 =
                samples.iter().map(|&s| s as f32).sum::<f32>() / channels as f32 / i16::MAX as f32;
            if self.window.len() == WINDOW {
                self.window.pop_front();
            }
            self.window.push_back(mono);
        }

        let now = Instant::now();
        if self
            .last_emit
            .is_some_and(|last| now.duration_since(last) < self.interval)
        {
            return;
        }
        self.last_emit = Some(now);

        let samples: Vec<f32> = self.window.iter().copied().collect();
        let mut bars = band_levels(&samples, frame.sample_rate, self.bars);
        if self.noise_weighted {
            apply_voice_weighting(&mut bars, self.bars);
        }

        self.tx.send_replace(LevelSnapshot {
            bars,
            active: true,
            noise_weighted: self.noise_weighted,
        });
    }

    /// Freeze the current bars and mark the feed inactive
    pub fn halt(&mut self) {
        self.last_emit = None;
        self.tx.send_modify(|snapshot| snapshot.active = false);
    }
}

/// Centre frequency of bar `index`, log-spaced between 80 Hz and 8 kHz
pub fn bar_frequency(index: usize, bars: usize) -> f32 {
    if bars <= 1 {
        return LOWEST_HZ;
    }
    let ratio = HIGHEST_HZ / LOWEST_HZ;
    LOWEST_HZ * ratio.powf(index as f32 / (bars - 1) as f32)
}

/// Goertzel magnitude per bar, normalized to `0.0..=1.0`
pub fn band_levels(samples: &[f32], sample_rate: u32, bars: usize) -> Vec<f32> {
    if samples.is_empty() || sample_rate == 0 {
        return vec![0.0; bars];
    }
    let nyquist = sample_rate as f32 / 2.0;
    let n = samples.len() as f32;

    (0..bars)
        .map(|i| {
            let freq = bar_frequency(i, bars);
            if freq >= nyquist {
                return 0.0;
            }
            let coeff = 2.0 * (2.0 * PI * freq / sample_rate as f32).cos();
            let (mut s1, mut s2) = (0.0f32, 0.0f32);
            for &x in samples {
                let s0 = x + coeff * s1 - s2;
                s2 = s1;
                s1 = s0;
            }
            let power = (s1 * s1 + s2 * s2 - coeff * s1 * s2).max(0.0);
            // A full-scale sine at the bin frequency yields n / 2
            (power.sqrt() * 2.0 / n).sqrt().min(1.0)
        })
        .collect()
}

fn apply_voice_weighting(bars: &mut [f32], count: usize) {
    for (i, bar) in bars.iter_mut().enumerate() {
        let freq = bar_frequency(i, count);
        let weight = if (VOICE_BAND_HZ.0..=VOICE_BAND_HZ.1).contains(&freq) {
            VOICE_BOOST
        } else {
            OFF_BAND_DAMPING
        };
        *bar = (*bar * weight).min(1.0);
    }
}
