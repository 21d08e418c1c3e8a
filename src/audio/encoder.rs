use anyhow::{anyhow, Result};
use bytes::{BufMut, Bytes, BytesMut};
use rubato::{FftFixedInOut, Resampler};
use tracing::{debug, warn};

use super::backend::AudioFrame;

/// Encodes captured frames as 16-bit little-endian PCM in the session format
///
/// Frames in another format are converted first: multi-channel input is
/// averaged (or mono duplicated) to the session layout, and any other
/// sample rate goes through a rubato FFT resampler so the stream always
/// plays back at the labelled rate. Encoded bytes accumulate until the
/// next tick calls [`PcmEncoder::flush`].
pub struct PcmEncoder {
    sample_rate: u32,
    channels: u16,
    pending: BytesMut,
    samples_encoded: u64,
    resampler: Option<RateConverter>,
}

impl PcmEncoder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            pending: BytesMut::new(),
            samples_encoded: 0,
            resampler: None,
        }
    }

    /// MIME label of the produced stream (RFC 2586 linear PCM)
    pub fn mime_type(&self) -> String {
        format!("audio/L16;rate={};channels={}", self.sample_rate, self.channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Total interleaved samples encoded so far
    pub fn samples_encoded(&self) -> u64 {
        self.samples_encoded
    }

    pub fn encode(&mut self, frame: &AudioFrame) {
        let from = frame.channels.max(1);
        let samples = if from == self.channels {
            frame.samples.clone()
        } else {
            remix(&frame.samples, from, self.channels)
        };

        if frame.sample_rate == self.sample_rate || frame.sample_rate == 0 {
            self.finish_resampling();
            self.push(&samples);
            return;
        }

        let converted = match self.converter_for(frame.sample_rate) {
            Ok(converter) => converter.process(&samples),
            Err(e) => {
                warn!("Dropping {}Hz frame: {:#}", frame.sample_rate, e);
                return;
            }
        };
        self.push(&converted);
    }

    /// Push out audio still buffered inside the resampler. Called once the
    /// stream is over; a partial block is padded and trimmed to its length.
    pub fn finish(&mut self) {
        self.finish_resampling();
    }

    /// Take everything encoded since the last flush. `None` when nothing is pending.
    pub fn flush(&mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.pending.split().freeze())
    }

    fn push(&mut self, samples: &[i16]) {
        self.pending.reserve(samples.len() * 2);
        for sample in samples {
            self.pending.put_i16_le(*sample);
        }
        self.samples_encoded += samples.len() as u64;
    }

    fn finish_resampling(&mut self) {
        if let Some(mut converter) = self.resampler.take() {
            let tail = converter.finish();
            self.push(&tail);
        }
    }

    fn converter_for(&mut self, input_rate: u32) -> Result<&mut RateConverter> {
        if self.resampler.as_ref().map(|r| r.input_rate) != Some(input_rate) {
            self.finish_resampling();
            debug!(
                "Resampling capture input {}Hz -> {}Hz",
                input_rate, self.sample_rate
            );
            self.resampler = Some(RateConverter::new(
                input_rate,
                self.sample_rate,
                self.channels as usize,
            )?);
        }
        self.resampler
            .as_mut()
            .ok_or_else(|| anyhow!("resampler missing"))
    }
}

/// Streaming sample-rate conversion over interleaved i16 audio
///
/// Input is buffered per channel until a full resampler block is available.
/// `FftFixedInOut` turns every block into a fixed number of output frames,
/// so total output length tracks `input * to / from` exactly.
struct RateConverter {
    input_rate: u32,
    output_rate: u32,
    inner: FftFixedInOut<f32>,
    buffered: Vec<Vec<f32>>,
}

impl RateConverter {
    fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self> {
        // Blocks of roughly 10ms, rounded to a whole number of rate periods
        let step = (input_rate / gcd(input_rate, output_rate)) as usize;
        let wanted = (input_rate as usize / 100).max(1);
        let block = step * (wanted / step).max(1);

        let inner = FftFixedInOut::<f32>::new(
            input_rate as usize,
            output_rate as usize,
            block,
            channels,
        )
        .map_err(|e| anyhow!("failed to construct resampler: {}", e))?;

        Ok(Self {
            input_rate,
            output_rate,
            inner,
            buffered: vec![Vec::new(); channels],
        })
    }

    fn process(&mut self, interleaved: &[i16]) -> Vec<i16> {
        let channels = self.buffered.len();
        for frame in interleaved.chunks_exact(channels) {
            for (buffer, &sample) in self.buffered.iter_mut().zip(frame) {
                buffer.push(sample as f32 / 32768.0);
            }
        }

        let mut out = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.buffered[0].len() < needed {
                break;
            }
            let block: Vec<Vec<f32>> = self
                .buffered
                .iter_mut()
                .map(|buffer| buffer.drain(..needed).collect())
                .collect();
            match self.inner.process(&block, None) {
                Ok(output) => interleave(&output, usize::MAX, &mut out),
                Err(e) => {
                    warn!("Resampler failed on a block: {}", e);
                    break;
                }
            }
        }
        out
    }

    /// Pad the leftover partial block, convert it, keep only its share
    fn finish(&mut self) -> Vec<i16> {
        let remaining = self.buffered[0].len();
        let mut out = Vec::new();
        if remaining == 0 {
            return out;
        }

        let needed = self.inner.input_frames_next();
        for buffer in &mut self.buffered {
            buffer.resize(needed, 0.0);
        }
        let keep = (remaining as u64 * self.output_rate as u64 / self.input_rate as u64) as usize;
        match self.inner.process(&self.buffered, None) {
            Ok(output) => interleave(&output, keep, &mut out),
            Err(e) => warn!("Resampler failed on the final block: {}", e),
        }
        for buffer in &mut self.buffered {
            buffer.clear();
        }
        out
    }
}

/// Append up to `limit` frames of planar f32 output as interleaved i16
fn interleave(planar: &[Vec<f32>], limit: usize, out: &mut Vec<i16>) {
    let frames = planar.first().map_or(0, Vec::len).min(limit);
    out.reserve(frames * planar.len());
    for i in 0..frames {
        for channel in planar {
            let scaled = (channel[i] * 32768.0).round();
            out.push(scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16);
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// Convert interleaved samples between channel layouts.
///
/// Downmixing averages all input channels; upmixing duplicates the mono
/// mix into every output channel.
fn remix(samples: &[i16], from: u16, to: u16) -> Vec<i16> {
    let from = from as usize;
    let to = to.max(1) as usize;
    let mut out = Vec::with_capacity(samples.len() / from * to);

    for frame in samples.chunks_exact(from) {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        let mono = (sum / from as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        out.extend(std::iter::repeat(mono).take(to));
    }

    out
}
