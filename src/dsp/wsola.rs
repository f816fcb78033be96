//! Waveform-similarity overlap-add (WSOLA) time stretching.
//!
//! Frames of `frame` samples are taken from the input every `hop * speed` samples, nudged by up
//! to `search` samples toward the position that best continues the previous frame, windowed with
//! a periodic Hann window and overlap-added every `hop = frame / 2` output samples. With that
//! window and hop the overlapping windows sum to one, so a constant input comes out unchanged
//! once the first hop has been emitted.

use std::collections::VecDeque;

use crate::foundation::error::{OpflowError, OpflowResult};

/// Timing parameters, in milliseconds so they survive sample-rate changes.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WsolaConfig {
    /// Length of one analysis/synthesis frame.
    pub frame_size_ms: f64,
    /// Maximum shift, either way, when aligning the next frame.
    pub search_range_ms: f64,
}

impl Default for WsolaConfig {
    fn default() -> Self {
        Self {
            frame_size_ms: 25.0,
            search_range_ms: 10.0,
        }
    }
}

impl WsolaConfig {
    /// Reject non-finite or non-positive timings.
    pub fn validate(&self) -> OpflowResult<()> {
        if !(self.frame_size_ms.is_finite() && self.frame_size_ms > 0.0) {
            return Err(OpflowError::validation(
                "wsola 'frame_size_ms' must be finite and > 0",
            ));
        }
        if !(self.search_range_ms.is_finite() && self.search_range_ms >= 0.0) {
            return Err(OpflowError::validation(
                "wsola 'search_range_ms' must be finite and >= 0",
            ));
        }
        Ok(())
    }

    /// Frame length in samples. Always even and at least 2.
    pub fn frame_size_samples(&self, sample_rate: u32) -> usize {
        let n = (f64::from(sample_rate) * self.frame_size_ms / 1000.0).round() as usize;
        (n.max(2) + 1) & !1
    }

    /// Output hop in samples, half a frame.
    pub fn hop_size_samples(&self, sample_rate: u32) -> usize {
        self.frame_size_samples(sample_rate) / 2
    }

    /// Alignment search radius in samples.
    pub fn search_range_samples(&self, sample_rate: u32) -> usize {
        (f64::from(sample_rate) * self.search_range_ms / 1000.0).round() as usize
    }
}

/// Stateful mono time stretcher. One instance per stream; call [`WsolaProcessor::reset`] on seek.
pub struct WsolaProcessor {
    sample_rate: u32,
    frame: usize,
    hop: usize,
    search: usize,
    window: Vec<f32>,
    // Unconsumed input; `input[0]` is absolute sample `base`.
    input: VecDeque<f32>,
    base: u64,
    overlap: Vec<f32>,
    analysis_pos: f64,
    prev_start: Option<u64>,
    last_offset: isize,
}

impl WsolaProcessor {
    /// Slowest supported playback rate. Lower speeds are clamped.
    pub const MIN_SPEED: f32 = 0.1;
    /// Fastest supported playback rate. Higher speeds are clamped.
    pub const MAX_SPEED: f32 = 10.0;

    /// Processor for a mono stream at `sample_rate`.
    pub fn new(sample_rate: u32, config: WsolaConfig) -> OpflowResult<Self> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(OpflowError::validation("wsola sample rate must be > 0"));
        }
        let frame = config.frame_size_samples(sample_rate);
        let search = config.search_range_samples(sample_rate);
        Ok(Self {
            sample_rate,
            frame,
            hop: frame / 2,
            search,
            window: periodic_hann(frame),
            input: VecDeque::with_capacity(frame * 4 + search * 2),
            base: 0,
            overlap: vec![0.0; frame],
            analysis_pos: 0.0,
            prev_start: None,
            last_offset: 0,
        })
    }

    /// Sample rate the processor was built for.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frame length in samples.
    pub fn frame_size(&self) -> usize {
        self.frame
    }

    /// Output hop in samples.
    pub fn hop_size(&self) -> usize {
        self.hop
    }

    /// Input samples buffered and not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Alignment offset chosen for the most recent frame.
    pub fn last_offset(&self) -> isize {
        self.last_offset
    }

    /// Buffer `input` and write as many whole hops of stretched output as possible.
    ///
    /// Returns the number of samples written. Fewer than `output.len()` (possibly zero) means
    /// more input is needed; it is not an error. `speed` above 1 plays faster.
    pub fn process(&mut self, input: &[f32], speed: f32, output: &mut [f32]) -> usize {
        self.input.extend(input.iter().copied());
        let speed = if speed.is_finite() {
            speed.clamp(Self::MIN_SPEED, Self::MAX_SPEED)
        } else {
            1.0
        };
        let analysis_hop = self.hop as f64 * f64::from(speed);

        let mut written = 0;
        while output.len() - written >= self.hop {
            let Some(start) = self.next_frame_start() else {
                break;
            };
            self.overlap_add(start, &mut output[written..written + self.hop]);
            written += self.hop;

            self.prev_start = Some(start);
            self.analysis_pos += analysis_hop;
            self.consume();
        }
        written
    }

    /// Drop all buffered audio and positions. Behaves as freshly constructed afterwards.
    pub fn reset(&mut self) {
        self.input.clear();
        self.base = 0;
        self.overlap.fill(0.0);
        self.analysis_pos = 0.0;
        self.prev_start = None;
        self.last_offset = 0;
    }

    fn end(&self) -> u64 {
        self.base + self.input.len() as u64
    }

    fn at(&self, abs: u64) -> f32 {
        self.input[(abs - self.base) as usize]
    }

    /// Absolute start of the next frame, or `None` if not enough input is buffered.
    fn next_frame_start(&mut self) -> Option<u64> {
        let natural = self.analysis_pos.round() as u64;
        let frame = self.frame as u64;
        let search = self.search as u64;

        let reference = self.prev_start.map(|p| p + self.hop as u64);
        let mut needed = natural + search + frame;
        if let Some(r) = reference {
            needed = needed.max(r + frame);
        }
        if needed > self.end() {
            return None;
        }

        let offset = match reference {
            Some(r) => self.best_offset(natural, r),
            None => 0,
        };
        self.last_offset = offset;
        Some(natural.saturating_add_signed(offset as i64).max(self.base))
    }

    /// Offset in `[-search, search]` whose frame best continues the previous one.
    /// Ties go to the smaller magnitude; quiet references keep the natural position.
    fn best_offset(&self, natural: u64, reference: u64) -> isize {
        let ref_energy: f32 = (0..self.frame as u64)
            .map(|i| self.at(reference + i).powi(2))
            .sum();
        if ref_energy < 1e-10 {
            return 0;
        }

        let mut best = 0_isize;
        let mut best_score = f32::MIN;
        for step in 0..=(2 * self.search) {
            let magnitude = step.div_ceil(2) as isize;
            let offset = if step % 2 == 1 { -magnitude } else { magnitude };
            let Some(start) = natural.checked_add_signed(offset as i64) else {
                continue;
            };
            if start < self.base {
                continue;
            }
            let score = self.correlation(start, reference, ref_energy);
            if score > best_score {
                best_score = score;
                best = offset;
            }
        }
        best
    }

    fn correlation(&self, start: u64, reference: u64, ref_energy: f32) -> f32 {
        let mut cross = 0.0_f32;
        let mut energy = 0.0_f32;
        for i in 0..self.frame as u64 {
            let a = self.at(start + i);
            cross += a * self.at(reference + i);
            energy += a * a;
        }
        let denom = (energy * ref_energy).sqrt();
        if denom < 1e-10 { 0.0 } else { cross / denom }
    }

    fn overlap_add(&mut self, start: u64, out: &mut [f32]) {
        for j in 0..self.frame {
            self.overlap[j] += self.at(start + j as u64) * self.window[j];
        }
        out.copy_from_slice(&self.overlap[..self.hop]);
        self.overlap.copy_within(self.hop.., 0);
        let tail = self.frame - self.hop;
        self.overlap[tail..].fill(0.0);
    }

    /// Release input that no future frame or reference can touch.
    fn consume(&mut self) {
        let natural = self.analysis_pos.round() as u64;
        let mut keep_from = natural.saturating_sub(self.search as u64);
        if let Some(p) = self.prev_start {
            keep_from = keep_from.min(p + self.hop as u64);
        }
        let keep_from = keep_from.clamp(self.base, self.end());
        let drop = (keep_from - self.base) as usize;
        self.input.drain(..drop);
        self.base = keep_from;
    }
}

impl std::fmt::Debug for WsolaProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsolaProcessor")
            .field("sample_rate", &self.sample_rate)
            .field("frame", &self.frame)
            .field("search", &self.search)
            .field("pending", &self.input.len())
            .finish()
    }
}

fn periodic_hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let phase = std::f64::consts::TAU * i as f64 / n as f64;
            (0.5 * (1.0 - phase.cos())) as f32
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/dsp/wsola.rs"]
mod tests;
