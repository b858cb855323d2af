/// Sample-buffer framing and radiance statistics.
///
/// The renderer dumps one flat (n, 4) array per run. Each per-pixel record
/// is self-describing: row 0 carries `[header_len, sample_count, mean_x,
/// mean_y]` (the per-frame mean), row 1 carries `[acc_mean_x, acc_mean_y,
/// var_x, var_y]` (the cross-frame accumulated mean, then the per-frame
/// variances), row 2 carries `[acc_var_x, acc_var_y, var_xy, acc_var_xy]`,
/// followed by `sample_count` rows of `(x, y, weight, extra)`.
use crate::npy::NpyArray;
use constants::sample_buffer::{
    MEAN_CHECK_TOLERANCE, MIN_HEADER_ROWS, MOVING_WEIGHT_BLEND, ROW_WIDTH,
    VARIANCE_CHECK_TOLERANCE,
};
use std::fmt;

#[derive(Debug)]
pub enum BufferError {
    /// A record's header or samples run past the end of the array.
    Truncated { record_start: usize },
    /// A record header has fewer rows than the layout requires.
    HeaderTooShort { record_start: usize, header_len: usize },
    /// The array does not have the (n, 4) shape of a sample dump.
    BadShape { cols: usize },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::Truncated { record_start } => {
                write!(f, "record at row {} is truncated", record_start)
            }
            BufferError::HeaderTooShort {
                record_start,
                header_len,
            } => write!(
                f,
                "record at row {} has a {}-row header, expected at least {}",
                record_start, header_len, MIN_HEADER_ROWS
            ),
            BufferError::BadShape { cols } => {
                write!(f, "expected a {}-column buffer, got {}", ROW_WIDTH, cols)
            }
        }
    }
}

impl std::error::Error for BufferError {}

/// The shader's own running mean/covariance, read from a record header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderEstimate {
    pub mean: [f64; 2],
    pub var_x: f64,
    pub var_y: f64,
    pub var_xy: f64,
}

/// One per-pixel record: the shader's estimates plus its sample rows.
pub struct Frame<'a> {
    /// The shader's estimate over this frame's samples alone.
    pub shader: ShaderEstimate,
    /// The shader's running estimate accumulated across frames so far.
    pub accumulated: ShaderEstimate,
    samples: &'a [f64],
}

impl<'a> Frame<'a> {
    pub fn sample_count(&self) -> usize {
        self.samples.len() / ROW_WIDTH
    }

    /// Sample rows as `(x, y, weight, extra)` slices.
    pub fn samples(&self) -> impl Iterator<Item = &'a [f64]> {
        self.samples.chunks_exact(ROW_WIDTH)
    }
}

/// A loaded dump with validated record framing.
#[derive(Debug)]
pub struct SampleBuffer {
    arr: NpyArray,
    /// (record start row, header rows, sample rows) per frame.
    records: Vec<(usize, usize, usize)>,
}

impl SampleBuffer {
    pub fn new(arr: NpyArray) -> Result<Self, BufferError> {
        if arr.cols != ROW_WIDTH {
            return Err(BufferError::BadShape { cols: arr.cols });
        }

        let mut records = Vec::new();
        let mut index = 0;
        while index < arr.rows {
            let header_len = arr.row(index)[0] as usize;
            let sample_count = arr.row(index)[1] as usize;
            if header_len < MIN_HEADER_ROWS {
                return Err(BufferError::HeaderTooShort {
                    record_start: index,
                    header_len,
                });
            }
            // header_len and sample_count come from file floats; a corrupt
            // dump can hold values that saturate the usize cast.
            let record_end = index
                .checked_add(header_len)
                .and_then(|end| end.checked_add(sample_count))
                .filter(|&end| end <= arr.rows)
                .ok_or(BufferError::Truncated {
                    record_start: index,
                })?;
            records.push((index, header_len, sample_count));
            index = record_end;
        }

        Ok(Self { arr, records })
    }

    pub fn frame_count(&self) -> usize {
        self.records.len()
    }

    pub fn frames(&self) -> impl Iterator<Item = Frame<'_>> {
        self.records.iter().map(|&(start, header_len, count)| {
            let row0 = self.arr.row(start);
            let row1 = self.arr.row(start + 1);
            let row2 = self.arr.row(start + 2);
            let sample_start = (start + header_len) * ROW_WIDTH;
            Frame {
                shader: ShaderEstimate {
                    mean: [row0[2], row0[3]],
                    var_x: row1[2],
                    var_y: row1[3],
                    var_xy: row2[2],
                },
                accumulated: ShaderEstimate {
                    mean: [row1[0], row1[1]],
                    var_x: row2[0],
                    var_y: row2[1],
                    var_xy: row2[3],
                },
                samples: &self.arr.data()[sample_start..sample_start + count * ROW_WIDTH],
            }
        })
    }
}

// ── Reference statistics ──────────────────────────────────────────────────

/// Weighted mean/covariance over every sample of every frame, plus the
/// reservoir reference value (mean sample weight).
#[derive(Debug, Clone, Copy)]
pub struct ReferenceStats {
    pub mean: [f64; 2],
    pub var_x: f64,
    pub var_y: f64,
    pub var_xy: f64,
    pub total_weight: f64,
    pub total_samples: usize,
    pub mcmc_ref: f64,
}

/// Two-pass weighted statistics: an exact mean first, then central moments
/// against it. Single-pass forms drift for the long dumps the renderer
/// produces.
pub fn reference_stats(buf: &SampleBuffer) -> ReferenceStats {
    let mut mean = [0.0f64; 2];
    let mut weight_sum = 0.0;
    let mut total_samples = 0usize;

    for frame in buf.frames() {
        for sample in frame.samples() {
            let w = sample[2];
            mean[0] += w * sample[0];
            mean[1] += w * sample[1];
            weight_sum += w;
            total_samples += 1;
        }
    }
    mean[0] /= weight_sum;
    mean[1] /= weight_sum;

    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut var_xy = 0.0;
    for frame in buf.frames() {
        for sample in frame.samples() {
            let w = sample[2];
            let dx = sample[0] - mean[0];
            let dy = sample[1] - mean[1];
            var_x += w * dx * dx;
            var_y += w * dy * dy;
            var_xy += w * dx * dy;
        }
    }

    ReferenceStats {
        mean,
        var_x: var_x / weight_sum,
        var_y: var_y / weight_sum,
        var_xy: var_xy / weight_sum,
        total_weight: weight_sum,
        total_samples,
        mcmc_ref: weight_sum / total_samples as f64,
    }
}

// ── Per-frame incremental statistics ──────────────────────────────────────

/// Result of replaying the shader's single-pass update over one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameEstimate {
    pub mean: [f64; 2],
    pub var_x: f64,
    pub var_y: f64,
    pub var_xy: f64,
    pub weight: f64,
}

/// The incremental weighted mean/covariance update the shader runs per
/// sample. The variance terms use the post-update mean, matching the GPU
/// code exactly (the estimator is what ships, not the textbook form).
pub fn incremental_estimate(frame: &Frame) -> FrameEstimate {
    let mut mean = [0.0f64; 2];
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut var_xy = 0.0;
    let mut weight = 0.0;

    for sample in frame.samples() {
        let w = sample[2];
        let total = weight + w;
        mean[0] += w * (sample[0] - mean[0]) / total;
        mean[1] += w * (sample[1] - mean[1]) / total;

        let dx = sample[0] - mean[0];
        let dy = sample[1] - mean[1];
        var_x = weight * var_x / total + weight * dx * dx / (total * total);
        var_y = weight * var_y / total + weight * dy * dy / (total * total);
        var_xy = weight * var_xy / total + weight * dx * dy / (total * total);

        weight = total;
    }

    FrameEstimate {
        mean,
        var_x,
        var_y,
        var_xy,
        weight,
    }
}

/// Cross-check a replayed estimate against the header the shader wrote.
/// Returns the mismatching field names, empty when everything agrees.
pub fn verify_against_shader(estimate: &FrameEstimate, shader: &ShaderEstimate) -> Vec<&'static str> {
    let mut mismatches = Vec::new();
    let mean_err = (estimate.mean[0] - shader.mean[0]).abs() + (estimate.mean[1] - shader.mean[1]).abs();
    if mean_err > MEAN_CHECK_TOLERANCE {
        mismatches.push("mean");
    }
    if (estimate.var_x - shader.var_x).abs() > VARIANCE_CHECK_TOLERANCE {
        mismatches.push("var_x");
    }
    if (estimate.var_y - shader.var_y).abs() > VARIANCE_CHECK_TOLERANCE {
        mismatches.push("var_y");
    }
    if (estimate.var_xy - shader.var_xy).abs() > VARIANCE_CHECK_TOLERANCE {
        mismatches.push("var_xy");
    }
    mismatches
}

// ── Cross-frame moving average ────────────────────────────────────────────

/// Exponentially-weighted accumulation of per-frame estimates, the temporal
/// filter the renderer applies across frames.
#[derive(Debug, Clone, Copy)]
pub struct MovingAverage {
    pub mean: [f64; 2],
    pub var_x: f64,
    pub var_y: f64,
    pub var_xy: f64,
    pub weight: f64,
}

impl MovingAverage {
    pub fn new() -> Self {
        // The screen-space mean starts at the pixel center.
        Self {
            mean: [0.5, 0.5],
            var_x: 0.0,
            var_y: 0.0,
            var_xy: 0.0,
            weight: 0.0,
        }
    }

    pub fn update(&mut self, frame: &FrameEstimate) {
        let w = frame.weight;
        let total = w + self.weight;
        let old_mean = self.mean;

        self.mean[0] += w * (frame.mean[0] - self.mean[0]) / total;
        self.mean[1] += w * (frame.mean[1] - self.mean[1]) / total;

        let dfx = frame.mean[0] - self.mean[0];
        let dfy = frame.mean[1] - self.mean[1];
        let dox = old_mean[0] - self.mean[0];
        let doy = old_mean[1] - self.mean[1];

        self.var_x = (w * frame.var_x
            + self.weight * self.var_x
            + w * dfx * dfx
            + self.weight * dox * dox)
            / total;
        self.var_y = (w * frame.var_y
            + self.weight * self.var_y
            + w * dfy * dfy
            + self.weight * doy * doy)
            / total;
        self.var_xy = (w * frame.var_xy
            + self.weight * self.var_xy
            + w * dfx * dfy
            + self.weight * dox * doy)
            / total;

        self.weight =
            MOVING_WEIGHT_BLEND * self.weight + (1.0 - MOVING_WEIGHT_BLEND) * w;
    }

    /// Absolute errors `[mean_x, mean_y, std_x, std_y, var_xy]` against the
    /// reference statistics.
    pub fn error_against(&self, reference: &ReferenceStats) -> [f64; 5] {
        [
            (self.mean[0] - reference.mean[0]).abs(),
            (self.mean[1] - reference.mean[1]).abs(),
            (self.var_x.sqrt() - reference.var_x.sqrt()).abs(),
            (self.var_y.sqrt() - reference.var_y.sqrt()).abs(),
            (self.var_xy - reference.var_xy).abs(),
        ]
    }
}

/// Replay every frame through the incremental estimator and the moving
/// average, producing the per-frame error series against the reference.
/// Also reports how many frames disagreed with their shader headers.
pub fn per_frame_errors(
    buf: &SampleBuffer,
    reference: &ReferenceStats,
) -> (Vec<[f64; 5]>, MovingAverage, usize) {
    let mut moving = MovingAverage::new();
    let mut errors = Vec::with_capacity(buf.frame_count());
    let mut mismatched_frames = 0;

    for frame in buf.frames() {
        let estimate = incremental_estimate(&frame);
        let mismatches = verify_against_shader(&estimate, &frame.shader);
        if !mismatches.is_empty() {
            mismatched_frames += 1;
        }

        moving.update(&estimate);
        errors.push(moving.error_against(reference));
    }

    (errors, moving, mismatched_frames)
}

// ── Histogram ─────────────────────────────────────────────────────────────

/// Weighted 2D density histogram of all samples over the unit square.
pub struct Histogram {
    pub bins: usize,
    /// Row-major density values, y-major like the exported gaussian grid.
    pub density: Vec<f64>,
}

pub fn weighted_histogram(buf: &SampleBuffer, bins: usize) -> Histogram {
    let mut counts = vec![0.0f64; bins * bins];
    let mut total_weight = 0.0;

    for frame in buf.frames() {
        for sample in frame.samples() {
            let (x, y, w) = (sample[0], sample[1], sample[2]);
            if !(0.0..1.0).contains(&x) || !(0.0..1.0).contains(&y) {
                continue;
            }
            let bx = (x * bins as f64) as usize;
            let by = (y * bins as f64) as usize;
            counts[by * bins + bx] += w;
            total_weight += w;
        }
    }

    // Normalize to a density: mass 1 over the unit square.
    let bin_area = 1.0 / (bins as f64 * bins as f64);
    if total_weight > 0.0 {
        for c in counts.iter_mut() {
            *c /= total_weight * bin_area;
        }
    }

    Histogram {
        bins,
        density: counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npy::NpyArray;
    use approx::assert_relative_eq;

    /// Build a buffer of records with the dump's header layout.
    pub fn synthetic_buffer(frames: &[Vec<[f64; 4]>]) -> SampleBuffer {
        let mut rows: Vec<Vec<f64>> = Vec::new();
        for samples in frames {
            rows.push(vec![3.0, samples.len() as f64, 0.0, 0.0]);
            rows.push(vec![0.0; 4]);
            rows.push(vec![0.0; 4]);
            for s in samples {
                rows.push(s.to_vec());
            }
        }
        SampleBuffer::new(NpyArray::from_rows(rows)).unwrap()
    }

    #[test]
    fn framing_walks_all_records() {
        let buf = synthetic_buffer(&[
            vec![[0.1, 0.2, 1.0, 0.0], [0.3, 0.4, 2.0, 0.0]],
            vec![[0.5, 0.5, 1.0, 0.0]],
        ]);
        assert_eq!(buf.frame_count(), 2);
        let counts: Vec<usize> = buf.frames().map(|f| f.sample_count()).collect();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn truncated_record_is_rejected() {
        // Claims 5 samples but only carries 1.
        let rows = vec![
            vec![3.0, 5.0, 0.0, 0.0],
            vec![0.0; 4],
            vec![0.0; 4],
            vec![0.1, 0.1, 1.0, 0.0],
        ];
        let err = SampleBuffer::new(NpyArray::from_rows(rows)).unwrap_err();
        assert!(matches!(err, BufferError::Truncated { record_start: 0 }));
    }

    #[test]
    fn absurd_sample_count_is_rejected() {
        // A corrupt count field saturates the usize cast; the framing walk
        // must reject it instead of overflowing.
        let rows = vec![vec![3.0, 1e300, 0.0, 0.0], vec![0.0; 4], vec![0.0; 4]];
        let err = SampleBuffer::new(NpyArray::from_rows(rows)).unwrap_err();
        assert!(matches!(err, BufferError::Truncated { record_start: 0 }));
    }

    #[test]
    fn cross_frame_shader_estimate_reads_header_fields() {
        let rows = vec![
            vec![3.0, 1.0, 0.4, 0.6],
            vec![0.45, 0.55, 0.01, 0.02],
            vec![0.003, 0.004, 0.001, 0.005],
            vec![0.5, 0.5, 1.0, 0.0],
        ];
        let buf = SampleBuffer::new(NpyArray::from_rows(rows)).unwrap();
        let frame = buf.frames().next().unwrap();
        assert_eq!(frame.shader.mean, [0.4, 0.6]);
        assert_eq!(frame.shader.var_x, 0.01);
        assert_eq!(frame.shader.var_y, 0.02);
        assert_eq!(frame.shader.var_xy, 0.001);
        assert_eq!(frame.accumulated.mean, [0.45, 0.55]);
        assert_eq!(frame.accumulated.var_x, 0.003);
        assert_eq!(frame.accumulated.var_y, 0.004);
        assert_eq!(frame.accumulated.var_xy, 0.005);
    }

    #[test]
    fn short_header_is_rejected() {
        let rows = vec![vec![2.0, 0.0, 0.0, 0.0], vec![0.0; 4]];
        let err = SampleBuffer::new(NpyArray::from_rows(rows)).unwrap_err();
        assert!(matches!(err, BufferError::HeaderTooShort { .. }));
    }

    #[test]
    fn reference_stats_weighted_mean_and_variance() {
        // Two samples, weights 1 and 3 → mean pulled toward the second.
        let buf = synthetic_buffer(&[vec![[0.0, 0.0, 1.0, 0.0], [0.4, 0.8, 3.0, 0.0]]]);
        let stats = reference_stats(&buf);
        assert_relative_eq!(stats.mean[0], 0.3);
        assert_relative_eq!(stats.mean[1], 0.6);
        // var_x = (1*(0-0.3)^2 + 3*(0.4-0.3)^2)/4
        assert_relative_eq!(stats.var_x, 0.03);
        assert_relative_eq!(stats.var_xy, 0.06);
        assert_relative_eq!(stats.mcmc_ref, 2.0);
    }

    #[test]
    fn incremental_estimate_matches_hand_computation() {
        // x = {0, 1}, unit weights, replayed through the shader's update:
        // after s1: mean 0, var 0; after s2: mean 0.5,
        // var_x = 1*0/2 + 1*(1-0.5)^2/4 = 0.0625.
        let buf = synthetic_buffer(&[vec![[0.0, 0.0, 1.0, 0.0], [1.0, 0.0, 1.0, 0.0]]]);
        let est = incremental_estimate(&buf.frames().next().unwrap());
        assert_relative_eq!(est.mean[0], 0.5);
        assert_relative_eq!(est.var_x, 0.0625);
        assert_relative_eq!(est.weight, 2.0);
    }

    #[test]
    fn shader_verification_flags_disagreement() {
        let est = FrameEstimate {
            mean: [0.5, 0.5],
            var_x: 0.01,
            var_y: 0.01,
            var_xy: 0.0,
            weight: 1.0,
        };
        let ok = ShaderEstimate {
            mean: [0.5, 0.5],
            var_x: 0.01,
            var_y: 0.01,
            var_xy: 0.0,
        };
        assert!(verify_against_shader(&est, &ok).is_empty());

        let off = ShaderEstimate { var_x: 0.02, ..ok };
        assert_eq!(verify_against_shader(&est, &off), vec!["var_x"]);
    }

    #[test]
    fn moving_average_converges_to_stationary_frames() {
        let frame = FrameEstimate {
            mean: [0.3, 0.7],
            var_x: 0.01,
            var_y: 0.02,
            var_xy: 0.001,
            weight: 16.0,
        };
        let mut moving = MovingAverage::new();
        for _ in 0..200 {
            moving.update(&frame);
        }
        assert_relative_eq!(moving.mean[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(moving.mean[1], 0.7, epsilon = 1e-6);
        assert_relative_eq!(moving.var_x, 0.01, epsilon = 1e-4);
    }

    #[test]
    fn histogram_mass_normalizes_to_density() {
        let buf = synthetic_buffer(&[vec![[0.105, 0.105, 2.0, 0.0], [0.905, 0.905, 2.0, 0.0]]]);
        let hist = weighted_histogram(&buf, 10);
        // Two occupied bins, each half the mass: density 0.5 * 100.
        let occupied: Vec<f64> = hist.density.iter().copied().filter(|d| *d > 0.0).collect();
        assert_eq!(occupied.len(), 2);
        assert_relative_eq!(occupied[0], 50.0);
    }
}
