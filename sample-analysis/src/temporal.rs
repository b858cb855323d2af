/// Bias/variance of exponential-decay temporal accumulation, and the
/// error-compensated EMA prototype.
use rand::Rng;

/// EMA blend weight used by the temporal filter.
pub const EMA_WEIGHT: f64 = 0.95;

/// Blend weight of the frame-to-frame error compensator.
pub const ERROR_WEIGHT: f64 = 0.4;

/// Angular frequency of the simulated signal's ramp-up phase.
pub const SIGNAL_FREQUENCY: f64 = 0.1;

/// Amplitude of the simulated signal.
pub const SIGNAL_AMPLITUDE: f64 = 4.0;

/// Frame at which the simulated signal stops moving.
pub const SIGNAL_SETTLE_FRAME: usize = 100;

/// Effective per-frame blend of an n-frame history that keeps variance
/// matched to a plain average: β(1) = 1, β(i) = ½·√(6i / ((i+1)(2i+1))).
pub fn beta(i: usize) -> f64 {
    if i == 1 {
        return 1.0;
    }
    let i = i as f64;
    0.5 * (6.0 * i / ((i + 1.0) * (2.0 * i + 1.0))).sqrt()
}

/// Accumulated bias of the truncated estimator after n frames.
pub fn bias(n: usize) -> f64 {
    (1..=n).map(|i| (1.0 - beta(i)) * i as f64).sum()
}

/// Variance of the truncated estimator after n frames.
pub fn variance(n: usize) -> f64 {
    let mut beta_sum = 0.0;
    let mut sum = 0.0;
    for i in 1..=n {
        beta_sum += beta(i);
        sum += beta_sum * beta_sum;
    }
    sum / (n * n) as f64
}

/// One frame of the EMA tracking simulation.
#[derive(Debug, Clone, Copy)]
pub struct TrackedFrame {
    /// Noise-free signal value.
    pub reference: f64,
    /// Plain exponential moving average.
    pub ema: f64,
    /// EMA with the frame-delta error compensator added back.
    pub compensated: f64,
}

/// Track a noisy signal (sine ramp, then constant) with a plain EMA and an
/// error-compensated EMA. The compensator feeds the smoothed frame-to-frame
/// delta back in, trading variance for lag when the signal moves.
pub fn simulate<R: Rng>(frames: usize, rng: &mut R) -> Vec<TrackedFrame> {
    let mut ema = 0.0;
    let mut compensated;
    let mut moving_error = 0.0;
    let mut last = 0.0;

    let mut series = Vec::with_capacity(frames);
    for i in 0..frames {
        let reference = if i < SIGNAL_SETTLE_FRAME {
            SIGNAL_AMPLITUDE * (SIGNAL_FREQUENCY * i as f64).sin()
        } else {
            SIGNAL_AMPLITUDE
        };
        let noisy = reference + (rng.gen_range(0.0..1.0) - 0.5);

        moving_error = ERROR_WEIGHT * moving_error + (1.0 - ERROR_WEIGHT) * (noisy - last);
        ema = EMA_WEIGHT * ema + (1.0 - EMA_WEIGHT) * noisy;
        compensated = EMA_WEIGHT * ema + (1.0 - EMA_WEIGHT) * noisy + moving_error;

        series.push(TrackedFrame {
            reference,
            ema,
            compensated,
        });
        last = noisy;
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn beta_base_case_and_decay() {
        assert_relative_eq!(beta(1), 1.0);
        // β(2) = ½·√(12/15)
        assert_relative_eq!(beta(2), 0.5 * (12.0f64 / 15.0).sqrt(), epsilon = 1e-12);
        // β shrinks toward ½·√3/2 ≈ 0.866/2·… monotonically from above.
        assert!(beta(2) > beta(10));
        assert!(beta(10) > beta(100));
    }

    #[test]
    fn single_frame_estimator_is_unbiased() {
        assert_relative_eq!(bias(1), 0.0);
        assert_relative_eq!(variance(1), 1.0);
    }

    #[test]
    fn bias_grows_and_variance_dips_then_climbs() {
        assert!(bias(50) > bias(10));
        // A short history averages noise down; past the dip the decay
        // weighting concentrates on recent frames and variance climbs back
        // toward its limit of 3/2.
        assert!(variance(2) < variance(1));
        assert!(variance(50) > variance(10));
        assert!(variance(200) > variance(50));
        assert!(variance(200) < 1.5);
    }

    #[test]
    fn ema_settles_on_a_constant_signal() {
        let mut rng = StdRng::seed_from_u64(21);
        let series = simulate(500, &mut rng);
        let last = series.last().unwrap();
        assert_relative_eq!(last.reference, SIGNAL_AMPLITUDE);
        // Noise is ±0.5 uniform; the EMA hugs the plateau.
        assert!((last.ema - SIGNAL_AMPLITUDE).abs() < 0.3);
    }

    #[test]
    fn compensator_leads_the_plain_ema_on_the_ramp() {
        let mut rng = StdRng::seed_from_u64(2);
        let series = simulate(500, &mut rng);
        // While the signal rises, the plain EMA lags behind the reference;
        // the compensated tracker closes part of that gap on average.
        let (mut ema_err, mut comp_err) = (0.0, 0.0);
        for frame in &series[20..SIGNAL_SETTLE_FRAME] {
            ema_err += (frame.ema - frame.reference).abs();
            comp_err += (frame.compensated - frame.reference).abs();
        }
        assert!(comp_err < ema_err);
    }
}
