/// Gauss-Hermite approximation of the pixel integral, and the accuracy
/// sweeps that size the order/cutoff tradeoff.
use crate::gauss::gauss2d;
use crate::hermite::GhTable;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

/// Tensor-product Gauss-Hermite estimate of ∫∫ f over the unit square,
/// where f is expected to concentrate like a Gaussian with the given
/// mean/variance. Nodes falling outside the unit square are rejected; the
/// 2√(var_x·var_y) factor is the change of variables to the node space.
pub fn gauss_hermite_integral<F>(
    table: &GhTable,
    mean: [f64; 2],
    var_x: f64,
    var_y: f64,
    order_x: usize,
    order_y: usize,
    f: F,
) -> f64
where
    F: Fn(f64, f64) -> f64,
{
    let sx = (2.0 * var_x).sqrt();
    let sy = (2.0 * var_y).sqrt();

    let mut integral = 0.0;
    for &[x, wx] in table.row(order_x) {
        let x_trans = sx * x + mean[0];
        if !(0.0..=1.0).contains(&x_trans) {
            continue;
        }
        for &[y, wy] in table.row(order_y) {
            let y_trans = sy * y + mean[1];
            if !(0.0..=1.0).contains(&y_trans) {
                continue;
            }
            integral += wx * wy * f(x_trans, y_trans);
        }
    }

    integral * 2.0 * (var_x * var_y).sqrt()
}

// ── Composite test scene ──────────────────────────────────────────────────

/// Axis-aligned box membership with half-extents, the stand-in for a ray
/// hitting geometry.
pub fn box2d(x: f64, y: f64, mean_x: f64, mean_y: f64, half_w: f64, half_h: f64) -> bool {
    x > mean_x - half_w && x < mean_x + half_w && y > mean_y - half_h && y < mean_y + half_h
}

/// Grid step for the sweep's brute-force scene reference.
pub const SCENE_REFERENCE_STEP: f64 = 0.0005;

/// Synthetic pixel: a tight Gaussian lobe clipped to the unit square, with
/// an optional hard shadow box carving a notch out of it. Mimics the
/// radiance landscape the real sampler sees at a penumbra.
#[derive(Debug, Clone, Copy)]
pub struct CompositeScene {
    pub shadow: bool,
}

impl CompositeScene {
    pub const LOBE_MEAN: [f64; 2] = [0.5, 0.5];
    pub const LOBE_STD: f64 = 0.05;
    pub const SHADOW_CENTER: [f64; 2] = [0.6, 0.5];
    pub const SHADOW_HALF: f64 = 0.05;

    /// Returns the radiance value and whether a ray was traced (hits count
    /// toward the evaluation budget, misses are free).
    pub fn eval(&self, x: f64, y: f64) -> (f64, usize) {
        let hit = box2d(x, y, 0.5, 0.5, 0.5, 0.5);
        if !hit {
            return (0.0, 0);
        }

        let shadowed = self.shadow
            && box2d(
                x,
                y,
                Self::SHADOW_CENTER[0],
                Self::SHADOW_CENTER[1],
                Self::SHADOW_HALF,
                Self::SHADOW_HALF,
            );
        let lobe = gauss2d(
            x,
            y,
            Self::LOBE_MEAN,
            Self::LOBE_STD * Self::LOBE_STD,
            Self::LOBE_STD * Self::LOBE_STD,
            0.0,
        );
        (if shadowed { 0.0 } else { lobe }, 1)
    }

    /// Ground truth for the sweep: the unshadowed lobe's mean/std (what the
    /// sampler would estimate) and the shadowed integral (what the
    /// quadrature must reproduce), both on a regular grid.
    pub fn reference(&self, step: f64) -> SceneReference {
        let steps = (1.0 / step) as usize;

        let mut weight = 0.0;
        let mut mean = [0.0f64; 2];
        let mut integral = 0.0;
        for j in 0..steps {
            let y = j as f64 * step;
            for i in 0..steps {
                let x = i as f64 * step;
                let unshadowed = CompositeScene { shadow: false };
                let (z, _) = unshadowed.eval(x, y);
                weight += z;
                mean[0] += z * x;
                mean[1] += z * y;
                integral += self.eval(x, y).0;
            }
        }
        mean[0] /= weight;
        mean[1] /= weight;

        let mut var = [0.0f64; 2];
        for j in 0..steps {
            let y = j as f64 * step;
            for i in 0..steps {
                let x = i as f64 * step;
                let unshadowed = CompositeScene { shadow: false };
                let (z, _) = unshadowed.eval(x, y);
                var[0] += z * (x - mean[0]) * (x - mean[0]);
                var[1] += z * (y - mean[1]) * (y - mean[1]);
            }
        }

        SceneReference {
            mean,
            std: [(var[0] / weight).sqrt(), (var[1] / weight).sqrt()],
            integral: integral / (steps * steps) as f64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SceneReference {
    pub mean: [f64; 2],
    pub std: [f64; 2],
    pub integral: f64,
}

/// GH estimate of the composite scene with node pruning: nodes outside
/// `cutoff_std` standard deviations are discarded before evaluation.
/// Returns the estimate and the number of rays traced.
pub fn integral_with_cutoff(
    table: &GhTable,
    order: usize,
    mean_x: f64,
    mean_y: f64,
    std_x: f64,
    std_y: f64,
    cutoff_std: f64,
    scene: &CompositeScene,
) -> (f64, usize) {
    let sx = 2f64.sqrt() * std_x;
    let sy = 2f64.sqrt() * std_y;

    let mut sum = 0.0;
    let mut evaluations = 0usize;
    for &[x, wx] in table.row(order) {
        let tx = sx * x + mean_x;
        for &[y, wy] in table.row(order) {
            let ty = sy * y + mean_y;
            if !box2d(tx, ty, mean_x, mean_y, cutoff_std * std_x, cutoff_std * std_y) {
                continue;
            }
            let (value, rays) = scene.eval(tx, ty);
            sum += wx * wy * value;
            evaluations += rays;
        }
    }

    (sum * 2.0 * std_x * std_y, evaluations)
}

// ── Accuracy sweep ────────────────────────────────────────────────────────

/// Mean relative error and mean ray count of one (order, cutoff) pair over
/// a grid of estimator perturbations: the mean shifted by up to ±1.5σ and
/// the std mis-scaled by ×0.6..2. This is the map that decides which order
/// a pixel of a given confidence should get.
#[derive(Debug, Clone, Copy)]
pub struct SweepResult {
    pub order: usize,
    pub cutoff_std: f64,
    pub mean_error: f64,
    pub mean_evaluations: f64,
}

pub fn accuracy_sweep(
    table: &GhTable,
    order: usize,
    cutoff_std: f64,
    reference: &SceneReference,
    scene: &CompositeScene,
) -> SweepResult {
    let mean_offsets: Vec<f64> = grid_range(-1.5, 1.5, 0.05);
    let std_offsets: Vec<f64> = grid_range(-0.4, 1.0, 0.05);

    let pb = ProgressBar::new(std_offsets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.green/blue}] {pos}/{len} rows ({percent}%) {msg}")
            .unwrap()
            .progress_chars("▉▊▋▌▍▎▏ "),
    );
    pb.set_message(format!("order {} cutoff {:.2}", order, cutoff_std));

    let (error_sum, eval_sum) = std_offsets
        .par_iter()
        .map(|&std_offset| {
            let mut row_error = 0.0;
            let mut row_evals = 0usize;
            for &mean_offset in &mean_offsets {
                let mean_x = reference.mean[0] + mean_offset * reference.std[0];
                let mean_y = reference.mean[1] + mean_offset * reference.std[1];
                let std_x = (1.0 + std_offset) * reference.std[0];
                let std_y = (1.0 + std_offset) * reference.std[1];

                let (value, evaluations) = integral_with_cutoff(
                    table, order, mean_x, mean_y, std_x, std_y, cutoff_std, scene,
                );
                row_error += (value - reference.integral).abs() / reference.integral.abs();
                row_evals += evaluations;
            }
            pb.inc(1);
            (row_error, row_evals)
        })
        .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    pb.finish_with_message("sweep done");

    let cells = (mean_offsets.len() * std_offsets.len()) as f64;
    SweepResult {
        order,
        cutoff_std,
        mean_error: error_sum / cells,
        mean_evaluations: eval_sum as f64 / cells,
    }
}

fn grid_range(start: f64, end: f64, step: f64) -> Vec<f64> {
    let mut values = Vec::new();
    let mut v = start;
    while v < end {
        values.push(v);
        v += step;
    }
    values
}

// ── 1D study ──────────────────────────────────────────────────────────────

/// The 1D pilot: a unit step on [0,1] integrated by a scaled GH rule.
/// Returns the estimate and how many evaluations landed on geometry.
pub fn step_integral_1d(table: &GhTable, order: usize, mean: f64, std: f64) -> (f64, usize) {
    let mut sum = 0.0;
    let mut evaluations = 0usize;
    for &[x, w] in table.row(order) {
        let t = 2f64.sqrt() * x * std + mean;
        if (0.0..=1.0).contains(&t) {
            sum += w;
            evaluations += 1;
        }
    }
    (sum * 2f64.sqrt() * std, evaluations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauss::reference_integral;
    use approx::assert_relative_eq;

    #[test]
    fn gh_integral_recovers_a_contained_gaussian() {
        // σ = 0.05 centered: essentially all mass inside the unit square,
        // so the integral is 1 and moderate orders nail it.
        let table = GhTable::build(24);
        let mean = [0.5, 0.5];
        let (var_x, var_y) = (0.0025, 0.0025);
        let value = gauss_hermite_integral(&table, mean, var_x, var_y, 20, 20, |x, y| {
            gauss2d(x, y, mean, var_x, var_y, 0.0)
        });
        assert_relative_eq!(value, 1.0, epsilon = 1e-6);
        let brute = reference_integral(mean, var_x, var_y, 0.0);
        assert_relative_eq!(value, brute, epsilon = 1e-2);
    }

    #[test]
    fn off_center_mass_is_clipped() {
        // Mean far outside the square: every node rejected, integral 0.
        let table = GhTable::build(8);
        let value = gauss_hermite_integral(&table, [3.0, 3.0], 0.0025, 0.0025, 4, 4, |_, _| 1.0);
        assert_eq!(value, 0.0);
    }

    #[test]
    fn composite_scene_shadow_carves_the_lobe() {
        let lit = CompositeScene { shadow: false };
        let shadowed = CompositeScene { shadow: true };
        // Inside the shadow box.
        assert!(lit.eval(0.6, 0.5).0 > 0.0);
        assert_eq!(shadowed.eval(0.6, 0.5).0, 0.0);
        // Outside it, identical.
        assert_relative_eq!(lit.eval(0.45, 0.45).0, shadowed.eval(0.45, 0.45).0);
        // Off-geometry misses trace no ray.
        assert_eq!(lit.eval(1.5, 0.5), (0.0, 0));
    }

    #[test]
    fn scene_reference_recovers_the_lobe_parameters() {
        let scene = CompositeScene { shadow: false };
        let reference = scene.reference(SCENE_REFERENCE_STEP);
        assert_relative_eq!(reference.mean[0], 0.5, epsilon = 1e-3);
        assert_relative_eq!(reference.std[0], CompositeScene::LOBE_STD, epsilon = 1e-3);
        assert_relative_eq!(reference.integral, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn cutoff_integral_approaches_reference_at_high_order() {
        let scene = CompositeScene { shadow: true };
        let reference = scene.reference(0.002);
        let table = GhTable::build(20);
        let (value, evaluations) = integral_with_cutoff(
            &table,
            17,
            reference.mean[0],
            reference.mean[1],
            reference.std[0],
            reference.std[1],
            3.0,
            &scene,
        );
        assert!((value - reference.integral).abs() / reference.integral < 0.2);
        assert!(evaluations > 0 && evaluations <= 17 * 17);
    }

    #[test]
    fn tighter_cutoff_spends_fewer_rays() {
        let scene = CompositeScene { shadow: true };
        let table = GhTable::build(20);
        let (_, wide) =
            integral_with_cutoff(&table, 17, 0.5, 0.5, 0.05, 0.05, 2.5, &scene);
        let (_, tight) =
            integral_with_cutoff(&table, 17, 0.5, 0.5, 0.05, 0.05, 1.0, &scene);
        assert!(tight < wide);
    }

    #[test]
    fn step_integral_counts_its_evaluations() {
        let table = GhTable::build(20);
        let (value, evaluations) = step_integral_1d(&table, 17, 0.5, (1.0f64 / 12.0).sqrt());
        assert!(evaluations <= 17);
        assert!((value - 1.0).abs() < 0.25);
    }
}
