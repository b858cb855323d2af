/// Bivariate Gaussian model fitted to the per-pixel sample distribution.
use constants::sample_buffer::REFERENCE_GRID_STEP;

/// Density of the bivariate normal with the given mean and covariance,
/// parameterized by the correlation ρ = var_xy / (σx σy).
pub fn gauss2d(x: f64, y: f64, mean: [f64; 2], var_x: f64, var_y: f64, var_xy: f64) -> f64 {
    let std_x = var_x.sqrt();
    let std_y = var_y.sqrt();

    let rho = var_xy / (std_x * std_y);
    let rho_sq = 1.0 - rho * rho;

    let a = (x - mean[0]) / std_x;
    let b = (y - mean[1]) / std_y;

    let t = a * a + b * b - 2.0 * rho * a * b;

    (-0.5 * t / rho_sq).exp() / (2.0 * std::f64::consts::PI * std_x * std_y * rho_sq.sqrt())
}

/// Brute-force integral of the fitted density over the unit square: the mean
/// of the density on a regular grid. This is the ground truth the quadrature
/// approximations are judged against.
pub fn reference_integral(mean: [f64; 2], var_x: f64, var_y: f64, var_xy: f64) -> f64 {
    let steps = (1.0 / REFERENCE_GRID_STEP) as usize;
    let mut sum = 0.0;
    for j in 0..steps {
        let y = j as f64 * REFERENCE_GRID_STEP;
        for i in 0..steps {
            let x = i as f64 * REFERENCE_GRID_STEP;
            sum += gauss2d(x, y, mean, var_x, var_y, var_xy);
        }
    }
    sum / (steps * steps) as f64
}

/// Evaluate the fitted density on a bins×bins grid over the unit square,
/// y-major, for export alongside the sample histogram.
pub fn density_grid(
    mean: [f64; 2],
    var_x: f64,
    var_y: f64,
    var_xy: f64,
    bins: usize,
) -> Vec<f64> {
    let mut grid = Vec::with_capacity(bins * bins);
    for j in 0..bins {
        let y = (j as f64 + 0.5) / bins as f64;
        for i in 0..bins {
            let x = (i as f64 + 0.5) / bins as f64;
            grid.push(gauss2d(x, y, mean, var_x, var_y, var_xy));
        }
    }
    grid
}
