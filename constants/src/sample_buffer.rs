/// Layout of the Monte-Carlo sample dumps produced by the renderer.
///
/// The buffer is a flat (n, 4) f64 array. Each per-pixel record starts with a
/// self-describing header block, followed by `sample_count` rows of
/// (x, y, weight, extra).

/// Number of columns in every buffer row
pub const ROW_WIDTH: usize = 4;

/// Minimum header rows a record must carry (length/count row plus the two
/// rows of shader-side mean/variance estimates)
pub const MIN_HEADER_ROWS: usize = 3;

/// Resolution of the exported 2D sample histogram
pub const HISTOGRAM_BINS: usize = 100;

/// Grid step for the brute-force reference integral over the unit square
pub const REFERENCE_GRID_STEP: f64 = 0.005;

/// Tolerance when cross-checking the shader's incremental mean estimate
pub const MEAN_CHECK_TOLERANCE: f64 = 1e-6;

/// Tolerance when cross-checking the shader's incremental variance estimates
pub const VARIANCE_CHECK_TOLERANCE: f64 = 1e-7;

/// Blend factor for the cross-frame moving weight
/// (moving_weight = 0.9 * old + 0.1 * frame_weight)
pub const MOVING_WEIGHT_BLEND: f64 = 0.9;
