/// Tuning for the temporal sample reservoir ("MCMC pass")

/// Reservoir capacity in samples per pixel
pub const MAX_SPP: usize = 8;

/// Upper bound on candidates admitted per frame
pub const MAX_NEW_SAMPLES_PER_FRAME: usize = 4;

/// Scratch size used while a pass is in flight
pub const SCRATCH_SLOTS: usize = MAX_SPP + MAX_NEW_SAMPLES_PER_FRAME;

/// Per-frame exponential decay applied to stored values and weights
pub const DECAY_RATE: f64 = 0.9;

/// Candidate subsampling mask: admit when (rng & SUBSAMPLE_MASK) == 0,
/// i.e. one candidate in four on average
pub const SUBSAMPLE_MASK: u32 = 3;

/// Base merge window along x for matching a candidate to a stored slot
pub const X_DELTA: f64 = 0.001;

/// Base merge window along y for matching a candidate to a stored slot
pub const Y_DELTA: f64 = 0.005;

/// Widening applied to the merge window for low-valued candidates:
/// scale = 1 + (1 - clamp(value)) * MERGE_WINDOW_GAIN
pub const MERGE_WINDOW_GAIN: f64 = 10.0;

/// Slots with a weight below this are treated as empty
pub const EMPTY_SLOT_WEIGHT: f64 = 0.001;

/// Passes of the partial bubble sort that floats heavy slots forward
pub const SORT_PASSES: usize = 3;

/// Floor for the weight sum when forming the reservoir estimate
pub const ESTIMATE_WEIGHT_FLOOR: f64 = 1e-5;
