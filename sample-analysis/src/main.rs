/// Sample-buffer analysis tool main entry point
mod buffer;
mod gauss;
mod hermite;
mod npy;
mod quadrature;
mod report;
mod reservoir;
mod temporal;

use constants::reservoir::MAX_SPP;
use constants::sample_buffer::HISTOGRAM_BINS;
use hermite::GhTable;
use quadrature::{CompositeScene, SCENE_REFERENCE_STEP};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::env;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "stats" => stats(require_buffer(&args)?),
        "histogram" => histogram(require_buffer(&args)?),
        "quadrature" => per_frame_quadrature(require_buffer(&args)?),
        "gh-sweep" => gh_sweep(),
        "reservoir" => replay_reservoir(require_buffer(&args)?, parse_seed(&args)),
        "temporal" => temporal_study(parse_seed(&args)),
        other => {
            eprintln!("Unknown command: {other}");
            usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn usage(program: &str) {
    eprintln!("Usage: {program} <command> [args]");
    eprintln!("Commands:");
    eprintln!("  stats <buffer.npy>              reference vs shader statistics");
    eprintln!("  histogram <buffer.npy>          export sample histogram + fitted gaussian");
    eprintln!("  quadrature <buffer.npy>         per-frame Gauss-Hermite pixel integrals");
    eprintln!("  gh-sweep                        order/cutoff accuracy sweep on the test scene");
    eprintln!("  reservoir <buffer.npy> [seed]   replay the temporal reservoir estimators");
    eprintln!("  temporal [seed]                 EMA bias/variance study");
}

fn require_buffer(args: &[String]) -> Result<buffer::SampleBuffer, Box<dyn std::error::Error>> {
    if args.len() < 3 {
        eprintln!("Missing buffer path");
        usage(&args[0]);
        std::process::exit(1);
    }
    let arr = npy::load(Path::new(&args[2]))?;
    Ok(buffer::SampleBuffer::new(arr)?)
}

fn parse_seed(args: &[String]) -> u64 {
    args.iter()
        .skip(2)
        .find_map(|a| a.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Reference statistics over the whole dump, cross-checked against the
/// shader's own per-frame headers, plus the moving-average error series.
fn stats(buf: buffer::SampleBuffer) -> Result<(), Box<dyn std::error::Error>> {
    let reference = buffer::reference_stats(&buf);

    println!("Frames: {}", buf.frame_count());
    println!("Samples: {}", reference.total_samples);
    println!("Total weight: {:.6}", reference.total_weight);
    println!(
        "Reference mean: ({:.6}, {:.6})",
        reference.mean[0], reference.mean[1]
    );
    println!(
        "Reference variance: var_x {:.8}  var_y {:.8}  var_xy {:.8}",
        reference.var_x, reference.var_y, reference.var_xy
    );
    println!("Reservoir reference (mean weight): {:.6}", reference.mcmc_ref);

    // The shader's own cross-frame accumulation, read from the last header.
    if let Some(frame) = buf.frames().last() {
        let shader = frame.accumulated;
        println!(
            "Shader running mean: ({:.6}, {:.6})",
            shader.mean[0], shader.mean[1]
        );
        println!(
            "Shader running variance: var_x {:.8}  var_y {:.8}  var_xy {:.8}",
            shader.var_x, shader.var_y, shader.var_xy
        );
    }

    let (errors, moving, mismatched_frames) = buffer::per_frame_errors(&buf, &reference);
    println!(
        "Moving average after {} frames: mean ({:.6}, {:.6})  var_x {:.8}  var_y {:.8}",
        errors.len(),
        moving.mean[0],
        moving.mean[1],
        moving.var_x,
        moving.var_y
    );
    if let Some(last) = errors.last() {
        println!(
            "Final absolute error: mean ({:.6}, {:.6})  std ({:.6}, {:.6})  var_xy {:.8}",
            last[0], last[1], last[2], last[3], last[4]
        );
    }
    if mismatched_frames > 0 {
        println!(
            "Warning: {mismatched_frames} frame headers disagree with the replayed estimator"
        );
    } else {
        println!("All frame headers match the replayed estimator");
    }

    report::save_error_series(Path::new("error_series.json"), &errors, mismatched_frames)
}

/// Weighted histogram plus the Gaussian fitted to the same samples.
fn histogram(buf: buffer::SampleBuffer) -> Result<(), Box<dyn std::error::Error>> {
    let fit = buffer::reference_stats(&buf);
    let histogram = buffer::weighted_histogram(&buf, HISTOGRAM_BINS);
    let fitted =
        gauss::density_grid(fit.mean, fit.var_x, fit.var_y, fit.var_xy, HISTOGRAM_BINS);

    println!(
        "Fitted gaussian: mean ({:.6}, {:.6})  var_x {:.8}  var_y {:.8}  var_xy {:.8}",
        fit.mean[0], fit.mean[1], fit.var_x, fit.var_y, fit.var_xy
    );
    report::save_histogram_report(Path::new("histogram.json"), &histogram, &fit, &fitted)
}

/// Per-frame low-order Gauss-Hermite integrals of the fitted density,
/// compared against the brute-force grid integral.
fn per_frame_quadrature(buf: buffer::SampleBuffer) -> Result<(), Box<dyn std::error::Error>> {
    let table = GhTable::build(2);

    for (index, frame) in buf.frames().enumerate() {
        let estimate = buffer::incremental_estimate(&frame);
        let mean = estimate.mean;
        let (var_x, var_y, var_xy) = (estimate.var_x, estimate.var_y, estimate.var_xy);

        let gh = quadrature::gauss_hermite_integral(&table, mean, var_x, var_y, 2, 2, |x, y| {
            gauss::gauss2d(x, y, mean, var_x, var_y, var_xy)
        });
        let brute = gauss::reference_integral(mean, var_x, var_y, var_xy);

        println!(
            "frame {index:4}  mean ({:.4}, {:.4})  gh(2x2) {gh:.6}  grid {brute:.6}  err {:.6}",
            mean[0],
            mean[1],
            (gh - brute).abs()
        );
    }

    Ok(())
}

const SWEEP_PAIRS: [(usize, f64); 4] = [(3, 2.5), (7, 1.25), (11, 1.0), (17, 1.0)];

/// Order/cutoff accuracy sweep over the composite test scene, plus the 1D
/// step-function pilot study.
fn gh_sweep() -> Result<(), Box<dyn std::error::Error>> {
    let table = GhTable::build(20);
    let scene = CompositeScene { shadow: true };
    let reference = scene.reference(SCENE_REFERENCE_STEP);

    println!(
        "Scene reference: mean ({:.4}, {:.4})  std ({:.4}, {:.4})  integral {:.6}",
        reference.mean[0], reference.mean[1], reference.std[0], reference.std[1],
        reference.integral
    );

    let mut results = Vec::with_capacity(SWEEP_PAIRS.len());
    for (order, cutoff_std) in SWEEP_PAIRS {
        let result = quadrature::accuracy_sweep(&table, order, cutoff_std, &reference, &scene);
        println!(
            "order {:2}  cutoff {:.2}σ  mean error {:.4}  mean rays {:.1}",
            result.order, result.cutoff_std, result.mean_error, result.mean_evaluations
        );
        results.push(result);
    }

    println!("1D step study (mean 0.5, uniform std):");
    let std = (1.0f64 / 12.0).sqrt();
    for (order, _) in SWEEP_PAIRS {
        let (value, evaluations) = quadrature::step_integral_1d(&table, order, 0.5, std);
        println!("  order {order:2}  integral {value:.6}  evaluations {evaluations}");
    }

    report::save_sweep_report(Path::new("sweep.json"), &results, &reference)
}

/// Replays a dump through the temporal reservoir estimators and summarizes
/// each series against the mean-weight reference.
fn replay_reservoir(
    buf: buffer::SampleBuffer,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let reference = buffer::reference_stats(&buf).mcmc_ref;
    let mut rng = StdRng::seed_from_u64(seed);
    let series = reservoir::replay(&buf, &mut rng);

    println!("Reservoir capacity: {MAX_SPP} slots, seed {seed}");
    for (index, ((smart, simple), raw)) in series
        .smart
        .iter()
        .zip(&series.simple)
        .zip(&series.raw)
        .enumerate()
    {
        println!("frame {index:4}  smart {smart:.6}  simple {simple:.6}  raw {raw:.6}");
    }

    let smart = reservoir::series_stats(&series.smart, reference);
    let simple = reservoir::series_stats(&series.simple, reference);
    let raw = reservoir::series_stats(&series.raw, reference);
    println!("Reference: {reference:.6}");
    println!(
        "smart:  bias {:.6}  variance {:.8}  mse {:.8}",
        smart.bias, smart.variance, smart.mse
    );
    println!(
        "simple: bias {:.6}  variance {:.8}  mse {:.8}",
        simple.bias, simple.variance, simple.mse
    );
    println!(
        "raw:    bias {:.6}  variance {:.8}  mse {:.8}",
        raw.bias, raw.variance, raw.mse
    );

    report::save_replay_report(
        Path::new("replay.json"),
        &series,
        &smart,
        &simple,
        &raw,
        reference,
    )
}

const TEMPORAL_FRAMES: usize = 500;
const TEMPORAL_CURVE_POINTS: usize = 100;

/// Closed-form bias/variance of the decayed accumulator plus the noisy
/// tracking simulation.
fn temporal_study(seed: u64) -> Result<(), Box<dyn std::error::Error>> {
    let bias: Vec<f64> = (1..=TEMPORAL_CURVE_POINTS).map(temporal::bias).collect();
    let variance: Vec<f64> = (1..=TEMPORAL_CURVE_POINTS)
        .map(temporal::variance)
        .collect();

    for n in [1, 2, 4, 8, 16, 32, 64, TEMPORAL_CURVE_POINTS] {
        println!(
            "n {n:3}  beta {:.6}  bias {:.6}  variance {:.8}",
            temporal::beta(n),
            bias[n - 1],
            variance[n - 1]
        );
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let tracked = temporal::simulate(TEMPORAL_FRAMES, &mut rng);
    if let Some(last) = tracked.last() {
        println!(
            "After {TEMPORAL_FRAMES} frames: reference {:.4}  ema {:.4}  compensated {:.4}",
            last.reference, last.ema, last.compensated
        );
    }

    report::save_temporal_report(Path::new("temporal.json"), &bias, &variance, &tracked)
}
