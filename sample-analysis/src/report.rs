/// JSON exports for external plotting of the analysis results.
use crate::buffer::{Histogram, ReferenceStats};
use crate::quadrature::{SceneReference, SweepResult};
use crate::reservoir::{ReplaySeries, SeriesStats};
use crate::temporal::TrackedFrame;
use serde_json::json;
use std::fs;
use std::path::Path;

/// Saves the weighted sample histogram next to the fitted Gaussian density
/// evaluated on the same grid, so the two surfaces can be plotted together.
pub fn save_histogram_report(
    path: &Path,
    histogram: &Histogram,
    fit: &ReferenceStats,
    fitted_density: &[f64],
) -> Result<(), Box<dyn std::error::Error>> {
    let report = json!({
        "bins": histogram.bins,
        "histogram": histogram.density,
        "fitted_density": fitted_density,
        "fit": {
            "mean": fit.mean,
            "var_x": fit.var_x,
            "var_y": fit.var_y,
            "var_xy": fit.var_xy,
        },
    });

    fs::write(path, report.to_string())?;
    println!("Saved histogram report: {}", path.display());

    Ok(())
}

/// Saves the per-frame moving-average error series produced by replaying a
/// dump through the incremental estimator.
pub fn save_error_series(
    path: &Path,
    errors: &[[f64; 5]],
    mismatched_frames: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = json!({
        "fields": ["mean_x", "mean_y", "std_x", "std_y", "var_xy"],
        "frames": errors,
        "mismatched_frames": mismatched_frames,
    });

    fs::write(path, report.to_string())?;
    println!("Saved error series: {}", path.display());

    Ok(())
}

/// Saves the reservoir replay series and their bias/variance summaries.
pub fn save_replay_report(
    path: &Path,
    series: &ReplaySeries,
    smart: &SeriesStats,
    simple: &SeriesStats,
    raw: &SeriesStats,
    reference: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = |stats: &SeriesStats| {
        json!({
            "bias": stats.bias,
            "variance": stats.variance,
            "mse": stats.mse,
        })
    };
    let report = json!({
        "reference": reference,
        "smart": { "series": series.smart, "stats": summary(smart) },
        "simple": { "series": series.simple, "stats": summary(simple) },
        "raw": { "series": series.raw, "stats": summary(raw) },
    });

    fs::write(path, report.to_string())?;
    println!("Saved replay report: {}", path.display());

    Ok(())
}

/// Saves the order/cutoff accuracy sweep results.
pub fn save_sweep_report(
    path: &Path,
    results: &[SweepResult],
    reference: &SceneReference,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows: Vec<_> = results
        .iter()
        .map(|r| {
            json!({
                "order": r.order,
                "cutoff_std": r.cutoff_std,
                "mean_error": r.mean_error,
                "mean_evaluations": r.mean_evaluations,
            })
        })
        .collect();
    let report = json!({
        "reference": {
            "mean": reference.mean,
            "std": reference.std,
            "integral": reference.integral,
        },
        "sweeps": rows,
    });

    fs::write(path, report.to_string())?;
    println!("Saved sweep report: {}", path.display());

    Ok(())
}

/// Saves the EMA bias/variance curves and the tracking simulation series.
pub fn save_temporal_report(
    path: &Path,
    bias: &[f64],
    variance: &[f64],
    tracked: &[TrackedFrame],
) -> Result<(), Box<dyn std::error::Error>> {
    let report = json!({
        "bias": bias,
        "variance": variance,
        "reference": tracked.iter().map(|f| f.reference).collect::<Vec<_>>(),
        "ema": tracked.iter().map(|f| f.ema).collect::<Vec<_>>(),
        "compensated": tracked.iter().map(|f| f.compensated).collect::<Vec<_>>(),
    });

    fs::write(path, report.to_string())?;
    println!("Saved temporal report: {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn histogram_report_round_trips_through_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("histogram.json");

        let histogram = Histogram {
            bins: 2,
            density: vec![0.0, 1.0, 2.0, 1.0],
        };
        let fit = ReferenceStats {
            mean: [0.5, 0.5],
            var_x: 0.01,
            var_y: 0.02,
            var_xy: 0.0,
            total_weight: 4.0,
            total_samples: 4,
            mcmc_ref: 1.0,
        };
        save_histogram_report(&path, &histogram, &fit, &[1.0, 1.0, 1.0, 1.0]).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["bins"], 2);
        assert_eq!(parsed["histogram"].as_array().unwrap().len(), 4);
        assert_eq!(parsed["fit"]["var_y"], 0.02);
    }

    #[test]
    fn replay_report_keeps_all_three_series() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("replay.json");

        let series = ReplaySeries {
            smart: vec![0.1, 0.2],
            simple: vec![0.3, 0.3],
            raw: vec![0.25, 0.25],
        };
        let stats = SeriesStats {
            bias: 0.05,
            variance: 0.001,
            mse: 0.0035,
        };
        save_replay_report(&path, &series, &stats, &stats, &stats, 0.25).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["reference"], 0.25);
        assert_eq!(parsed["smart"]["series"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["simple"]["stats"]["bias"], 0.05);
    }
}
