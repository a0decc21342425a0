//! The dynamic aperture integration engine.
//!
//! Sweeps a finite stream of field frames, projecting each instantaneous
//! aperture onto the fluence grid and weighting its exact per-cell overlap
//! area by the MU delivered since the previous frame. The grid's row range
//! is partitioned into contiguous bands, one per worker; each worker owns
//! its band exclusively so accumulation needs no locking. Floating-point
//! accumulation order differs between workers; run with
//! `max_parallelism = 1` for bit-identical results.

use crate::aperture::{Aperture, build_aperture, jaw_outline};
use crate::error::{FluenceError, Result};
use crate::fluence::{CancelToken, Fluence};
use crate::geom::{ClipScratch, Point, Polygon, Rect, intersection_area};
use crate::grid::Grid;
use crate::mlc::MlcModel;
use crate::options::FluenceOptions;
use crate::sample::{FieldFrame, FluenceSource};
use crate::scale::Bank;
use rayon::prelude::*;
use tracing::{debug, trace};

/// One frame that survived the skip rules, ready for rasterisation.
struct SweepEntry {
    polygons: Vec<(Polygon, Rect)>,
    bbox: Rect,
    delta_mu: f64,
}

#[derive(Copy, Clone, Debug)]
struct GridGeom {
    x0: f64,
    y0: f64,
    dx: f64,
    dy: f64,
    cols: usize,
}

/// Reconstruct the fluence of `source` under `options`.
///
/// An empty frame stream yields a zeroed grid. Invalid frames (non-finite
/// axis values, negative MU deltas, leaf counts that do not match the MLC
/// model) abort the sweep before any accumulation happens.
pub fn create_fluence<S: FluenceSource>(source: &S, options: &FluenceOptions) -> Result<Fluence> {
    create_fluence_with_cancel(source, options, &CancelToken::new())
}

/// Like [`create_fluence`], but checking `cancel` between samples. On
/// cancellation the partially accumulated grid is returned with
/// [`Fluence::is_complete`] false.
pub fn create_fluence_with_cancel<S: FluenceSource>(
    source: &S,
    options: &FluenceOptions,
    cancel: &CancelToken,
) -> Result<Fluence> {
    let mlc = source.mlc_model();
    let frames = source.frames()?;
    validate_frames(&frames, mlc.as_ref())?;

    let mut grid = match options.bounds {
        Some(b) => Grid::with_origin(
            options.cols,
            options.rows,
            b.width(),
            b.height(),
            b.x0,
            b.y0,
        ),
        None => Grid::new(options.cols, options.rows, options.width, options.height),
    };
    let grid_bounds = grid.bounds();

    // Build every surviving aperture up front; workers share them read-only.
    let mut entries = Vec::new();
    let mut outlines = Vec::new();
    let mut aperture = Aperture::default();
    for (i, frame) in frames.iter().enumerate() {
        if i > 0 && frame.delta_mu() <= options.min_delta_mu {
            continue;
        }
        if frame.is_beam_hold() && !options.include_beam_holds {
            continue;
        }
        build_aperture(frame, mlc.as_ref(), &mut aperture);
        if options.record_jaw_outlines {
            outlines.push(jaw_outline(frame));
        }
        let Some(bbox) = aperture.bbox else {
            continue;
        };
        let Some(bbox) = bbox.intersect(&grid_bounds) else {
            continue;
        };
        let polygons = aperture
            .polygons
            .iter()
            .filter_map(|p| p.bbox().map(|b| (p.clone(), b)))
            .collect();
        entries.push(SweepEntry {
            polygons,
            bbox,
            delta_mu: frame.delta_mu(),
        });
    }
    debug!(
        frames = frames.len(),
        integrated = entries.len(),
        approximate = options.use_approximate_fluence,
        "starting fluence sweep"
    );

    let geom = GridGeom {
        x0: grid.x0(),
        y0: grid.y0(),
        dx: grid.dx(),
        dy: grid.dy(),
        cols: grid.cols(),
    };
    let workers = options.max_parallelism.max(1).min(grid.rows());
    let approximate = options.use_approximate_fluence;
    if workers <= 1 {
        sweep_band(grid.data_mut(), 0, &geom, &entries, approximate, cancel);
    } else {
        let band_rows = grid.rows().div_ceil(workers);
        let chunk = band_rows * geom.cols;
        grid.data_mut()
            .par_chunks_mut(chunk)
            .enumerate()
            .for_each(|(band, buf)| {
                sweep_band(buf, band * band_rows, &geom, &entries, approximate, cancel);
            });
    }

    Ok(Fluence::new(
        grid,
        options.clone(),
        outlines,
        !cancel.is_cancelled(),
    ))
}

/// Accumulate every entry into one contiguous row band starting at `row0`.
fn sweep_band(
    buf: &mut [f32],
    row0: usize,
    geom: &GridGeom,
    entries: &[SweepEntry],
    approximate: bool,
    cancel: &CancelToken,
) {
    let band_rows = buf.len() / geom.cols;
    let band_y0 = geom.y0 + row0 as f64 * geom.dy;
    let band_rect = Rect::new(
        geom.x0,
        band_y0,
        geom.x0 + geom.cols as f64 * geom.dx,
        band_y0 + band_rows as f64 * geom.dy,
    );
    let cell_area = geom.dx * geom.dy;
    let mut scratch = ClipScratch::default();

    for entry in entries {
        if cancel.is_cancelled() {
            return;
        }
        let Some(region) = entry.bbox.intersect(&band_rect) else {
            continue;
        };
        let c0 = (((region.x0 - geom.x0) / geom.dx).floor().max(0.0)) as usize;
        let c1 = ((((region.x1 - geom.x0) / geom.dx).ceil()) as usize).min(geom.cols);
        let r0 = (((region.y0 - band_y0) / geom.dy).floor().max(0.0)) as usize;
        let r1 = ((((region.y1 - band_y0) / geom.dy).ceil()) as usize).min(band_rows);
        trace!(rows = r1 - r0, cols = c1 - c0, "rasterising aperture");

        for r in r0..r1 {
            let cy0 = band_y0 + r as f64 * geom.dy;
            let cy1 = cy0 + geom.dy;
            for c in c0..c1 {
                let cx0 = geom.x0 + c as f64 * geom.dx;
                let cx1 = cx0 + geom.dx;
                if approximate {
                    let centre = Point::new(0.5 * (cx0 + cx1), 0.5 * (cy0 + cy1));
                    // Abutting leaf quads share edges; count the cell once.
                    if entry.polygons.iter().any(|(p, bb)| {
                        centre.x >= bb.x0
                            && centre.x <= bb.x1
                            && centre.y >= bb.y0
                            && centre.y <= bb.y1
                            && p.contains(centre)
                    }) {
                        buf[r * geom.cols + c] += entry.delta_mu as f32;
                    }
                } else {
                    let cell = Rect::new(cx0, cy0, cx1, cy1);
                    let cell_poly = cell.corners();
                    let mut area = 0.0;
                    for (poly, poly_bb) in &entry.polygons {
                        if cell.intersect(poly_bb).is_none() {
                            continue;
                        }
                        area += intersection_area(&cell_poly, &poly.vertices, &mut scratch);
                    }
                    if area > 0.0 {
                        buf[r * geom.cols + c] += (area * entry.delta_mu / cell_area) as f32;
                    }
                }
            }
        }
    }
}

fn validate_frames<F: FieldFrame>(frames: &[F], mlc: &dyn MlcModel) -> Result<()> {
    for (index, frame) in frames.iter().enumerate() {
        let scalars = [
            ("gantry", frame.gantry()),
            ("collimator", frame.collimator()),
            ("X1", frame.x1()),
            ("X2", frame.x2()),
            ("Y1", frame.y1()),
            ("Y2", frame.y2()),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(FluenceError::InvalidSample {
                    index,
                    reason: format!("{name} is not finite ({value})"),
                });
            }
        }
        let delta = frame.delta_mu();
        if !delta.is_finite() || delta < 0.0 {
            return Err(FluenceError::InvalidSample {
                index,
                reason: format!("MU delta must be finite and non-negative, got {delta}"),
            });
        }
        let pairs = frame.leaf_pair_count();
        if pairs != mlc.leaf_pair_count() {
            return Err(FluenceError::MlcModelMismatch {
                index,
                sample: pairs,
                model: mlc.name().to_string(),
                expected: mlc.leaf_pair_count(),
            });
        }
        for bank in [Bank::A, Bank::B] {
            for leaf in 0..pairs {
                let v = frame.leaf_position(bank, leaf);
                if !v.is_finite() {
                    return Err(FluenceError::InvalidSample {
                        index,
                        reason: format!("leaf {leaf} of bank {bank} is not finite ({v})"),
                    });
                }
            }
        }
    }
    Ok(())
}
