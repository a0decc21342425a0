use linac_tools_fluence::mlc::{Millennium120, MlcModel};
use linac_tools_fluence::sample::{FieldSample, MemorySource};
use linac_tools_fluence::{
    CancelToken, FluenceError, FluenceOptions, create_fluence, create_fluence_with_cancel,
};
use std::sync::Arc;

fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn mlc() -> Arc<Millennium120> {
    Arc::new(Millennium120::new())
}

/// A 10 x 10 cm open field: jaws at +/-5 cm, every leaf retracted well past
/// the jaws.
fn open_field(delta_mu: f64) -> FieldSample {
    FieldSample {
        x1: -5.0,
        x2: 5.0,
        y1: -5.0,
        y2: 5.0,
        bank_a: vec![-20.0; 60],
        bank_b: vec![20.0; 60],
        delta_mu,
        ..Default::default()
    }
}

fn options_100() -> FluenceOptions {
    let mut o = FluenceOptions::new(100, 100, 20.0, 20.0);
    o.max_parallelism = 1;
    o
}

#[test]
fn static_open_field() {
    init();
    let source = MemorySource::new(mlc(), vec![open_field(100.0)]);
    let fluence = create_fluence(&source, &options_100()).unwrap();
    let grid = fluence.grid();
    assert!(fluence.is_complete());

    // Cells fully inside the field carry the full MU delta, outside zero;
    // the field edge falls exactly on cell boundaries for this grid.
    for row in 0..100 {
        for col in 0..100 {
            let r = grid.bounds_of_cell(row, col);
            let cx = 0.5 * (r.x0 + r.x1);
            let cy = 0.5 * (r.y0 + r.y1);
            let inside = cx.abs() < 5.0 && cy.abs() < 5.0;
            let v = grid.get(row, col);
            if inside {
                assert!((v - 100.0).abs() < 1e-3, "({row},{col}) = {v}");
            } else {
                assert_eq!(v, 0.0, "({row},{col}) = {v}");
            }
        }
    }

    // Integral convention: sum * dx * dy == MU-weighted open area.
    let integral = grid.sum() * grid.dx() * grid.dy();
    assert!((integral - 10_000.0).abs() / 10_000.0 < 1e-4);
    assert!((grid.sum() - 250_000.0).abs() < 1.0);
}

#[test]
fn rotated_collimator_preserves_integral() {
    init();
    let mut sample = open_field(100.0);
    sample.collimator = 45.0;
    let source = MemorySource::new(mlc(), vec![sample]);
    let fluence = create_fluence(&source, &options_100()).unwrap();
    let grid = fluence.grid();

    let integral = grid.sum() * grid.dx() * grid.dy();
    assert!(
        (integral - 10_000.0).abs() / 10_000.0 < 1e-4,
        "integral = {integral}"
    );
    assert!(grid.data().iter().all(|&v| v >= 0.0));
}

#[test]
fn sliding_window_accumulates_uniformly() {
    init();
    // A 1 cm gap stepping 0.1 cm per sample across a 10 x 10 cm opening.
    let mut samples = Vec::new();
    for i in 0..100 {
        let lead = -5.0 + 0.1 * i as f64;
        samples.push(FieldSample {
            x1: -5.0,
            x2: 5.0,
            y1: -5.0,
            y2: 5.0,
            bank_a: vec![lead; 60],
            bank_b: vec![lead + 1.0; 60],
            delta_mu: 1.0,
            ..Default::default()
        });
    }
    let source = MemorySource::new(mlc(), samples);
    let fluence = create_fluence(&source, &options_100()).unwrap();
    let grid = fluence.grid();

    // Every cell whose full swept support lies inside the travel range
    // is crossed by the gap for exactly 10 MU.
    for row in 30..70 {
        for col in 0..100 {
            let r = grid.bounds_of_cell(row, col);
            if r.x0 >= -3.9 && r.x1 <= 4.7 {
                let v = grid.get(row, col);
                assert!((v - 10.0).abs() < 1e-3, "({row},{col}) = {v}");
            }
        }
    }
}

#[test]
fn beam_holds_are_skipped() {
    init();
    let mut with_holds = Vec::new();
    let mut without_holds = Vec::new();
    for i in 0..100 {
        let mut s = open_field(1.0);
        s.collimator = 0.3 * i as f64;
        if i % 10 == 0 {
            s.beam_hold = true;
            with_holds.push(s);
        } else {
            with_holds.push(s.clone());
            without_holds.push(s);
        }
    }
    let a = create_fluence(&MemorySource::new(mlc(), with_holds), &options_100()).unwrap();
    let b = create_fluence(&MemorySource::new(mlc(), without_holds), &options_100()).unwrap();
    assert_eq!(a.grid().data(), b.grid().data());
}

#[test]
fn parallel_matches_serial() {
    init();
    let mut samples = Vec::new();
    for i in 0..50 {
        let mut s = open_field(2.0);
        s.collimator = 1.5 * i as f64;
        samples.push(s);
    }
    let source = MemorySource::new(mlc(), samples);

    let serial = create_fluence(&source, &options_100()).unwrap();
    let mut par_opts = options_100();
    par_opts.max_parallelism = 8;
    let parallel = create_fluence(&source, &par_opts).unwrap();

    for (a, b) in serial
        .grid()
        .data()
        .iter()
        .zip(parallel.grid().data().iter())
    {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn approximate_mode_agrees_for_large_apertures() {
    init();
    let mut sample = open_field(100.0);
    sample.collimator = 45.0;
    let source = MemorySource::new(mlc(), vec![sample]);

    let exact = create_fluence(&source, &options_100()).unwrap();
    let mut approx_opts = options_100();
    approx_opts.use_approximate_fluence = true;
    let approx = create_fluence(&source, &approx_opts).unwrap();

    let se = exact.grid().sum();
    let sa = approx.grid().sum();
    assert!((se - sa).abs() / se < 0.02, "exact {se}, approximate {sa}");
}

#[test]
fn zero_delta_mu_changes_nothing() {
    init();
    let base = vec![open_field(100.0)];
    let mut extended = base.clone();
    let mut idle = open_field(0.0);
    idle.collimator = 45.0;
    extended.push(idle);

    let a = create_fluence(&MemorySource::new(mlc(), base), &options_100()).unwrap();
    let b = create_fluence(&MemorySource::new(mlc(), extended), &options_100()).unwrap();
    assert_eq!(a.grid().data(), b.grid().data());
}

#[test]
fn closed_mlc_yields_zero() {
    init();
    let mut s = open_field(500.0);
    s.bank_a = vec![1.5; 60];
    s.bank_b = vec![1.5; 60];
    let fluence = create_fluence(&MemorySource::new(mlc(), vec![s]), &options_100()).unwrap();
    assert_eq!(fluence.grid().sum(), 0.0);
}

#[test]
fn aperture_outside_grid_yields_zero() {
    init();
    let mut s = open_field(100.0);
    s.x1 = 30.0;
    s.x2 = 40.0;
    s.bank_a = vec![25.0; 60];
    s.bank_b = vec![45.0; 60];
    let fluence = create_fluence(&MemorySource::new(mlc(), vec![s]), &options_100()).unwrap();
    assert_eq!(fluence.grid().sum(), 0.0);
}

#[test]
fn empty_stream_yields_zero_grid() {
    init();
    let fluence = create_fluence(&MemorySource::new(mlc(), vec![]), &options_100()).unwrap();
    assert!(fluence.is_complete());
    assert_eq!(fluence.grid().sum(), 0.0);
}

#[test]
fn cancellation_marks_result_incomplete() {
    init();
    let source = MemorySource::new(mlc(), vec![open_field(100.0)]);
    let token = CancelToken::new();
    token.cancel();
    let fluence = create_fluence_with_cancel(&source, &options_100(), &token).unwrap();
    assert!(!fluence.is_complete());
    assert_eq!(fluence.grid().sum(), 0.0);
}

#[test]
fn nan_axis_is_fatal() {
    init();
    let mut s = open_field(10.0);
    s.gantry = f64::NAN;
    let r = create_fluence(&MemorySource::new(mlc(), vec![s]), &options_100());
    assert!(matches!(r, Err(FluenceError::InvalidSample { index: 0, .. })));
}

#[test]
fn negative_delta_mu_is_fatal() {
    init();
    let ok = open_field(10.0);
    let mut bad = open_field(10.0);
    bad.delta_mu = -1.0;
    let r = create_fluence(&MemorySource::new(mlc(), vec![ok, bad]), &options_100());
    assert!(matches!(r, Err(FluenceError::InvalidSample { index: 1, .. })));
}

#[test]
fn leaf_count_mismatch_is_fatal() {
    init();
    let mut s = open_field(10.0);
    s.bank_a = vec![-20.0; 40];
    s.bank_b = vec![20.0; 40];
    let r = create_fluence(&MemorySource::new(mlc(), vec![s]), &options_100());
    assert!(matches!(
        r,
        Err(FluenceError::MlcModelMismatch { index: 0, .. })
    ));
}

#[test]
fn jaw_outlines_are_captured_per_integrated_sample() {
    init();
    let mut samples = vec![open_field(10.0), open_field(10.0), open_field(10.0)];
    samples[1].beam_hold = true;
    let mut opts = options_100();
    opts.record_jaw_outlines = true;
    let fluence = create_fluence(&MemorySource::new(mlc(), samples), &opts).unwrap();
    assert_eq!(fluence.jaw_outlines().len(), 2);
    assert!((fluence.jaw_outlines()[0].area() - 100.0).abs() < 1e-9);
}

#[test]
fn model_trait_objects_are_usable() {
    init();
    let model: Arc<dyn MlcModel> = mlc();
    assert_eq!(model.leaf_pair_count(), 60);
}
