use linac_tools_fluence::scale::{Bank, ScaleRegistry};
use linac_tools_fluence::{FluenceOptions, RecordType, create_fluence};
use linac_tools_tlog::axis::LogAxis;
use linac_tools_tlog::header::{AxisScale, MlcModelCode};
use linac_tools_tlog::stats::{axis_statistics, mlc_statistics};
use linac_tools_tlog::{LogFluenceSource, TrajectoryLog, TrajectoryLogError};
use linac_tools_fluence::sample::FluenceSource;

fn init() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

const HEADER_SIZE: usize = 1024;
const LEAF_PAIRS: usize = 60;

fn push_i32(bytes: &mut Vec<u8>, v: i32) {
    bytes.extend_from_slice(&v.to_le_bytes());
}

fn push_f32(bytes: &mut Vec<u8>, v: f32) {
    bytes.extend_from_slice(&v.to_le_bytes());
}

fn push_str(bytes: &mut Vec<u8>, s: &str, width: usize) {
    let mut field = vec![0u8; width];
    field[..s.len()].copy_from_slice(s.as_bytes());
    bytes.extend_from_slice(&field);
}

/// One synthetic snapshot in machine scale: jaws at +/-5 cm IEC, leaves
/// retracted to +/-20 cm IEC, gantry and collimator at IEC 0.
struct Snapshot {
    mu: f32,
    control_point: f32,
    beam_hold: f32,
    gantry_error: f32,
}

fn build_log(subbeam_cps: &[i32], snapshots: &[Snapshot], truncate_snapshots: bool) -> Vec<u8> {
    let axes = [0, 1, 2, 3, 4, 5, 40, 41, 42, 50];
    let samples = [1, 1, 1, 1, 1, 1, 1, 1, 1, 2 + 2 * LEAF_PAIRS as i32];

    let mut bytes = Vec::new();
    push_str(&mut bytes, "VOSTL", 16);
    push_str(&mut bytes, "3.0", 16);
    push_i32(&mut bytes, HEADER_SIZE as i32);
    push_i32(&mut bytes, 20);
    push_i32(&mut bytes, axes.len() as i32);
    for a in axes {
        push_i32(&mut bytes, a);
    }
    for s in samples {
        push_i32(&mut bytes, s);
    }
    push_i32(&mut bytes, 1); // machine scale
    push_i32(&mut bytes, subbeam_cps.len() as i32);
    push_i32(&mut bytes, i32::from(truncate_snapshots));
    push_i32(&mut bytes, snapshots.len() as i32);
    push_i32(&mut bytes, 2); // NDS 120
    bytes.resize(HEADER_SIZE, 0);

    for (i, cp) in subbeam_cps.iter().enumerate() {
        push_i32(&mut bytes, *cp);
        push_f32(&mut bytes, 50.0);
        push_f32(&mut bytes, 12.5);
        push_i32(&mut bytes, i as i32);
        push_str(&mut bytes, "Beam", 512);
    }

    for snap in snapshots {
        let pair = |expected: f32, actual: f32, bytes: &mut Vec<u8>| {
            push_f32(bytes, expected);
            push_f32(bytes, actual);
        };
        // Coll Rtn, Gantry Rtn: machine 180 is IEC 0.
        pair(180.0, 180.0, &mut bytes);
        pair(180.0 + snap.gantry_error, 180.0, &mut bytes);
        // Y1, Y2, X1, X2: machine 5 maps to IEC -5/+5 for the "1" jaws.
        pair(5.0, 5.0, &mut bytes);
        pair(5.0, 5.0, &mut bytes);
        pair(5.0, 5.0, &mut bytes);
        pair(5.0, 5.0, &mut bytes);
        pair(snap.mu, snap.mu, &mut bytes);
        pair(snap.beam_hold, snap.beam_hold, &mut bytes);
        pair(snap.control_point, snap.control_point, &mut bytes);
        // Carriages A and B.
        pair(0.0, 0.0, &mut bytes);
        pair(0.0, 0.0, &mut bytes);
        // Bank A at -20 cm IEC, bank B raw -20 flips to +20 cm IEC.
        for _ in 0..LEAF_PAIRS {
            pair(-20.0, -20.0, &mut bytes);
        }
        for _ in 0..LEAF_PAIRS {
            pair(-20.0, -20.0, &mut bytes);
        }
    }
    bytes
}

fn default_snapshots() -> Vec<Snapshot> {
    vec![
        Snapshot {
            mu: 0.0,
            control_point: 0.0,
            beam_hold: 0.0,
            gantry_error: 0.0,
        },
        Snapshot {
            mu: 50.0,
            control_point: 1.0,
            beam_hold: 0.0,
            gantry_error: 2.0,
        },
        Snapshot {
            mu: 100.0,
            control_point: 2.0,
            beam_hold: 0.0,
            gantry_error: 2.0,
        },
    ]
}

#[test]
fn parses_header_and_subbeams() {
    init();
    let bytes = build_log(&[0], &default_snapshots(), false);
    let log = TrajectoryLog::read(&bytes).unwrap();
    let header = log.header();
    assert_eq!(header.version, "3.0");
    assert_eq!(header.sampling_interval_ms, 20);
    assert_eq!(header.axis_scale, AxisScale::Machine);
    assert_eq!(header.mlc_model, MlcModelCode::Nds120);
    assert_eq!(header.num_snapshots, 3);
    assert_eq!(header.samples_per_snapshot(), 9 + 122);

    assert_eq!(log.subbeams().len(), 1);
    assert_eq!(log.subbeams()[0].name, "Beam");
    assert!((log.subbeams()[0].monitor_units - 50.0).abs() < 1e-6);
}

#[test]
fn snapshot_access() {
    init();
    let bytes = build_log(&[0], &default_snapshots(), false);
    let log = TrajectoryLog::read(&bytes).unwrap();

    let mu = log.value(LogAxis::Mu, 1, RecordType::Actual).unwrap();
    assert!((mu - 50.0).abs() < 1e-6);
    let gantry_exp = log
        .value(LogAxis::GantryRtn, 1, RecordType::Expected)
        .unwrap();
    assert!((gantry_exp - 182.0).abs() < 1e-6);

    let leaf = log.leaf(Bank::B, 10, 0, RecordType::Actual).unwrap();
    assert!((leaf - -20.0).abs() < 1e-6);
    let carriage = log.carriage(Bank::A, 0, RecordType::Actual).unwrap();
    assert_eq!(carriage, 0.0);

    assert!(matches!(
        log.value(LogAxis::CouchVrt, 0, RecordType::Actual),
        Err(TrajectoryLogError::MissingAxis(LogAxis::CouchVrt))
    ));
    assert!(matches!(
        log.value(LogAxis::Mu, 3, RecordType::Actual),
        Err(TrajectoryLogError::SnapshotOutOfRange { .. })
    ));
}

#[test]
fn rejects_bad_signature() {
    init();
    let mut bytes = build_log(&[0], &default_snapshots(), false);
    bytes[0] = b'X';
    assert!(matches!(
        TrajectoryLog::read(&bytes),
        Err(TrajectoryLogError::BadSignature(_))
    ));
}

#[test]
fn short_data_errors_unless_marked_truncated() {
    init();
    let full = build_log(&[0], &default_snapshots(), false);
    let cut = full[..full.len() - 200].to_vec();
    assert!(matches!(
        TrajectoryLog::read(&cut),
        Err(TrajectoryLogError::TruncatedSnapshots { .. })
    ));

    let full = build_log(&[0], &default_snapshots(), true);
    let cut = full[..full.len() - 200].to_vec();
    let log = TrajectoryLog::read(&cut).unwrap();
    assert_eq!(log.num_snapshots(), 2);
}

#[test]
fn statistics_report_expected_actual_deviation() {
    init();
    let bytes = build_log(&[0], &default_snapshots(), false);
    let log = TrajectoryLog::read(&bytes).unwrap();
    let stats = axis_statistics(&log).unwrap();
    let gantry = stats
        .iter()
        .find(|s| s.axis == LogAxis::GantryRtn)
        .unwrap();
    // Two of three snapshots deviate by 2 degrees.
    assert!((gantry.max_error - 2.0).abs() < 1e-6);
    assert!((gantry.rms_error - (8.0f64 / 3.0).sqrt()).abs() < 1e-6);

    let mlc = mlc_statistics(&log).unwrap().unwrap();
    assert_eq!(mlc.max_error, 0.0);
}

#[test]
fn adapter_converts_to_iec_frames() {
    init();
    let bytes = build_log(&[0], &default_snapshots(), false);
    let log = TrajectoryLog::read(&bytes).unwrap();
    let registry = ScaleRegistry::with_defaults();
    let source = LogFluenceSource::new(&log, &registry, RecordType::Actual).unwrap();

    let frames = source.frames().unwrap();
    assert_eq!(frames.len(), 3);
    let f = &frames[1];
    assert!((f.gantry - 0.0).abs() < 1e-6);
    assert!((f.x1 - -5.0).abs() < 1e-6);
    assert!((f.x2 - 5.0).abs() < 1e-6);
    assert!((f.y1 - -5.0).abs() < 1e-6);
    assert!((f.bank_a[0] - -20.0).abs() < 1e-6);
    assert!((f.bank_b[0] - 20.0).abs() < 1e-6);
    assert!((frames[0].delta_mu - 0.0).abs() < 1e-6);
    assert!((frames[1].delta_mu - 50.0).abs() < 1e-6);
    assert!((frames[2].delta_mu - 50.0).abs() < 1e-6);
}

#[test]
fn fluence_from_log_preserves_mu_weighted_area() {
    init();
    let bytes = build_log(&[0], &default_snapshots(), false);
    let log = TrajectoryLog::read(&bytes).unwrap();
    let registry = ScaleRegistry::with_defaults();
    let source = LogFluenceSource::new(&log, &registry, RecordType::Actual).unwrap();

    let mut options = FluenceOptions::new(100, 100, 20.0, 20.0);
    options.max_parallelism = 1;
    let fluence = create_fluence(&source, &options).unwrap();
    let grid = fluence.grid();
    // 100 MU through an open 10 x 10 cm field.
    let integral = grid.sum() * grid.dx() * grid.dy();
    assert!((integral - 10_000.0).abs() / 10_000.0 < 1e-4);
}

#[test]
fn subbeam_ranges_follow_control_points() {
    init();
    let bytes = build_log(&[0, 2], &default_snapshots(), false);
    let log = TrajectoryLog::read(&bytes).unwrap();
    assert_eq!(log.subbeam_snapshots(0).unwrap(), 0..2);
    assert_eq!(log.subbeam_snapshots(1).unwrap(), 2..3);

    let registry = ScaleRegistry::with_defaults();
    let source = LogFluenceSource::for_subbeam(&log, &registry, RecordType::Actual, 1).unwrap();
    let frames = source.frames().unwrap();
    assert_eq!(frames.len(), 1);
    // The first frame of a sub-beam differences MU against the preceding
    // snapshot.
    assert!((frames[0].delta_mu - 50.0).abs() < 1e-6);

    assert!(matches!(
        log.subbeam_snapshots(2),
        Err(TrajectoryLogError::SubBeamOutOfRange { .. })
    ));
}

#[test]
fn beam_hold_flag_surfaces_in_frames() {
    init();
    let mut snaps = default_snapshots();
    snaps[1].beam_hold = 2.0;
    let bytes = build_log(&[0], &snaps, false);
    let log = TrajectoryLog::read(&bytes).unwrap();
    let registry = ScaleRegistry::with_defaults();
    let source = LogFluenceSource::new(&log, &registry, RecordType::Actual).unwrap();
    let frames = source.frames().unwrap();
    assert!(!frames[0].beam_hold);
    assert!(frames[1].beam_hold);
    assert!(!frames[2].beam_hold);
}
