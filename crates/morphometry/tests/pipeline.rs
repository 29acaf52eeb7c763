use std::fs;
use std::path::Path;

use mm_core::Image;
use morphometry::io::save_gray;
use morphometry::{
    BatchSummary, CAMERA_HEADER, CameraConfig, CameraLedger, ConfigError, DetectStrategy, Error,
    FixedCaptureDate, MorphOp, NoCaptureDate, NormalizeConfig, PathsConfig, SCANNER_HEADER,
    ScannerConfig, ThresholdMethod, camera_batch, normalize_batch, scanner_batch,
};

fn page(w: usize, h: usize, background: u8, blobs: &[(f64, f64, f64, f64, u8)]) -> Image<u8> {
    let mut img = Image::new_fill(w, h, background);
    for &(cx, cy, a, b, v) in blobs {
        for y in 0..h {
            for x in 0..w {
                let dx = (x as f64 - cx) / a;
                let dy = (y as f64 - cy) / b;
                if dx * dx + dy * dy <= 1.0 {
                    *img.get_mut(x, y).expect("in bounds") = v;
                }
            }
        }
    }
    img
}

fn paths(root: &Path) -> PathsConfig {
    PathsConfig {
        input_dir: root.join("in"),
        gray_dir: root.join("gray"),
        out_dir: root.join("out"),
    }
}

/// Camera defaults with smaller neighbourhoods so the test images stay
/// small.
fn small_camera() -> CameraConfig {
    let mut cfg = CameraConfig::default();
    cfg.detector.threshold = ThresholdMethod::Adaptive {
        block_size: 151,
        constant: 3.0,
    };
    if let DetectStrategy::Adaptive(env) = &mut cfg.detector.strategy {
        env.roi_half_extent = 150;
        env.erode = MorphOp::rect(9, 2);
    }
    cfg.recognizer.threshold = ThresholdMethod::Adaptive {
        block_size: 151,
        constant: 3.0,
    };
    cfg.measure.scale = 10.0;
    cfg
}

#[test]
fn camera_batch_is_idempotent_per_label() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.gray_dir).expect("mkdir");

    let label = "A1_20230509_gray.png";
    let insect = page(400, 300, 238, &[(200.0, 150.0, 70.0, 30.0, 70)]);
    save_gray(&insect, &paths.gray_dir.join(label)).expect("save");
    save_gray(
        &Image::new_fill(400, 300, 250u8),
        &paths.gray_dir.join("blank_gray.png"),
    )
    .expect("save");

    let cfg = small_camera();
    let first = camera_batch(&paths, &cfg).expect("camera batch");
    assert_eq!(
        first,
        BatchSummary {
            images: 2,
            skipped: 0,
            measured: 1,
            unmeasured: 1,
            failed: 0,
        }
    );
    assert!(paths.out_dir.join(label).is_file());
    assert!(paths.out_dir.join("blank_gray.png").is_file());

    let ledger = CameraLedger::open(paths.out_dir.join("camera.txt")).expect("ledger");
    let rows = ledger.rows().expect("rows");
    assert_eq!(rows.len(), 1);
    let fields: Vec<&str> = rows[0].split('\t').collect();
    assert_eq!(fields[0], label);
    let length: f64 = fields[1].parse().expect("length");
    assert!(length > 5.0 && length < 16.0, "length {length}");
    assert_eq!(fields[5], "10");

    camera_batch(&paths, &cfg).expect("second run");
    assert_eq!(ledger.rows().expect("rows"), rows);
    assert!(ledger.backup_path().is_file());

    let text = fs::read_to_string(ledger.path()).expect("read ledger");
    assert_eq!(text.lines().next(), Some(CAMERA_HEADER));
}

#[test]
fn curated_images_are_skipped_and_redo_crops_are_used() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = paths(dir.path());
    let cfg = small_camera();
    fs::create_dir_all(paths.gray_dir.join(&cfg.redo_subdir)).expect("mkdir");
    fs::create_dir_all(paths.out_dir.join("good")).expect("mkdir");

    let img = page(400, 300, 238, &[(200.0, 150.0, 70.0, 30.0, 70)]);
    save_gray(&img, &paths.gray_dir.join("kept.png")).expect("save");
    save_gray(&img, &paths.out_dir.join("good").join("kept.png")).expect("save");

    // Detection would find nothing on glare; the manual crop still measures.
    save_gray(
        &Image::new_fill(400, 300, 250u8),
        &paths.gray_dir.join("redo_me.png"),
    )
    .expect("save");
    let crop = page(200, 120, 238, &[(100.0, 60.0, 70.0, 30.0, 70)]);
    save_gray(
        &crop,
        &paths.gray_dir.join(&cfg.redo_subdir).join("redo_me.png"),
    )
    .expect("save");

    let summary = camera_batch(&paths, &cfg).expect("camera batch");
    assert_eq!(summary.images, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.measured, 1);

    let rows = CameraLedger::open(paths.out_dir.join("camera.txt"))
        .expect("ledger")
        .rows()
        .expect("rows");
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("redo_me.png\t"));
}

#[test]
fn scanner_batch_writes_one_ledger_per_page() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.input_dir).expect("mkdir");

    let plate = page(
        600,
        400,
        230,
        &[(150.0, 120.0, 90.0, 40.0, 50), (420.0, 260.0, 70.0, 50.0, 60)],
    );
    save_gray(&plate, &paths.input_dir.join("plate.png")).expect("save");
    save_gray(
        &Image::new_fill(300, 200, 230u8),
        &paths.input_dir.join("empty.png"),
    )
    .expect("save");

    let summary = scanner_batch(&paths, &ScannerConfig::default()).expect("scanner batch");
    assert_eq!(summary.images, 2);
    assert_eq!(summary.measured, 2);
    assert_eq!(summary.failed, 0);

    let text = fs::read_to_string(paths.out_dir.join("plate.txt")).expect("plate ledger");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], SCANNER_HEADER);
    assert_eq!(lines.len(), 3);

    let first: Vec<&str> = lines[1].split('\t').collect();
    assert_eq!(first[0], "1");
    let x: f64 = first[1].parse().expect("x");
    let y: f64 = first[2].parse().expect("y");
    assert!((x - 150.0).abs() < 3.0, "x {x}");
    assert!((y - 120.0).abs() < 3.0, "y {y}");
    assert!(lines[2].starts_with("2\t"));

    assert!(paths.out_dir.join("plate_output.jpg").is_file());
    let empty = fs::read_to_string(paths.out_dir.join("empty.txt")).expect("empty ledger");
    assert_eq!(empty.lines().count(), 1);
    assert!(paths.out_dir.join("empty_output.jpg").is_file());
}

#[test]
fn normalization_names_outputs_and_skips_existing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.input_dir).expect("mkdir");
    save_gray(
        &page(200, 160, 200, &[(100.0, 80.0, 10.0, 6.0, 60)]),
        &paths.input_dir.join("A1.png"),
    )
    .expect("save");

    let dates = FixedCaptureDate("2023:05:09 10:00:00".to_string());
    let cfg = NormalizeConfig::default();

    let first = normalize_batch(&paths, &cfg, &dates).expect("normalize");
    assert_eq!(first.measured, 1);
    let out = paths.gray_dir.join("A1_20230509_gray.jpg");
    assert!(out.is_file());

    let img = morphometry::io::load_gray(&out).expect("load");
    assert_eq!((img.width(), img.height()), (100, 80));

    let second = normalize_batch(&paths, &cfg, &dates).expect("normalize");
    assert_eq!(second.skipped, 1);
    assert_eq!(second.measured, 0);
}

#[test]
fn invalid_configs_are_rejected_before_any_work() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = paths(dir.path());
    fs::create_dir_all(&paths.input_dir).expect("mkdir");
    fs::create_dir_all(&paths.gray_dir).expect("mkdir");

    let mut scanner = ScannerConfig::default();
    scanner.detector.close = MorphOp::rect(0, 3);
    let err = scanner_batch(&paths, &scanner).expect_err("zero kernel");
    match &err {
        Error::Config(ConfigError::Invalid { field, .. }) => {
            assert_eq!(field, "scanner.detector.close.size")
        }
        other => panic!("unexpected error {other}"),
    }

    let mut camera = CameraConfig::default();
    camera.measure.erode_kernel = 0;
    assert!(matches!(camera_batch(&paths, &camera), Err(Error::Config(_))));

    let normalize = NormalizeConfig {
        top_values: 0,
        ..NormalizeConfig::default()
    };
    assert!(matches!(
        normalize_batch(&paths, &normalize, &NoCaptureDate),
        Err(Error::Config(_))
    ));

    assert!(!paths.out_dir.exists());
}
