use slide_regions::worker::LATEX_SNIPPETS;
use slide_regions::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn fast_timings() -> WorkerTimings {
    WorkerTimings {
        missing_dir_backoff_ms: 10,
        idle_interval_ms: 10,
        step_ms: 2,
        steps: 3,
    }
}

fn touch_crop(dir: &Path, page_index: usize, ordinal: usize) -> PathBuf {
    let path = dir.join(crop_file_name(page_index, ordinal));
    std::fs::write(&path, b"not really a png").unwrap();
    path
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

async fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[tokio::test]
async fn test_pass_writes_result_for_every_crop() {
    let dir = tempfile::tempdir().unwrap();
    let crops = [
        touch_crop(dir.path(), 0, 1),
        touch_crop(dir.path(), 0, 2),
        touch_crop(dir.path(), 3, 1),
    ];

    let mut worker = OcrWorker::placeholder(fast_timings());
    let stop = StopSignal::new();
    let outcome = worker.run_pass(dir.path(), &stop).await.unwrap();
    assert_eq!(
        outcome,
        PassOutcome::Processed {
            written: 3,
            failed: 0
        }
    );

    // enumeration order is filesystem dependent, so compare as a set
    let mut contents: Vec<String> = crops
        .iter()
        .map(|c| std::fs::read_to_string(result_path_for(c)).unwrap())
        .collect();
    contents.sort();
    let mut expected: Vec<String> = LATEX_SNIPPETS[..3]
        .iter()
        .map(|s| format!("{}\n", s))
        .collect();
    expected.sort();
    assert_eq!(contents, expected);

    // no temporary files left behind
    assert!(dir_names(dir.path()).iter().all(|n| !n.ends_with(".partial")));
}

#[tokio::test]
async fn test_second_pass_is_idle_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let crop = touch_crop(dir.path(), 0, 1);

    let mut worker = OcrWorker::placeholder(fast_timings());
    let stop = StopSignal::new();
    worker.run_pass(dir.path(), &stop).await.unwrap();

    let result = result_path_for(&crop);
    let before = std::fs::metadata(&result).unwrap().modified().unwrap();
    let names = dir_names(dir.path());

    assert_eq!(
        worker.run_pass(dir.path(), &stop).await.unwrap(),
        PassOutcome::Idle
    );
    assert_eq!(dir_names(dir.path()), names);
    assert_eq!(std::fs::metadata(&result).unwrap().modified().unwrap(), before);
    assert_eq!(worker.report().written, 1);
}

#[tokio::test]
async fn test_existing_results_and_other_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let done = touch_crop(dir.path(), 0, 1);
    std::fs::write(result_path_for(&done), "already here\n").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("slide_002_crop_1.png.partial"), "half").unwrap();
    std::fs::create_dir(dir.path().join("folder.png")).unwrap();

    let mut worker = OcrWorker::placeholder(fast_timings());
    let outcome = worker.run_pass(dir.path(), &StopSignal::new()).await.unwrap();

    assert_eq!(outcome, PassOutcome::Idle);
    assert_eq!(
        std::fs::read_to_string(result_path_for(&done)).unwrap(),
        "already here\n"
    );
}

#[tokio::test]
async fn test_recreated_crop_gets_fresh_result() {
    let dir = tempfile::tempdir().unwrap();
    let stale = dir.path().join("slide_001_crop_1.tex");
    std::fs::write(&stale, "OLD LABEL\n").unwrap();

    let page = image::RgbaImage::new(200, 200);
    let region = Region::new(Point::new(10, 10), Point::new(60, 60));
    let written = export_crops(&page, &[region], 0, dir.path()).unwrap();
    assert_eq!(written, vec![dir.path().join("slide_001_crop_2.png")]);

    let mut worker = OcrWorker::placeholder(fast_timings());
    let outcome = worker.run_pass(dir.path(), &StopSignal::new()).await.unwrap();
    assert_eq!(
        outcome,
        PassOutcome::Processed {
            written: 1,
            failed: 0
        }
    );
    assert_eq!(
        std::fs::read_to_string(result_path_for(&written[0])).unwrap(),
        format!("{}\n", LATEX_SNIPPETS[0])
    );
    assert_eq!(std::fs::read_to_string(&stale).unwrap(), "OLD LABEL\n");
}

#[tokio::test]
async fn test_missing_directory_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("latex_regions");

    let mut worker = OcrWorker::placeholder(fast_timings());
    let outcome = worker.run_pass(&missing, &StopSignal::new()).await.unwrap();
    assert_eq!(outcome, PassOutcome::DirectoryMissing);
    assert!(!missing.exists());
}

#[tokio::test]
async fn test_preset_stop_signal_does_no_work() {
    let dir = tempfile::tempdir().unwrap();
    let crop = touch_crop(dir.path(), 0, 1);

    let stop = StopSignal::new();
    stop.set();

    let mut worker = OcrWorker::placeholder(fast_timings());
    assert_eq!(
        worker.run_pass(dir.path(), &stop).await.unwrap(),
        PassOutcome::Stopped
    );

    let report = OcrWorker::placeholder(fast_timings())
        .run(dir.path(), &stop)
        .await;
    assert_eq!(report.written, 0);
    assert!(!result_path_for(&crop).exists());
}

#[tokio::test]
async fn test_write_failure_does_not_stop_other_items() {
    let dir = tempfile::tempdir().unwrap();
    let blocked = touch_crop(dir.path(), 0, 1);
    let fine = touch_crop(dir.path(), 0, 2);

    // a directory where the temporary result file should go makes the write fail
    std::fs::create_dir(dir.path().join("slide_001_crop_1.tex.partial")).unwrap();

    let mut worker = OcrWorker::placeholder(fast_timings());
    let outcome = worker.run_pass(dir.path(), &StopSignal::new()).await.unwrap();

    assert_eq!(
        outcome,
        PassOutcome::Processed {
            written: 1,
            failed: 1
        }
    );
    assert!(!result_path_for(&blocked).exists());
    assert!(result_path_for(&fine).exists());
    assert_eq!(worker.report().failed, 1);
}

#[tokio::test]
async fn test_custom_recognizer() {
    struct StemRecognizer;

    impl Recognizer for StemRecognizer {
        fn recognize(&mut self, crop: &Path) -> String {
            crop.file_stem().unwrap().to_string_lossy().to_uppercase()
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let crop = touch_crop(dir.path(), 6, 2);

    let mut worker = OcrWorker::new(StemRecognizer, fast_timings());
    worker.run_pass(dir.path(), &StopSignal::new()).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(result_path_for(&crop)).unwrap(),
        "SLIDE_007_CROP_2\n"
    );
}

#[tokio::test]
async fn test_worker_waits_for_directory_then_processes() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("out");
    let stop = StopSignal::new();

    let task = tokio::spawn({
        let dir = dir.clone();
        let stop = stop.clone();
        async move { OcrWorker::placeholder(fast_timings()).run(&dir, &stop).await }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    std::fs::create_dir(&dir).unwrap();
    let crop = touch_crop(&dir, 0, 1);
    let result = result_path_for(&crop);

    assert!(wait_until(Duration::from_secs(5), || result.exists()).await);

    // crops that show up later are picked up by a later pass
    let late = touch_crop(&dir, 1, 1);
    let late_result = result_path_for(&late);
    assert!(wait_until(Duration::from_secs(5), || late_result.exists()).await);

    stop.set();
    let report = task.await.unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(
        std::fs::read_to_string(&late_result).unwrap(),
        format!("{}\n", LATEX_SNIPPETS[1])
    );
}

#[tokio::test]
async fn test_stop_mid_item_leaves_no_result() {
    let dir = tempfile::tempdir().unwrap();
    let crop = touch_crop(dir.path(), 0, 1);
    let stop = StopSignal::new();

    let slow = WorkerTimings {
        step_ms: 50,
        steps: 200,
        ..fast_timings()
    };
    let task = tokio::spawn({
        let dir = dir.path().to_path_buf();
        let stop = stop.clone();
        async move { OcrWorker::placeholder(slow).run(&dir, &stop).await }
    });

    tokio::time::sleep(Duration::from_millis(120)).await;
    let stopped_at = Instant::now();
    stop.set();
    let report = task.await.unwrap();

    // shutdown takes at most about one increment, not the full 10 s task
    assert!(stopped_at.elapsed() < Duration::from_secs(2));
    assert_eq!(report.written, 0);
    assert!(!result_path_for(&crop).exists());
    assert_eq!(dir_names(dir.path()), vec!["slide_001_crop_1.png".to_string()]);
}

#[test]
fn test_worker_handle_shutdown_from_plain_thread() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let crop = touch_crop(dir.path(), 0, 1);

    let handle = WorkerHandle::spawn(
        runtime.handle(),
        dir.path().to_path_buf(),
        OcrWorker::placeholder(fast_timings()),
        StopSignal::new(),
    );

    let result = result_path_for(&crop);
    let start = Instant::now();
    while !result.exists() && start.elapsed() < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(5));
    }

    let report = handle.shutdown().unwrap();
    assert_eq!(report.written, 1);
    assert!(report.passes >= 1);
}
