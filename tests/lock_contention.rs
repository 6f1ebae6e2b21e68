use media_migrate::fs_ops::try_acquire_dir_lock;
use media_migrate::{Config, FsSpaceProbe, TransferMode, exit_code_for, run_transfer};
use std::fs;
use tempfile::tempdir;

#[test]
fn second_run_on_locked_source_is_refused() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let src = base.join("src");
    let dst = base.join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    fs::write(src.join("a.bin"), b"a").unwrap();

    let mut cfg = Config::new([&src], [&dst]);
    cfg.headroom_bytes = 0;

    let held = try_acquire_dir_lock(&src).unwrap().expect("first lock");
    let err = run_transfer(&cfg, TransferMode::Copy, &FsSpaceProbe).unwrap_err();
    assert_eq!(exit_code_for(&err), 2);
    assert!(format!("{err:#}").contains("another run"), "{err:#}");
    assert!(!dst.join("a.bin").exists());
    drop(held);

    let summary = run_transfer(&cfg, TransferMode::Copy, &FsSpaceProbe).expect("lock released");
    assert_eq!(summary.copied, 1);
}

#[test]
fn disabled_locks_skip_the_sidecar() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let src = base.join("src");
    let dst = base.join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();
    fs::write(src.join("a.bin"), b"a").unwrap();

    let mut cfg = Config::new([&src], [&dst]);
    cfg.headroom_bytes = 0;
    cfg.disable_locks = true;

    let _held = try_acquire_dir_lock(&src).unwrap().expect("foreign lock");
    let summary = run_transfer(&cfg, TransferMode::Copy, &FsSpaceProbe).expect("locks disabled");
    assert_eq!(summary.copied, 1);
}
