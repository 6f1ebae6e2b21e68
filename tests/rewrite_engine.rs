use media_migrate::rewrite::{VerifyStage, marker_path, temp_path};
use media_migrate::{
    Config, FileHasher, RewriteEngine, RewriteError, RewriteState, Sha256Hasher, run_rewrite,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

fn write(path: &Path, contents: &[u8]) -> io::Result<()> {
    fs::create_dir_all(path.parent().unwrap())?;
    fs::write(path, contents)
}

fn pool() -> io::Result<(tempfile::TempDir, PathBuf)> {
    let td = tempdir()?;
    let root = fs::canonicalize(td.path())?.join("pool");
    fs::create_dir_all(&root)?;
    Ok((td, root))
}

/// Hashes the `.rewrite` temp differently from everything else.
struct FlakyTempHash;

impl FileHasher for FlakyTempHash {
    fn hash(&self, path: &Path) -> io::Result<String> {
        if path.to_string_lossy().ends_with(".rewrite") {
            Ok("not-the-same".into())
        } else {
            Sha256Hasher.hash(path)
        }
    }
}

/// Returns a wrong digest for the third file hashed: the rewritten file, when a
/// single file goes through the engine (original, temp copy, then the result).
#[derive(Default)]
struct BadFinalHash {
    calls: AtomicUsize,
}

impl FileHasher for BadFinalHash {
    fn hash(&self, path: &Path) -> io::Result<String> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 2 {
            Ok("bad".into())
        } else {
            Sha256Hasher.hash(path)
        }
    }
}

#[test]
fn rewrite_keeps_content_and_hash() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, root) = pool()?;
    let file = root.join("photos/2019/img_001.raw");
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    write(&file, &payload)?;
    let before = Sha256Hasher.hash(&file)?;

    let state = RewriteEngine::new(&Sha256Hasher).rewrite(&file)?;
    assert_eq!(state, RewriteState::Done);
    assert_eq!(Sha256Hasher.hash(&file)?, before);
    assert_eq!(fs::read(&file)?, payload);
    assert!(marker_path(&file).exists());
    assert!(!temp_path(&file).exists());
    Ok(())
}

#[test]
fn engine_is_idempotent_while_marker_exists() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, root) = pool()?;
    let file = root.join("a.bin");
    write(&file, b"abc")?;
    let engine = RewriteEngine::new(&Sha256Hasher);

    assert_eq!(engine.rewrite(&file)?, RewriteState::Done);
    let marker_mtime = fs::metadata(marker_path(&file))?.modified()?;
    // Second pass sees the marker and does no work.
    assert_eq!(engine.rewrite(&file)?, RewriteState::Done);
    assert_eq!(fs::metadata(marker_path(&file))?.modified()?, marker_mtime);
    assert!(!temp_path(&file).exists());
    Ok(())
}

#[test]
fn copy_mismatch_leaves_original_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, root) = pool()?;
    let file = root.join("doc.pdf");
    write(&file, b"original bytes")?;

    let err = RewriteEngine::new(&FlakyTempHash).rewrite(&file).unwrap_err();
    assert!(matches!(err, RewriteError::Integrity { .. }));
    assert!(!err.needs_inspection());
    assert_eq!(fs::read(&file)?, b"original bytes");
    assert!(!temp_path(&file).exists());
    assert!(!marker_path(&file).exists());
    Ok(())
}

#[test]
fn mismatch_after_rename_needs_inspection_and_leaves_no_marker()
-> Result<(), Box<dyn std::error::Error>> {
    let (_td, root) = pool()?;
    let file = root.join("archive/tape_07.tar");
    write(&file, b"irreplaceable")?;

    let hasher = BadFinalHash::default();
    let err = RewriteEngine::new(&hasher).rewrite(&file).unwrap_err();
    assert!(
        matches!(err, RewriteError::Integrity { stage: VerifyStage::AfterRename, .. }),
        "{err:?}"
    );
    assert_eq!(err.last_state(), RewriteState::Renamed);
    assert!(err.needs_inspection());
    assert_eq!(hasher.calls.load(Ordering::SeqCst), 3);

    assert!(!marker_path(&file).exists());
    assert!(!temp_path(&file).exists());
    // The bytes themselves made it through; only the check failed.
    assert_eq!(fs::read(&file)?, b"irreplaceable");
    Ok(())
}

#[test]
fn run_rewrite_lists_files_needing_inspection() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, root) = pool()?;
    let file = root.join("only.bin");
    write(&file, b"one file, so the third hash is its final check")?;

    let mut cfg = Config::default();
    cfg.disable_locks = true;
    let summary = run_rewrite(&root, &cfg, &BadFinalHash::default())?;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.rewritten, 0);
    assert_eq!(summary.needs_inspection, vec![file.clone()]);
    assert!(!marker_path(&file).exists());
    Ok(())
}

#[test]
fn run_rewrite_sweeps_markers_after_full_pass() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, root) = pool()?;
    write(&root.join("one.txt"), b"1")?;
    write(&root.join("sub/two.txt"), b"22")?;
    write(&root.join("sub/deeper/three.txt"), b"333")?;
    // Left over by an interrupted earlier run.
    write(&temp_path(&root.join("sub/two.txt")), b"2")?;

    let mut cfg = Config::default();
    cfg.disable_locks = true;
    let summary = run_rewrite(&root, &cfg, &Sha256Hasher)?;
    assert_eq!(summary.rewritten, 3);
    assert_eq!(summary.failed, 0);
    let cleanup = summary.cleanup.expect("cleanup report after a real run");
    assert_eq!(cleanup.removed, 3);
    assert!(cleanup.is_clean());

    assert_eq!(fs::read(root.join("sub/two.txt"))?, b"22");
    let names: Vec<_> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().all(|n| !n.contains(".rewrite")), "artifacts left: {names:?}");
    Ok(())
}

#[test]
fn resumed_run_counts_marked_files_as_done() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, root) = pool()?;
    let a = root.join("a.txt");
    let b = root.join("b.txt");
    write(&a, b"a")?;
    write(&b, b"b")?;
    // `a` finished in an earlier, interrupted run.
    RewriteEngine::new(&Sha256Hasher).rewrite(&a)?;

    let mut cfg = Config::default();
    cfg.disable_locks = true;
    let summary = run_rewrite(&root, &cfg, &Sha256Hasher)?;
    assert_eq!(summary.already_done, 1);
    assert_eq!(summary.rewritten, 1);
    Ok(())
}

#[test]
fn dry_run_changes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, root) = pool()?;
    let file = root.join("video.mkv");
    write(&file, b"frames")?;
    let before = fs::metadata(&file)?.modified()?;

    let mut cfg = Config::default();
    cfg.disable_locks = true;
    cfg.dry_run = true;
    let summary = run_rewrite(&root, &cfg, &Sha256Hasher)?;
    assert_eq!(summary.would_rewrite, 1);
    assert_eq!(summary.rewritten, 0);
    assert!(summary.cleanup.is_none());

    assert_eq!(fs::metadata(&file)?.modified()?, before);
    assert!(!marker_path(&file).exists());
    assert!(!temp_path(&file).exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlinks_are_not_rewritten() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, root) = pool()?;
    let target = root.join("real.txt");
    write(&target, b"real")?;
    let link = root.join("link.txt");
    std::os::unix::fs::symlink(&target, &link)?;

    let mut cfg = Config::default();
    cfg.disable_locks = true;
    let summary = run_rewrite(&root, &cfg, &Sha256Hasher)?;
    assert_eq!(summary.rewritten, 1);
    assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
    Ok(())
}

#[test]
fn missing_root_is_a_precondition_failure() {
    let td = tempdir().unwrap();
    let err = run_rewrite(&td.path().join("nope"), &Config::default(), &Sha256Hasher).unwrap_err();
    assert_eq!(media_migrate::exit_code_for(&err), 2);
}
