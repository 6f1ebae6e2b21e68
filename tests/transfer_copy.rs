use filetime::{FileTime, set_file_mtime};
use media_migrate::{Config, SpaceProbe, TransferGroup, TransferMode, run_transfer};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Every destination reports the same, effectively unlimited, free space.
struct Plenty;

impl SpaceProbe for Plenty {
    fn free_bytes(&self, _path: &Path) -> io::Result<u64> {
        Ok(u64::MAX / 2)
    }
}

fn write(path: &Path, contents: &[u8]) -> io::Result<()> {
    fs::create_dir_all(path.parent().unwrap())?;
    fs::write(path, contents)
}

fn layout() -> io::Result<(tempfile::TempDir, PathBuf, PathBuf)> {
    let td = tempdir()?;
    let base = fs::canonicalize(td.path())?;
    let src = base.join("incoming");
    let dst = base.join("archive");
    fs::create_dir_all(&src)?;
    fs::create_dir_all(&dst)?;
    Ok((td, src, dst))
}

fn config(src: &Path, dst: &Path) -> Config {
    let mut cfg = Config::new([src], [dst]);
    cfg.headroom_bytes = 0;
    cfg
}

#[test]
fn copy_places_files_under_relative_path() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, src, dst) = layout()?;
    write(&src.join("tv/Show/S01/E01.mkv"), b"episode one")?;
    write(&src.join("notes.txt"), b"hi")?;

    let summary = run_transfer(&config(&src, &dst), TransferMode::Copy, &Plenty)?;
    assert_eq!(summary.copied, 2);
    assert_eq!(summary.failed, 0);

    assert_eq!(fs::read(dst.join("tv/Show/S01/E01.mkv"))?, b"episode one");
    assert_eq!(fs::read(dst.join("notes.txt"))?, b"hi");
    // Copy mode keeps the sources.
    assert!(src.join("tv/Show/S01/E01.mkv").exists());
    Ok(())
}

#[test]
fn second_copy_run_skips_everything() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, src, dst) = layout()?;
    for i in 0..5 {
        write(&src.join(format!("set/file_{i}.bin")), format!("payload {i}").as_bytes())?;
    }
    let cfg = config(&src, &dst);

    let first = run_transfer(&cfg, TransferMode::Copy, &Plenty)?;
    assert_eq!(first.copied, 5);

    let second = run_transfer(&cfg, TransferMode::Copy, &Plenty)?;
    assert_eq!(second.copied, 0);
    assert_eq!(second.skipped_duplicate, 5);
    assert_eq!(second.total(), 5);
    Ok(())
}

#[test]
fn excluded_files_never_reach_destination() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, src, dst) = layout()?;
    write(&src.join("movie/Thumbs.db"), b"junk")?;
    write(&src.join("movie/partial.tmp"), b"junk")?;
    write(&src.join("#recycle/old/movie.mkv"), b"junk")?;
    write(&src.join("movie/movie.mkv"), b"keep me")?;

    let summary = run_transfer(&config(&src, &dst), TransferMode::Copy, &Plenty)?;
    assert_eq!(summary.copied, 1);
    assert_eq!(summary.skipped_excluded, 2);

    assert!(dst.join("movie/movie.mkv").exists());
    assert!(!dst.join("movie/Thumbs.db").exists());
    assert!(!dst.join("movie/partial.tmp").exists());
    assert!(!dst.join("#recycle").exists());
    Ok(())
}

#[test]
fn same_file_in_two_groups_is_copied_once() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, src_a, dst) = layout()?;
    let src_b = src_a.parent().unwrap().join("incoming_b");
    write(&src_a.join("album/track.flac"), b"same bytes")?;
    write(&src_b.join("album/track.flac"), b"same bytes")?;

    let mut cfg = config(&src_a, &dst);
    cfg.groups.push(TransferGroup::new([&src_b], [&dst]));

    let summary = run_transfer(&cfg, TransferMode::Copy, &Plenty)?;
    assert_eq!(summary.copied, 1);
    assert_eq!(summary.skipped_duplicate, 1);
    Ok(())
}

#[test]
fn differently_cased_twin_is_not_copied() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, src, dst) = layout()?;
    write(&src.join("Movies/Film.mkv"), b"0123456789")?;
    write(&dst.join("movies/film.mkv"), b"abcdefghij")?;

    let summary = run_transfer(&config(&src, &dst), TransferMode::Copy, &Plenty)?;
    assert_eq!(summary.skipped_duplicate, 1);
    assert_eq!(summary.copied, 0);
    assert_eq!(fs::read(dst.join("movies/film.mkv"))?, b"abcdefghij");
    Ok(())
}

#[test]
fn copy_preserves_modification_time() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, src, dst) = layout()?;
    let file = src.join("old/photo.jpg");
    write(&file, b"pixels")?;
    let when = FileTime::from_unix_time(1_500_000_000, 0);
    set_file_mtime(&file, when)?;

    run_transfer(&config(&src, &dst), TransferMode::Copy, &Plenty)?;

    let meta = fs::metadata(dst.join("old/photo.jpg"))?;
    assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), 1_500_000_000);
    Ok(())
}

#[test]
fn no_internal_files_left_on_destination() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, src, dst) = layout()?;
    for i in 0..3 {
        write(&src.join(format!("d{i}/f.bin")), &vec![i as u8; 4096])?;
    }
    run_transfer(&config(&src, &dst), TransferMode::Copy, &Plenty)?;

    let leftovers: Vec<_> = walkdir::WalkDir::new(&dst)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".media_migrate."))
        .collect();
    assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");
    // The run lock on the source root is released and removed.
    assert!(!src.join(".media_migrate.lock").exists());
    Ok(())
}

#[test]
fn parallel_workers_transfer_every_file() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, src, dst) = layout()?;
    for i in 0..40 {
        write(&src.join(format!("batch/{:02}/item_{i:03}.dat", i % 7)), format!("item {i}").as_bytes())?;
    }
    let mut cfg = config(&src, &dst);
    cfg.workers = 3;

    let summary = run_transfer(&cfg, TransferMode::Copy, &Plenty)?;
    assert_eq!(summary.copied, 40);
    assert_eq!(summary.failed, 0);
    for i in 0..40 {
        let p = dst.join(format!("batch/{:02}/item_{i:03}.dat", i % 7));
        assert_eq!(fs::read_to_string(p)?, format!("item {i}"));
    }
    Ok(())
}

#[test]
fn overlapping_source_and_destination_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let (_td, src, _dst) = layout()?;
    write(&src.join("a.txt"), b"a")?;
    let cfg = config(&src, &src);
    let err = run_transfer(&cfg, TransferMode::Copy, &Plenty).unwrap_err();
    assert_eq!(media_migrate::exit_code_for(&err), 2);
    Ok(())
}
