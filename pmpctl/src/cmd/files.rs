// SPDX-License-Identifier: MIT

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use colored::Colorize;
use tempfile::NamedTempFile;

use pmpfs::{FileInfo, Id3Tags};

use crate::cmd::confirm;
use crate::device::{self, Session};
use crate::utils::progress::ProgressObserver;
use crate::utils::string::*;
use crate::utils::{LogLevel, log_level};
use crate::{log_fail, log_info, log_ok};

pub fn list(s: &mut Session, tags: bool) -> anyhow::Result<()> {
    let files = s.list_files()?;
    if files.is_empty() {
        log_info!("No files on {} storage", s.current_storage());
        return Ok(());
    }

    let verbose = log_level() == LogLevel::Verbose;
    if verbose {
        println!(
            "{}",
            format!(
                "{:>3}  {:<40} {:>11} {:>6} {:>6}  {:<19}",
                "#", "Name", "Size", "Start", "Blocks", "Uploaded"
            )
            .bold()
        );
    }

    let mut total = 0u64;
    for f in &files {
        total += f.size as u64;
        if verbose {
            println!(
                "{:>3}  {:<40} {:>11} {:>6} {:>6}  {:<19}",
                f.index + 1,
                truncate(&f.name, 40),
                sep_u64(f.size as u64),
                f.block_position,
                f.block_count,
                format_time(f.uploaded_time())
            );
        } else {
            println!("{:>3}  {:<40} {:>10}", f.index + 1, truncate(&f.name, 40), pretty_bytes(f.size as u64));
        }
        if tags {
            print_tags(&read_tags(s, f));
        }
    }
    log_info!("{} file(s), {}", files.len(), pretty_bytes(total));
    Ok(())
}

fn read_tags(s: &mut Session, f: &FileInfo) -> Id3Tags {
    s.read_file_tags(f).unwrap_or_else(|e| {
        log::warn!("tags of {}: {e}", f.name);
        Id3Tags::default()
    })
}

fn print_tags(t: &Id3Tags) {
    println!(
        "     {} {}  {} {}  {} {}  {} {}  {} {}",
        "title".dimmed(),
        or_dash(&t.title),
        "artist".dimmed(),
        or_dash(&t.artist),
        "album".dimmed(),
        or_dash(&t.album),
        "year".dimmed(),
        or_dash(&t.year),
        "bitrate".dimmed(),
        format_bitrate(t.bitrate)
    );
}

/// Local files named by glob `patterns`, or every `.mp3` in the working directory.
pub fn upload_sources(patterns: &[String], directory: bool) -> anyhow::Result<Vec<PathBuf>> {
    if directory {
        return mp3_files_in(Path::new("."));
    }
    let mut paths = Vec::new();
    for pattern in patterns {
        let before = paths.len();
        for entry in glob::glob(pattern).with_context(|| format!("Invalid pattern {pattern}"))? {
            match entry {
                Ok(p) if p.is_file() => paths.push(p),
                Ok(_) => {}
                Err(e) => log_fail!("{e}"),
            }
        }
        if paths.len() == before {
            log_fail!("No file matches {pattern}");
        }
    }
    Ok(paths)
}

/// `.mp3` files (any case) directly inside `dir`, sorted by name.
pub fn mp3_files_in(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| x.eq_ignore_ascii_case("mp3"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn device_name(path: &Path) -> anyhow::Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))
}

pub fn upload(s: &mut Session, paths: &[PathBuf]) -> anyhow::Result<()> {
    if paths.is_empty() {
        bail!("Nothing to upload");
    }

    let mut failed = 0usize;
    for path in paths {
        if let Err(e) = upload_one(s, path) {
            log_fail!("{}: {e:#}", path.display());
            failed += 1;
        }
    }
    device::report_stats(s);
    if failed > 0 {
        bail!("{failed} of {} upload(s) failed", paths.len());
    }
    Ok(())
}

fn upload_one(s: &mut Session, path: &Path) -> anyhow::Result<()> {
    let name = device_name(path)?;
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut progress = ProgressObserver::bytes(data.len() as u64, name);
    let info = s.upload_file(name, &data, &mut progress);
    progress.finish();
    let info = info?;

    log_ok!(
        "Uploaded {} as #{} ({}, {} block(s))",
        name,
        info.index + 1,
        pretty_bytes(info.size as u64),
        info.block_count
    );
    Ok(())
}

/// Target for a download; defaults to the entry name in the working directory.
pub fn output_path(name: &str, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| PathBuf::from(name))
}

pub fn download(s: &mut Session, name: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let target = output_path(name, output);
    if target.exists() {
        bail!("{} already exists, refusing to overwrite", target.display());
    }

    let size = s
        .list_files()?
        .into_iter()
        .find(|f| f.name == name)
        .map(|f| f.size as u64)
        .ok_or_else(|| anyhow!("No file named {name} on {} storage", s.current_storage()))?;

    let mut progress = ProgressObserver::bytes(size, name);
    let data = s.download_file(name, &mut progress);
    progress.finish();
    let data = data?;

    write_new(&target, &data)?;
    log_ok!("Downloaded {name} to {} ({})", target.display(), pretty_bytes(data.len() as u64));
    device::report_stats(s);
    Ok(())
}

/// Writes via a temporary sibling so a failure never leaves a partial file.
fn write_new(target: &Path, data: &[u8]) -> anyhow::Result<()> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist_noclobber(target)
        .map_err(|e| anyhow!("Failed to create {}: {}", target.display(), e.error))?;
    Ok(())
}

pub fn delete(s: &mut Session, names: &[String], all: bool, force: bool) -> anyhow::Result<()> {
    if all {
        let count = s.list_files()?.len();
        let prompt = format!("Delete all {count} file(s) on {} storage?", s.current_storage());
        if !confirm(&prompt, force)? {
            log_info!("Delete cancelled");
            return Ok(());
        }
        let removed = s.delete_all_files()?;
        log_ok!("Deleted {removed} file(s)");
        return Ok(());
    }

    if names.is_empty() {
        bail!("Name at least one file, or pass --all");
    }
    let mut failed = 0usize;
    for name in names {
        match s.delete_file(name) {
            Ok(()) => log_ok!("Deleted {name}"),
            Err(e) => {
                log_fail!("{name}: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} delete(s) failed", names.len());
    }
    Ok(())
}

/// `from` and `to` are 1-based, as printed by `list`.
pub fn move_entry(s: &mut Session, from: usize, to: usize) -> anyhow::Result<()> {
    let (Some(src), Some(dst)) = (from.checked_sub(1), to.checked_sub(1)) else {
        bail!("Positions start at 1");
    };
    s.move_file(src, dst)?;
    log_ok!("Moved #{from} to #{to}");
    Ok(())
}

pub fn rename(s: &mut Session, old: &str, new: &str) -> anyhow::Result<()> {
    s.rename_file(old, new)?;
    log_ok!("Renamed {old} to {new}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mp3_files_in_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.MP3", "notes.txt", "c.mp3.bak"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("d.mp3")).unwrap();

        let found: Vec<String> = mp3_files_in(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(found, ["a.MP3", "b.mp3"]);
    }

    #[test]
    fn test_glob_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.mp3"), b"1").unwrap();
        fs::write(dir.path().join("two.mp3"), b"2").unwrap();
        let pattern = format!("{}/*.mp3", dir.path().display());

        let paths = upload_sources(&[pattern], false).unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_write_new_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("song.mp3");
        write_new(&target, b"first").unwrap();
        assert!(write_new(&target, b"second").is_err());
        assert_eq!(fs::read(&target).unwrap(), b"first");
    }

    #[test]
    fn test_output_path_defaults_to_name() {
        assert_eq!(output_path("a.mp3", None), PathBuf::from("a.mp3"));
        assert_eq!(
            output_path("a.mp3", Some(PathBuf::from("/tmp/x.mp3"))),
            PathBuf::from("/tmp/x.mp3")
        );
    }
}
