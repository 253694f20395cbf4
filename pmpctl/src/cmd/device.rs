// SPDX-License-Identifier: MIT

use anyhow::{Context, bail};
use colored::Colorize;

use pmpfs::pmp300::*;
use pmpfs::{DeviceInfo, DeviceSession, timestamp_to_datetime};
use pmpio::prelude::*;

use crate::cmd::confirm;
use crate::config::Settings;
use crate::device::{self, Session};
use crate::utils::progress::ProgressObserver;
use crate::utils::string::*;
use crate::utils::{LogLevel, log_level};
use crate::{log_fail, log_info, log_normal, log_ok, log_verbose};

/// Walks the bridge and the player step by step, stopping at the first failure.
pub fn test(settings: &Settings) -> anyhow::Result<()> {
    let bridge = device::open_bridge(settings)?;
    log_ok!("Bridge answered ping");

    let mut s = DeviceSession::new(bridge, settings.session.clone());
    let version = s.check_bridge().context("Bridge self check failed")?;
    log_ok!("Bridge firmware {version}, data pins and delays respond");

    s.bridge_mut()
        .write_control(CTRL_IDLE)
        .context("Control register write failed")?;
    let status = s.bridge_mut().read_status().context("Status register read failed")?;
    log_ok!(
        "Control set idle, status 0x{status:02X} ({})",
        if status & STATUS_MASK == STATUS_READY {
            "ready"
        } else {
            "busy"
        }
    );

    s.initialize().context("Player did not take the init sequence")?;
    log_ok!("Player initialized, {} storage selected", s.current_storage());

    let info = s.get_device_info().context("Directory read failed")?;
    log_ok!(
        "Directory valid: {} file(s), {} free",
        info.entry_count,
        pretty_bytes(info.free_bytes())
    );

    device::report_stats(&s);
    Ok(())
}

pub fn info(s: &mut Session) -> anyhow::Result<()> {
    let info = s.get_device_info()?;
    print_info(&info);
    Ok(())
}

fn print_info(info: &DeviceInfo) {
    log_normal!("{} storage", info.medium.to_string().bold());
    println!("  Files        : {}", info.entry_count);
    println!(
        "  Capacity     : {} ({} blocks)",
        pretty_bytes(info.capacity_bytes()),
        sep_u64(info.blocks_available as u64)
    );
    println!(
        "  Used         : {} ({} blocks)",
        pretty_bytes(info.used_bytes()),
        sep_u64(info.blocks_used as u64)
    );
    println!(
        "  Free         : {} ({} blocks)",
        pretty_bytes(info.free_bytes()),
        sep_u64(info.blocks_remaining as u64)
    );
    println!("  Bad blocks   : {}", info.blocks_bad);
    println!("  Version      : 0x{:04X}", info.version);
    println!("  Last update  : {}", format_time(info.last_update_time()));
}

pub fn format(s: &mut Session, check_bad_blocks: bool, force: bool) -> anyhow::Result<()> {
    let medium = s.current_storage();
    let prompt = format!("Erase every file on {medium} storage?");
    if !confirm(&prompt, force)? {
        log_info!("Format cancelled");
        return Ok(());
    }
    if check_bad_blocks {
        log_info!("Surface scan rewrites every block; this takes a while");
    }

    // Length is set by the first scan callback.
    let mut observer = ProgressObserver::blocks(0, "scanning");
    let report = s.format_device(check_bad_blocks, &mut observer)?;
    observer.finish();

    log_ok!(
        "Formatted {} storage: {} blocks ({})",
        report.medium,
        sep_u64(report.capacity as u64),
        pretty_bytes(report.capacity as u64 * BLOCK_SIZE as u64)
    );
    if !report.bad_blocks.is_empty() {
        log_normal!(
            "{} bad block(s): {}",
            report.bad_blocks.len(),
            report
                .bad_blocks
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    } else if report.scanned {
        log_verbose!("No bad blocks found");
    }
    device::report_stats(s);
    Ok(())
}

/// Prints capacity and usage for both media, keeping the current selection.
pub fn storage_list(s: &mut Session) -> anyhow::Result<()> {
    let previous = s.current_storage();
    for medium in StorageMedium::ALL {
        if medium == StorageMedium::External {
            let probe = s.detect_external_storage()?;
            if !probe.present {
                log_normal!("{} storage: {}", medium.to_string().bold(), "not present".dimmed());
                continue;
            }
            if let Some(e) = probe.error {
                log_normal!(
                    "{} storage: {} ({e})",
                    medium.to_string().bold(),
                    "unreadable".red()
                );
                continue;
            }
        }

        s.switch_storage(medium)?;
        match s.get_device_info() {
            Ok(info) => log_normal!(
                "{} storage: {} file(s), {} used of {}, {} free",
                medium.to_string().bold(),
                info.entry_count,
                pretty_bytes(info.used_bytes()),
                pretty_bytes(info.capacity_bytes()),
                pretty_bytes(info.free_bytes())
            ),
            Err(e) => log_normal!(
                "{} storage: {} ({e})",
                medium.to_string().bold(),
                "unreadable".red()
            ),
        }
    }
    s.switch_storage(previous)?;
    Ok(())
}

/// Best-effort header dump of both media, corrupt or not.
pub fn dump_headers(s: &mut Session) -> anyhow::Result<()> {
    let previous = s.current_storage();
    for medium in StorageMedium::ALL {
        if medium == StorageMedium::External && !s.detect_external_storage()?.present {
            log_normal!("{} storage: not present", medium.to_string().bold());
            continue;
        }
        s.switch_storage(medium)?;
        let read = match s.read_directory() {
            Ok(read) => read,
            Err(e) => {
                log_fail!("{medium} storage: {e}");
                continue;
            }
        };
        print_header(medium, &read);
    }
    s.switch_storage(previous)?;
    Ok(())
}

fn print_header(medium: StorageMedium, read: &DirectoryRead) {
    let h = &read.directory.header;
    let status = match &read.error {
        None => "valid".green(),
        Some(e) => e.to_string().red(),
    };
    log_normal!("{} directory: {status}", medium.to_string().bold());
    println!("  entry_count      : {}", h.entry_count());
    println!("  blocks_available : {}", h.capacity());
    println!("  blocks_used      : {}", h.blocks_used.get());
    println!("  blocks_remaining : {}", h.blocks_remaining.get());
    println!("  blocks_bad       : {}", h.blocks_bad.get());
    println!(
        "  time_last_update : {} ({})",
        h.time_last_update.get(),
        format_time(timestamp_to_datetime(h.time_last_update.get()))
    );
    println!("  checksum1        : 0x{:04X}", h.checksum1.get());
    println!("  checksum2        : 0x{:04X}", h.checksum2.get());
    println!("  version          : 0x{:04X}", h.version());
    println!(
        "  counters         : {}",
        if h.counters_balanced() {
            "balanced"
        } else {
            "unbalanced"
        }
    );

    let raw = encode(&read.directory);
    println!("  header[0..32]    : {}", hex_bytes(&raw[..32]));
    for (i, e) in read.directory.entries.iter().enumerate() {
        log_verbose!(
            "  #{:<2} {:<32} {:>9} B  start {:>5}  blocks {:>4}",
            i + 1,
            truncate(&e.name(), 32),
            sep_u64(e.size() as u64),
            e.block_position(),
            e.block_count()
        );
    }
}

pub fn check(s: &mut Session) -> anyhow::Result<()> {
    let report = s.check_directory()?;
    let min_level = if log_level() == LogLevel::Verbose {
        Severity::Info
    } else {
        Severity::Warn
    };
    print!(
        "{}",
        report.display_with(ReportDisplayOpts {
            min_level,
            prefix: "[pmpctl] ",
            show_summary: true,
            ..ReportDisplayOpts::default()
        })
    );
    if let Some(first) = report.first_error() {
        bail!("{} directory is inconsistent: {}", s.current_storage(), first.msg);
    }
    log_ok!("{} directory is consistent", s.current_storage());
    Ok(())
}
