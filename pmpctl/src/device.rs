// SPDX-License-Identifier: MIT

use anyhow::{Context, anyhow};
use serialport::SerialPort;

use pmpfs::DeviceSession;
use pmpio::prelude::*;

use crate::config::{DEVICE_ENV, Settings};
use crate::{log_info, log_verbose};

pub type Bridge = BridgeCounter<SerialBridge<Box<dyn SerialPort>>>;
pub type Session = DeviceSession<Bridge>;

/// Opens the serial port and waits for the bridge to come up.
pub fn open_bridge(settings: &Settings) -> anyhow::Result<Bridge> {
    let device = settings
        .device
        .as_deref()
        .ok_or_else(|| anyhow!("device not specified. Use --device or set {DEVICE_ENV}"))?;

    log_verbose!("Opening {device} at {} baud", settings.baud);
    let port = serialport::new(device, settings.baud)
        .timeout(settings.serial_timeout)
        .open()
        .with_context(|| format!("Failed to open serial port {device}"))?;

    let bridge = SerialBridge::connect(port, settings.settle)
        .with_context(|| format!("Bridge on {device} did not answer"))?;
    Ok(BridgeCounter::new(bridge))
}

/// Bridge plus an initialized session; the bridge is left usable on failure.
pub fn open_session(settings: &Settings) -> anyhow::Result<Session> {
    let bridge = open_bridge(settings)?;
    let mut session = DeviceSession::connect(bridge, settings.session.clone())
        .context("Failed to initialize the player")?;
    let variant = session
        .check_present()
        .with_context(|| format!("No {} storage responding", settings.session.medium))?;
    log_info!(
        "Connected to {} storage ({variant})",
        session.current_storage()
    );
    Ok(session)
}

/// Bridge traffic counters, printed in verbose mode.
pub fn report_stats(session: &Session) {
    let s = session.bridge().snapshot();
    log_verbose!(
        "Bridge: {} round trips, {} B out, {} B in, {} ms delays, {} errors",
        s.round_trips(),
        s.bulk_write_bytes,
        s.bulk_read_bytes,
        s.delay_ms_total,
        s.errors
    );
}
