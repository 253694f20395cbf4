// SPDX-License-Identifier: MIT

//! Device session: one exclusive bridge, one player.
//!
//! Every mutation reads the directory from the device, edits a copy and
//! commits it with a single directory write. Reads may use the cached
//! directory; any failed transfer, and every selection of the external
//! slot, drops it.

use std::time::Duration;

use pmpio::prelude::*;
use time::OffsetDateTime;

use crate::core::checker::*;
use crate::core::errors::*;
use crate::core::utils::time_utils::{now_timestamp, timestamp_to_datetime};
use crate::driver::handshake::{Handshake, Timing};
use crate::driver::scanner::scan_surface;
use crate::driver::transfer::{self, TransferObserver};
use crate::fs::pmp300::allocator::{BlockChain, resolve_chain};
use crate::fs::pmp300::codec::{DirectoryRead, decode, seal};
use crate::fs::pmp300::constant::*;
use crate::fs::pmp300::directory::Directory;
use crate::fs::pmp300::table::FileTable;
use crate::fs::pmp300::types::*;
use crate::id3::{FRAME_SCAN_LEN, ID3V1_SIZE, ID3V2_HEADER_SIZE, Id3Tags, id3v2_size, mpeg_bitrate, parse_id3v1};

const BRIDGE_CHECK_DELAY_US: u16 = 100;

/// Per-session settings. Passed in explicitly; nothing is global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Medium selected by `initialize`.
    pub medium: StorageMedium,
    /// Deadline for each ready wait during transfers.
    pub status_timeout: Duration,
    /// Deadline for presence probes; expiry means "absent".
    pub probe_timeout: Duration,
    pub poll_interval: Duration,
    /// Padding for the last block of an upload.
    pub fill_byte: u8,
    /// Capacity used by `format_device` instead of the detected one.
    pub capacity_override: Option<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let timing = Timing::default();
        Self {
            medium: StorageMedium::Internal,
            status_timeout: timing.status_timeout,
            probe_timeout: Duration::from_millis(500),
            poll_interval: timing.poll_interval,
            fill_byte: DEFAULT_FILL_BYTE,
            capacity_override: None,
        }
    }
}

impl SessionConfig {
    #[inline]
    pub fn timing(&self) -> Timing {
        Timing {
            status_timeout: self.status_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

/// Outcome of probing the external slot.
///
/// `present == false` with no error: nothing answered.
/// `present == true` with an error: a card answered but its directory is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageProbe {
    pub present: bool,
    pub error: Option<PmpError>,
}

impl StorageProbe {
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.present && self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub medium: StorageMedium,
    pub entry_count: u16,
    pub blocks_available: u16,
    pub blocks_used: u16,
    pub blocks_remaining: u16,
    pub blocks_bad: u16,
    pub version: u16,
    /// Raw seconds since the epoch.
    pub last_update: u32,
}

impl DeviceInfo {
    fn from_directory(medium: StorageMedium, dir: &Directory) -> Self {
        let h = &dir.header;
        Self {
            medium,
            entry_count: h.entry_count(),
            blocks_available: h.capacity(),
            blocks_used: h.blocks_used.get(),
            blocks_remaining: h.blocks_remaining.get(),
            blocks_bad: h.blocks_bad.get(),
            version: h.version(),
            last_update: h.time_last_update.get(),
        }
    }

    /// `None` when never stamped.
    pub fn last_update_time(&self) -> Option<OffsetDateTime> {
        timestamp_to_datetime(self.last_update)
    }

    #[inline]
    pub fn capacity_bytes(&self) -> u64 {
        self.blocks_available as u64 * BLOCK_SIZE as u64
    }

    #[inline]
    pub fn used_bytes(&self) -> u64 {
        self.blocks_used as u64 * BLOCK_SIZE as u64
    }

    #[inline]
    pub fn free_bytes(&self) -> u64 {
        self.blocks_remaining as u64 * BLOCK_SIZE as u64
    }
}

/// One listed entry; `index` is its 0-based playback position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub index: usize,
    pub name: String,
    pub size: u32,
    pub block_position: u16,
    pub block_count: u16,
    pub uploaded: u32,
}

impl FileInfo {
    fn from_entry(index: usize, e: &DirEntry) -> Self {
        Self {
            index,
            name: e.name(),
            size: e.size(),
            block_position: e.block_position(),
            block_count: e.block_count(),
            uploaded: e.time_upload.get(),
        }
    }

    pub fn uploaded_time(&self) -> Option<OffsetDateTime> {
        timestamp_to_datetime(self.uploaded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatReport {
    pub medium: StorageMedium,
    pub capacity: u16,
    /// Bad blocks committed to the new directory (kept and newly found).
    pub bad_blocks: Vec<u16>,
    pub scanned: bool,
}

pub struct DeviceSession<B: PmpBridge> {
    hs: Handshake<B>,
    config: SessionConfig,
    medium: StorageMedium,
    variant: CapacityVariant,
    cache: [Option<Directory>; 2],
}

impl<B: PmpBridge> DeviceSession<B> {
    /// Wraps `bridge` without touching the device.
    pub fn new(bridge: B, config: SessionConfig) -> Self {
        let medium = config.medium;
        Self {
            hs: Handshake::new(bridge, config.timing()),
            config,
            medium,
            variant: CapacityVariant::Unknown,
            cache: [None, None],
        }
    }

    /// Wraps `bridge` and runs [`Self::initialize`].
    pub fn connect(bridge: B, config: SessionConfig) -> PmpResult<Self> {
        let mut session = Self::new(bridge, config);
        session.initialize()?;
        Ok(session)
    }

    #[inline]
    pub fn bridge(&self) -> &B {
        self.hs.bridge()
    }

    #[inline]
    pub fn bridge_mut(&mut self) -> &mut B {
        self.hs.bridge_mut()
    }

    pub fn into_inner(self) -> B {
        self.hs.into_inner()
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[inline]
    pub fn current_storage(&self) -> StorageMedium {
        self.medium
    }

    /// Variant found by the last [`Self::check_present`] on internal storage.
    #[inline]
    pub fn variant(&self) -> CapacityVariant {
        self.variant
    }

    /// Resets and wakes the device, then selects the configured medium.
    pub fn initialize(&mut self) -> PmpResult {
        self.cache = [None, None];
        self.hs.initialize()?;
        self.hs.select(self.config.medium)?;
        self.medium = self.config.medium;
        Ok(())
    }

    pub fn switch_storage(&mut self, medium: StorageMedium) -> PmpResult {
        if let Err(e) = self.hs.select(medium) {
            self.cache = [None, None];
            return Err(e.into());
        }
        self.medium = medium;
        // The card may have been swapped while deselected.
        if medium == StorageMedium::External {
            self.cache[medium.index()] = None;
        }
        Ok(())
    }

    /// Probes the current medium and establishes its capacity variant.
    pub fn check_present(&mut self) -> PmpResult<CapacityVariant> {
        match self.hs.wait_ready_within(self.config.probe_timeout) {
            Ok(_) => {}
            Err(DriverError::Timeout { .. }) => return Err(PmpError::DeviceAbsent),
            Err(e) => return Err(e.into()),
        }
        let read = self.read_directory()?;
        let variant = match read.error {
            None => CapacityVariant::from_blocks(read.directory.header.capacity()),
            Some(_) => CapacityVariant::Unknown,
        };
        if self.medium == StorageMedium::Internal {
            self.variant = variant;
        }
        log::debug!("{} storage present, {variant} capacity", self.medium);
        Ok(variant)
    }

    /// Probes the external slot, then restores the previous selection.
    pub fn detect_external_storage(&mut self) -> PmpResult<StorageProbe> {
        let previous = self.medium;
        self.switch_storage(StorageMedium::External)?;
        let probe = self.probe_current();
        if previous != StorageMedium::External {
            self.switch_storage(previous)?;
        }
        let probe = probe?;
        log::debug!("external probe: present={} error={:?}", probe.present, probe.error);
        Ok(probe)
    }

    fn probe_current(&mut self) -> PmpResult<StorageProbe> {
        match self.hs.wait_ready_within(self.config.probe_timeout) {
            Ok(_) => {}
            Err(DriverError::Timeout { .. }) => {
                self.cache[self.medium.index()] = None;
                return Ok(StorageProbe {
                    present: false,
                    error: None,
                });
            }
            Err(e) => return Err(e.into()),
        }
        let error = match self.read_directory() {
            Ok(read) => read.error.map(PmpError::from),
            Err(e) if e.kind() == ErrorKind::Channel => return Err(e),
            Err(e) => Some(e),
        };
        Ok(StorageProbe {
            present: true,
            error,
        })
    }

    /// Reads and decodes the current medium's directory.
    ///
    /// A checksum failure is returned inside [`DirectoryRead`], not as `Err`.
    pub fn read_directory(&mut self) -> PmpResult<DirectoryRead> {
        let raw = self.guard(|hs| transfer::read_directory(hs))?;
        let read = decode(&raw)?;
        self.cache[self.medium.index()] = read.is_valid().then(|| read.directory.clone());
        Ok(read)
    }

    /// Trusted directory of the current medium; refuses a corrupt one.
    fn directory(&mut self) -> PmpResult<Directory> {
        if let Some(dir) = &self.cache[self.medium.index()] {
            return Ok(dir.clone());
        }
        Ok(self.read_directory()?.into_result()?)
    }

    /// Directory as currently on the device; every mutation starts here.
    fn fresh_directory(&mut self) -> PmpResult<Directory> {
        Ok(self.read_directory()?.into_result()?)
    }

    /// Stamps, seals and writes `dir`; caches it only once on the device.
    fn commit(&mut self, mut dir: Directory) -> PmpResult {
        dir.header.time_last_update = now_timestamp().into();
        let raw = seal(&mut dir);
        self.guard(|hs| transfer::write_directory(hs, &raw))?;
        log::debug!("committed {} directory ({} entries)", self.medium, dir.len());
        self.cache[self.medium.index()] = Some(dir);
        Ok(())
    }

    fn guard<T>(&mut self, op: impl FnOnce(&mut Handshake<B>) -> DriverResult<T>) -> PmpResult<T> {
        op(&mut self.hs).map_err(|e| {
            self.cache[self.medium.index()] = None;
            PmpError::from(e)
        })
    }

    pub fn get_device_info(&mut self) -> PmpResult<DeviceInfo> {
        let dir = self.directory()?;
        Ok(DeviceInfo::from_directory(self.medium, &dir))
    }

    /// Entries in playback order.
    pub fn list_files(&mut self) -> PmpResult<Vec<FileInfo>> {
        let dir = self.directory()?;
        Ok(dir
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| FileInfo::from_entry(i, e))
            .collect())
    }

    /// Writes `data` into freshly allocated blocks, then commits the new entry.
    pub fn upload_file<O: TransferObserver + ?Sized>(
        &mut self,
        name: &str,
        data: &[u8],
        observer: &mut O,
    ) -> PmpResult<FileInfo> {
        let size = u32::try_from(data.len()).map_err(|_| PmpError::Other("File too large"))?;
        let mut dir = self.fresh_directory()?;
        let now = now_timestamp();
        let chain = FileTable::new(&mut dir).add_entry(name, size, now)?;

        log::debug!("uploading {name}: {size} bytes over {} block(s)", chain.len());
        let fill = self.config.fill_byte;
        self.guard(|hs| transfer::upload(hs, &chain, data, fill, observer))?;

        let index = dir.len() - 1;
        let info = FileInfo::from_entry(index, &dir.entries[index]);
        self.commit(dir)?;
        Ok(info)
    }

    pub fn download_file<O: TransferObserver + ?Sized>(
        &mut self,
        name: &str,
        observer: &mut O,
    ) -> PmpResult<Vec<u8>> {
        let dir = self.directory()?;
        let index = dir.find(name).ok_or(TableError::NotFound)?;
        let entry = dir.entries[index];
        let chain = resolve_chain(&dir, entry.block_position(), entry.block_count() as usize)?;
        self.guard(|hs| transfer::download(hs, &chain, entry.size() as u64, observer))
    }

    /// Removes the first entry named `name`.
    pub fn delete_file(&mut self, name: &str) -> PmpResult {
        let mut dir = self.fresh_directory()?;
        FileTable::new(&mut dir).remove_entry(name)?;
        self.commit(dir)
    }

    /// Removes every entry; bad blocks stay marked. Returns the count removed.
    pub fn delete_all_files(&mut self) -> PmpResult<usize> {
        let mut dir = self.fresh_directory()?;
        let removed = FileTable::new(&mut dir).remove_all();
        self.commit(dir)?;
        Ok(removed)
    }

    /// Moves the entry at `from` to `to` (0-based playback positions).
    pub fn move_file(&mut self, from: usize, to: usize) -> PmpResult {
        let mut dir = self.fresh_directory()?;
        FileTable::new(&mut dir).move_entry(from, to)?;
        self.commit(dir)
    }

    pub fn rename_file(&mut self, old: &str, new: &str) -> PmpResult {
        let mut dir = self.fresh_directory()?;
        FileTable::new(&mut dir).rename(old, new)?;
        self.commit(dir)
    }

    /// Capacity a format should lay out: override, then a valid header,
    /// then the internal variant.
    fn format_capacity(&mut self, current: Option<&Directory>) -> PmpResult<u16> {
        if let Some(cap) = self.config.capacity_override {
            if cap == 0 || cap as usize > MAX_BLOCKS {
                return Err(PmpError::Other("Capacity override out of range"));
            }
            return Ok(cap);
        }
        if let Some(dir) = current {
            if dir.header.capacity_is_sane() {
                return Ok(dir.header.capacity());
            }
        }
        match self.medium {
            StorageMedium::Internal => Ok(self.variant.internal_blocks().unwrap_or(STANDARD_INTERNAL_BLOCKS)),
            StorageMedium::External => Err(PmpError::UnknownCapacity),
        }
    }

    /// Writes a fresh empty directory, optionally after a surface scan.
    ///
    /// Bad blocks recorded in a valid previous directory are carried over.
    pub fn format_device<O: TransferObserver + ?Sized>(
        &mut self,
        check_bad_blocks: bool,
        observer: &mut O,
    ) -> PmpResult<FormatReport> {
        let current = self.read_directory()?;
        let current = current.is_valid().then_some(current.directory);
        let capacity = self.format_capacity(current.as_ref())?;

        let mut bad = current.as_ref().map(Directory::bad_blocks).unwrap_or_default();
        bad.retain(|&b| b < capacity);
        bad.sort_unstable();
        bad.dedup();
        if check_bad_blocks {
            // The scan overwrites file data; no committed entry may point at it.
            self.commit(Directory::empty(capacity, &bad))?;
            log::debug!("scanning {capacity} block(s)");
            let found = self.guard(|hs| scan_surface(hs, capacity, observer))?;
            bad.extend(found);
            bad.sort_unstable();
            bad.dedup();
        }

        if !bad.is_empty() {
            log::warn!("{} bad block(s) excluded from allocation", bad.len());
        }
        self.commit(Directory::empty(capacity, &bad))?;

        Ok(FormatReport {
            medium: self.medium,
            capacity,
            bad_blocks: bad,
            scanned: check_bad_blocks,
        })
    }

    /// ID3v1 fields and first-frame bitrate; reads only the pages involved.
    pub fn read_file_tags(&mut self, file: &FileInfo) -> PmpResult<Id3Tags> {
        let dir = self.directory()?;
        let chain = resolve_chain(&dir, file.block_position, file.block_count as usize)?;
        let size = file.size as u64;

        let tail_at = size.saturating_sub(ID3V1_SIZE as u64);
        let tail = self.read_range(&chain, size, tail_at, ID3V1_SIZE)?;
        let mut tags = parse_id3v1(&tail);

        let head = self.read_range(&chain, size, 0, ID3V2_HEADER_SIZE)?;
        let audio_at = id3v2_size(&head) as u64;
        let audio = self.read_range(&chain, size, audio_at, FRAME_SCAN_LEN)?;
        tags.bitrate = mpeg_bitrate(&audio);
        Ok(tags)
    }

    fn read_range(&mut self, chain: &BlockChain, size: u64, offset: u64, len: usize) -> PmpResult<Vec<u8>> {
        self.guard(|hs| transfer::read_range(hs, chain, size, offset, len))
    }

    /// Reads the directory and runs every checker phase over it.
    ///
    /// Checksum failures are reported as `DIR.CHECKSUM` findings.
    pub fn check_directory(&mut self) -> PmpResult<VerifyReport> {
        let read = self.read_directory()?;
        let mut report = VerifyReport::default();
        if let Some(e) = read.error {
            report.push(Finding::err("DIR.CHECKSUM", e.to_string()));
        }
        report.findings.extend(read.directory.verify_all().findings);
        Ok(report)
    }

    /// Round trip through every bridge primitive the device does not need.
    ///
    /// Pings, reads the firmware version, drives the data pins as outputs
    /// and runs a short bridge-side delay. Bridges without direction control
    /// pass.
    pub fn check_bridge(&mut self) -> PmpResult<FirmwareVersion> {
        let bridge = self.hs.bridge_mut();
        bridge.ping()?;
        let version = bridge.firmware_version()?;
        match bridge.set_data_direction(DataDirection::Output) {
            Ok(()) | Err(BridgeError::Unsupported) => {}
            Err(e) => return Err(e.into()),
        }
        bridge.delay_us(BRIDGE_CHECK_DELAY_US)?;
        log::debug!("bridge firmware {version} passed self check");
        Ok(version)
    }
}

#[cfg(all(test, feature = "emulator"))]
mod tests {
    use super::*;
    use crate::driver::transfer::NoProgress;
    use crate::emulator::{EmulatedDevice, EmulatedMedium};

    fn config() -> SessionConfig {
        SessionConfig {
            status_timeout: Duration::from_millis(20),
            probe_timeout: Duration::from_millis(5),
            poll_interval: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    fn session(dev: EmulatedDevice) -> DeviceSession<EmulatedDevice> {
        DeviceSession::connect(dev, config()).unwrap()
    }

    #[test]
    fn test_check_present_standard() {
        let mut s = session(EmulatedDevice::standard());
        assert_eq!(s.check_present().unwrap(), CapacityVariant::Standard);
        assert_eq!(s.variant(), CapacityVariant::Standard);
    }

    #[test]
    fn test_check_present_large() {
        let mut s = session(EmulatedDevice::new(EmulatedMedium::formatted(LARGE_INTERNAL_BLOCKS)));
        assert_eq!(s.check_present().unwrap(), CapacityVariant::Large);
    }

    #[test]
    fn test_check_present_absent() {
        let mut dev = EmulatedDevice::standard();
        dev.set_stalled(true);
        let mut s = session(dev);
        assert_eq!(s.check_present().unwrap_err(), PmpError::DeviceAbsent);
    }

    #[test]
    fn test_refuses_mutation_on_corrupt_directory() {
        let mut dev = EmulatedDevice::standard();
        if let Some(m) = dev.medium_mut(StorageMedium::Internal) {
            m.directory_mut()[USAGE_OFFSET + 3] ^= 0x01;
        }
        let mut s = session(dev);
        let err = s.upload_file("a.mp3", &[1, 2, 3], &mut NoProgress).unwrap_err();
        assert!(err.is_checksum());
        assert_eq!(s.bridge().medium(StorageMedium::Internal).map(|m| m.written_blocks()), Some(0));
    }

    #[test]
    fn test_failed_upload_leaves_directory() {
        let mut s = session(EmulatedDevice::standard());
        let before = s.bridge().medium(StorageMedium::Internal).map(|m| m.directory().to_vec());
        s.bridge_mut().fail_after(200);
        let err = s.upload_file("a.mp3", &vec![7u8; 100_000], &mut NoProgress).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Channel);

        s.bridge_mut().clear_faults();
        s.initialize().unwrap();
        let after = s.bridge().medium(StorageMedium::Internal).map(|m| m.directory().to_vec());
        assert_eq!(before, after);
        assert!(s.list_files().unwrap().is_empty());
    }

    #[test]
    fn test_commit_stamps_times() {
        let mut s = session(EmulatedDevice::standard());
        s.upload_file("a.mp3", b"abc", &mut NoProgress).unwrap();
        let info = s.get_device_info().unwrap();
        assert!(info.last_update_time().is_some());
        assert!(s.list_files().unwrap()[0].uploaded_time().is_some());
    }

    #[test]
    fn test_format_external_without_capacity() {
        let dev = EmulatedDevice::standard().with_external(EmulatedMedium::blank(512));
        let mut s = session(dev);
        s.switch_storage(StorageMedium::External).unwrap();
        assert_eq!(
            s.format_device(false, &mut NoProgress).unwrap_err(),
            PmpError::UnknownCapacity
        );
    }

    #[test]
    fn test_check_bridge_runs_primitives() {
        let mut s = DeviceSession::new(EmulatedDevice::standard(), config());
        let before = s.bridge().delay_ms_total();
        assert_eq!(s.check_bridge().unwrap(), FirmwareVersion::new(1, 0, 0));
        assert_eq!(s.bridge().delay_ms_total(), before + 1);
    }

    #[cfg(feature = "mem")]
    #[test]
    fn test_check_bridge_drives_data_pins() {
        let mut s = DeviceSession::new(MemBridge::new(), config());
        s.check_bridge().unwrap();
        assert_eq!(
            s.bridge().ops(),
            &[
                BridgeOp::Ping,
                BridgeOp::Version,
                BridgeOp::SetDirection(DataDirection::Output),
                BridgeOp::DelayUs(BRIDGE_CHECK_DELAY_US),
            ]
        );
    }

    #[test]
    fn test_rename_keeps_order() {
        let mut s = session(EmulatedDevice::standard());
        for name in ["one", "two", "three"] {
            s.upload_file(name, name.as_bytes(), &mut NoProgress).unwrap();
        }
        s.rename_file("two", "zwei").unwrap();
        let names: Vec<_> = s.list_files().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, ["one", "zwei", "three"]);
        assert_eq!(
            s.rename_file("missing", "x").unwrap_err(),
            PmpError::Table(TableError::NotFound)
        );
    }
}
