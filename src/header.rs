//! File headers: the fixed-size on-disk index record that addresses a
//! file's data sectors.

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use log::{debug, trace};

use crate::device::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::free_map::FreeMap;
use crate::geometry::{NUM_DIRECT, NUM_HEADER_SLOTS, NUM_INDIRECT, NUM_MAX_SECT, SECTOR_SIZE};

/// The on-disk record shared by top-level headers and indirect headers. An
/// indirect header reuses this exact layout, but only its direct portion
/// (the first `NUM_DIRECT` slots of `data_sectors`) is meaningful; see
/// `NUM_MAX_SECT` in `geometry.rs`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct RawHeader {
    num_bytes: i32,
    num_sectors: i32,
    data_sectors: [i32; NUM_HEADER_SLOTS],
}

impl RawHeader {
    const EMPTY: Self = Self {
        num_bytes: 0,
        num_sectors: 0,
        data_sectors: [-1; NUM_HEADER_SLOTS],
    };

    fn to_sector_buf(self) -> [u8; SECTOR_SIZE] {
        let mut buf = [0u8; SECTOR_SIZE];
        let bytes = bytemuck::bytes_of(&self);
        buf[..bytes.len()].copy_from_slice(bytes);
        buf
    }

    fn from_sector_buf(buf: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&buf[..size_of::<Self>()])
    }
}

/// An in-memory file header: the direct/indirect pointer table plus, for
/// every live indirect slot, the indirect header it points to. Discarded
/// after every operation; the disk is the only durable copy.
#[derive(Debug, Clone)]
pub struct FileHeader {
    raw: RawHeader,
    indirects: Vec<Option<RawHeader>>,
}

impl FileHeader {
    fn new(raw: RawHeader, indirects: Vec<Option<RawHeader>>) -> Self {
        Self { raw, indirects }
    }

    /// Reserves sectors for a new file of `file_size` bytes: direct slots
    /// first, then indirect slots each addressing up to `NUM_MAX_SECT` more
    /// sectors. Fails with `NoSpaceOnDisk` without undoing the caller's
    /// already-flipped bits; on failure the caller is expected to discard
    /// its free-map copy rather than write it back.
    pub fn allocate(free_map: &mut FreeMap, file_size: usize) -> FsResult<Self> {
        let num_sectors = file_size.div_ceil(SECTOR_SIZE);
        if free_map.num_clear() < num_sectors {
            return Err(FsError::NoSpaceOnDisk {
                requested: num_sectors,
                available: free_map.num_clear(),
            });
        }

        let mut raw = RawHeader {
            num_bytes: file_size as i32,
            num_sectors: num_sectors as i32,
            ..RawHeader::EMPTY
        };
        let mut indirects: Vec<Option<RawHeader>> = vec![None; NUM_INDIRECT];
        let mut remaining = num_sectors;

        for slot in raw.data_sectors.iter_mut().take(NUM_DIRECT) {
            if remaining == 0 {
                break;
            }
            let sector = free_map
                .find_and_set()
                .ok_or(FsError::NoSpaceOnDisk { requested: num_sectors, available: 0 })?;
            *slot = sector as i32;
            remaining -= 1;
        }

        for i in 0..NUM_INDIRECT {
            if remaining == 0 {
                break;
            }

            let indirect_sector = free_map
                .find_and_set()
                .ok_or(FsError::NoSpaceOnDisk { requested: num_sectors, available: 0 })?;
            raw.data_sectors[NUM_DIRECT + i] = indirect_sector as i32;

            let mut indirect_raw = RawHeader::EMPTY;
            let take = remaining.min(NUM_MAX_SECT);
            for slot in indirect_raw.data_sectors.iter_mut().take(take) {
                let sector = free_map
                    .find_and_set()
                    .ok_or(FsError::NoSpaceOnDisk { requested: num_sectors, available: 0 })?;
                *slot = sector as i32;
            }
            indirects[i] = Some(indirect_raw);
            remaining -= take;
        }

        debug_assert_eq!(remaining, 0, "pre-check guarantees enough free sectors");
        trace!("allocated header for {file_size} byte(s) across {num_sectors} sector(s)");

        Ok(Self::new(raw, indirects))
    }

    /// Clears every bit this header references: direct sectors, indirect
    /// header sectors, and the data sectors inside each indirect.
    pub fn deallocate(self, free_map: &mut FreeMap) {
        for slot in self.raw.data_sectors.iter().take(NUM_DIRECT) {
            if *slot != -1 {
                free_map.clear(*slot as u32);
            }
        }

        for i in 0..NUM_INDIRECT {
            let indirect_sector = self.raw.data_sectors[NUM_DIRECT + i];
            if indirect_sector == -1 {
                continue;
            }

            if let Some(indirect_raw) = &self.indirects[i] {
                for slot in indirect_raw.data_sectors.iter().take(NUM_MAX_SECT) {
                    if *slot != -1 {
                        free_map.clear(*slot as u32);
                    }
                }
            }

            free_map.clear(indirect_sector as u32);
        }

        debug!("deallocated header covering {} byte(s)", self.raw.num_bytes);
    }

    /// Reads the header at `sector`, then resolves every live indirect slot
    /// by reading its referenced sector too (one level only).
    pub fn fetch_from(device: &dyn BlockDevice, sector: u32) -> FsResult<Self> {
        let mut buf = [0u8; SECTOR_SIZE];
        device.read_sector(sector, &mut buf)?;
        let raw = RawHeader::from_sector_buf(&buf);

        let mut indirects = vec![None; NUM_INDIRECT];
        for (i, slot) in indirects.iter_mut().enumerate() {
            let indirect_sector = raw.data_sectors[NUM_DIRECT + i];
            if indirect_sector == -1 {
                continue;
            }
            let mut ibuf = [0u8; SECTOR_SIZE];
            device.read_sector(indirect_sector as u32, &mut ibuf)?;
            *slot = Some(RawHeader::from_sector_buf(&ibuf));
        }

        Ok(Self::new(raw, indirects))
    }

    /// Writes this header to `sector`, then writes each live indirect header
    /// back to the sector it points to.
    pub fn write_back(&self, device: &mut dyn BlockDevice, sector: u32) -> FsResult<()> {
        device.write_sector(sector, &self.raw.to_sector_buf())?;

        for i in 0..NUM_INDIRECT {
            let indirect_sector = self.raw.data_sectors[NUM_DIRECT + i];
            if indirect_sector == -1 {
                continue;
            }
            if let Some(indirect_raw) = &self.indirects[i] {
                device.write_sector(indirect_sector as u32, &indirect_raw.to_sector_buf())?;
            }
        }

        Ok(())
    }

    /// Resolves a byte offset to the device sector that holds it.
    pub fn byte_to_sector(&self, offset: usize) -> FsResult<u32> {
        let length = self.raw.num_bytes as u64;
        if offset as u64 >= length {
            return Err(FsError::OutOfRange { offset: offset as u64, length });
        }

        let p = offset / SECTOR_SIZE;
        if p < NUM_DIRECT {
            return Ok(self.raw.data_sectors[p] as u32);
        }

        let p2 = p - NUM_DIRECT;
        let i = p2 / NUM_MAX_SECT;
        let j = p2 % NUM_MAX_SECT;

        let indirect = self
            .indirects
            .get(i)
            .and_then(|slot| slot.as_ref())
            .ok_or(FsError::OutOfRange { offset: offset as u64, length })?;

        Ok(indirect.data_sectors[j] as u32)
    }

    pub fn file_length(&self) -> usize {
        self.raw.num_bytes as usize
    }

    /// Reads `buf.len()` bytes starting at `offset`, spanning as many
    /// sectors as necessary.
    pub fn read_at(&self, device: &dyn BlockDevice, offset: usize, buf: &mut [u8]) -> FsResult<()> {
        let mut done = 0;
        while done < buf.len() {
            let cur = offset + done;
            let sector = self.byte_to_sector(cur)?;
            let within = cur % SECTOR_SIZE;
            let chunk = (SECTOR_SIZE - within).min(buf.len() - done);

            let mut sector_buf = [0u8; SECTOR_SIZE];
            device.read_sector(sector, &mut sector_buf)?;
            buf[done..done + chunk].copy_from_slice(&sector_buf[within..within + chunk]);
            done += chunk;
        }
        Ok(())
    }

    /// Writes `buf` starting at `offset`. Does not grow the file — length is
    /// fixed at creation time.
    pub fn write_at(&self, device: &mut dyn BlockDevice, offset: usize, buf: &[u8]) -> FsResult<()> {
        let mut done = 0;
        while done < buf.len() {
            let cur = offset + done;
            let sector = self.byte_to_sector(cur)?;
            let within = cur % SECTOR_SIZE;
            let chunk = (SECTOR_SIZE - within).min(buf.len() - done);

            let mut sector_buf = [0u8; SECTOR_SIZE];
            device.read_sector(sector, &mut sector_buf)?;
            sector_buf[within..within + chunk].copy_from_slice(&buf[done..done + chunk]);
            device.write_sector(sector, &sector_buf)?;
            done += chunk;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryBlockDevice;

    #[test]
    fn allocate_fills_direct_slots_first() {
        let mut free_map = FreeMap::new(64);
        let header = FileHeader::allocate(&mut free_map, 2 * SECTOR_SIZE).unwrap();
        assert_eq!(header.file_length(), 2 * SECTOR_SIZE);
        assert_eq!(free_map.num_clear(), 62);
    }

    #[test]
    fn allocate_fails_without_rolling_back_caller_map() {
        let mut free_map = FreeMap::new(4);
        let err = FileHeader::allocate(&mut free_map, 100 * SECTOR_SIZE).unwrap_err();
        assert!(matches!(err, FsError::NoSpaceOnDisk { .. }));
    }

    #[test]
    fn round_trip_preserves_byte_to_sector_mapping() {
        let mut free_map = FreeMap::new(64);
        let header = FileHeader::allocate(&mut free_map, (NUM_DIRECT + 1) * SECTOR_SIZE).unwrap();

        let mut device = MemoryBlockDevice::new(64);
        header.write_back(&mut device, 10).unwrap();
        let reloaded = FileHeader::fetch_from(&device, 10).unwrap();

        for k in 0..header.file_length() {
            assert_eq!(header.byte_to_sector(k).ok(), reloaded.byte_to_sector(k).ok());
        }
    }

    #[test]
    fn uses_indirect_header_beyond_direct_capacity() {
        let mut free_map = FreeMap::new(64);
        let header = FileHeader::allocate(&mut free_map, (NUM_DIRECT + 1) * SECTOR_SIZE).unwrap();
        let via_indirect = header.byte_to_sector(NUM_DIRECT * SECTOR_SIZE).unwrap();
        assert_ne!(via_indirect, 0);
    }

    #[test]
    fn byte_to_sector_rejects_offsets_past_length() {
        let mut free_map = FreeMap::new(16);
        let header = FileHeader::allocate(&mut free_map, SECTOR_SIZE).unwrap();
        assert!(matches!(
            header.byte_to_sector(SECTOR_SIZE),
            Err(FsError::OutOfRange { .. })
        ));
    }

    #[test]
    fn deallocate_frees_every_referenced_sector() {
        let mut free_map = FreeMap::new(64);
        let before = free_map.num_clear();
        let header = FileHeader::allocate(&mut free_map, (NUM_DIRECT + 1) * SECTOR_SIZE).unwrap();
        assert!(free_map.num_clear() < before);
        header.deallocate(&mut free_map);
        assert_eq!(free_map.num_clear(), before);
    }

    #[test]
    fn read_write_round_trip_through_device() {
        let mut free_map = FreeMap::new(64);
        let header = FileHeader::allocate(&mut free_map, (NUM_DIRECT + 1) * SECTOR_SIZE).unwrap();
        let mut device = MemoryBlockDevice::new(64);

        let payload: Vec<u8> = (0..header.file_length() as u32).map(|b| b as u8).collect();
        header.write_at(&mut device, 0, &payload).unwrap();

        let mut readback = vec![0u8; header.file_length()];
        header.read_at(&device, 0, &mut readback).unwrap();
        assert_eq!(readback, payload);
    }
}
