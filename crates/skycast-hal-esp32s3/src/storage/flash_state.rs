//! Persistent wake-cycle state in the last sector of the data partition.
//!
//! The record is one aligned 16-byte block, rewritten in place with an
//! erase-then-write each save. A blank or unrecognized sector loads as
//! `None`, which the core maps to first-boot defaults.

use embedded_storage::{ReadStorage, Storage};
use esp_bootloader_esp_idf::partitions::{
    DataPartitionSubType, PARTITION_TABLE_MAX_LEN, PartitionType, read_partition_table,
};
use esp_rom_sys::rom::spiflash::{
    ESP_ROM_SPIFLASH_RESULT_OK, esp_rom_spiflash_erase_sector, esp_rom_spiflash_read,
    esp_rom_spiflash_unlock, esp_rom_spiflash_write,
};
use skycast_core::state::{PersistentState, StateStore};

const FLASH_SECTOR_SIZE: u32 = 4096;
const DEFAULT_FLASH_CAPACITY_BYTES: usize = 16 * 1024 * 1024;

const STATE_MAGIC: u32 = 0x3159_4B53; // "SKY1"
const STATE_VERSION: u8 = 1;
const STATE_RECORD_LEN: usize = 16;

const FLAG_LOW_BATTERY_LATCHED: u8 = 0x01;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlashStateError {
    PartitionTable,
    StatePartitionMissing,
    PartitionTooSmall,
    FlashOpFailed(i32),
    Corrupted,
}

#[derive(Debug)]
struct RawFlash;

impl RawFlash {
    fn new() -> Result<Self, FlashStateError> {
        let rc = unsafe { esp_rom_spiflash_unlock() };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashStateError::FlashOpFailed(rc));
        }
        Ok(Self)
    }

    fn erase_sector(&mut self, sector_addr: u32) -> Result<(), FlashStateError> {
        let sector = sector_addr / FLASH_SECTOR_SIZE;
        let rc = unsafe { esp_rom_spiflash_erase_sector(sector) };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashStateError::FlashOpFailed(rc));
        }
        Ok(())
    }

    fn read_word(&mut self, addr: u32) -> Result<u32, FlashStateError> {
        let mut word = 0u32;
        let rc = unsafe { esp_rom_spiflash_read(addr, &mut word as *mut u32 as *const u32, 4) };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashStateError::FlashOpFailed(rc));
        }
        Ok(word)
    }

    fn write_word(&mut self, addr: u32, word: u32) -> Result<(), FlashStateError> {
        let rc = unsafe { esp_rom_spiflash_write(addr, &word as *const u32, 4) };
        if rc != ESP_ROM_SPIFLASH_RESULT_OK {
            return Err(FlashStateError::FlashOpFailed(rc));
        }
        Ok(())
    }

    /// The record sits at a sector boundary, so it is always word-aligned.
    fn read_record(&mut self, addr: u32) -> Result<[u8; STATE_RECORD_LEN], FlashStateError> {
        let mut buf = [0u8; STATE_RECORD_LEN];
        for (i, chunk) in buf.chunks_exact_mut(4).enumerate() {
            let word = self.read_word(addr + i as u32 * 4)?;
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Ok(buf)
    }

    fn write_record(
        &mut self,
        addr: u32,
        buf: &[u8; STATE_RECORD_LEN],
    ) -> Result<(), FlashStateError> {
        for (i, chunk) in buf.chunks_exact(4).enumerate() {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            self.write_word(addr + i as u32 * 4, word)?;
        }
        Ok(())
    }
}

impl ReadStorage for RawFlash {
    type Error = FlashStateError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let mut addr = offset & !0b11;
        let mut filled = 0usize;

        while filled < bytes.len() {
            let word = self.read_word(addr)?.to_le_bytes();
            for (i, b) in word.iter().enumerate() {
                let src = addr as i64 + i as i64 - offset as i64;
                if src < 0 {
                    continue;
                }
                let src = src as usize;
                if src >= bytes.len() {
                    break;
                }
                bytes[src] = *b;
                filled = filled.max(src + 1);
            }
            addr += 4;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        DEFAULT_FLASH_CAPACITY_BYTES
    }
}

impl Storage for RawFlash {
    fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Self::Error> {
        // The partition-table reader only reads; state writes go through
        // the aligned record path.
        Err(FlashStateError::Corrupted)
    }
}

#[derive(Debug)]
pub struct FlashStateStore {
    flash: RawFlash,
    state_sector_addr: u32,
}

impl FlashStateStore {
    pub fn new() -> Result<Self, FlashStateError> {
        let mut flash = RawFlash::new()?;

        let mut table_buf = [0u8; PARTITION_TABLE_MAX_LEN];
        let table = read_partition_table(&mut flash, &mut table_buf)
            .map_err(|_| FlashStateError::PartitionTable)?;

        let mut best_data_undefined: Option<(u32, u32)> = None;
        let mut fallback_nvs: Option<(u32, u32)> = None;

        for entry in table.iter() {
            if entry.is_read_only() || entry.len() < FLASH_SECTOR_SIZE {
                continue;
            }

            match entry.partition_type() {
                PartitionType::Data(DataPartitionSubType::Undefined) => {
                    best_data_undefined = Some((entry.offset(), entry.len()));
                    break;
                }
                PartitionType::Data(DataPartitionSubType::Nvs) => {
                    if fallback_nvs.is_none() {
                        fallback_nvs = Some((entry.offset(), entry.len()));
                    }
                }
                _ => {}
            }
        }

        let (offset, len) = best_data_undefined
            .or(fallback_nvs)
            .ok_or(FlashStateError::StatePartitionMissing)?;

        if len < FLASH_SECTOR_SIZE {
            return Err(FlashStateError::PartitionTooSmall);
        }

        let state_sector_addr = offset + len - FLASH_SECTOR_SIZE;
        Ok(Self {
            flash,
            state_sector_addr,
        })
    }
}

impl StateStore for FlashStateStore {
    type Error = FlashStateError;

    fn load(&mut self) -> Result<Option<PersistentState>, Self::Error> {
        let buf = self.flash.read_record(self.state_sector_addr)?;

        if buf.iter().all(|b| *b == 0xFF) {
            return Ok(None);
        }

        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != STATE_MAGIC {
            return Ok(None);
        }

        if buf[4] != STATE_VERSION {
            return Ok(None);
        }

        let expected_checksum = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        if checksum32(&buf[..12]) != expected_checksum {
            return Err(FlashStateError::Corrupted);
        }

        Ok(Some(PersistentState {
            low_battery_latched: (buf[5] & FLAG_LOW_BATTERY_LATCHED) != 0,
            consecutive_errors: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        }))
    }

    fn save(&mut self, state: &PersistentState) -> Result<(), Self::Error> {
        let mut buf = [0u8; STATE_RECORD_LEN];
        buf[0..4].copy_from_slice(&STATE_MAGIC.to_le_bytes());
        buf[4] = STATE_VERSION;
        buf[5] = if state.low_battery_latched {
            FLAG_LOW_BATTERY_LATCHED
        } else {
            0
        };
        buf[8..12].copy_from_slice(&state.consecutive_errors.to_le_bytes());
        let checksum = checksum32(&buf[..12]);
        buf[12..16].copy_from_slice(&checksum.to_le_bytes());

        self.flash.erase_sector(self.state_sector_addr)?;
        self.flash.write_record(self.state_sector_addr, &buf)
    }
}

fn checksum32(bytes: &[u8]) -> u32 {
    let mut hash = 0x811C_9DC5u32;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}
