use std::{collections::BTreeMap, path::Path};

use log::{debug, error};

use super::{disk_manager::DiskManager, page::Page};
use crate::{
    error::KvError,
    types::{KvResult, PageId},
};

pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// A fixed capacity page cache on top of the `DiskManager`.
///
/// A page has at most one resident copy, which is found through
/// `page_table`. When all slots are taken, a victim is chosen by the
/// clock algorithm: the hand sweeps over the slots, clearing access
/// bits, and picks the first page that is neither accessed nor pinned.
pub struct BufferManager {
    disk_manager: DiskManager,

    frames: Vec<Page>,

    /// page id -> slot index in `frames`
    page_table: BTreeMap<PageId, usize>,

    /// Slots in `frames` which don't hold a resident page.
    free_slots: Vec<usize>,

    /// Position of the clock hand.
    victim_index_base: usize,

    capacity: usize,
}

impl BufferManager {
    pub fn new<P: AsRef<Path>>(file_path: P) -> KvResult<Self> {
        Self::with_capacity(file_path, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity<P: AsRef<Path>>(file_path: P, capacity: usize) -> KvResult<Self> {
        assert!(capacity > 0, "buffer capacity must be positive");

        Ok(Self {
            disk_manager: DiskManager::new(file_path)?,
            frames: Vec::new(),
            page_table: BTreeMap::new(),
            free_slots: Vec::new(),
            victim_index_base: 0,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn resident_count(&self) -> usize {
        self.page_table.len()
    }

    pub fn page_num(&self) -> u32 {
        self.disk_manager.page_num()
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.page_table.contains_key(&page_id)
    }

    /// Make the page resident, loading it from disk if necessary.
    pub fn fetch_page(&mut self, page_id: PageId) -> KvResult {
        if self.page_table.contains_key(&page_id) {
            return Ok(());
        }

        let page = self.disk_manager.fetch_page(page_id)?;
        debug!("load page {} from disk", page_id);
        if cfg!(feature = "verify_checksum")
            && !page.is_blank()
            && !page.confirm_checksum()
        {
            return Err(KvError::new(&format!(
                "checksum mismatch on page {}",
                page_id
            )));
        }

        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None if self.frames.len() < self.capacity => {
                self.frames.push(page);
                self.page_table.insert(page_id, self.frames.len() - 1);
                return Ok(());
            }
            None => self.evict()?,
        };

        self.frames[slot] = page;
        self.page_table.insert(page_id, slot);
        Ok(())
    }

    pub fn create_new_page(&mut self) -> KvResult<PageId> {
        self.disk_manager.allocate_new_page()
    }

    pub fn read_page(&mut self, page_id: PageId, offset: usize, len: usize) -> KvResult<Vec<u8>> {
        let slot = self.resident_slot(page_id)?;
        Ok(self.frames[slot].read(offset, len))
    }

    pub fn write_page(&mut self, page_id: PageId, buf: &[u8], offset: usize) -> KvResult {
        let slot = self.resident_slot(page_id)?;
        self.frames[slot].write(buf, offset);
        Ok(())
    }

    pub fn pin(&mut self, page_id: PageId) -> KvResult {
        let slot = self.resident_slot(page_id)?;
        self.frames[slot].pin();
        Ok(())
    }

    pub fn unpin(&mut self, page_id: PageId) {
        let slot = self.page_table[&page_id];
        self.frames[slot].unpin();
    }

    /// Write the page back to disk and drop it from the cache.
    pub fn evict_page(&mut self, page_id: PageId) -> KvResult {
        let slot = self.release_slot(page_id)?;
        self.free_slots.push(slot);
        Ok(())
    }

    /// Write back every resident page and sync the file.
    pub fn flush(&mut self) -> KvResult {
        let page_ids: Vec<PageId> = self.page_table.keys().cloned().collect();
        for page_id in page_ids {
            self.evict_page(page_id)?;
        }
        self.disk_manager.flush()
    }

    /// Drop all pages, both in the cache and on disk.
    pub fn clear(&mut self) -> KvResult {
        self.flush()?;
        self.disk_manager.clear_file()
    }

    fn resident_slot(&mut self, page_id: PageId) -> KvResult<usize> {
        self.fetch_page(page_id)?;
        Ok(self.page_table[&page_id])
    }

    fn release_slot(&mut self, page_id: PageId) -> KvResult<usize> {
        let slot = *self
            .page_table
            .get(&page_id)
            .unwrap_or_else(|| panic!("page {} is not resident", page_id));

        let page = &mut self.frames[slot];
        if page.is_dirty() {
            page.update_checksum();
        }
        self.disk_manager.write_page(page_id, page)?;
        self.page_table.remove(&page_id);
        Ok(slot)
    }

    /// Pick a victim with the clock algorithm, write it back and
    /// return its (now empty) slot.
    fn evict(&mut self) -> KvResult<usize> {
        let slots = self.frames.len();
        for i in 0..2 * slots {
            let victim_index = (self.victim_index_base + i) % slots;
            let page = &mut self.frames[victim_index];
            if !page.is_accessed() && !page.is_pinned() {
                let victim = page.get_pid();
                debug!("evict page {} from slot {}", victim, victim_index);

                let slot = self.release_slot(victim)?;
                self.victim_index_base = (victim_index + 1) % slots;
                return Ok(slot);
            }
            page.clear_access();
        }

        let err = KvError::new("no evictable page, all pages are pinned");
        err.show_backtrace();
        Err(err)
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            error!("flush buffer manager failed: {}", e);
        }
    }
}
