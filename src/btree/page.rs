use std::fmt;

use crate::{
    types::PageId,
    utils::{checksum, from_hex, to_hex, HEX_LEN},
};

pub const PAGE_SIZE: usize = 4096;

/// The first bytes of every page hold the checksum of the rest of the
/// page, written as ascii hex digits.
pub const CHECKSUM_LEN: usize = HEX_LEN;

/// A fixed size block of the b-tree file, together with the
/// bookkeeping used by the buffer manager.
pub struct Page {
    page_id: PageId,
    data: Box<[u8; PAGE_SIZE]>,

    dirty: bool,
    pin_count: u32,

    /// Set on every access, cleared by the clock hand.
    access: bool,
}

impl Page {
    pub fn new(page_id: PageId, bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), PAGE_SIZE);

        let mut data = Box::new([0u8; PAGE_SIZE]);
        data.copy_from_slice(bytes);
        Self {
            page_id,
            data,
            dirty: false,
            pin_count: 0,
            access: false,
        }
    }

    pub fn get_pid(&self) -> PageId {
        self.page_id
    }

    /// Return a copy of `len` bytes starting at `offset`.
    pub fn read(&mut self, offset: usize, len: usize) -> Vec<u8> {
        assert!(offset + len <= PAGE_SIZE);
        self.access = true;
        self.data[offset..offset + len].to_vec()
    }

    /// Copy `buf` into the page at `offset`. The checksum region can
    /// only be changed through `update_checksum`.
    pub fn write(&mut self, buf: &[u8], offset: usize) {
        assert!(
            CHECKSUM_LEN <= offset && offset + buf.len() <= PAGE_SIZE,
            "invalid page write, offset: {}, len: {}",
            offset,
            buf.len()
        );
        self.dirty = true;
        self.access = true;
        self.data[offset..offset + buf.len()].copy_from_slice(buf);
    }

    pub fn update_checksum(&mut self) {
        let checksum = checksum(&self.data[CHECKSUM_LEN..]);
        self.data[..CHECKSUM_LEN].copy_from_slice(to_hex(checksum).as_bytes());
        self.dirty = true;
    }

    pub fn confirm_checksum(&self) -> bool {
        match from_hex(&self.data[..CHECKSUM_LEN]) {
            Ok(stored) => stored == checksum(&self.data[CHECKSUM_LEN..]),
            Err(_) => false,
        }
    }

    /// A page which has never been written back by the buffer
    /// manager, e.g. a page that was just allocated by growing the
    /// file.
    pub fn is_blank(&self) -> bool {
        self.data[..CHECKSUM_LEN].iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn is_accessed(&self) -> bool {
        self.access
    }

    pub fn clear_access(&mut self) {
        self.access = false;
    }

    pub fn pin(&mut self) {
        self.pin_count += 1;
    }

    pub fn unpin(&mut self) {
        assert!(self.pin_count > 0, "unpin a page which is not pinned");
        self.pin_count -= 1;
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "page_{} [dirty: {}, pin: {}, access: {}]",
            self.page_id, self.dirty, self.pin_count, self.access
        )
    }
}
