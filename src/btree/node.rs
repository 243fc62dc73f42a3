use std::collections::BTreeMap;

use log::debug;

use super::{buffer_manager::BufferManager, page::CHECKSUM_LEN};
use crate::{
    error::KvError,
    types::{KvResult, PageId},
    utils::{from_hex, to_hex, HEX_LEN},
};

// Node layout inside a page, all integers are 8 ascii hex digits:
//
// | checksum | is_leaf | keys_size | child_0 | key_0 | value_0 | child_1 | ... | child_5 |
// |    8     |    1    |     8     |    8    |  400  |   400   |    8    | ... |    8    |
//
// key   = key_size(8) + key bytes
// value = value_size(8) + value bytes

const IS_LEAF_LEN: usize = 1;
const KEYS_SIZE_LEN: usize = HEX_LEN;
const PAGEID_LEN: usize = HEX_LEN;
const KEY_LEN: usize = 400;
const VALUE_LEN: usize = 400;

const IS_LEAF_OFFSET: usize = CHECKSUM_LEN;
const KEYS_SIZE_OFFSET: usize = IS_LEAF_OFFSET + IS_LEAF_LEN;
const SLOTS_OFFSET: usize = KEYS_SIZE_OFFSET + KEYS_SIZE_LEN;
const SLOT_LEN: usize = PAGEID_LEN + KEY_LEN + VALUE_LEN;

/// The max number of children of a node.
pub const ORDER: usize = 6;

/// The min number of keys of a non-root node.
pub const HALF_ORDER: usize = (ORDER - 1) / 2;

/// The longest key (or value) that fits into a slot.
pub const MAX_ENTRY_LEN: usize = KEY_LEN - HEX_LEN;

/// A b-tree node, which is just a view over the page with the same id.
///
/// The node doesn't hold any data itself, every accessor goes through
/// the buffer manager.
///
/// ```text
///       keys[0]   keys[1]   keys[2]   keys[3]
///  c[0]       c[1]      c[2]      c[3]      c[4]
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node {
    page_id: PageId,
}

impl Node {
    pub fn new(page_id: PageId) -> Self {
        Self { page_id }
    }

    pub fn get_pid(&self) -> PageId {
        self.page_id
    }

    fn child_offset(index: usize) -> usize {
        SLOTS_OFFSET + index * SLOT_LEN
    }

    fn key_offset(index: usize) -> usize {
        SLOTS_OFFSET + PAGEID_LEN + index * SLOT_LEN
    }

    fn value_offset(index: usize) -> usize {
        SLOTS_OFFSET + PAGEID_LEN + KEY_LEN + index * SLOT_LEN
    }

    fn read_hex(&self, bm: &mut BufferManager, offset: usize) -> KvResult<u32> {
        let buf = bm.read_page(self.page_id, offset, HEX_LEN)?;
        from_hex(&buf).map_err(|e| {
            KvError::new(&format!(
                "corrupted node on page {}, offset {}: {}",
                self.page_id, offset, e
            ))
        })
    }

    fn read_sized(&self, bm: &mut BufferManager, offset: usize, cap: usize) -> KvResult<String> {
        let buf = bm.read_page(self.page_id, offset, cap)?;
        let size = from_hex(&buf[..HEX_LEN])? as usize;
        if HEX_LEN + size > cap {
            return Err(KvError::new(&format!(
                "corrupted entry size {} on page {}",
                size, self.page_id
            )));
        }

        String::from_utf8(buf[HEX_LEN..HEX_LEN + size].to_vec())
            .map_err(|_| KvError::new(&format!("non utf-8 entry on page {}", self.page_id)))
    }

    fn write_sized(&self, bm: &mut BufferManager, offset: usize, cap: usize, s: &str) -> KvResult {
        let mut buf = to_hex(s.len() as u32).into_bytes();
        buf.extend_from_slice(s.as_bytes());
        assert!(buf.len() <= cap, "entry too long: {} bytes", s.len());
        bm.write_page(self.page_id, &buf, offset)
    }

    pub fn is_leaf(&self, bm: &mut BufferManager) -> KvResult<bool> {
        let buf = bm.read_page(self.page_id, IS_LEAF_OFFSET, IS_LEAF_LEN)?;
        Ok(buf[0] == b'1')
    }

    pub fn keys_size(&self, bm: &mut BufferManager) -> KvResult<usize> {
        Ok(self.read_hex(bm, KEYS_SIZE_OFFSET)? as usize)
    }

    pub fn child_pageid(&self, bm: &mut BufferManager, index: usize) -> KvResult<PageId> {
        self.read_hex(bm, Self::child_offset(index))
    }

    fn child(&self, bm: &mut BufferManager, index: usize) -> KvResult<Node> {
        Ok(Node::new(self.child_pageid(bm, index)?))
    }

    pub fn keys(&self, bm: &mut BufferManager, index: usize) -> KvResult<String> {
        self.read_sized(bm, Self::key_offset(index), KEY_LEN)
    }

    pub fn values(&self, bm: &mut BufferManager, index: usize) -> KvResult<String> {
        self.read_sized(bm, Self::value_offset(index), VALUE_LEN)
    }

    pub fn set_is_leaf(&self, bm: &mut BufferManager, is_leaf: bool) -> KvResult {
        let buf = if is_leaf { b"1" } else { b"0" };
        bm.write_page(self.page_id, buf, IS_LEAF_OFFSET)
    }

    pub fn set_keys_size(&self, bm: &mut BufferManager, keys_size: usize) -> KvResult {
        bm.write_page(self.page_id, to_hex(keys_size as u32).as_bytes(), KEYS_SIZE_OFFSET)
    }

    pub fn set_child_pageid(
        &self,
        bm: &mut BufferManager,
        index: usize,
        child: PageId,
    ) -> KvResult {
        bm.write_page(self.page_id, to_hex(child).as_bytes(), Self::child_offset(index))
    }

    pub fn set_keys(&self, bm: &mut BufferManager, index: usize, key: &str) -> KvResult {
        self.write_sized(bm, Self::key_offset(index), KEY_LEN, key)
    }

    pub fn set_values(&self, bm: &mut BufferManager, index: usize, value: &str) -> KvResult {
        self.write_sized(bm, Self::value_offset(index), VALUE_LEN, value)
    }

    fn entry(&self, bm: &mut BufferManager, index: usize) -> KvResult<(String, String)> {
        Ok((self.keys(bm, index)?, self.values(bm, index)?))
    }

    fn set_entry(
        &self,
        bm: &mut BufferManager,
        index: usize,
        entry: &(String, String),
    ) -> KvResult {
        self.set_keys(bm, index, &entry.0)?;
        self.set_values(bm, index, &entry.1)
    }

    /// Copy the entry at `from` of node `src` to `to` of this node.
    fn copy_entry(&self, bm: &mut BufferManager, to: usize, src: &Node, from: usize) -> KvResult {
        let entry = src.entry(bm, from)?;
        self.set_entry(bm, to, &entry)
    }

    fn copy_child(&self, bm: &mut BufferManager, to: usize, src: &Node, from: usize) -> KvResult {
        let child = src.child_pageid(bm, from)?;
        self.set_child_pageid(bm, to, child)
    }

    pub fn is_full(&self, bm: &mut BufferManager) -> KvResult<bool> {
        Ok(self.keys_size(bm)? == ORDER - 1)
    }

    /// Reset the page to an empty node.
    pub fn init(&self, bm: &mut BufferManager, is_leaf: bool) -> KvResult {
        self.set_is_leaf(bm, is_leaf)?;
        self.set_keys_size(bm, 0)
    }

    /// Locate `key` in this node: `Ok(i)` if `keys[i] == key`, `Err(i)`
    /// if `keys[i]` is the first key greater than `key` (or
    /// `keys_size` if there is none).
    fn locate(&self, bm: &mut BufferManager, key: &str) -> KvResult<Result<usize, usize>> {
        let keys_size = self.keys_size(bm)?;
        for i in 0..keys_size {
            let k = self.keys(bm, i)?;
            if key == k {
                return Ok(Ok(i));
            } else if key < k.as_str() {
                return Ok(Err(i));
            }
        }
        Ok(Err(keys_size))
    }

    pub fn search(&self, bm: &mut BufferManager, key: &str) -> KvResult<Option<String>> {
        match self.locate(bm, key)? {
            Ok(i) => Ok(Some(self.values(bm, i)?)),
            Err(i) => {
                if self.is_leaf(bm)? {
                    Ok(None)
                } else {
                    self.child(bm, i)?.search(bm, key)
                }
            }
        }
    }

    pub fn update(&self, bm: &mut BufferManager, key: &str, value: &str) -> KvResult<bool> {
        match self.locate(bm, key)? {
            Ok(i) => {
                self.set_values(bm, i, value)?;
                Ok(true)
            }
            Err(i) => {
                if self.is_leaf(bm)? {
                    Ok(false)
                } else {
                    self.child(bm, i)?.update(bm, key, value)
                }
            }
        }
    }

    /// Insert into the subtree rooted at this node, which must not be
    /// full. Full children are split before descending into them.
    pub fn insert(&self, bm: &mut BufferManager, key: &str, value: &str) -> KvResult {
        assert!(!self.is_full(bm)?, "insert into a full node");

        let mut idx = match self.locate(bm, key)? {
            Ok(_) => panic!("key {:?} already exists", key),
            Err(idx) => idx,
        };

        if self.is_leaf(bm)? {
            let keys_size = self.keys_size(bm)?;
            for i in (idx..keys_size).rev() {
                self.copy_entry(bm, i + 1, self, i)?;
            }
            self.set_keys(bm, idx, key)?;
            self.set_values(bm, idx, value)?;
            self.set_keys_size(bm, keys_size + 1)
        } else {
            if self.child(bm, idx)?.is_full(bm)? {
                self.splitchild(bm, idx)?;
                if self.keys(bm, idx)?.as_str() < key {
                    idx += 1;
                }
            }
            self.child(bm, idx)?.insert(bm, key, value)
        }
    }

    /// Delete `key` from the subtree rooted at this node.
    ///
    /// Every child is fixed (shift or merge) before we descend into
    /// it, so the node we enter always has more than `HALF_ORDER`
    /// keys, except the root.
    pub fn del(&self, bm: &mut BufferManager, key: &str) -> KvResult<bool> {
        if self.is_leaf(bm)? {
            let index = match self.locate(bm, key)? {
                Ok(index) => index,
                Err(_) => return Ok(false),
            };

            let keys_size = self.keys_size(bm)?;
            for i in index + 1..keys_size {
                self.copy_entry(bm, i - 1, self, i)?;
            }
            self.set_keys_size(bm, keys_size - 1)?;
            return Ok(true);
        }

        let mut index = match self.locate(bm, key)? {
            Ok(i) => {
                let child0 = self.child(bm, i)?;
                let child1 = self.child(bm, i + 1)?;
                let size0 = child0.keys_size(bm)?;
                let size1 = child1.keys_size(bm)?;

                if size0 + size1 + 1 < ORDER {
                    self.merge(bm, i)?;
                    return child0.del(bm, key);
                }

                // replace the key with its predecessor or successor
                let data = if size0 > HALF_ORDER {
                    child0.delete_max_data(bm)?
                } else {
                    child1.delete_min_data(bm)?
                };
                self.set_entry(bm, i, &data)?;
                return Ok(true);
            }
            Err(i) => i,
        };

        let child = self.child(bm, index)?;
        if child.keys_size(bm)? <= HALF_ORDER {
            let keys_size = self.keys_size(bm)?;
            if index > 0 && self.child(bm, index - 1)?.keys_size(bm)? > HALF_ORDER {
                self.rightshift(bm, index - 1)?;
            } else if index + 1 <= keys_size
                && self.child(bm, index + 1)?.keys_size(bm)? > HALF_ORDER
            {
                self.leftshift(bm, index)?;
            } else if index < keys_size {
                self.merge(bm, index)?;
            } else {
                index -= 1;
                self.merge(bm, index)?;
            }
        }
        self.child(bm, index)?.del(bm, key)
    }

    /// Split the full child at `idx`: its median moves up into this
    /// node and its upper half moves into a new sibling at `idx + 1`.
    pub fn splitchild(&self, bm: &mut BufferManager, idx: usize) -> KvResult {
        assert!(!self.is_full(bm)?);
        let child = self.child(bm, idx)?;
        assert!(child.is_full(bm)?);

        let median = child.entry(bm, HALF_ORDER)?;
        let keys_size = self.keys_size(bm)?;
        for i in (idx..keys_size).rev() {
            self.copy_entry(bm, i + 1, self, i)?;
        }
        self.set_entry(bm, idx, &median)?;
        for i in (idx..=keys_size).rev() {
            self.copy_child(bm, i + 1, self, i)?;
        }
        self.set_keys_size(bm, keys_size + 1)?;

        let child_is_leaf = child.is_leaf(bm)?;
        let sibling = Node::new(bm.create_new_page()?);
        sibling.set_is_leaf(bm, child_is_leaf)?;
        for i in 0..HALF_ORDER {
            sibling.copy_entry(bm, i, &child, i + HALF_ORDER + 1)?;
        }
        if !child_is_leaf {
            for i in 0..HALF_ORDER + 1 {
                sibling.copy_child(bm, i, &child, i + HALF_ORDER + 1)?;
            }
        }
        sibling.set_keys_size(bm, HALF_ORDER)?;

        self.set_child_pageid(bm, idx + 1, sibling.get_pid())?;
        child.set_keys_size(bm, HALF_ORDER)?;

        debug!(
            "split page {} at key {:?}, new sibling: page {}",
            child.get_pid(),
            median.0,
            sibling.get_pid()
        );
        Ok(())
    }

    /// Move the first key of `children[index + 1]` through the
    /// separator into the end of `children[index]`.
    pub fn leftshift(&self, bm: &mut BufferManager, index: usize) -> KvResult {
        assert!(index < self.keys_size(bm)?);
        let child0 = self.child(bm, index)?;
        let child1 = self.child(bm, index + 1)?;
        let internal = !child0.is_leaf(bm)?;

        let size0 = child0.keys_size(bm)?;
        child0.copy_entry(bm, size0, self, index)?;
        if internal {
            child0.copy_child(bm, size0 + 1, &child1, 0)?;
        }
        child0.set_keys_size(bm, size0 + 1)?;

        self.copy_entry(bm, index, &child1, 0)?;

        let size1 = child1.keys_size(bm)?;
        for i in 0..size1 - 1 {
            child1.copy_entry(bm, i, &child1, i + 1)?;
        }
        if internal {
            for i in 0..size1 {
                child1.copy_child(bm, i, &child1, i + 1)?;
            }
        }
        child1.set_keys_size(bm, size1 - 1)?;

        debug!("left shift into page {}", child0.get_pid());
        Ok(())
    }

    /// Move the last key of `children[index]` through the separator
    /// into the front of `children[index + 1]`.
    pub fn rightshift(&self, bm: &mut BufferManager, index: usize) -> KvResult {
        assert!(index < self.keys_size(bm)?);
        let child0 = self.child(bm, index)?;
        let child1 = self.child(bm, index + 1)?;
        let internal = !child0.is_leaf(bm)?;

        let size0 = child0.keys_size(bm)?;
        let size1 = child1.keys_size(bm)?;
        for i in (0..size1).rev() {
            child1.copy_entry(bm, i + 1, &child1, i)?;
        }
        if internal {
            for i in (0..=size1).rev() {
                child1.copy_child(bm, i + 1, &child1, i)?;
            }
            child1.copy_child(bm, 0, &child0, size0)?;
        }
        child1.copy_entry(bm, 0, self, index)?;
        child1.set_keys_size(bm, size1 + 1)?;

        self.copy_entry(bm, index, &child0, size0 - 1)?;
        child0.set_keys_size(bm, size0 - 1)?;

        debug!("right shift into page {}", child1.get_pid());
        Ok(())
    }

    /// Concatenate `children[index]`, the separator and
    /// `children[index + 1]` into the left child.
    ///
    /// The page of the right child is not used anymore and is never
    /// reclaimed.
    pub fn merge(&self, bm: &mut BufferManager, index: usize) -> KvResult {
        let keys_size = self.keys_size(bm)?;
        assert!(index < keys_size);
        let child0 = self.child(bm, index)?;
        let child1 = self.child(bm, index + 1)?;
        let internal = !child0.is_leaf(bm)?;

        let size0 = child0.keys_size(bm)?;
        let size1 = child1.keys_size(bm)?;
        assert!(size0 + size1 + 1 < ORDER);

        child0.copy_entry(bm, size0, self, index)?;
        for i in 0..size1 {
            child0.copy_entry(bm, size0 + i + 1, &child1, i)?;
        }
        if internal {
            for i in 0..=size1 {
                child0.copy_child(bm, size0 + i + 1, &child1, i)?;
            }
        }
        child0.set_keys_size(bm, size0 + size1 + 1)?;

        for i in index + 1..keys_size {
            self.copy_entry(bm, i - 1, self, i)?;
        }
        for i in index + 2..=keys_size {
            self.copy_child(bm, i - 1, self, i)?;
        }
        self.set_keys_size(bm, keys_size - 1)?;

        debug!(
            "merge page {} into page {}, page {} is orphaned",
            child1.get_pid(),
            child0.get_pid(),
            child1.get_pid()
        );
        Ok(())
    }

    pub fn delete_max_data(&self, bm: &mut BufferManager) -> KvResult<(String, String)> {
        let data = self.max_data(bm)?;
        self.del(bm, &data.0)?;
        Ok(data)
    }

    pub fn max_data(&self, bm: &mut BufferManager) -> KvResult<(String, String)> {
        let keys_size = self.keys_size(bm)?;
        if self.is_leaf(bm)? {
            self.entry(bm, keys_size - 1)
        } else {
            self.child(bm, keys_size)?.max_data(bm)
        }
    }

    pub fn delete_min_data(&self, bm: &mut BufferManager) -> KvResult<(String, String)> {
        let data = self.min_data(bm)?;
        self.del(bm, &data.0)?;
        Ok(data)
    }

    pub fn min_data(&self, bm: &mut BufferManager) -> KvResult<(String, String)> {
        if self.is_leaf(bm)? {
            self.entry(bm, 0)
        } else {
            self.child(bm, 0)?.min_data(bm)
        }
    }

    pub fn all_data(&self, bm: &mut BufferManager) -> KvResult<BTreeMap<String, String>> {
        let mut all_data = BTreeMap::new();
        self.collect(bm, &mut all_data)?;
        Ok(all_data)
    }

    fn collect(&self, bm: &mut BufferManager, out: &mut BTreeMap<String, String>) -> KvResult {
        let keys_size = self.keys_size(bm)?;
        let is_leaf = self.is_leaf(bm)?;
        for i in 0..keys_size {
            if !is_leaf {
                self.child(bm, i)?.collect(bm, out)?;
            }
            let (k, v) = self.entry(bm, i)?;
            out.insert(k, v);
        }
        if !is_leaf {
            self.child(bm, keys_size)?.collect(bm, out)?;
        }
        Ok(())
    }

    /// Check the invariants of the subtree rooted at this node, return
    /// the depth of its leaves.
    ///
    /// Keys of the subtree must be in `(lower, upper)`.
    pub(crate) fn check_integrity(
        &self,
        bm: &mut BufferManager,
        is_root: bool,
        lower: Option<&str>,
        upper: Option<&str>,
    ) -> KvResult<usize> {
        let keys_size = self.keys_size(bm)?;
        if keys_size >= ORDER {
            return Err(KvError::new(&format!(
                "page {} has {} keys",
                self.page_id, keys_size
            )));
        }
        if !is_root && keys_size < HALF_ORDER {
            return Err(KvError::new(&format!(
                "page {} is under-full: {} keys",
                self.page_id, keys_size
            )));
        }

        let mut keys = Vec::with_capacity(keys_size);
        for i in 0..keys_size {
            keys.push(self.keys(bm, i)?);
        }
        for (i, k) in keys.iter().enumerate() {
            let too_small = match i {
                0 => lower.map_or(false, |l| k.as_str() <= l),
                _ => k <= &keys[i - 1],
            };
            let too_large = upper.map_or(false, |u| k.as_str() >= u);
            if too_small || too_large {
                return Err(KvError::new(&format!(
                    "key {:?} out of order on page {}",
                    k, self.page_id
                )));
            }
        }

        if self.is_leaf(bm)? {
            return Ok(1);
        }

        let mut depth = None;
        for i in 0..=keys_size {
            let lo = if i == 0 { lower } else { Some(keys[i - 1].as_str()) };
            let hi = if i == keys_size { upper } else { Some(keys[i].as_str()) };
            let d = self.child(bm, i)?.check_integrity(bm, false, lo, hi)?;
            match depth {
                None => depth = Some(d),
                Some(expected) if expected != d => {
                    return Err(KvError::new(&format!(
                        "unbalanced subtree under page {}",
                        self.page_id
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(depth.unwrap_or(0) + 1)
    }

    /// Render the subtree, one node per line.
    pub(crate) fn draw(&self, bm: &mut BufferManager, level: usize, out: &mut String) -> KvResult {
        let keys_size = self.keys_size(bm)?;
        let is_leaf = self.is_leaf(bm)?;

        let mut entries = Vec::with_capacity(keys_size);
        for i in 0..keys_size {
            let (k, v) = self.entry(bm, i)?;
            entries.push(format!("{}:{}", k, v));
        }
        out.push_str(&format!(
            "{}├── [{} page {}] {}\n",
            "│   ".repeat(level),
            if is_leaf { "leaf" } else { "internal" },
            self.page_id,
            entries.join(" "),
        ));

        if !is_leaf {
            for i in 0..=keys_size {
                self.child(bm, i)?.draw(bm, level + 1, out)?;
            }
        }
        Ok(())
    }
}
