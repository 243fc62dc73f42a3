use std::{collections::BTreeMap, path::Path};

use log::debug;

use super::{
    buffer_manager::{BufferManager, DEFAULT_BUFFER_CAPACITY},
    node::{Node, MAX_ENTRY_LEN},
    page::{CHECKSUM_LEN, PAGE_SIZE},
};
use crate::{
    error::KvError,
    types::{KvResult, PageId},
};

const ROOT_PAGE_ID: PageId = 0;

/// A b-tree stored in a single file, the root always lives in page 0.
pub struct BTree {
    buffer_manager: BufferManager,
    root: Node,
}

impl BTree {
    pub fn new<P: AsRef<Path>>(file_path: P) -> KvResult<Self> {
        Self::with_capacity(file_path, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity<P: AsRef<Path>>(file_path: P, capacity: usize) -> KvResult<Self> {
        let mut tree = Self {
            buffer_manager: BufferManager::with_capacity(file_path, capacity)?,
            root: Node::new(ROOT_PAGE_ID),
        };

        if tree.buffer_manager.page_num() == 0 {
            tree.init_root()?;
        }
        Ok(tree)
    }

    /// Create the empty root and write it through, a file with an
    /// all-zero page 0 can't be read back.
    fn init_root(&mut self) -> KvResult {
        let page_id = self.buffer_manager.create_new_page()?;
        assert_eq!(page_id, ROOT_PAGE_ID);
        self.root.init(&mut self.buffer_manager, true)?;
        self.buffer_manager.flush()
    }

    pub fn search(&mut self, key: &str) -> KvResult<Option<String>> {
        self.root.search(&mut self.buffer_manager, key)
    }

    /// Overwrite the value of an existing key, return false if the key
    /// doesn't exist.
    pub fn update(&mut self, key: &str, value: &str) -> KvResult<bool> {
        check_entry(key, value)?;
        self.root.update(&mut self.buffer_manager, key, value)
    }

    /// Insert a new key, the key must not exist in the tree.
    pub fn insert(&mut self, key: &str, value: &str) -> KvResult {
        check_entry(key, value)?;

        let bm = &mut self.buffer_manager;
        if self.root.is_full(bm)? {
            // move the content of the root to a new page, so the root
            // stays in page 0 and becomes the parent of the old root
            let new_page_id = bm.create_new_page()?;
            let content = bm.read_page(ROOT_PAGE_ID, CHECKSUM_LEN, PAGE_SIZE - CHECKSUM_LEN)?;
            bm.write_page(new_page_id, &content, CHECKSUM_LEN)?;

            self.root.init(bm, false)?;
            self.root.set_child_pageid(bm, 0, new_page_id)?;
            self.root.splitchild(bm, 0)?;
            debug!("root split, old root moved to page {}", new_page_id);
        }
        self.root.insert(bm, key, value)
    }

    /// Insert the key or overwrite its value.
    pub fn upsert(&mut self, key: &str, value: &str) -> KvResult {
        if !self.update(key, value)? {
            self.insert(key, value)?;
        }
        Ok(())
    }

    pub fn del(&mut self, key: &str) -> KvResult<bool> {
        let bm = &mut self.buffer_manager;
        let deleted = self.root.del(bm, key)?;

        if self.root.keys_size(bm)? == 0 && !self.root.is_leaf(bm)? {
            // the only child takes the place of the root, its old page
            // is never used again
            let child = self.root.child_pageid(bm, 0)?;
            let content = bm.read_page(child, CHECKSUM_LEN, PAGE_SIZE - CHECKSUM_LEN)?;
            bm.write_page(ROOT_PAGE_ID, &content, CHECKSUM_LEN)?;
            debug!("root collapsed, page {} is orphaned", child);
        }
        Ok(deleted)
    }

    /// Drop all data, the file is truncated and a new empty root is
    /// created.
    pub fn clear(&mut self) -> KvResult {
        self.buffer_manager.clear()?;
        self.init_root()
    }

    pub fn flush(&mut self) -> KvResult {
        self.buffer_manager.flush()
    }

    pub fn all_data(&mut self) -> KvResult<BTreeMap<String, String>> {
        self.root.all_data(&mut self.buffer_manager)
    }

    pub fn len(&mut self) -> KvResult<usize> {
        Ok(self.all_data()?.len())
    }

    pub fn is_empty(&mut self) -> KvResult<bool> {
        Ok(self.root.keys_size(&mut self.buffer_manager)? == 0)
    }

    /// Number of pages in the file, including orphaned ones.
    pub fn page_count(&self) -> u32 {
        self.buffer_manager.page_num()
    }

    pub fn buffer_manager(&mut self) -> &mut BufferManager {
        &mut self.buffer_manager
    }

    pub fn check_integrity(&mut self) -> KvResult {
        self.root
            .check_integrity(&mut self.buffer_manager, true, None, None)
            .map(|_| ())
    }

    /// Print the tree to the debug log.
    pub fn draw_tree(&mut self) -> KvResult {
        let mut out = String::new();
        self.root.draw(&mut self.buffer_manager, 0, &mut out)?;
        debug!("b-tree structure:\n{}", out);
        Ok(())
    }
}

/// Keys and values must fit into a node slot, and keys can't be empty.
pub fn check_entry(key: &str, value: &str) -> KvResult {
    if key.is_empty() {
        return Err(KvError::new("empty key"));
    }
    if key.len() > MAX_ENTRY_LEN {
        return Err(KvError::new(&format!(
            "key too long: {} bytes, max: {}",
            key.len(),
            MAX_ENTRY_LEN
        )));
    }
    if value.len() > MAX_ENTRY_LEN {
        return Err(KvError::new(&format!(
            "value too long: {} bytes, max: {}",
            value.len(),
            MAX_ENTRY_LEN
        )));
    }
    Ok(())
}
