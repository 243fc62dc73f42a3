use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::debug;

use super::page::{Page, PAGE_SIZE};
use crate::{
    types::{KvResult, PageId},
    utils::open_or_create,
};

/// Page granularity io against the single b-tree file.
pub struct DiskManager {
    file_path: PathBuf,
    file: File,

    /// Number of pages in the file, always `file length / PAGE_SIZE`.
    page_num: u32,
}

impl DiskManager {
    pub fn new<P: AsRef<Path>>(file_path: P) -> KvResult<Self> {
        let file = open_or_create(&file_path)?;
        let page_num = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file_path: file_path.as_ref().to_path_buf(),
            file,
            page_num,
        })
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn fetch_page(&mut self, page_id: PageId) -> KvResult<Page> {
        assert!(
            page_id < self.page_num,
            "page {} is out of range, page count: {}",
            page_id,
            self.page_num
        );

        self.file
            .seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.read_exact(&mut buf)?;
        Ok(Page::new(page_id, &buf))
    }

    /// Write the page back if it's dirty.
    pub fn write_page(&mut self, page_id: PageId, page: &mut Page) -> KvResult {
        assert!(page_id < self.page_num);

        if page.is_dirty() {
            self.file
                .seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
            self.file.write_all(page.as_bytes())?;
            page.mark_clean();
        }
        Ok(())
    }

    pub fn flush(&mut self) -> KvResult {
        self.file.sync_all()?;
        Ok(())
    }

    /// Grow the file by one page and return the id of the new page.
    pub fn allocate_new_page(&mut self) -> KvResult<PageId> {
        let page_id = self.page_num;
        self.file
            .set_len((self.page_num as u64 + 1) * PAGE_SIZE as u64)?;
        self.page_num += 1;

        debug!("allocate page {} in {:?}", page_id, self.file_path);
        Ok(page_id)
    }

    /// Truncate the file to zero length, all pages are dropped.
    pub fn clear_file(&mut self) -> KvResult {
        self.file.set_len(0)?;
        self.page_num = 0;
        Ok(())
    }
}
