mod test_utils;

use std::{
    fs::OpenOptions,
    io::{Seek, SeekFrom, Write},
};

use small_kv::btree::{BufferManager, Page, PAGE_SIZE};
use test_utils::setup;

fn page_payload(page_id: u32, round: u32) -> Vec<u8> {
    format!("page-{}-round-{}", page_id, round).into_bytes()
}

#[test]
fn test_page_checksum() {
    let mut page = Page::new(0, &[0u8; PAGE_SIZE]);
    assert!(page.is_blank());

    page.write(b"some payload", 100);
    page.update_checksum();
    assert!(!page.is_blank());
    assert!(page.confirm_checksum());

    // any change of the payload breaks the checksum
    let mut bytes = page.as_bytes().to_vec();
    bytes[PAGE_SIZE - 1] ^= 0xff;
    assert!(!Page::new(0, &bytes).confirm_checksum());
}

#[test]
#[should_panic]
fn test_page_write_into_checksum() {
    let mut page = Page::new(0, &[0u8; PAGE_SIZE]);
    page.write(b"abc", 4);
}

#[test]
fn test_eviction() {
    let dir = setup();
    let path = dir.path().join("pages.db");
    let page_count = 20;

    {
        let mut bm = BufferManager::with_capacity(&path, 4).unwrap();
        for _ in 0..page_count {
            bm.create_new_page().unwrap();
        }

        // write every page twice, the second round must win
        for round in 0..2 {
            for page_id in 0..page_count {
                bm.write_page(page_id, &page_payload(page_id, round), 8)
                    .unwrap();
                assert!(bm.resident_count() <= bm.capacity());
            }
        }
        bm.flush().unwrap();
        assert_eq!(bm.resident_count(), 0);
    }

    let mut bm = BufferManager::with_capacity(&path, 4).unwrap();
    assert_eq!(bm.page_num(), page_count);
    for page_id in (0..page_count).rev() {
        let expected = page_payload(page_id, 1);
        let buf = bm.read_page(page_id, 8, expected.len()).unwrap();
        assert_eq!(buf, expected);
    }
}

#[test]
fn test_pinned_pages_are_not_evicted() {
    let dir = setup();
    let mut bm = BufferManager::with_capacity(dir.path().join("pages.db"), 2).unwrap();
    for _ in 0..3 {
        bm.create_new_page().unwrap();
    }

    bm.pin(0).unwrap();
    bm.read_page(1, 8, 1).unwrap();
    bm.read_page(2, 8, 1).unwrap();
    assert!(bm.is_resident(0));
    assert!(!bm.is_resident(1));

    // no victim left when every slot is pinned
    bm.pin(2).unwrap();
    assert!(bm.read_page(1, 8, 1).is_err());

    bm.unpin(2);
    bm.read_page(1, 8, 1).unwrap();
    assert!(bm.is_resident(0));
    assert!(bm.is_resident(1));
}

#[test]
fn test_checksum_mismatch() {
    let dir = setup();
    let path = dir.path().join("pages.db");

    {
        let mut bm = BufferManager::new(&path).unwrap();
        bm.create_new_page().unwrap();
        bm.write_page(0, b"hello", 8).unwrap();
    }

    // flip a payload byte behind the buffer manager's back
    {
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(10)).unwrap();
        file.write_all(b"X").unwrap();
    }

    let mut bm = BufferManager::new(&path).unwrap();
    let result = bm.read_page(0, 8, 5);
    if cfg!(feature = "verify_checksum") {
        assert!(result.is_err());
    } else {
        assert_eq!(result.unwrap(), b"heXlo".to_vec());
    }
}
