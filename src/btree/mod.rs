/*
Everything below the transaction layer lives here: pages and
their checksums, the disk manager which reads and writes whole
pages, the buffer manager which caches them, and the b-tree whose
nodes are views over the cached pages.
*/

pub mod buffer_manager;
pub mod disk_manager;
pub mod node;
pub mod page;
pub mod tree;

pub use buffer_manager::{BufferManager, DEFAULT_BUFFER_CAPACITY};
pub use node::{Node, MAX_ENTRY_LEN, ORDER};
pub use page::{Page, PAGE_SIZE};
pub use tree::BTree;
