use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use log::debug;

use crate::common::config::{PageId, PAGE_SIZE};
use crate::error::{Result, StorageError};

/// `DiskManager` is the page file of SPEC_FULL.md §4.1: a flat file of
/// `PAGE_SIZE`-byte blocks addressed by zero-based page number. It performs
/// no caching and no concurrency mediation — the buffer pool is its sole
/// caller.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    file_name: String,
    total_pages: usize,
    num_reads: u64,
    num_writes: u64,
}

impl DiskManager {
    /// Creates a page file containing exactly one zero-filled page. Fails
    /// if a file already exists at `path` or cannot be created.
    pub fn create(path: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.write_all(&[0u8; PAGE_SIZE])?;
        file.flush()?;
        Ok(())
    }

    /// Removes the page file.
    pub fn destroy(path: &str) -> Result<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Opens an existing page file for random-access read/write and
    /// determines its current page count.
    pub fn open(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(StorageError::FileNotFound(path.to_string()));
        }
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len() as usize;
        let total_pages = len / PAGE_SIZE;
        Ok(Self {
            file,
            file_name: path.to_string(),
            total_pages,
            num_reads: 0,
            num_writes: 0,
        })
    }

    /// No-op beyond dropping the handle: the OS closes the descriptor when
    /// the file is dropped. Kept as an explicit method so callers can name
    /// the lifecycle step the way SPEC_FULL.md §4.1 does.
    pub fn close(self) {
        drop(self);
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn num_reads(&self) -> u64 {
        self.num_reads
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes
    }

    /// Reads block `page_num` into `buf`, which must be exactly `PAGE_SIZE`
    /// bytes. A short physical read (possible only if the file was
    /// truncated out from under us) is zero-padded. Fails if `page_num` is
    /// out of range.
    pub fn read_block(&mut self, page_num: PageId, buf: &mut [u8]) -> Result<()> {
        assert_eq!(buf.len(), PAGE_SIZE);
        if page_num < 0 || page_num as usize >= self.total_pages {
            return Err(StorageError::Precondition(format!(
                "page {page_num} out of range (total_pages={})",
                self.total_pages
            )));
        }
        let offset = page_num as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let read_count = self.file.read(buf)?;
        if read_count < PAGE_SIZE {
            debug!("short read on page {page_num}, zero-padding");
            buf[read_count..].fill(0);
        }
        self.num_reads += 1;
        Ok(())
    }

    /// Writes `buf` (exactly `PAGE_SIZE` bytes) to block `page_num`.
    /// `page_num` must already be within capacity; growth happens only via
    /// [`DiskManager::ensure_capacity`] / [`DiskManager::append_empty_block`].
    pub fn write_block(&mut self, page_num: PageId, buf: &[u8]) -> Result<()> {
        assert_eq!(buf.len(), PAGE_SIZE);
        if page_num < 0 || page_num as usize >= self.total_pages {
            return Err(StorageError::Precondition(format!(
                "page {page_num} out of range (total_pages={})",
                self.total_pages
            )));
        }
        let offset = page_num as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        self.file.flush()?;
        self.num_writes += 1;
        Ok(())
    }

    /// Zero-fills and appends one page, growing `total_pages` by one.
    pub fn append_empty_block(&mut self) -> Result<PageId> {
        let new_page = self.total_pages as PageId;
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;
        self.file.flush()?;
        self.total_pages += 1;
        self.num_writes += 1;
        Ok(new_page)
    }

    /// Appends empty blocks until `total_pages >= num_pages`.
    pub fn ensure_capacity(&mut self, num_pages: usize) -> Result<()> {
        while self.total_pages < num_pages {
            self.append_empty_block()?;
        }
        Ok(())
    }
}
