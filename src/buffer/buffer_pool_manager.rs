use std::collections::HashMap;

use super::replacer::LeastUsageReplacer;
use crate::common::config::{FrameId, PageId, ReplacementStrategy, NO_PAGE, PAGE_SIZE};
use crate::error::{Result, StorageError};
use crate::storage::disk::DiskManager;
use crate::storage::page::{Frame, PageHandle};

/// `BufferPoolManager` owns an array of `N` page frames and translates
/// page-number requests into frame accesses, reading from disk on miss and
/// writing back on eviction or explicit flush (SPEC_FULL.md §2, §4.2).
#[derive(Debug)]
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    disk: DiskManager,
    replacer: LeastUsageReplacer,
    strategy: ReplacementStrategy,
    read_io: u64,
    write_io: u64,
}

impl BufferPoolManager {
    /// Opens the page file at `file_name` and allocates `num_pages` frames,
    /// each in the unloaded state. `strategy` is recorded for
    /// observability; only [`ReplacementStrategy::Lru`] (the least-usage
    /// policy of §4.2.1) has a victim-selection implementation.
    pub fn init(file_name: &str, num_pages: usize, strategy: ReplacementStrategy) -> Result<Self> {
        let disk = DiskManager::open(file_name)?;
        Ok(Self {
            pool_size: num_pages,
            frames: (0..num_pages).map(|_| Frame::new()).collect(),
            page_table: HashMap::new(),
            disk,
            replacer: LeastUsageReplacer::new(),
            strategy,
            read_io: 0,
            write_io: 0,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn strategy(&self) -> ReplacementStrategy {
        self.strategy
    }

    pub fn num_read_io(&self) -> u64 {
        self.read_io
    }

    pub fn num_write_io(&self) -> u64 {
        self.write_io
    }

    pub fn total_pages(&self) -> usize {
        self.disk.total_pages()
    }

    /// Entry *i* is the page currently resident in frame *i*, or
    /// [`NO_PAGE`] if the frame is free (SPEC_FULL.md §6).
    pub fn frame_contents(&self) -> Vec<PageId> {
        self.frames
            .iter()
            .map(|f| f.page_num().unwrap_or(NO_PAGE))
            .collect()
    }

    pub fn dirty_flags(&self) -> Vec<bool> {
        self.frames.iter().map(Frame::is_dirty).collect()
    }

    pub fn fix_counts(&self) -> Vec<usize> {
        self.frames.iter().map(Frame::fix_count).collect()
    }

    /// Pins `page_num`, loading it from disk on miss. See SPEC_FULL.md
    /// §4.2 for the full placement/eviction/read sequence.
    pub fn pin_page(&mut self, page_num: PageId) -> Result<PageHandle> {
        if page_num < 0 {
            return Err(StorageError::Precondition(format!(
                "negative page number: {page_num}"
            )));
        }

        if let Some(&frame_id) = self.page_table.get(&page_num) {
            let frame = &mut self.frames[frame_id];
            frame.pin();
            frame.touch();
            return Ok(PageHandle::new(page_num, frame_id));
        }

        let frame_id = self.placement_frame()?;

        if let Some(old_page) = self.frames[frame_id].page_num() {
            if self.frames[frame_id].is_dirty() {
                self.write_back(frame_id, old_page)?;
            }
            self.page_table.remove(&old_page);
        }

        self.disk.ensure_capacity(page_num as usize + 1)?;
        let mut buf = vec![0u8; PAGE_SIZE];
        self.disk.read_block(page_num, &mut buf)?;
        self.read_io += 1;

        self.frames[frame_id].load(page_num, &buf);
        self.page_table.insert(page_num, frame_id);

        Ok(PageHandle::new(page_num, frame_id))
    }

    /// Picks a frame to place an incoming page into: any free frame first,
    /// otherwise the replacer's victim. REDESIGN FLAGS: fails instead of
    /// the original's silent frame-0 fallback when every frame is pinned.
    fn placement_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.frames.iter().position(Frame::is_free) {
            return Ok(frame_id);
        }
        self.replacer.victim(&self.frames).ok_or_else(|| {
            StorageError::Precondition("buffer pool exhausted: every frame is pinned".to_string())
        })
    }

    fn write_back(&mut self, frame_id: FrameId, page_num: PageId) -> Result<()> {
        self.disk
            .write_block(page_num, self.frames[frame_id].data())?;
        self.write_io += 1;
        self.frames[frame_id].set_dirty(false);
        Ok(())
    }

    /// Decrements the pinned frame's `fix_count`; a no-op if it is already
    /// zero or the page is not resident.
    pub fn unpin_page(&mut self, handle: &PageHandle) -> bool {
        match self.page_table.get(&handle.page_num) {
            Some(&frame_id) => self.frames[frame_id].unpin(),
            None => false,
        }
    }

    pub fn mark_dirty(&mut self, handle: &PageHandle) -> Result<()> {
        let frame_id = self.frame_id_for(handle.page_num)?;
        self.frames[frame_id].set_dirty(true);
        Ok(())
    }

    /// Writes the frame back regardless of its dirty flag, then clears it.
    pub fn force_page(&mut self, handle: &PageHandle) -> Result<()> {
        let frame_id = self.frame_id_for(handle.page_num)?;
        if self.frames[frame_id].is_dirty() {
            self.write_back(frame_id, handle.page_num)?;
        }
        Ok(())
    }

    /// Writes back every frame with `dirty && fix_count == 0`. A barrier:
    /// on return, every such frame has been written (SPEC_FULL.md §5).
    pub fn force_flush_pool(&mut self) -> Result<()> {
        let candidates: Vec<(FrameId, PageId)> = self
            .frames
            .iter()
            .enumerate()
            .filter_map(|(id, f)| {
                if f.is_dirty() && f.fix_count() == 0 {
                    f.page_num().map(|p| (id, p))
                } else {
                    None
                }
            })
            .collect();
        for (frame_id, page_num) in candidates {
            self.write_back(frame_id, page_num)?;
        }
        Ok(())
    }

    /// Flushes, verifies no frame remains pinned, then consumes the pool.
    pub fn shutdown(mut self) -> Result<()> {
        self.force_flush_pool()?;
        if let Some(frame_id) = self.frames.iter().position(|f| f.fix_count() > 0) {
            return Err(StorageError::Precondition(format!(
                "cannot shut down buffer pool: frame {frame_id} is still pinned"
            )));
        }
        Ok(())
    }

    pub fn frame_data<'a>(&'a self, handle: &PageHandle) -> &'a [u8] {
        self.frames[handle.frame_id].data()
    }

    pub fn frame_data_mut<'a>(&'a mut self, handle: &PageHandle) -> &'a mut [u8] {
        self.frames[handle.frame_id].data_mut()
    }

    fn frame_id_for(&self, page_num: PageId) -> Result<FrameId> {
        self.page_table
            .get(&page_num)
            .copied()
            .ok_or_else(|| StorageError::Precondition(format!("page {page_num} is not resident")))
    }
}
