use crate::common::config::{FIRST_DATA_PAGE, PageId};
use crate::error::Result;
use crate::tuple::{Record, Rid};

use super::page_layout::{is_slot_used, slot_payload};
use super::predicate::Predicate;
use super::table::Table;

/// Sequential scan state: `(page, slot, predicate)` per SPEC_FULL.md
/// §4.4.6. Pins one page at a time; never holds a pin between calls to
/// [`Scan::next`].
pub struct Scan {
    page: PageId,
    slot: usize,
    predicate: Option<Box<dyn Predicate>>,
    done: bool,
}

impl Scan {
    pub fn new(predicate: Option<Box<dyn Predicate>>) -> Self {
        Self {
            page: FIRST_DATA_PAGE,
            slot: 0,
            predicate,
            done: false,
        }
    }

    /// Advances the scan and returns the next matching tuple, or `None`
    /// once every data page has been visited.
    pub fn next(&mut self, table: &mut Table) -> Result<Option<(Rid, Record)>> {
        if self.done || self.page < FIRST_DATA_PAGE {
            return Ok(None);
        }
        loop {
            let handle = table.pool.pin_page(self.page)?;
            let found = self.scan_page(table, &handle)?;
            table.pool.unpin_page(&handle);

            if found.is_some() {
                return Ok(found);
            }

            self.slot = 0;
            self.page += 1;
            if self.page as usize >= table.pool.total_pages() {
                self.done = true;
                return Ok(None);
            }
        }
    }

    fn scan_page(
        &mut self,
        table: &Table,
        handle: &crate::storage::page::PageHandle,
    ) -> Result<Option<(Rid, Record)>> {
        while self.slot < table.capacity {
            let is_used = {
                let buf = table.pool.frame_data(handle);
                is_slot_used(buf, self.slot)
            };
            if is_used {
                let record = {
                    let buf = table.pool.frame_data(handle);
                    Record::from_bytes(
                        slot_payload(buf, table.capacity, table.record_width, self.slot).to_vec(),
                    )
                };
                let keep = match &self.predicate {
                    None => true,
                    Some(p) => p.eval(&record, &table.schema)?,
                };
                if keep {
                    let rid = Rid::new(self.page, self.slot);
                    self.slot += 1;
                    return Ok(Some((rid, record)));
                }
            }
            self.slot += 1;
        }
        Ok(None)
    }

    /// Releases scan state (SPEC_FULL.md §4.4.6's `closeScan`). Dropping a
    /// `Scan` has the same effect; this exists so callers can name the
    /// lifecycle point explicitly.
    pub fn close(self) {}
}
