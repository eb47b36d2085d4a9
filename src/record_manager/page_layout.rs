use crate::common::config::PAGE_SIZE;

/// Byte offset of the `slots_used` header field (SPEC_FULL.md §3).
pub const HEADER_LEN: usize = 4;

/// Number of slots a data page can hold for a given record width:
/// `M = floor((PAGE_SIZE - 4) / (R + 1))`, one directory byte plus `R`
/// payload bytes per slot.
pub fn slot_capacity(record_width: usize) -> usize {
    (PAGE_SIZE - HEADER_LEN) / (record_width + 1)
}

fn dir_offset() -> usize {
    HEADER_LEN
}

fn payload_region_offset(capacity: usize) -> usize {
    HEADER_LEN + capacity
}

pub fn read_slots_used(page: &[u8]) -> u32 {
    u32::from_ne_bytes(page[0..4].try_into().unwrap())
}

pub fn write_slots_used(page: &mut [u8], count: u32) {
    page[0..4].copy_from_slice(&count.to_ne_bytes());
}

pub fn is_slot_used(page: &[u8], slot: usize) -> bool {
    page[dir_offset() + slot] != 0
}

pub fn set_slot_used(page: &mut [u8], slot: usize, used: bool) {
    page[dir_offset() + slot] = if used { 1 } else { 0 };
}

pub fn slot_payload<'a>(page: &'a [u8], capacity: usize, record_width: usize, slot: usize) -> &'a [u8] {
    let start = payload_region_offset(capacity) + slot * record_width;
    &page[start..start + record_width]
}

pub fn slot_payload_mut<'a>(
    page: &'a mut [u8],
    capacity: usize,
    record_width: usize,
    slot: usize,
) -> &'a mut [u8] {
    let start = payload_region_offset(capacity) + slot * record_width;
    &mut page[start..start + record_width]
}

/// Counts the 1-bytes in the slot directory; should equal `slots_used`
/// whenever P5 holds.
pub fn count_used_slots(page: &[u8], capacity: usize) -> usize {
    (0..capacity).filter(|&slot| is_slot_used(page, slot)).count()
}

pub fn init_empty_data_page(page: &mut [u8]) {
    page.fill(0);
    write_slots_used(page, 0);
}
