use crate::buffer::BufferPoolManager;
use crate::common::config::{
    FIRST_DATA_PAGE, DEFAULT_TABLE_POOL_SIZE, NO_PAGE, PAGE_SIZE, PageId, ReplacementStrategy,
};
use crate::error::{Result, StorageError};
use crate::storage::disk::DiskManager;
use crate::tuple::{Attribute, DataType, Record, Rid, Schema};

use super::page_layout::{
    init_empty_data_page, is_slot_used, read_slots_used, set_slot_used, slot_capacity,
    slot_payload, slot_payload_mut, write_slots_used,
};

/// An open table: its schema, the buffer pool bound to its page file, and
/// the two cached counters persisted on page 0 (SPEC_FULL.md §3, §4.4.1).
#[derive(Debug)]
pub struct Table {
    pub(crate) schema: Schema,
    pub(crate) pool: BufferPoolManager,
    pub(crate) record_width: usize,
    pub(crate) capacity: usize,
    num_tuples: usize,
    next_free_page: PageId,
}

impl Table {
    /// Creates the page file, writes a fresh page-0 metadata block, and
    /// shuts the pool back down (SPEC_FULL.md §4.4.1).
    pub fn create(path: &str, schema: Schema) -> Result<()> {
        DiskManager::create(path)?;
        let mut pool =
            BufferPoolManager::init(path, DEFAULT_TABLE_POOL_SIZE, ReplacementStrategy::default())?;
        let metadata = encode_metadata(&schema, 0, NO_PAGE)?;
        let handle = pool.pin_page(0)?;
        {
            let buf = pool.frame_data_mut(&handle);
            buf.fill(0);
            buf[..metadata.len()].copy_from_slice(metadata.as_bytes());
        }
        pool.mark_dirty(&handle)?;
        pool.unpin_page(&handle);
        pool.force_flush_pool()?;
        pool.shutdown()
    }

    /// Opens the page file's buffer pool and reconstructs the schema from
    /// page 0, including the persisted key-attribute set (REDESIGN FLAGS).
    pub fn open(path: &str) -> Result<Self> {
        let mut pool =
            BufferPoolManager::init(path, DEFAULT_TABLE_POOL_SIZE, ReplacementStrategy::default())?;
        let handle = pool.pin_page(0)?;
        let (schema, num_tuples, next_free_page) = {
            let buf = pool.frame_data(&handle);
            decode_metadata(buf)?
        };
        pool.unpin_page(&handle);
        let record_width = schema.record_width();
        let capacity = slot_capacity(record_width);
        Ok(Self {
            schema,
            pool,
            record_width,
            capacity,
            num_tuples,
            next_free_page,
        })
    }

    /// Writes metadata back to page 0, flushes, and shuts the pool down
    /// (SPEC_FULL.md §4.4.1).
    pub fn close(mut self) -> Result<()> {
        self.write_metadata()?;
        self.pool.force_flush_pool()?;
        self.pool.shutdown()
    }

    pub fn delete_table(path: &str) -> Result<()> {
        DiskManager::destroy(path)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_tuples(&self) -> usize {
        self.num_tuples
    }

    /// Number of slots per data page for this table's record width (`M`
    /// in SPEC_FULL.md §3).
    pub fn slot_capacity(&self) -> usize {
        self.capacity
    }

    fn write_metadata(&mut self) -> Result<()> {
        let metadata = encode_metadata(&self.schema, self.num_tuples, self.next_free_page)?;
        let handle = self.pool.pin_page(0)?;
        {
            let buf = self.pool.frame_data_mut(&handle);
            buf.fill(0);
            buf[..metadata.len()].copy_from_slice(metadata.as_bytes());
        }
        self.pool.mark_dirty(&handle)?;
        self.pool.unpin_page(&handle);
        Ok(())
    }

    /// Appends a fresh data page and adopts it as `next_free_page`. Page
    /// content comes back zero-filled by [`BufferPoolManager::pin_page`]'s
    /// capacity growth, so no direct disk write is needed here (REDESIGN
    /// FLAGS: record manager I/O stays routed through the pool).
    fn allocate_data_page(&mut self) -> Result<()> {
        let new_page = self.pool.total_pages() as PageId;
        let handle = self.pool.pin_page(new_page)?;
        {
            let buf = self.pool.frame_data_mut(&handle);
            init_empty_data_page(buf);
        }
        self.pool.mark_dirty(&handle)?;
        self.pool.unpin_page(&handle);
        self.next_free_page = new_page;
        Ok(())
    }

    /// Places `record` on the page named by `next_free_page`, allocating a
    /// new data page first if there isn't one (SPEC_FULL.md §4.4.2).
    pub fn insert(&mut self, record: &Record) -> Result<Rid> {
        if self.next_free_page < FIRST_DATA_PAGE {
            self.allocate_data_page()?;
        }
        loop {
            let page = self.next_free_page;
            let handle = self.pool.pin_page(page)?;
            let slot = {
                let buf = self.pool.frame_data(&handle);
                (0..self.capacity).find(|&s| !is_slot_used(buf, s))
            };
            match slot {
                Some(slot) => {
                    let used = {
                        let buf = self.pool.frame_data_mut(&handle);
                        slot_payload_mut(buf, self.capacity, self.record_width, slot)
                            .copy_from_slice(record.as_bytes());
                        set_slot_used(buf, slot, true);
                        let used = read_slots_used(buf) + 1;
                        write_slots_used(buf, used);
                        used as usize
                    };
                    self.pool.mark_dirty(&handle)?;
                    self.pool.unpin_page(&handle);
                    self.num_tuples += 1;
                    if used == self.capacity {
                        self.next_free_page = NO_PAGE;
                    }
                    return Ok(Rid::new(page, slot));
                }
                None => {
                    // stale hint: the page claims free space but every slot
                    // is occupied. Clear the hint and retry from scratch.
                    self.pool.unpin_page(&handle);
                    self.next_free_page = NO_PAGE;
                    self.allocate_data_page()?;
                }
            }
        }
    }

    /// Reads the record named by `rid` (SPEC_FULL.md §4.4.5).
    pub fn get(&mut self, rid: Rid) -> Result<Record> {
        let handle = self.pool.pin_page(rid.page)?;
        let result = {
            let buf = self.pool.frame_data(&handle);
            if is_slot_used(buf, rid.slot) {
                Ok(Record::from_bytes(
                    slot_payload(buf, self.capacity, self.record_width, rid.slot).to_vec(),
                ))
            } else {
                Err(StorageError::SlotEmpty)
            }
        };
        self.pool.unpin_page(&handle);
        result
    }

    /// Overwrites the slot's payload in place (SPEC_FULL.md §4.4.4).
    pub fn update(&mut self, rid: Rid, record: &Record) -> Result<()> {
        let handle = self.pool.pin_page(rid.page)?;
        let used = {
            let buf = self.pool.frame_data(&handle);
            is_slot_used(buf, rid.slot)
        };
        if !used {
            self.pool.unpin_page(&handle);
            return Err(StorageError::SlotEmpty);
        }
        {
            let buf = self.pool.frame_data_mut(&handle);
            slot_payload_mut(buf, self.capacity, self.record_width, rid.slot)
                .copy_from_slice(record.as_bytes());
        }
        self.pool.mark_dirty(&handle)?;
        self.pool.unpin_page(&handle);
        Ok(())
    }

    /// Clears the slot; a free slot is a silent no-op (SPEC_FULL.md §4.4.3,
    /// §7).
    pub fn delete(&mut self, rid: Rid) -> Result<()> {
        let handle = self.pool.pin_page(rid.page)?;
        let (used_before, already_free) = {
            let buf = self.pool.frame_data(&handle);
            (read_slots_used(buf) as usize, !is_slot_used(buf, rid.slot))
        };
        if already_free {
            self.pool.unpin_page(&handle);
            return Ok(());
        }
        let was_full = used_before == self.capacity;
        {
            let buf = self.pool.frame_data_mut(&handle);
            set_slot_used(buf, rid.slot, false);
            write_slots_used(buf, (used_before - 1) as u32);
        }
        self.pool.mark_dirty(&handle)?;
        self.pool.unpin_page(&handle);
        self.num_tuples -= 1;
        if was_full {
            self.next_free_page = rid.page;
        }
        Ok(())
    }
}

/// Serializes page-0 metadata (SPEC_FULL.md §3, §6) plus the persisted
/// key-attribute line added by REDESIGN FLAGS. Fails with `Precondition`
/// if the result would not fit in one page (REDESIGN FLAGS: metadata page
/// bound).
fn encode_metadata(schema: &Schema, num_tuples: usize, next_free_page: PageId) -> Result<String> {
    let mut text = format!("{num_tuples} {next_free_page}\n{}\n", schema.num_attrs());
    for attr in schema.attributes() {
        text.push_str(&format!(
            "{} {} {}\n",
            attr.data_type.code(),
            attr.length,
            attr.name
        ));
    }
    let key_list = schema
        .key_attrs()
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    text.push_str(&format!("{} {}\n", schema.key_attrs().len(), key_list));

    if text.len() > PAGE_SIZE {
        return Err(StorageError::Precondition(format!(
            "table metadata is {} bytes, exceeds page size {}",
            text.len(),
            PAGE_SIZE
        )));
    }
    Ok(text)
}

fn decode_metadata(page: &[u8]) -> Result<(Schema, usize, PageId)> {
    let end = page.iter().position(|&b| b == 0).unwrap_or(page.len());
    let text = std::str::from_utf8(&page[..end])
        .map_err(|e| StorageError::Precondition(format!("corrupt table metadata: {e}")))?;
    let mut lines = text.lines();

    let header = lines
        .next()
        .ok_or_else(|| StorageError::Precondition("missing metadata header line".to_string()))?;
    let mut header_parts = header.split_whitespace();
    let num_tuples: usize = parse_field(header_parts.next(), "num_tuples")?;
    let next_free_page: PageId = parse_field(header_parts.next(), "next_free_page")?;

    let num_attr_line = lines
        .next()
        .ok_or_else(|| StorageError::Precondition("missing attribute count line".to_string()))?;
    let num_attr: usize = parse_field(Some(num_attr_line), "num_attr")?;

    let mut attributes = Vec::with_capacity(num_attr);
    for _ in 0..num_attr {
        let line = lines
            .next()
            .ok_or_else(|| StorageError::Precondition("missing attribute line".to_string()))?;
        let mut parts = line.split_whitespace();
        let type_code: u8 = parse_field(parts.next(), "type_code")?;
        let type_length: usize = parse_field(parts.next(), "type_length")?;
        let name = parts
            .next()
            .ok_or_else(|| StorageError::Precondition("missing attribute name".to_string()))?;
        let data_type = DataType::from_code(type_code)
            .ok_or_else(|| StorageError::Precondition(format!("unknown type code {type_code}")))?;
        attributes.push(Attribute::new(name, data_type, type_length));
    }

    let key_line = lines
        .next()
        .ok_or_else(|| StorageError::Precondition("missing key-attribute line".to_string()))?;
    let mut key_parts = key_line.split_whitespace();
    let num_keys: usize = parse_field(key_parts.next(), "num_keys")?;
    let mut key_attrs = Vec::with_capacity(num_keys);
    for _ in 0..num_keys {
        key_attrs.push(parse_field(key_parts.next(), "key_attr")?);
    }

    Ok((Schema::new(attributes, key_attrs), num_tuples, next_free_page))
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, label: &str) -> Result<T> {
    field
        .ok_or_else(|| StorageError::Precondition(format!("missing metadata field: {label}")))?
        .parse()
        .map_err(|_| StorageError::Precondition(format!("malformed metadata field: {label}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::Value;
    use tempdir::TempDir;

    fn table_schema() -> Schema {
        Schema::new(
            vec![Attribute::int("id"), Attribute::string("name", 8)],
            vec![0],
        )
    }

    fn new_table(dir: &TempDir, name: &str, schema: Schema) -> Table {
        let path = dir.path().join(name);
        let path = path.to_str().unwrap();
        Table::create(path, schema).unwrap();
        Table::open(path).unwrap()
    }

    #[test]
    fn create_open_round_trips_schema_and_keys() {
        let dir = TempDir::new("table").unwrap();
        let table = new_table(&dir, "t.db", table_schema());
        assert_eq!(table.schema().num_attrs(), 2);
        assert_eq!(table.schema().key_attrs(), &[0]);
        assert_eq!(table.num_tuples(), 0);
        table.close().unwrap();
    }

    #[test]
    fn insert_then_get_round_trips_payload() {
        let dir = TempDir::new("table").unwrap();
        let mut table = new_table(&dir, "t.db", table_schema());
        let record = Record::from_values(
            &table.schema,
            &[Value::Int(42), Value::Str("alice".to_string())],
        )
        .unwrap();
        let rid = table.insert(&record).unwrap();
        let fetched = table.get(rid).unwrap();
        assert_eq!(fetched.as_bytes(), record.as_bytes());
        assert_eq!(table.num_tuples(), 1);
        table.close().unwrap();
    }

    #[test]
    fn delete_then_get_is_slot_empty() {
        let dir = TempDir::new("table").unwrap();
        let mut table = new_table(&dir, "t.db", table_schema());
        let record =
            Record::from_values(&table.schema, &[Value::Int(1), Value::Str("a".to_string())])
                .unwrap();
        let rid = table.insert(&record).unwrap();
        table.delete(rid).unwrap();
        assert_eq!(table.num_tuples(), 0);
        assert!(matches!(table.get(rid), Err(StorageError::SlotEmpty)));
        table.close().unwrap();
    }

    #[test]
    fn delete_of_free_slot_is_noop() {
        let dir = TempDir::new("table").unwrap();
        let mut table = new_table(&dir, "t.db", table_schema());
        let record =
            Record::from_values(&table.schema, &[Value::Int(1), Value::Str("a".to_string())])
                .unwrap();
        let rid = table.insert(&record).unwrap();
        table.delete(rid).unwrap();
        assert!(table.delete(rid).is_ok());
        assert_eq!(table.num_tuples(), 0);
        table.close().unwrap();
    }

    #[test]
    fn update_overwrites_payload_without_changing_count() {
        let dir = TempDir::new("table").unwrap();
        let mut table = new_table(&dir, "t.db", table_schema());
        let record =
            Record::from_values(&table.schema, &[Value::Int(1), Value::Str("a".to_string())])
                .unwrap();
        let rid = table.insert(&record).unwrap();
        let updated =
            Record::from_values(&table.schema, &[Value::Int(1), Value::Str("b".to_string())])
                .unwrap();
        table.update(rid, &updated).unwrap();
        assert_eq!(table.get(rid).unwrap().as_bytes(), updated.as_bytes());
        assert_eq!(table.num_tuples(), 1);
        table.close().unwrap();
    }

    #[test]
    fn update_of_free_slot_fails() {
        let dir = TempDir::new("table").unwrap();
        let mut table = new_table(&dir, "t.db", table_schema());
        let record =
            Record::from_values(&table.schema, &[Value::Int(1), Value::Str("a".to_string())])
                .unwrap();
        let rid = table.insert(&record).unwrap();
        table.delete(rid).unwrap();
        assert!(matches!(
            table.update(rid, &record),
            Err(StorageError::SlotEmpty)
        ));
        table.close().unwrap();
    }

    #[test]
    fn page_fills_then_spills_to_next_page() {
        let dir = TempDir::new("table").unwrap();
        let mut table = new_table(&dir, "t.db", table_schema());
        let capacity = table.capacity;
        let mut last_rid = None;
        for i in 0..(capacity as i32 + 1) {
            let record = Record::from_values(
                &table.schema,
                &[Value::Int(i), Value::Str("x".to_string())],
            )
            .unwrap();
            last_rid = Some(table.insert(&record).unwrap());
        }
        let last_rid = last_rid.unwrap();
        assert_eq!(last_rid.page, FIRST_DATA_PAGE + 1);
        assert_eq!(last_rid.slot, 0);
        table.close().unwrap();
    }

    #[test]
    fn metadata_survives_reopen() {
        let dir = TempDir::new("table").unwrap();
        let path = dir.path().join("t.db");
        let path = path.to_str().unwrap();
        Table::create(path, table_schema()).unwrap();
        let mut table = Table::open(path).unwrap();
        let record =
            Record::from_values(&table.schema, &[Value::Int(9), Value::Str("z".to_string())])
                .unwrap();
        table.insert(&record).unwrap();
        table.close().unwrap();

        let reopened = Table::open(path).unwrap();
        assert_eq!(reopened.num_tuples(), 1);
        assert_eq!(reopened.schema().key_attrs(), &[0]);
        reopened.close().unwrap();
    }

    use super::super::page_layout::{count_used_slots, read_slots_used};
    use proptest::prelude::*;

    fn single_int_schema() -> Schema {
        Schema::new(vec![Attribute::int("n")], vec![])
    }

    proptest! {
        /// P6 / P7 — tuple count tracks inserts exactly, and every inserted
        /// record reads back byte-identical.
        #[test]
        fn p6_p7_insert_and_get_round_trip(values in prop::collection::vec(any::<i32>(), 1..15)) {
            let dir = TempDir::new("p67").unwrap();
            let table = new_table(&dir, "t.db", single_int_schema());
            let mut table = table;
            let mut rids = Vec::new();
            for v in &values {
                let record = Record::from_values(&table.schema, &[Value::Int(*v)]).unwrap();
                rids.push(table.insert(&record).unwrap());
            }
            prop_assert_eq!(table.num_tuples(), values.len());
            for (rid, v) in rids.iter().zip(values.iter()) {
                let fetched = table.get(*rid).unwrap();
                prop_assert_eq!(fetched.get_attr(&table.schema, 0), Value::Int(*v));
            }
            table.close().unwrap();
        }

        /// P8 — `update(r); update(r)` is observably the same as one update.
        #[test]
        fn p8_update_idempotent(initial in any::<i32>(), updated in any::<i32>()) {
            let dir = TempDir::new("p8").unwrap();
            let mut table = new_table(&dir, "t.db", single_int_schema());
            let rid = table
                .insert(&Record::from_values(&table.schema, &[Value::Int(initial)]).unwrap())
                .unwrap();
            let new_record = Record::from_values(&table.schema, &[Value::Int(updated)]).unwrap();
            table.update(rid, &new_record).unwrap();
            table.update(rid, &new_record).unwrap();
            prop_assert_eq!(table.get(rid).unwrap().get_attr(&table.schema, 0), Value::Int(updated));
            prop_assert_eq!(table.num_tuples(), 1);
            table.close().unwrap();
        }

        /// P5 — the slot directory's 1-count equals `slots_used` after any
        /// insert/delete sequence.
        #[test]
        fn p5_slot_directory_matches_slots_used(
            n_insert in 1usize..8,
            delete_mask in prop::collection::vec(any::<bool>(), 0..8),
        ) {
            let dir = TempDir::new("p5").unwrap();
            let mut table = new_table(&dir, "t.db", single_int_schema());
            let mut rids = Vec::new();
            for i in 0..n_insert {
                let record = Record::from_values(&table.schema, &[Value::Int(i as i32)]).unwrap();
                rids.push(table.insert(&record).unwrap());
            }
            for (i, &should_delete) in delete_mask.iter().enumerate() {
                if should_delete && i < rids.len() {
                    table.delete(rids[i]).unwrap();
                }
            }
            let page = rids[0].page;
            let handle = table.pool.pin_page(page).unwrap();
            let used_count = {
                let buf = table.pool.frame_data(&handle);
                (count_used_slots(buf, table.capacity) as u32, read_slots_used(buf))
            };
            table.pool.unpin_page(&handle);
            prop_assert_eq!(used_count.0, used_count.1);
            table.close().unwrap();
        }
    }
}
