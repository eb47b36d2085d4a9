use crate::common::config::PageId;
use crate::error::{Result, StorageError};
use crate::tuple::schema::Schema;
use crate::tuple::value::{DataType, Value};

/// Identifies a tuple by the data page it lives on and its slot number
/// within that page's slot directory (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page: PageId,
    pub slot: usize,
}

impl Rid {
    pub fn new(page: PageId, slot: usize) -> Self {
        Self { page, slot }
    }
}

/// A fixed-width tuple buffer, exactly `schema.record_width()` bytes, laid
/// out attribute-by-attribute at the offsets `schema` computes
/// (SPEC_FULL.md §4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    bytes: Vec<u8>,
}

impl Record {
    /// A zero-filled record matching `schema`'s width.
    pub fn empty(schema: &Schema) -> Self {
        Self {
            bytes: vec![0u8; schema.record_width()],
        }
    }

    /// Builds a record from values given in attribute order, type-checking
    /// each against the schema.
    pub fn from_values(schema: &Schema, values: &[Value]) -> Result<Self> {
        if values.len() != schema.num_attrs() {
            return Err(StorageError::Precondition(format!(
                "expected {} values, got {}",
                schema.num_attrs(),
                values.len()
            )));
        }
        let mut record = Self::empty(schema);
        for (idx, value) in values.iter().enumerate() {
            record.set_attr(schema, idx, value)?;
        }
        Ok(record)
    }

    /// Wraps an existing byte buffer copied out of a data page, e.g. by
    /// the record manager's scan path.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Reads attribute `attr_index` out of the record.
    ///
    /// INT/FLOAT/BOOL are the raw native-endian bytes of the fixed width;
    /// STRING is the full `type_length` window with trailing zero bytes
    /// trimmed off (SPEC_FULL.md §4.3).
    pub fn get_attr(&self, schema: &Schema, attr_index: usize) -> Value {
        let attr = schema.attribute(attr_index);
        let offset = schema.offset(attr_index);
        let width = attr.width();
        let slice = &self.bytes[offset..offset + width];
        match attr.data_type {
            DataType::Int => Value::Int(i32::from_ne_bytes(slice.try_into().unwrap())),
            DataType::Float => Value::Float(f32::from_ne_bytes(slice.try_into().unwrap())),
            DataType::Bool => Value::Bool(slice[0] != 0),
            DataType::String => {
                let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
                Value::Str(String::from_utf8_lossy(&slice[..end]).into_owned())
            }
        }
    }

    /// Writes `value` into attribute `attr_index`'s slot. STRING values
    /// longer than `type_length` are rejected; shorter ones are zero-padded.
    pub fn set_attr(&mut self, schema: &Schema, attr_index: usize, value: &Value) -> Result<()> {
        let attr = schema.attribute(attr_index);
        if value.data_type() != attr.data_type {
            return Err(StorageError::Precondition(format!(
                "attribute {} expects {:?}, got {:?}",
                attr.name,
                attr.data_type,
                value.data_type()
            )));
        }
        let offset = schema.offset(attr_index);
        let width = attr.width();
        let slot = &mut self.bytes[offset..offset + width];
        match value {
            Value::Int(v) => slot.copy_from_slice(&v.to_ne_bytes()),
            Value::Float(v) => slot.copy_from_slice(&v.to_ne_bytes()),
            Value::Bool(v) => slot[0] = if *v { 1 } else { 0 },
            Value::Str(s) => {
                let src = s.as_bytes();
                if src.len() > width {
                    return Err(StorageError::Precondition(format!(
                        "attribute {} value is {} bytes, exceeds width {}",
                        attr.name,
                        src.len(),
                        width
                    )));
                }
                slot.fill(0);
                slot[..src.len()].copy_from_slice(src);
            }
        }
        Ok(())
    }
}
