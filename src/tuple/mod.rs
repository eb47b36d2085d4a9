pub mod record;
pub mod schema;
pub mod value;

pub use record::{Record, Rid};
pub use schema::{Attribute, Schema};
pub use value::{DataType, Value};
