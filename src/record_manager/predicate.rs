use crate::error::Result;
use crate::tuple::{Record, Schema};

/// The out-of-scope expression evaluator collaborator, narrowed to the
/// boolean predicate interface a scan actually needs (SPEC_FULL.md §1,
/// §4.4.6, DESIGN NOTES §9): "given a tuple and schema, yields a boolean
/// value." Kept as a trait rather than a dependency on one expression
/// library, so the record manager never needs to know how conditions are
/// expressed.
pub trait Predicate {
    fn eval(&self, record: &Record, schema: &Schema) -> Result<bool>;
}

impl<F> Predicate for F
where
    F: Fn(&Record, &Schema) -> Result<bool>,
{
    fn eval(&self, record: &Record, schema: &Schema) -> Result<bool> {
        self(record, schema)
    }
}
