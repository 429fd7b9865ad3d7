//! Conversion between typed records and string field maps.
//!
//! Records stored in a hash slot are flattened to a map of field name to
//! string value. Each record type declares its fields once with
//! [`hash_record!`]; each field type converts itself through
//! [`FieldCodec`]:
//!
//! - timestamps (`DateTime<Utc>`) as epoch milliseconds,
//! - identifiers (`Uuid`) in canonical form,
//! - string arrays as a JSON array,
//! - enums declared with [`symbolic_enum!`] by variant name,
//! - absent (`None`) values are omitted from the map.
//!
//! Conversion is lenient: a field that cannot be read or decoded is logged
//! and skipped, and the rest of the record still converts.

mod codec;
mod error;
mod record;

pub use codec::FieldCodec;
pub use error::MarshalError;
pub use record::{
    FieldMap, FieldReader, FieldSpec, FieldWriter, HashRecord, from_field_map, to_field_map,
    try_to_field_map,
};
