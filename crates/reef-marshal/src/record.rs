//! Record schemas and whole-record conversion to and from field maps.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::MarshalError;

/// Field name → stored value, as kept in a hash slot.
pub type FieldMap = BTreeMap<String, String>;

/// Reads a field from a record. `Ok(None)` means the value is absent.
pub type FieldReader<T> = fn(&T) -> Result<Option<String>, MarshalError>;

/// Writes a decoded field into a record.
pub type FieldWriter<T> = fn(&mut T, &str) -> Result<(), MarshalError>;

/// One entry of a record's field table.
pub struct FieldSpec<T> {
    /// Name of the field in the stored map.
    pub name: &'static str,
    /// Read accessor.
    pub read: FieldReader<T>,
    /// Write accessor. `None` for read-only fields.
    pub write: Option<FieldWriter<T>>,
}

/// A type that can be stored as a hash of named string fields.
///
/// Implement it with [`hash_record!`](crate::hash_record) rather than by hand.
pub trait HashRecord: Default {
    /// The record's field table, in declaration order.
    fn fields() -> Vec<FieldSpec<Self>>;
}

/// Convert a record to a field map, leaving out absent values.
///
/// A field whose read fails is logged and left out; the rest of the map is
/// still returned.
pub fn to_field_map<T: HashRecord>(record: &T) -> FieldMap {
    let mut map = FieldMap::new();
    for spec in T::fields() {
        match (spec.read)(record) {
            Ok(Some(value)) => {
                map.insert(spec.name.to_string(), value);
            }
            Ok(None) => {}
            Err(e) => warn!(field = spec.name, %e, "skipping unreadable field"),
        }
    }
    map
}

/// Convert a record to a field map, failing on the first unreadable field.
pub fn try_to_field_map<T: HashRecord>(record: &T) -> Result<FieldMap, MarshalError> {
    let mut map = FieldMap::new();
    for spec in T::fields() {
        if let Some(value) = (spec.read)(record)? {
            map.insert(spec.name.to_string(), value);
        }
    }
    Ok(map)
}

/// Build a record from a field map.
///
/// Starts from `T::default()` and fills every declared field present in the
/// map. Read-only fields and values that fail to decode are logged and
/// skipped; map entries that match no declared field are ignored.
pub fn from_field_map<T: HashRecord>(map: &FieldMap) -> T {
    let mut record = T::default();
    for spec in T::fields() {
        let Some(raw) = map.get(spec.name) else {
            continue;
        };
        let result = match spec.write {
            Some(write) => write(&mut record, raw),
            None => Err(MarshalError::NotWritable(spec.name)),
        };
        match result {
            Ok(()) => {}
            Err(MarshalError::NotWritable(field)) => {
                debug!(field, "no write accessor, skipping field");
            }
            Err(e) => warn!(field = spec.name, %e, "skipping undecodable field"),
        }
    }
    record
}

/// Implement [`HashRecord`](crate::HashRecord) for a struct by listing its
/// fields.
///
/// Every listed field must implement [`FieldCodec`](crate::FieldCodec).
/// Fields listed under `readonly` are written to maps but never read back.
///
/// ```
/// use reef_marshal::{FieldMap, from_field_map, hash_record, to_field_map};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Chapter {
///     title: String,
///     words: i64,
///     checksum: String,
/// }
///
/// hash_record!(Chapter { title, words } readonly { checksum });
///
/// let chapter = Chapter { title: "Prologue".into(), words: 1200, checksum: "ab12".into() };
/// let map = to_field_map(&chapter);
/// assert_eq!(map["words"], "1200");
/// assert_eq!(map["checksum"], "ab12");
///
/// let back: Chapter = from_field_map(&map);
/// assert_eq!(back.title, "Prologue");
/// assert_eq!(back.checksum, "");
/// ```
#[macro_export]
macro_rules! hash_record {
    (
        $ty:ident { $($field:ident),* $(,)? }
        $(readonly { $($ro:ident),* $(,)? })?
    ) => {
        impl $crate::HashRecord for $ty {
            fn fields() -> ::std::vec::Vec<$crate::FieldSpec<Self>> {
                ::std::vec![
                    $(
                        $crate::FieldSpec {
                            name: stringify!($field),
                            read: |r: &Self| $crate::FieldCodec::encode(&r.$field),
                            write: ::std::option::Option::Some(|r: &mut Self, raw: &str| {
                                r.$field = $crate::FieldCodec::decode(raw)?;
                                ::std::result::Result::Ok(())
                            }),
                        },
                    )*
                    $($(
                        $crate::FieldSpec {
                            name: stringify!($ro),
                            read: |r: &Self| $crate::FieldCodec::encode(&r.$ro),
                            write: ::std::option::Option::None,
                        },
                    )*)?
                ]
            }
        }
    };
}
