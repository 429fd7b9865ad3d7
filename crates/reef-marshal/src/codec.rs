//! Per-type conversion between field values and their stored text form.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::MarshalError;

/// Conversion between a field's Rust value and its stored string form.
///
/// `encode` returns `Ok(None)` for absent values, which are left out of the
/// field map rather than stored as an empty string.
pub trait FieldCodec: Sized {
    /// Encode the value for storage.
    fn encode(&self) -> Result<Option<String>, MarshalError>;

    /// Decode a stored value.
    fn decode(raw: &str) -> Result<Self, MarshalError>;
}

impl FieldCodec for String {
    fn encode(&self) -> Result<Option<String>, MarshalError> {
        Ok(Some(self.clone()))
    }

    fn decode(raw: &str) -> Result<Self, MarshalError> {
        Ok(raw.to_string())
    }
}

/// Numbers are stored in decimal. Blank input decodes to zero.
macro_rules! numeric_codec {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FieldCodec for $ty {
                fn encode(&self) -> Result<Option<String>, MarshalError> {
                    Ok(Some(self.to_string()))
                }

                fn decode(raw: &str) -> Result<Self, MarshalError> {
                    let raw = raw.trim();
                    if raw.is_empty() {
                        return Ok(Self::default());
                    }
                    raw.parse::<$ty>()
                        .map_err(|e| MarshalError::invalid(stringify!($ty), raw, e))
                }
            }
        )+
    };
}

numeric_codec!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl FieldCodec for bool {
    fn encode(&self) -> Result<Option<String>, MarshalError> {
        Ok(Some(self.to_string()))
    }

    fn decode(raw: &str) -> Result<Self, MarshalError> {
        match raw.trim() {
            "" | "false" => Ok(false),
            "true" => Ok(true),
            other => Err(MarshalError::invalid("bool", other, "expected true or false")),
        }
    }
}

/// Timestamps are stored as epoch milliseconds. Blank input decodes to the epoch.
impl FieldCodec for DateTime<Utc> {
    fn encode(&self) -> Result<Option<String>, MarshalError> {
        Ok(Some(self.timestamp_millis().to_string()))
    }

    fn decode(raw: &str) -> Result<Self, MarshalError> {
        let millis = i64::decode(raw)?;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| MarshalError::invalid("DateTime<Utc>", raw, "timestamp out of range"))
    }
}

/// Identifiers are stored in canonical hyphenated form.
impl FieldCodec for Uuid {
    fn encode(&self) -> Result<Option<String>, MarshalError> {
        Ok(Some(self.hyphenated().to_string()))
    }

    fn decode(raw: &str) -> Result<Self, MarshalError> {
        Uuid::parse_str(raw.trim()).map_err(|e| MarshalError::invalid("Uuid", raw, e))
    }
}

/// String arrays are stored as one JSON-array string.
impl FieldCodec for Vec<String> {
    fn encode(&self) -> Result<Option<String>, MarshalError> {
        Ok(Some(serde_json::to_string(self)?))
    }

    fn decode(raw: &str) -> Result<Self, MarshalError> {
        serde_json::from_str(raw).map_err(|e| MarshalError::invalid("Vec<String>", raw, e))
    }
}

impl<T: FieldCodec> FieldCodec for Option<T> {
    fn encode(&self) -> Result<Option<String>, MarshalError> {
        match self {
            Some(value) => value.encode(),
            None => Ok(None),
        }
    }

    fn decode(raw: &str) -> Result<Self, MarshalError> {
        T::decode(raw).map(Some)
    }
}

/// Declare an enum whose variants are stored by their symbolic name.
///
/// Only fieldless variants are supported. Attributes (including
/// `#[default]`) pass through to the generated enum.
///
/// ```
/// reef_marshal::symbolic_enum! {
///     #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
///     pub enum Status {
///         #[default]
///         Draft,
///         Published,
///     }
/// }
///
/// use reef_marshal::FieldCodec;
/// assert_eq!(Status::Published.symbol(), "Published");
/// assert_eq!(Status::decode("Draft").unwrap(), Status::Draft);
/// ```
#[macro_export]
macro_rules! symbolic_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Symbolic name used when storing this value.
            pub fn symbol(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }

        impl $crate::FieldCodec for $name {
            fn encode(&self) -> ::std::result::Result<::std::option::Option<String>, $crate::MarshalError> {
                ::std::result::Result::Ok(::std::option::Option::Some(self.symbol().to_string()))
            }

            fn decode(raw: &str) -> ::std::result::Result<Self, $crate::MarshalError> {
                match raw {
                    $(stringify!($variant) => ::std::result::Result::Ok(Self::$variant),)+
                    other => ::std::result::Result::Err($crate::MarshalError::UnknownVariant {
                        target: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}
