//! Bidirectional enum <-> code <-> string tables.
//!
//! Every wire-visible enum in this crate is declared through `code_enum!`,
//! which emits the enum together with one static `TABLE` of
//! `(variant, numeric code, canonical string)` rows. The forward and
//! reverse lookups are generated from the same rows, so
//! `parse(as_str(v)) == v` and `from_code(code(v)) == v` hold for every
//! variant.

use thiserror::Error;

/// A string or numeric code did not match any row of an enum table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {type_name} value '{value}'")]
pub struct UnknownVariant {
    /// Name of the enum being parsed.
    pub type_name: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $code:literal => $text:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant
            ),+
        }

        impl $name {
            /// Every variant with its numeric code and canonical string.
            pub const TABLE: &'static [($name, u16, &'static str)] = &[
                $( ($name::$variant, $code, $text) ),+
            ];

            /// Canonical string form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }

            /// Numeric code.
            pub fn code(&self) -> u16 {
                match self {
                    $( Self::$variant => $code ),+
                }
            }

            /// Look up a variant by its canonical string.
            pub fn parse(value: &str) -> Result<Self, $crate::mapping::UnknownVariant> {
                Self::TABLE
                    .iter()
                    .find(|(_, _, text)| *text == value)
                    .map(|(variant, _, _)| *variant)
                    .ok_or_else(|| $crate::mapping::UnknownVariant {
                        type_name: stringify!($name),
                        value: value.to_string(),
                    })
            }

            /// Look up a variant by its numeric code.
            pub fn from_code(code: u16) -> Result<Self, $crate::mapping::UnknownVariant> {
                Self::TABLE
                    .iter()
                    .find(|(_, c, _)| *c == code)
                    .map(|(variant, _, _)| *variant)
                    .ok_or_else(|| $crate::mapping::UnknownVariant {
                        type_name: stringify!($name),
                        value: code.to_string(),
                    })
            }

            /// Iterate over all variants in declaration order.
            pub fn all() -> impl Iterator<Item = $name> {
                Self::TABLE.iter().map(|(variant, _, _)| *variant)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::mapping::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::parse(&value).map_err(::serde::de::Error::custom)
            }
        }
    };
}
