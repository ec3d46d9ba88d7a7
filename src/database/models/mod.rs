use thiserror::Error;

use crate::filter::ColumnTypes;

/// Declares a TEXT-backed enumeration with its wire/database spelling.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::database::models::InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::database::models::InvalidEnum {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod case;
pub mod client;
pub mod document;
pub mod hearing;
pub mod invoice;
pub mod user;

pub use case::{Case, CasePriority, CaseStatus};
pub use client::{Client, ClientType};
pub use document::Document;
pub use hearing::{Hearing, HearingStatus};
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus};
pub use user::{Role, User};

/// Table metadata shared by the filtered repository
pub trait Model {
    const TABLE: &'static str;
    /// Human label used in not-found messages
    const LABEL: &'static str;
    /// Columns callers may select, filter and order on
    const COLUMNS: &'static [&'static str];
    /// Postgres types of the columns above that are not TEXT
    const COLUMN_TYPES: ColumnTypes;
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid {kind} '{value}'")]
pub struct InvalidEnum {
    pub kind: &'static str,
    pub value: String,
}

impl From<InvalidEnum> for crate::error::ApiError {
    fn from(err: InvalidEnum) -> Self {
        crate::error::ApiError::field(err.kind, err.to_string())
    }
}
