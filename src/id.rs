//! Code for handling IDs
use anyhow::{Result, ensure};

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        /// An ID type (e.g. `CountryID`, `IsoCode`, etc.)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }

            /// View the ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id_type! {CountryID}
define_id_type! {IsoCode}

/// Check an ISO code supplied by the user and put it in canonical (upper case) form
pub fn parse_iso_code(code: &str) -> Result<IsoCode> {
    let code = code.trim();
    ensure!(
        (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic()),
        "Invalid ISO code: '{code}'"
    );

    Ok(code.to_ascii_uppercase().into())
}
