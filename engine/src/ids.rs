//! Opaque identity types for the barter domain.
//!
//! The engine juggles three distinct id spaces (owner, item, collection)
//! that are all plain strings on the wire. Newtypes keep them from being
//! mixed up at call sites the way a bare `String` parameter would allow.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(TenantId);
string_id!(OwnerId);
string_id!(ItemId);
string_id!(CollectionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_display() {
        let owner = OwnerId::new("wallet-a");
        assert_eq!(owner.to_string(), "wallet-a");
        assert_eq!(owner.as_str(), "wallet-a");
    }

    #[test]
    fn ids_order_lexicographically() {
        let mut ids = vec![OwnerId::new("C"), OwnerId::new("A"), OwnerId::new("B")];
        ids.sort();
        assert_eq!(ids, vec![OwnerId::new("A"), OwnerId::new("B"), OwnerId::new("C")]);
    }
}
