//! Opaque identifiers minted by the adapter.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Random v4 id newtype, serialized as the bare uuid string.
macro_rules! random_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

random_id!(
    /// Handed back by LoadMMUs for each freshly created unit instance.
    InstanceToken
);

random_id!(
    /// One per inbound transport connection.
    ConnectionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(InstanceToken::new(), InstanceToken::new());
    }

    #[test]
    fn test_display_and_wire_form_are_the_uuid() {
        let uuid = Uuid::new_v4();
        let token = InstanceToken::from(uuid);
        assert_eq!(token.to_string(), uuid.to_string());
        assert_eq!(
            serde_json::to_string(&token).unwrap(),
            format!("\"{uuid}\"")
        );
        assert_eq!(token.uuid(), uuid);
    }
}
