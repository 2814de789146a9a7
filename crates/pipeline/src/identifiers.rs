//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging (for example)
//! a [`ProcessId`] with a [`CommitSha`] even though both are strings under the
//! hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: supervisor / Git names
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a managed process as assigned by the process supervisor.
    ///
    /// Opaque to this crate: the supervisor adapter decides the format (pm2 uses
    /// small integers, rendered here as strings).
    ProcessId
}

string_id! {
    /// A Git commit SHA (usually a 40-character lowercase hex string).
    CommitSha
}

string_id! {
    /// A fully qualified Git ref name (e.g. `"refs/heads/main"`).
    GitRef
}

string_id! {
    /// A repository remote URL in any of its forms (HTTPS, SSH, `git://`, SVN).
    ///
    /// Compared by exact string equality; no normalisation is applied.
    RepositoryUrl
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one inbound webhook delivery.
///
/// Generated when a signed request is accepted; propagated through spans so all
/// activity caused by one delivery can be correlated in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    /// Generates a new random delivery identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`DeliveryId`] from an existing UUID (e.g. GitHub's
    /// `X-GitHub-Delivery` header).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
