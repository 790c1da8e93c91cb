//! Type-safe identifier wrappers.
//!
//! Hosts and infections carry strongly-typed UUID v7 identifiers so that a
//! host id can never be passed where an infection id is expected. Antibody
//! handles are plain indices into a host's antibody store and are only
//! meaningful for the host that issued them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a host individual.
    HostId
}

define_id! {
    /// Unique identifier for a single infection instance inside a host.
    InfectionId
}

/// Handle to an antibody held in a host's antibody store.
///
/// The handle is a lookup key only: the infection that holds it never owns
/// or frees the antibody. Handles are issued by the store and are stable
/// for the store's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AntibodyId(pub u32);

impl AntibodyId {
    /// Return the store index this handle refers to.
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for AntibodyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ab#{}", self.0)
    }
}
