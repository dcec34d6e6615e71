use std::{
    fmt::Display,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_PAYLOAD_ID: AtomicU64 = AtomicU64::new(1);

macro_rules! id_type {
    ($name:ident, $counter:ident, $doc:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        #[doc = $doc]
        pub struct $name(pub u64);

        impl $name {
            /// Allocates an id no other live or past object in this process has used.
            pub(crate) fn next() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

id_type!(
    KeyId,
    NEXT_KEY_ID,
    "The handle to a crypto context. Key ids are never reused within a process."
);
id_type!(
    PayloadId,
    NEXT_PAYLOAD_ID,
    "The handle to a stored ciphertext. Payload ids are never reused within a process."
);
