//! Opaque 128-bit identifiers for every entity in the data model.
//!
//! Each id is a distinct newtype around `Uuid` so the compiler rejects mixing
//! e.g. a `TriviaId` where a `UserId` is expected. None of these expose their
//! internal representation beyond `Display`/(de)serialization as a string.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
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
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(UserId);
id_type!(TriviaId);
id_type!(QuestionId);
id_type!(OptionId);
id_type!(TriviaQuestionId);
id_type!(ParticipationId);
id_type!(AnswerId);
