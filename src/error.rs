//! Error types shared by the containers.

use std::collections::TryReserveError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Growing or creating storage failed; the container is unchanged.
    #[error("allocation failed while {context}")]
    Alloc {
        context: &'static str,
        #[source]
        source: TryReserveError,
    },

    /// Maximum load factor must be finite and strictly positive.
    #[error("invalid max load factor: {0}")]
    InvalidLoadFactor(f32),
}

impl Error {
    pub(crate) fn alloc(context: &'static str) -> impl FnOnce(TryReserveError) -> Self {
        move |source| Error::Alloc { context, source }
    }
}

/// Rejected `AaTree::insert`. The offered node stays in the arena, unattached.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    #[error("key {key} is already present in the tree")]
    DuplicateKey { key: u32 },

    #[error("node handle does not refer to a live node")]
    StaleHandle,

    #[error("node is already attached to the tree")]
    AlreadyAttached,
}
