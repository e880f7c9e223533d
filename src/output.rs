//! JSON inspection export (feature `serde`).
//!
//! The export mirrors the ownership tree — states → actions → (outcomes →)
//! sparse transitions — so a model can be dumped, diffed, and reloaded
//! without touching the builder API.

use crate::GenericMdp;

impl<A: serde::Serialize> GenericMdp<A> {
    /// Pretty-printed JSON of the full state→action→transition tree.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
