//! Data models for the org-chart backend.
//!
//! Record models match the frontend TypeScript interfaces for seamless interoperability.

mod datastore;
mod department;
mod employee;
mod hierarchy;

pub use datastore::*;
pub use department::*;
pub use employee::*;
pub use hierarchy::*;

use serde::{Deserialize, Deserializer};

/// Deserialize a present field, `null` included, as `Some(..)`.
///
/// Combined with `#[serde(default)]` on an `Option<Option<T>>` this keeps
/// "field absent" (`None`) apart from "field set to null" (`Some(None)`).
pub(crate) fn deserialize_nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
