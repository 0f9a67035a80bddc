#[macro_use]
extern crate static_assertions;

pub mod engine;
pub mod error;
pub mod image;
pub mod merkle;
pub mod mosaic;
pub mod pipeline;

use serde::{Deserialize, Serialize};

use crate::merkle::Node;

/// Public statement bound by a receipt: the commitment to the original image,
/// the parameters of the transform, and the digest of the mosaic it produced.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Journal {
    pub root: Node,
    pub image_dimensions: (u32, u32),
    pub granularity: u32,
    pub mosaic_dimensions: (u32, u32),
    pub mosaic_digest: Node,
}

/// A journal together with the seal produced over it by the engine that
/// generated the proof. The bincode encoding of a receipt is the opaque
/// artifact handed to callers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Receipt {
    pub journal: Journal,
    pub seal: Node,
}

impl Receipt {
    pub fn to_vec(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
