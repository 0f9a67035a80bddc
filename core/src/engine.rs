use std::fmt;

use log::debug;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::ProveError;
use crate::image::{ImageMerkleTree, PixelBuffer, IMAGE_CHUNK_SIZE};
use crate::merkle::Node;
use crate::mosaic::mosaic;
use crate::{Journal, Receipt};

/// Domain separation tag for receipt seals.
const SEAL_DOMAIN: &[u8] = b"mosaic-engine/v1/seal";

/// Outcome of checking a receipt against a candidate mosaic. `Invalid` is an
/// expected result, not a failure of the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerificationResult {
    Valid,
    Invalid(RejectReason),
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Why a candidate mosaic was rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RejectReason {
    MalformedReceipt,
    SealMismatch,
    DimensionMismatch,
    DigestMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::MalformedReceipt => "the receipt bytes do not decode to a receipt",
            Self::SealMismatch => "the receipt was not sealed by this engine session",
            Self::DimensionMismatch => "the candidate dimensions differ from the attested mosaic",
            Self::DigestMismatch => "the candidate bytes differ from the attested mosaic",
        };
        f.write_str(reason)
    }
}

/// Proof and verification engine for the mosaic transform.
///
/// A receipt commits to the original image with a Merkle tree over its pixel
/// chunks and attests, under a seal keyed to this engine session, that the
/// mosaic digest in the journal is the transform's output for that image and
/// granularity. Verification needs only the receipt and the candidate mosaic;
/// the original pixels are never re-disclosed.
pub struct MosaicEngine {
    seal_key: [u8; 32],
}

impl MosaicEngine {
    /// Bootstrap an engine session. Until this has run, no transform, proof,
    /// or verification request can be served.
    pub fn init() -> Self {
        let mut seal_key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seal_key);
        Self { seal_key }
    }

    /// Produce a receipt binding the original image to its mosaic output.
    ///
    /// The mosaic is recomputed here rather than accepted from the caller, so
    /// the journal can only ever attest the transform's true output.
    pub fn prove(&self, image: &PixelBuffer, granularity: u32) -> Result<Receipt, ProveError> {
        let tree = ImageMerkleTree::<{ IMAGE_CHUNK_SIZE }>::new(image);
        let output = mosaic(image, granularity);

        let journal = Journal {
            root: tree.root(),
            image_dimensions: image.dimensions(),
            granularity,
            mosaic_dimensions: output.dimensions(),
            mosaic_digest: Node::digest(output.as_bytes()),
        };
        debug!(
            "sealing journal for {}x{} image with root {}",
            journal.image_dimensions.0, journal.image_dimensions.1, journal.root,
        );
        let seal = self.seal(&journal)?;

        Ok(Receipt { journal, seal })
    }

    /// Check a receipt against a candidate mosaic buffer.
    ///
    /// Returns `Valid` only if the receipt decodes, carries this session's
    /// seal, and the candidate is byte-identical to the attested mosaic at the
    /// attested dimensions. Everything else is an `Invalid` outcome with the
    /// first reason found.
    pub fn verify(&self, receipt_bytes: &[u8], candidate: &PixelBuffer) -> VerificationResult {
        let receipt = match Receipt::from_bytes(receipt_bytes) {
            Ok(receipt) => receipt,
            Err(_) => return VerificationResult::Invalid(RejectReason::MalformedReceipt),
        };

        let expected_seal = match self.seal(&receipt.journal) {
            Ok(seal) => seal,
            Err(_) => return VerificationResult::Invalid(RejectReason::MalformedReceipt),
        };
        if receipt.seal != expected_seal {
            return VerificationResult::Invalid(RejectReason::SealMismatch);
        }

        if receipt.journal.mosaic_dimensions != candidate.dimensions() {
            return VerificationResult::Invalid(RejectReason::DimensionMismatch);
        }

        if receipt.journal.mosaic_digest != Node::digest(candidate.as_bytes()) {
            return VerificationResult::Invalid(RejectReason::DigestMismatch);
        }

        VerificationResult::Valid
    }

    fn seal(&self, journal: &Journal) -> Result<Node, ProveError> {
        let mut hasher = Sha256::new();
        hasher.update(SEAL_DOMAIN);
        hasher.update(self.seal_key);
        hasher.update(bincode::serialize(journal)?);
        Ok(Node::from(<[u8; 32]>::from(hasher.finalize())))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn arbitrary_image(width: u32, height: u32, salt: u8) -> PixelBuffer {
        let data = (0..width as usize * height as usize * 4)
            .map(|i| (i * 37 % 241) as u8 ^ salt)
            .collect();
        PixelBuffer::from_raw(data, width, height).unwrap()
    }

    #[test]
    fn honest_mosaic_verifies() {
        let engine = MosaicEngine::init();
        let image = arbitrary_image(8, 8, 0);

        let receipt = engine.prove(&image, 2).unwrap();
        let bytes = receipt.to_vec().unwrap();
        let candidate = mosaic(&image, 2);

        assert_eq!(engine.verify(&bytes, &candidate), VerificationResult::Valid);
    }

    #[test]
    fn solid_red_scenario_accepts_red_and_rejects_blue() {
        let engine = MosaicEngine::init();
        let red: Vec<u8> = [255u8, 0, 0, 255].into_iter().cycle().take(64).collect();
        let image = PixelBuffer::from_raw(red, 4, 4).unwrap();

        let bytes = engine.prove(&image, 2).unwrap().to_vec().unwrap();
        let candidate = mosaic(&image, 2);
        assert_eq!(candidate.dimensions(), (2, 2));
        assert_eq!(engine.verify(&bytes, &candidate), VerificationResult::Valid);

        let blue: Vec<u8> = [0u8, 0, 255, 255].into_iter().cycle().take(16).collect();
        let blue = PixelBuffer::from_raw(blue, 2, 2).unwrap();
        assert_eq!(
            engine.verify(&bytes, &blue),
            VerificationResult::Invalid(RejectReason::DigestMismatch),
        );
    }

    #[test]
    fn every_single_byte_flip_is_detected() {
        let engine = MosaicEngine::init();
        let image = arbitrary_image(4, 4, 0);
        let bytes = engine.prove(&image, 2).unwrap().to_vec().unwrap();
        let candidate = mosaic(&image, 2);

        for i in 0..candidate.as_bytes().len() {
            let mut tampered = candidate.as_bytes().to_vec();
            tampered[i] ^= 0x01;
            let tampered =
                PixelBuffer::from_raw(tampered, candidate.width(), candidate.height()).unwrap();
            assert_eq!(
                engine.verify(&bytes, &tampered),
                VerificationResult::Invalid(RejectReason::DigestMismatch),
            );
        }
    }

    #[test]
    fn proof_for_another_image_is_rejected() {
        let engine = MosaicEngine::init();
        let image_a = arbitrary_image(8, 8, 0);
        let image_b = arbitrary_image(8, 8, 0xff);

        let bytes = engine.prove(&image_a, 2).unwrap().to_vec().unwrap();
        assert_eq!(
            engine.verify(&bytes, &mosaic(&image_b, 2)),
            VerificationResult::Invalid(RejectReason::DigestMismatch),
        );
    }

    #[test]
    fn granularity_is_bound_by_the_receipt() {
        let engine = MosaicEngine::init();
        let image = arbitrary_image(8, 8, 0);

        let bytes = engine.prove(&image, 2).unwrap().to_vec().unwrap();
        assert_eq!(
            engine.verify(&bytes, &mosaic(&image, 6)),
            VerificationResult::Invalid(RejectReason::DigestMismatch),
        );
    }

    #[test]
    fn swapped_dimensions_are_rejected() {
        let engine = MosaicEngine::init();
        let image = arbitrary_image(6, 4, 0);

        let bytes = engine.prove(&image, 2).unwrap().to_vec().unwrap();
        let candidate = mosaic(&image, 2);
        assert_eq!(candidate.dimensions(), (3, 2));

        let swapped =
            PixelBuffer::from_raw(candidate.as_bytes().to_vec(), 2, 3).unwrap();
        assert_eq!(
            engine.verify(&bytes, &swapped),
            VerificationResult::Invalid(RejectReason::DimensionMismatch),
        );
    }

    #[test]
    fn garbage_receipt_bytes_are_an_outcome_not_a_panic() {
        let engine = MosaicEngine::init();
        let candidate = mosaic(&arbitrary_image(4, 4, 0), 2);

        assert_eq!(
            engine.verify(&[0u8; 7], &candidate),
            VerificationResult::Invalid(RejectReason::MalformedReceipt),
        );
    }

    #[test]
    fn truncated_receipt_is_rejected() {
        let engine = MosaicEngine::init();
        let image = arbitrary_image(4, 4, 0);
        let bytes = engine.prove(&image, 2).unwrap().to_vec().unwrap();

        assert_eq!(
            engine.verify(&bytes[..bytes.len() - 1], &mosaic(&image, 2)),
            VerificationResult::Invalid(RejectReason::MalformedReceipt),
        );
    }

    #[test]
    fn receipts_do_not_transfer_between_engine_sessions() {
        let image = arbitrary_image(8, 8, 0);
        let bytes = MosaicEngine::init()
            .prove(&image, 2)
            .unwrap()
            .to_vec()
            .unwrap();

        let other = MosaicEngine::init();
        assert_eq!(
            other.verify(&bytes, &mosaic(&image, 2)),
            VerificationResult::Invalid(RejectReason::SealMismatch),
        );
    }
}
