use log::{debug, warn};

use crate::engine::{MosaicEngine, VerificationResult};
use crate::error::PipelineError;
use crate::image::PixelBuffer;
use crate::mosaic::mosaic;

/// Monotonic counter identifying the most recent image/granularity submission.
pub type Generation = u64;

/// Where a session currently stands in the pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Idle,
    ImageLoaded,
    MosaicComputed,
    ProofGenerated,
    Verified,
    VerificationFailed,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::ImageLoaded => "ImageLoaded",
            Self::MosaicComputed => "MosaicComputed",
            Self::ProofGenerated => "ProofGenerated",
            Self::Verified => "Verified",
            Self::VerificationFailed => "VerificationFailed",
        }
    }
}

/// Owner of one user session's pipeline state.
///
/// Sequences image submission, the mosaic transform, proof generation, and
/// verification, and keeps the retained mosaic and receipt consistent: any
/// new image or granularity supersedes both, so a receipt produced for one
/// pairing can never be presented as evidence for another. Verification runs
/// against the retained mosaic, the exact bytes handed out for display.
///
/// Transform, proof, and verification requests are rejected until an engine
/// has been attached. Results computed on a worker can be handed back through
/// [`MosaicPipeline::install_mosaic`], which discards anything tagged with a
/// superseded generation.
pub struct MosaicPipeline {
    engine: Option<MosaicEngine>,
    stage: Stage,
    generation: Generation,
    image: Option<PixelBuffer>,
    granularity: u32,
    mosaic: Option<PixelBuffer>,
    receipt: Option<Vec<u8>>,
}

impl MosaicPipeline {
    pub fn new() -> Self {
        Self {
            engine: None,
            stage: Stage::Idle,
            generation: 0,
            image: None,
            granularity: 0,
            mosaic: None,
            receipt: None,
        }
    }

    /// Flip the readiness gate. Requests made before this are rejected with
    /// [`PipelineError::EngineNotReady`].
    pub fn attach_engine(&mut self, engine: MosaicEngine) {
        self.engine = Some(engine);
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The retained mosaic, if one has been computed for the current image.
    pub fn mosaic(&self) -> Option<&PixelBuffer> {
        self.mosaic.as_ref()
    }

    /// The held receipt bytes, if a proof has been generated.
    pub fn receipt(&self) -> Option<&[u8]> {
        self.receipt.as_deref()
    }

    /// Submit a new image, superseding everything derived from the previous
    /// one. Returns the generation tag identifying this submission.
    pub fn submit_image(
        &mut self,
        data: Vec<u8>,
        width: u32,
        height: u32,
        granularity: u32,
    ) -> Result<Generation, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::MalformedInput(format!(
                "image dimensions must be non-zero, got {}x{}",
                width, height,
            )));
        }
        let image = PixelBuffer::from_raw(data, width, height)?;

        self.generation += 1;
        self.image = Some(image);
        self.granularity = granularity;
        self.supersede_derived();
        debug!(
            "loaded {}x{} image at granularity {} as generation {}",
            width, height, granularity, self.generation,
        );
        Ok(self.generation)
    }

    /// Change the granularity for the current image. The retained mosaic and
    /// receipt no longer correspond to the session parameters and are dropped.
    pub fn set_granularity(&mut self, granularity: u32) -> Result<Generation, PipelineError> {
        if self.image.is_none() {
            return Err(self.invalid_transition("set the granularity"));
        }
        self.generation += 1;
        self.granularity = granularity;
        self.supersede_derived();
        Ok(self.generation)
    }

    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    /// Run the transform on the current image and retain the output.
    pub fn compute_mosaic(&mut self) -> Result<&PixelBuffer, PipelineError> {
        self.require_engine()?;
        let image = match &self.image {
            Some(image) => image,
            None => return Err(self.invalid_transition("compute a mosaic")),
        };

        let output = mosaic(image, self.granularity);
        self.stage = Stage::MosaicComputed;
        Ok(self.mosaic.insert(output))
    }

    /// Accept a transform result computed elsewhere, typically on a worker
    /// thread. A result tagged with anything but the current generation was
    /// superseded while in flight and is discarded.
    pub fn install_mosaic(
        &mut self,
        generation: Generation,
        output: PixelBuffer,
    ) -> Result<&PixelBuffer, PipelineError> {
        self.require_engine()?;
        if generation != self.generation {
            warn!(
                "discarding mosaic for generation {}, session has moved to {}",
                generation, self.generation,
            );
            return Err(PipelineError::StaleState {
                submitted: generation,
                current: self.generation,
            });
        }
        let image = match &self.image {
            Some(image) => image,
            None => return Err(self.invalid_transition("install a mosaic")),
        };
        let expected = (image.width() / 2, image.height() / 2);
        if output.dimensions() != expected {
            return Err(PipelineError::MalformedInput(format!(
                "mosaic dimensions {:?} do not match the expected {:?}",
                output.dimensions(),
                expected,
            )));
        }

        self.stage = Stage::MosaicComputed;
        Ok(self.mosaic.insert(output))
    }

    /// Generate a proof for the current image and granularity, retaining the
    /// receipt bytes for the verification step.
    pub fn generate_proof(&mut self) -> Result<&[u8], PipelineError> {
        let engine = match &self.engine {
            Some(engine) => engine,
            None => return Err(PipelineError::EngineNotReady),
        };
        let image = match (&self.image, &self.mosaic) {
            (Some(image), Some(_)) => image,
            _ => return Err(self.invalid_transition("generate a proof")),
        };

        let receipt = engine.prove(image, self.granularity)?;
        let bytes = receipt
            .to_vec()
            .map_err(|err| PipelineError::ProofGeneration(err.into()))?;
        self.stage = Stage::ProofGenerated;
        Ok(self.receipt.insert(bytes))
    }

    /// Verify the held receipt against the retained mosaic. A negative result
    /// is recoverable; the session keeps its state and a fresh submission
    /// restarts the cycle.
    pub fn verify(&mut self) -> Result<VerificationResult, PipelineError> {
        let engine = match &self.engine {
            Some(engine) => engine,
            None => return Err(PipelineError::EngineNotReady),
        };
        let (receipt, candidate) = match (&self.receipt, &self.mosaic) {
            (Some(receipt), Some(candidate)) => (receipt.as_slice(), candidate),
            _ => return Err(self.invalid_transition("verify")),
        };

        let result = engine.verify(receipt, candidate);
        self.stage = if result.is_valid() {
            Stage::Verified
        } else {
            Stage::VerificationFailed
        };
        debug!("verification finished: {:?}", result);
        Ok(result)
    }

    fn supersede_derived(&mut self) {
        self.mosaic = None;
        self.receipt = None;
        self.stage = Stage::ImageLoaded;
    }

    fn require_engine(&self) -> Result<(), PipelineError> {
        if self.engine.is_none() {
            return Err(PipelineError::EngineNotReady);
        }
        Ok(())
    }

    fn invalid_transition(&self, action: &'static str) -> PipelineError {
        PipelineError::InvalidTransition {
            action,
            state: self.stage.name(),
        }
    }
}

impl Default for MosaicPipeline {
    fn default() -> Self {
        Self::new()
    }
}
