use crate::classification::{classify, ClassificationResult};
use crate::error::DiagnoseError;
use crate::heatmap::engine::{Explanation, HeatmapEngine};
use crate::model_runtime::interface::ModelRuntime;
use image::DynamicImage;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub result: ClassificationResult,
    pub explanation: Explanation,
}

/// Classifies a decoded image and explains the decision.
///
/// The runtime is shared behind a mutex, so concurrent callers take turns.
#[derive(Clone)]
pub struct Diagnoser {
    runtime: Arc<Mutex<dyn ModelRuntime>>,
    engine: HeatmapEngine,
}

impl Diagnoser {
    pub fn new(runtime: Arc<Mutex<dyn ModelRuntime>>, engine: HeatmapEngine) -> Self {
        Self { runtime, engine }
    }

    pub fn diagnose(&self, image: &DynamicImage) -> Result<Diagnosis, DiagnoseError> {
        self.diagnose_with(image, || {})
    }

    /// Like [`Diagnoser::diagnose`], calling `on_acquired` once the shared
    /// runtime is held and before any model work starts.
    pub fn diagnose_with(
        &self,
        image: &DynamicImage,
        on_acquired: impl FnOnce(),
    ) -> Result<Diagnosis, DiagnoseError> {
        let (score, activations, gradient) = {
            // A panic during an earlier item leaves the runtime itself intact.
            let runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
            on_acquired();
            let score = runtime.forward(image)?;
            let (activations, gradient) = runtime.activations_and_gradient(image)?;
            (score, activations, gradient)
        };

        let result = classify(score);
        debug!(
            score,
            label = %result.label(),
            confidence = result.confidence(),
            "classified image"
        );

        let explanation = self.engine.explain(image, &activations, &gradient)?;
        Ok(Diagnosis {
            result,
            explanation,
        })
    }
}
