//! ONNX Runtime backend for arbitrary image stylization networks.
//!
//! The network ships as two graphs: a style prediction graph mapping a
//! `[1, 256, 256, 3]` style image to a bottleneck, and a transformer graph
//! rendering a `[1, H, W, 3]` content image with that bottleneck.

use std::path::{Path, PathBuf};

use ndarray::{Array4, ArrayD};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};

use crate::model::StyleModel;

#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    #[error(transparent)]
    Ort(#[from] ort::Error),
    /// The graph does not have the inputs or outputs of a style network.
    #[error("unexpected signature for {graph}: {reason}")]
    Signature { graph: &'static str, reason: String },
}

/// Where to find the two graphs and how to run them.
#[derive(Clone, Debug)]
pub struct OnnxModelConfig {
    pub predict_path: PathBuf,
    pub transfer_path: PathBuf,
    /// intra-op threads per session, 0 lets the runtime decide
    pub intra_threads: usize,
}

pub struct OnnxStyleModel {
    predict: Session,
    transfer: Session,
    predict_input: String,
    predict_output: String,
    content_input: String,
    bottleneck_input: String,
    transfer_output: String,
}

impl OnnxStyleModel {
    /// Loads both graphs. Called once at startup.
    pub fn load(config: &OnnxModelConfig) -> Result<Self, OnnxError> {
        let predict = build_session(&config.predict_path, config.intra_threads)?;
        let transfer = build_session(&config.transfer_path, config.intra_threads)?;

        let predict_input = first_name(predict.inputs.iter().map(|i| &i.name), "style predict")?;
        let predict_output =
            first_name(predict.outputs.iter().map(|o| &o.name), "style predict")?;
        let transfer_output =
            first_name(transfer.outputs.iter().map(|o| &o.name), "style transfer")?;

        if transfer.inputs.len() != 2 {
            return Err(OnnxError::Signature {
                graph: "style transfer",
                reason: format!("expected 2 inputs, found {}", transfer.inputs.len()),
            });
        }
        // the bottleneck input is named as such in the published graphs;
        // otherwise fall back to (content, bottleneck) order
        let bottleneck_index = transfer
            .inputs
            .iter()
            .position(|i| i.name.contains("bottleneck"))
            .unwrap_or(1);
        let bottleneck_input = transfer.inputs[bottleneck_index].name.clone();
        let content_input = transfer.inputs[1 - bottleneck_index].name.clone();

        log::debug!(
            "Style transfer inputs: content={content_input}, bottleneck={bottleneck_input}"
        );

        Ok(Self {
            predict,
            transfer,
            predict_input,
            predict_output,
            content_input,
            bottleneck_input,
            transfer_output,
        })
    }
}

impl StyleModel for OnnxStyleModel {
    type Error = OnnxError;

    fn predict_style(&mut self, style: Array4<f32>) -> Result<ArrayD<f32>, Self::Error> {
        let input = Tensor::from_array(style)?;
        let outputs = self
            .predict
            .run(ort::inputs![self.predict_input.as_str() => input])?;
        Ok(outputs[self.predict_output.as_str()]
            .try_extract_array::<f32>()?
            .to_owned())
    }

    fn transform(
        &mut self,
        content: Array4<f32>,
        bottleneck: ArrayD<f32>,
    ) -> Result<ArrayD<f32>, Self::Error> {
        let content = Tensor::from_array(content)?;
        let bottleneck = Tensor::from_array(bottleneck)?;
        let outputs = self.transfer.run(ort::inputs![
            self.content_input.as_str() => content,
            self.bottleneck_input.as_str() => bottleneck
        ])?;
        Ok(outputs[self.transfer_output.as_str()]
            .try_extract_array::<f32>()?
            .to_owned())
    }
}

fn build_session(path: &Path, intra_threads: usize) -> Result<Session, ort::Error> {
    log::info!("Loading {}", path.display());
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
    if intra_threads > 0 {
        builder = builder.with_intra_threads(intra_threads)?;
    }
    builder.commit_from_file(path)
}

fn first_name<'a>(
    mut names: impl Iterator<Item = &'a String>,
    graph: &'static str,
) -> Result<String, OnnxError> {
    names.next().cloned().ok_or_else(|| OnnxError::Signature {
        graph,
        reason: "graph has no tensors on one side".to_string(),
    })
}
