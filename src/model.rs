use ndarray::{Array4, ArrayD};

/// Trait for the pre-trained style transfer network served by the gate.
///
/// Arbitrary style networks are made of two parts: a style prediction network
/// that embeds a style image into a bottleneck vector, and a transformer that
/// renders the content image with that bottleneck. Implementors expose both so
/// the gate can blend bottlenecks; [`StyleModel::stylize`] composes them.
///
/// Tensors are NHWC with values in `[0, 1]`:
/// * content: `[1, H, W, 3]`
/// * style: `[1, 256, 256, 3]`
/// * output: `[1, H', W', 3]` or `[H', W', 3]`
///
/// Implementations are not required to be re-entrant. The gate never calls
/// into a model from two threads at once.
pub trait StyleModel {
    /// The error type returned by the network.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Embeds a batched style image into a bottleneck tensor.
    fn predict_style(&mut self, style: Array4<f32>) -> Result<ArrayD<f32>, Self::Error>;

    /// Renders a batched content image with the given style bottleneck.
    fn transform(
        &mut self,
        content: Array4<f32>,
        bottleneck: ArrayD<f32>,
    ) -> Result<ArrayD<f32>, Self::Error>;

    /// Runs the full network on a content and style pair.
    fn stylize(
        &mut self,
        content: Array4<f32>,
        style: Array4<f32>,
    ) -> Result<ArrayD<f32>, Self::Error> {
        let bottleneck = self.predict_style(style)?;
        self.transform(content, bottleneck)
    }
}
