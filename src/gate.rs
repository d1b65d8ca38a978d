use std::{
    sync::{Mutex, MutexGuard, PoisonError, TryLockError},
    time::Instant,
};

use image::RgbImage;
use ndarray::{ArrayD, Axis};

use crate::{
    codec::{ImageBuffer, STYLE_SIZE, resize_style},
    error::GateError,
    model::StyleModel,
};

/// Represents the current state of the inference gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    /// No request is running inference; the next caller enters immediately.
    Free,
    /// A request holds the model; other callers block until it is released.
    Held,
}

impl GateState {
    /// The name reported by `GET /status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Free => "free",
            GateState::Held => "held",
        }
    }
}

/// Serializes access to a single loaded style model.
///
/// The model is loaded once and is expensive to duplicate, and it is not
/// guaranteed to be re-entrant. The gate owns it behind a mutex so at most one
/// request executes inference at any instant; every other caller blocks, with
/// no timeout, until the holder finishes. Wakeup order among waiters is
/// unspecified.
///
/// The lock is released on every exit path. If the model panics, the guard is
/// dropped during unwinding and the next caller recovers the poisoned mutex, so
/// the gate stays usable.
pub struct InferenceGate<M: StyleModel> {
    model: Mutex<M>,
}

impl<M: StyleModel> InferenceGate<M> {
    /// Creates a gate around an already loaded model.
    pub fn new(model: M) -> Self {
        Self {
            model: Mutex::new(model),
        }
    }

    /// Returns the current state of the gate without blocking.
    pub fn state(&self) -> GateState {
        match self.model.try_lock() {
            Ok(_) | Err(TryLockError::Poisoned(_)) => GateState::Free,
            Err(TryLockError::WouldBlock) => GateState::Held,
        }
    }

    /// Stylizes `content` with `style` under the exclusive lock.
    ///
    /// `style` must already be `STYLE_SIZE` x `STYLE_SIZE`; resizing is the
    /// codec's job and happens before the gate is entered. Both images are
    /// wrapped with a batch axis of size 1 before the model sees them, and the
    /// batch axis is stripped from the output.
    ///
    /// # Returns
    /// The model output scaled to `[0, 255]` as an 8-bit RGB image.
    ///
    /// # Errors
    /// * `InvalidInput` - the style image has the wrong size
    /// * `InferenceFailure` - the model failed or returned a non-RGB tensor
    pub fn run_inference(
        &self,
        content: ImageBuffer,
        style: ImageBuffer,
    ) -> Result<RgbImage, GateError> {
        check_style(&style)?;
        let content = content.to_batched_tensor().map_err(invalid_input)?;
        let style = style.to_batched_tensor().map_err(invalid_input)?;

        let output = self.with_model(|model| {
            model.stylize(content, style).map_err(inference_failure)
        })?;
        output_to_rgb(output)
    }

    /// Stylizes `content` with a style strength of `ratio`.
    ///
    /// The style bottleneck is blended with the content's own bottleneck
    /// (`ratio` of style, `1 - ratio` of content) before rendering. A ratio of
    /// `1.0` is exactly [`InferenceGate::run_inference`]. All model calls of the
    /// request happen under a single lock hold.
    ///
    /// The content's bottleneck is predicted from the content resized to
    /// `STYLE_SIZE` x `STYLE_SIZE`, the fixed input of the style network; the
    /// full-size content is only used for rendering.
    pub fn run_inference_with_ratio(
        &self,
        content: ImageBuffer,
        style: ImageBuffer,
        ratio: f32,
    ) -> Result<RgbImage, GateError> {
        check_ratio(ratio)?;
        if ratio == 1.0 {
            return self.run_inference(content, style);
        }
        check_style(&style)?;

        let identity = resize_style(&content)
            .to_batched_tensor()
            .map_err(invalid_input)?;
        let content = content.to_batched_tensor().map_err(invalid_input)?;
        let style = style.to_batched_tensor().map_err(invalid_input)?;

        let output = self.with_model(|model| {
            let style_bottleneck = model.predict_style(style).map_err(inference_failure)?;
            let identity_bottleneck = model.predict_style(identity).map_err(inference_failure)?;
            let bottleneck = blend(&identity_bottleneck, &style_bottleneck, ratio)?;
            model.transform(content, bottleneck).map_err(inference_failure)
        })?;
        output_to_rgb(output)
    }

    /// Stylizes `content` with a mix of two styles.
    ///
    /// The rendered bottleneck is `1 - ratio` of `style_a` and `ratio` of
    /// `style_b`. Both styles must already be `STYLE_SIZE` squares.
    pub fn combine_styles(
        &self,
        content: ImageBuffer,
        style_a: ImageBuffer,
        style_b: ImageBuffer,
        ratio: f32,
    ) -> Result<RgbImage, GateError> {
        check_ratio(ratio)?;
        check_style(&style_a)?;
        check_style(&style_b)?;

        let content = content.to_batched_tensor().map_err(invalid_input)?;
        let style_a = style_a.to_batched_tensor().map_err(invalid_input)?;
        let style_b = style_b.to_batched_tensor().map_err(invalid_input)?;

        let output = self.with_model(|model| {
            let a = model.predict_style(style_a).map_err(inference_failure)?;
            let b = model.predict_style(style_b).map_err(inference_failure)?;
            let bottleneck = blend(&a, &b, ratio)?;
            model.transform(content, bottleneck).map_err(inference_failure)
        })?;
        output_to_rgb(output)
    }

    fn acquire(&self) -> MutexGuard<'_, M> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // The guard is dropped before returning, whatever `f` produced.
    fn with_model<T>(
        &self,
        f: impl FnOnce(&mut M) -> Result<T, GateError>,
    ) -> Result<T, GateError> {
        let mut model = self.acquire();
        log::debug!("Inference gate acquired");
        let start_time = Instant::now();

        let result = f(&mut *model);
        drop(model);

        match &result {
            Ok(_) => log::debug!("Inference completed in {:?}", start_time.elapsed()),
            Err(e) => log::debug!("Inference failed after {:?}: {e}", start_time.elapsed()),
        }
        result
    }
}

fn inference_failure<E: std::error::Error>(err: E) -> GateError {
    GateError::InferenceFailure(err.to_string())
}

fn invalid_input<E: std::error::Error>(err: E) -> GateError {
    GateError::InvalidInput(err.to_string())
}

fn check_style(style: &ImageBuffer) -> Result<(), GateError> {
    if style.width() != STYLE_SIZE || style.height() != STYLE_SIZE {
        return Err(GateError::InvalidInput(format!(
            "style image must be {STYLE_SIZE}x{STYLE_SIZE}, got {}x{}",
            style.width(),
            style.height()
        )));
    }
    Ok(())
}

/// Checks that a style ratio lies in `[0, 1]`.
pub fn check_ratio(ratio: f32) -> Result<(), GateError> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(GateError::InvalidInput(format!(
            "style ratio must be between 0 and 1, got {ratio}"
        )));
    }
    Ok(())
}

/// Linear blend `(1 - weight) * a + weight * b` of two bottlenecks.
fn blend(a: &ArrayD<f32>, b: &ArrayD<f32>, weight: f32) -> Result<ArrayD<f32>, GateError> {
    if a.shape() != b.shape() {
        return Err(GateError::InferenceFailure(format!(
            "bottleneck shapes differ: {:?} vs {:?}",
            a.shape(),
            b.shape()
        )));
    }
    Ok(a * (1.0 - weight) + b * weight)
}

/// Strips the batch axis, if present, and scales `[0, 1]` floats to 8-bit RGB.
fn output_to_rgb(output: ArrayD<f32>) -> Result<RgbImage, GateError> {
    let shape = output.shape().to_vec();
    let image = match shape.as_slice() {
        [1, _, _, _] => output.index_axis_move(Axis(0), 0),
        [_, _, _] => output,
        shape => {
            return Err(GateError::InferenceFailure(format!(
                "unexpected output shape {shape:?}"
            )));
        }
    };

    let (height, width, channels) = (image.shape()[0], image.shape()[1], image.shape()[2]);
    if channels != 3 || height == 0 || width == 0 {
        return Err(GateError::InferenceFailure(format!(
            "output is not an RGB image: {:?}",
            image.shape()
        )));
    }

    let pixels = image
        .iter()
        .map(|v| (v * 255.0).clamp(0.0, 255.0) as u8)
        .collect();
    RgbImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
        GateError::InferenceFailure("output buffer does not match its shape".to_string())
    })
}
