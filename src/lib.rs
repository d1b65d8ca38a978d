//! HTTP style transfer served from a single pre-trained model.
//!
//! A request uploads a content image and a style image; the images are decoded,
//! the style is resized to the network's fixed input, and the pair is run
//! through the model behind an [`InferenceGate`], which lets at most one request
//! use the model at a time. The stylized result is returned as a JPEG.
//!
//! The model itself is opaque: anything implementing [`StyleModel`] can be
//! served. With the `onnx` feature, `OnnxStyleModel` runs the network with
//! ONNX Runtime.

pub mod codec;
pub mod config;
pub mod error;
pub mod gate;
pub mod messages;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod server;

pub use codec::ImageBuffer;
pub use config::ServerConfig;
pub use error::{CodecError, GateError, StylizeError};
pub use gate::{GateState, InferenceGate};
pub use model::StyleModel;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxModelConfig, OnnxStyleModel};
pub use server::{router, serve};
