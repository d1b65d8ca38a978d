use axum::http::StatusCode;

/// Errors raised while moving pixels between bytes, images and tensors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The uploaded bytes are not an image the decoder understands.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    /// The stylized image could not be serialized.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
    /// The image has a zero width or height.
    #[error("image has zero width or height")]
    EmptyImage,
    /// A pixel buffer could not be reshaped into a tensor.
    #[error("invalid tensor layout: {0}")]
    Tensor(String),
}

/// Errors raised by the inference gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The caller broke the input contract (style size, ratio range).
    #[error("invalid inference input: {0}")]
    InvalidInput(String),
    /// The model failed, or produced an output that is not an RGB image.
    #[error("inference failed: {0}")]
    InferenceFailure(String),
}

/// Errors surfaced by the HTTP layer. Each variant maps to a status code.
#[derive(Debug, thiserror::Error)]
pub enum StylizeError {
    /// A required field is missing or a form value is malformed.
    #[error("{0}")]
    Validation(String),
    /// The multipart body could not be read.
    #[error("{}", .0.body_text())]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error(transparent)]
    Decode(CodecError),
    #[error(transparent)]
    Inference(#[from] GateError),
    #[error(transparent)]
    Encode(CodecError),
    /// The blocking worker running the request died.
    #[error("inference worker failed: {0}")]
    Worker(String),
}

impl StylizeError {
    /// Short machine readable tag sent next to the message.
    ///
    /// A multipart body cut off by the upload limit is `payload_too_large`;
    /// any other unreadable body is a `validation_error`.
    pub fn kind(&self) -> &'static str {
        match self {
            StylizeError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "payload_too_large"
            }
            StylizeError::Validation(_) | StylizeError::Multipart(_) => "validation_error",
            StylizeError::Decode(_) => "decode_error",
            StylizeError::Inference(_) | StylizeError::Worker(_) => "inference_failure",
            StylizeError::Encode(_) => "encode_error",
        }
    }
}
