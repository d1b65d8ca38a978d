use argh::FromArgs;
use std::{path::PathBuf, sync::Arc};
use stylize::{
    InferenceGate, OnnxModelConfig, OnnxStyleModel, ServerConfig,
    config::{DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT},
};

#[derive(FromArgs)]
/// Serves style transfer over HTTP with a single pre-trained model.
struct StylizeArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// path to the style prediction graph (.onnx)
    #[argh(option)]
    style_model: PathBuf,

    /// path to the style transformer graph (.onnx)
    #[argh(option)]
    transfer_model: PathBuf,

    /// intra-op threads per session, 0 lets the runtime decide
    #[argh(option, default = "0")]
    threads: usize,

    /// quality of the returned JPEG
    #[argh(option, default = "stylize::codec::JPEG_QUALITY")]
    jpeg_quality: u8,

    /// largest accepted upload, in bytes
    #[argh(option, default = "DEFAULT_MAX_UPLOAD_BYTES")]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: StylizeArgs = argh::from_env();

    // the model is loaded once before accepting requests; failure is fatal
    log::info!("Loading pre-trained model...");
    let model = OnnxStyleModel::load(&OnnxModelConfig {
        predict_path: args.style_model,
        transfer_path: args.transfer_model,
        intra_threads: args.threads,
    })?;
    log::info!("Model loaded");

    let gate = Arc::new(InferenceGate::new(model));
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        jpeg_quality: args.jpeg_quality,
        max_upload_bytes: args.max_upload_bytes,
    };

    log::info!("🚀 Starting the server");
    log::info!("🔧 Press Ctrl+C to stop the server");

    stylize::serve(gate, config).await?;

    Ok(())
}
