use crate::codec::JPEG_QUALITY;

// defaults for the server
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5002;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Runtime settings of the HTTP server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// the interface to listen on
    pub host: String,
    /// the port to listen on
    pub port: u16,
    /// quality of the returned JPEG, 1-100
    pub jpeg_quality: u8,
    /// largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// The `host:port` string to bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            jpeg_quality: JPEG_QUALITY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
