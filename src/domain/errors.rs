use derive_more::{Display, From};

/// Failures that prevent a chart instance from starting at all.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum InitializationError {
    #[display(fmt = "browser window is not available")]
    NoWindow,
    #[display(fmt = "canvas '{}' not found", _0)]
    CanvasNotFound(String),
    #[display(fmt = "failed to create surface: {}", _0)]
    SurfaceCreation(String),
    #[display(fmt = "no suitable graphics adapter: {}", _0)]
    AdapterUnavailable(String),
    #[display(fmt = "device request failed: {}", _0)]
    DeviceRequest(String),
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum RenderingError {
    #[display(fmt = "failed to acquire surface texture: {}", _0)]
    SurfaceTexture(String),
    #[display(fmt = "shader '{}' failed to compile: {}", pass, reason)]
    ShaderCompilation { pass: String, reason: String },
    #[display(fmt = "no buffers registered under '{}'", _0)]
    MissingBuffer(String),
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum NetworkError {
    #[display(fmt = "connection failed: {}", _0)]
    ConnectionFailed(String),
    #[display(fmt = "http status {}", _0)]
    HttpStatus(u16),
    #[display(fmt = "request timed out")]
    Timeout,
    #[display(fmt = "failed to decode payload: {}", _0)]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum ValidationError {
    #[display(fmt = "invalid candle: {}", _0)]
    Candle(String),
    #[display(fmt = "invalid message: {}", _0)]
    Message(String),
    #[display(fmt = "invalid configuration: {}", _0)]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum StorageError {
    #[display(fmt = "storage unavailable: {}", _0)]
    Unavailable(String),
    #[display(fmt = "failed to serialize: {}", _0)]
    Serialize(String),
}

/// Top-level error for the chart engine.
#[derive(Debug, Clone, PartialEq, Display, From)]
pub enum ChartError {
    #[display(fmt = "Initialization Error: {}", _0)]
    Initialization(InitializationError),
    #[display(fmt = "Rendering Error: {}", _0)]
    Rendering(RenderingError),
    #[display(fmt = "Network Error: {}", _0)]
    Network(NetworkError),
    #[display(fmt = "Validation Error: {}", _0)]
    Validation(ValidationError),
    #[display(fmt = "Storage Error: {}", _0)]
    Storage(StorageError),
}

impl ChartError {
    /// Whether the chart instance must show an error state instead of the canvas.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChartError::Initialization(_))
    }
}

impl std::error::Error for InitializationError {}
impl std::error::Error for RenderingError {}
impl std::error::Error for NetworkError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for StorageError {}
impl std::error::Error for ChartError {}

impl From<ChartError> for wasm_bindgen::JsValue {
    fn from(err: ChartError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}

pub type ChartResult<T> = Result<T, ChartError>;
pub type RenderingResult<T> = Result<T, ChartError>;
pub type NetworkResult<T> = Result<T, ChartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_display() {
        let err: ChartError = NetworkError::HttpStatus(503).into();
        assert_eq!(err.to_string(), "Network Error: http status 503");
        assert!(!err.is_fatal());
    }

    #[test]
    fn initialization_is_fatal() {
        let err: ChartError = InitializationError::NoWindow.into();
        assert!(err.is_fatal());
    }
}
