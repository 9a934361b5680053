use thiserror::Error;

/// Configuration-time failures. The simulation loop itself never errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid integrator configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid world bounds: {width}x{height}")]
    InvalidBounds { width: f32, height: f32 },
    #[error("degenerate shape: {0}")]
    DegenerateShape(&'static str),
    #[error("failed to parse integrator configuration")]
    ConfigParse(#[from] ron::error::SpannedError),
}

pub type Result<T> = std::result::Result<T, Error>;
