use thiserror::Error;

/// Failures raised by the fixed-point (`Wad`/`Ray`) arithmetic layer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

/// Failures raised by the protocol coordinator and its pools.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("insufficient capital: eligible pools do not cover the policy's MCR")]
    InsufficientCapital,

    #[error("insufficient ocean: pool cannot lock more MCR than its free capital")]
    InsufficientOcean,

    #[error("risk module not found: {0}")]
    RiskModuleNotFound(String),

    #[error("pool not found: {0}")]
    PoolNotFound(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
