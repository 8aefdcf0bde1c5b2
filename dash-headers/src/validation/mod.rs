//! Header chain verification.

mod chain;
mod chunk;
mod difficulty;

pub use chain::{ChainInput, ChainVerifier};
pub(crate) use chunk::preceding_window;
pub use chunk::ChunkVerifier;
pub use difficulty::{DifficultyOracle, HeaderBitsOracle};

use crate::error::ValidationResult;

pub trait Validator<T> {
    fn validate(&self, data: T) -> ValidationResult<()>;
}
