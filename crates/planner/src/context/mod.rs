//! Prompt context: section buckets, deduplication, enforcement addenda and
//! size estimation.

pub mod addenda;
pub mod assembler;
pub mod collapse;
pub mod token;

pub use assembler::{AssembleOptions, AssembledPrompt, Buckets, PromptAssembler};
pub use token::approx_tokens;
