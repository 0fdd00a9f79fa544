//! Demo/harness file-based flows: genesis generation, synthetic
//! transaction generation, and length-prefixed replay into a pool.

pub mod genesis;
pub mod replay;
pub mod txgen;
