//! Offer-versus-floor arbitrage classification.

pub mod classifier;

pub use classifier::{classify, ArbitrageFlag, ArbitrageResult};
