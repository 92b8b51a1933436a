//! Sovereign debt sustainability analysis: a Monte Carlo debt-to-GDP
//! projection kernel with regime-dependent interest rates, plus the
//! closed-form debt-stabilizing primary balance.

pub mod api;
pub mod cli;
pub mod core;
