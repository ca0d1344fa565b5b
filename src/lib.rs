//! Fail-safe trading decision core.
//!
//! One deterministic pipeline per cycle: volatility regime -> strategy
//! directive -> signal evaluation -> mandatory risk gate -> execution ->
//! position maintenance. Every component has a defined safe output for
//! every bad input; when in doubt the system stands down (strategy C),
//! it never fails open.

pub mod core;
pub mod execution;
pub mod market;
pub mod positions;
pub mod regime;
pub mod risk;
pub mod strategy;
pub mod trading;
