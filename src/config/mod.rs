pub mod generation;
pub mod rule;
pub mod simulation;
