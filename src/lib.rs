pub mod cli;
pub mod config;
pub mod grid;
pub mod persistence;
pub mod simulation;
