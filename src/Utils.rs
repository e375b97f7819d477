//! different utility modules used throughout the project
/// terminal and file logging setup
pub mod logger;
