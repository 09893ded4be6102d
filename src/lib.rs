/// Locating assets by name under game data directories
pub mod assets;
/// Readers for the chunked container format shared by model and map files
pub mod data;
/// Error definitions
pub mod error;
/// Map (`.TED`) decoding
pub mod map;
/// Model (`.ALO`) decoding
pub mod models;

#[cfg(test)]
mod test_util;
