/// Nested chunk framing
pub mod chunk;
/// Flat minichunk records inside data chunk payloads
pub mod minichunk;
// Shared winnow parsers
pub mod parser_utils;
