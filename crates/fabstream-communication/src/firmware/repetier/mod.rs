//! Repetier-Firmware dialect

pub mod response_parser;

pub use response_parser::RepetierResponseParser;
