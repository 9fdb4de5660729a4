//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod filter;
pub mod filter_eval;
pub mod filter_parser;
pub mod indicator;
pub mod ohlcv;
pub mod request;
pub mod saved_filter;
pub mod scan;
pub mod symbol_data;
pub mod timeframe;
pub mod universe;
