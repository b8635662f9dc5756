//! Run output: console summary and JSON documents

pub mod json;
pub mod text;
