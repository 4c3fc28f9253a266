#![crate_type = "lib"]
#![crate_name = "queryrt"]

pub mod common;
pub mod config;
pub mod runtime;
pub mod types;
