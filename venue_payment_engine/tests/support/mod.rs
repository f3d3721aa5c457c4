#![allow(dead_code)]
pub mod payloads;
pub mod prepare_env;
pub mod processor;
