#[allow(dead_code)]
#[path = "../common/mod.rs"]
mod common;

mod analyze;
