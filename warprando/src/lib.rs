// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod randomize;
pub mod settings;
pub mod spoiler_log;
pub mod traverse;
