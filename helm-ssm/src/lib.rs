pub mod cli;
pub mod configs;
pub mod domain;
pub mod parameters;
pub mod storage;
pub mod template;
