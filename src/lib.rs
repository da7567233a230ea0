#![forbid(unsafe_code)]

pub mod agents;
pub mod assemble;
pub mod category;
pub mod cli;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod formats;
pub mod import;
pub mod linkedin;
pub mod logging;
pub mod openai;
pub mod parse;
pub mod pipeline;
pub mod run_log;
pub mod store;
