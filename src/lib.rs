pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod git;
pub mod materialize;
pub mod spinner;
pub mod state;
pub mod terminal;
#[cfg(test)]
mod test_support;
pub mod types;
pub mod ui;
pub mod util;
