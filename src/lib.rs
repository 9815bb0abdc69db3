pub mod cli;
pub mod error;
pub mod gpt;
pub mod repl;
pub mod secrets;
