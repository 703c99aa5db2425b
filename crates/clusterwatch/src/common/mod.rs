pub mod cli;
pub mod command;
pub mod controlflow;
pub mod error;
pub mod rpc;
pub mod setup;
