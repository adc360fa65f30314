/// Subcommands and their implementations.
pub mod cli;
