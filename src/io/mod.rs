//! File I/O for kinetics setups.

pub mod setup;

pub use setup::{Setup, SetupFile, load_setup, read_setup_file, setup_from_str, write_setup_file};
