//! File-backed implementation of the checkpoint store.

mod json_file;

pub use json_file::JsonFileCheckpointStore;
