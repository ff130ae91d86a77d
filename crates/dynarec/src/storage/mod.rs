//! Storage backends for the `dynarec` binary.

pub mod dynamodb;
