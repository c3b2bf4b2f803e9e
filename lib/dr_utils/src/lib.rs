//! Cross-crates utilities for the `DroidRunner` project.

pub mod leb;
