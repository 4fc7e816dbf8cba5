//! Package fixtures

use std::path::{Path, PathBuf};

pub const MIB: usize = 1024 * 1024;

/// Deterministic package content: byte `i` is `i % 251`
pub fn package_bytes(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Write a package of `size` bytes named `name` into `dir`
pub fn write_package(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, package_bytes(size)).expect("failed to write package fixture");
    path
}
