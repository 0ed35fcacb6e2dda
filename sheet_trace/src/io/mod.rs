//! File input and output helpers for fragment data.

use std::fs::File;
use std::io::{self, Read, Write};

pub mod fragment_json;

pub use fragment_json::{
    read_fragments_json, read_surfaces_json, write_fragments_json, write_surfaces_json,
    FragmentRecord,
};

/// Reads a file to string.
pub fn read_to_string(path: &str) -> io::Result<String> {
    let mut buffer = String::new();
    File::open(path)?.read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Writes a string to a file, replacing its contents.
pub fn write_string(path: &str, contents: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())
}
