//! Generates the static command manifest.
//!
//! `command_manifest.rs` declares one module per `src/commands/<name>.rs`
//! artifact and the `ENTRY_POINTS` table binding each handler.
//! `command_tests.rs` declares one module per `tests/commands/<name>.rs` test
//! artifact and is pulled in by `tests/commands/mod.rs`.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

include!("src/extension/reserved_names.rs");

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));
    let commands_dir = manifest_dir.join("src").join("commands");
    let tests_dir = manifest_dir.join("tests").join("commands");
    println!("cargo:rerun-if-changed={}", commands_dir.display());
    println!("cargo:rerun-if-changed={}", tests_dir.display());
    println!("cargo:rerun-if-changed=src/extension/reserved_names.rs");

    let commands = artifacts(&commands_dir);
    let mut manifest = String::new();
    for (name, path) in &commands {
        writeln!(manifest, "#[path = {:?}]\npub mod {name};", path.display().to_string())
            .expect("write manifest");
    }
    manifest.push_str("\npub const ENTRY_POINTS: &[crate::registry::EntryPoint] = &[\n");
    for (name, _) in &commands {
        writeln!(manifest, "    {name}::ENTRY,").expect("write manifest");
    }
    manifest.push_str("];\n");
    fs::write(out_dir.join("command_manifest.rs"), manifest).expect("write command_manifest.rs");

    let mut suite = String::new();
    for (name, path) in artifacts(&tests_dir) {
        writeln!(suite, "#[path = {:?}]\nmod {name};", path.display().to_string())
            .expect("write test manifest");
    }
    fs::write(out_dir.join("command_tests.rs"), suite).expect("write command_tests.rs");
}

fn artifacts(dir: &Path) -> Vec<(String, PathBuf)> {
    let pattern = dir.join("*.rs");
    let mut found = Vec::new();
    for entry in glob::glob(&pattern.to_string_lossy()).expect("artifact glob") {
        let path = match entry {
            Ok(path) => path,
            Err(error) => {
                println!("cargo:warning=unreadable artifact: {error}");
                continue;
            }
        };
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if stem == "mod" {
            continue;
        }
        if !is_module_name(stem) {
            println!("cargo:warning=skipping {}: not a module name", path.display());
            continue;
        }
        found.push((stem.to_string(), path.clone()));
    }
    found.sort();
    found
}

fn is_module_name(stem: &str) -> bool {
    let mut chars = stem.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED_NAMES.contains(&stem)
}
