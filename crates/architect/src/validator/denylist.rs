//! Name-based scan for dangerous calls and imports.
//!
//! A path is dangerous when one of the [`DENYLIST`] entries appears in it as a
//! contiguous run of segments, so `process::Command` matches
//! `std::process::Command::new` but `Command` alone does not match
//! `CommandSpec`. Only call expressions (including the comma-separated
//! arguments of macro calls), macro names, `use` items and `extern crate`
//! items are inspected.
//!
//! Known bypasses, kept on purpose because this is a name match and not a data
//! flow analysis:
//! - binding a function to a local first (`let spawn = Command::new; spawn("sh")`),
//!   since the callee is then a local variable;
//! - a type alias (`type Sh = std::process::Command;`) followed by `Sh::new()`;
//! - method calls on values obtained some other way.

use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::{Expr, ExprCall, ItemExternCrate, ItemUse, Macro, Token, UseTree};

use super::ValidationError;

/// Paths (or path fragments) treated as unsafe in installed commands.
pub const DENYLIST: &[&str] = &[
    // process execution
    "std::process",
    "tokio::process",
    "process::Command",
    "Command::new",
    "exec",
    "execv",
    "execvp",
    "libc",
    "nix",
    // dynamic loading
    "libloading",
    "Library::new",
    "dlopen",
    // raw file access
    "std::fs",
    "tokio::fs",
    "File::open",
    "File::create",
    "OpenOptions",
    // memory reinterpretation
    "transmute",
    // source inclusion
    "include",
    "include_str",
    "include_bytes",
];

pub fn scan(file: &syn::File) -> Result<(), ValidationError> {
    let mut scanner = Scanner::default();
    scanner.visit_file(file);
    match scanner.finding {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Returns the denylist entry matching `segments`, if any.
pub fn matched_entry(segments: &[String]) -> Option<&'static str> {
    DENYLIST.iter().copied().find(|entry| {
        let parts: Vec<&str> = entry.split("::").collect();
        segments.len() >= parts.len()
            && segments
                .windows(parts.len())
                .any(|window| window.iter().zip(&parts).all(|(a, b)| a == b))
    })
}

#[derive(Default)]
struct Scanner {
    finding: Option<ValidationError>,
}

impl Scanner {
    fn check_call(&mut self, segments: Vec<String>) {
        if self.finding.is_none() && matched_entry(&segments).is_some() {
            self.finding = Some(ValidationError::DangerousCall(segments.join("::")));
        }
    }

    fn check_import(&mut self, segments: Vec<String>) {
        if self.finding.is_none() && matched_entry(&segments).is_some() {
            self.finding = Some(ValidationError::DangerousImport(segments.join("::")));
        }
    }
}

impl<'ast> Visit<'ast> for Scanner {
    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        if self.finding.is_some() {
            return;
        }
        if let Expr::Path(callee) = node.func.as_ref() {
            self.check_call(path_segments(&callee.path));
        }
        visit::visit_expr_call(self, node);
    }

    fn visit_macro(&mut self, node: &'ast Macro) {
        if self.finding.is_some() {
            return;
        }
        self.check_call(path_segments(&node.path));
        // Macro bodies are opaque tokens; format-style bodies still parse as
        // expressions and get the same call scan.
        if let Ok(args) = node.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
            for arg in &args {
                self.visit_expr(arg);
            }
        }
        visit::visit_macro(self, node);
    }

    fn visit_item_use(&mut self, node: &'ast ItemUse) {
        if self.finding.is_some() {
            return;
        }
        let mut imports = Vec::new();
        flatten_use(&node.tree, Vec::new(), &mut imports);
        for import in imports {
            self.check_import(import);
        }
    }

    fn visit_item_extern_crate(&mut self, node: &'ast ItemExternCrate) {
        self.check_import(vec![node.ident.to_string()]);
    }
}

fn path_segments(path: &syn::Path) -> Vec<String> {
    path.segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect()
}

fn flatten_use(tree: &UseTree, prefix: Vec<String>, out: &mut Vec<Vec<String>>) {
    match tree {
        UseTree::Path(path) => {
            let mut next = prefix;
            next.push(path.ident.to_string());
            flatten_use(&path.tree, next, out);
        }
        UseTree::Name(name) => {
            let mut full = prefix;
            if name.ident != "self" {
                full.push(name.ident.to_string());
            }
            out.push(full);
        }
        UseTree::Rename(rename) => {
            let mut full = prefix;
            if rename.ident != "self" {
                full.push(rename.ident.to_string());
            }
            out.push(full);
        }
        UseTree::Glob(_) => out.push(prefix),
        UseTree::Group(group) => {
            for item in &group.items {
                flatten_use(item, prefix.clone(), out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_source(source: &str) -> Result<(), ValidationError> {
        scan(&syn::parse_file(source).expect("parse"))
    }

    #[test]
    fn flags_process_execution_call() {
        let err = scan_source(
            r#"async fn run() { let _ = std::process::Command::new("ls").output(); }"#,
        )
        .expect_err("dangerous");
        assert_eq!(
            err,
            ValidationError::DangerousCall("std::process::Command::new".to_string())
        );
    }

    #[test]
    fn flags_grouped_and_renamed_imports() {
        let err = scan_source("use std::{collections::HashMap, process::Command as Cmd};")
            .expect_err("dangerous");
        assert_eq!(
            err,
            ValidationError::DangerousImport("std::process::Command".to_string())
        );

        let err = scan_source("use tokio::fs as files;").expect_err("dangerous");
        assert_eq!(err, ValidationError::DangerousImport("tokio::fs".to_string()));
    }

    #[test]
    fn flags_glob_import_and_extern_crate() {
        let err = scan_source("use std::fs::*;").expect_err("glob");
        assert_eq!(err, ValidationError::DangerousImport("std::fs".to_string()));

        let err = scan_source("extern crate libloading;").expect_err("extern crate");
        assert_eq!(err, ValidationError::DangerousImport("libloading".to_string()));
    }

    #[test]
    fn flags_source_inclusion_macros() {
        let err = scan_source(r#"const SECRET: &str = include_str!("/etc/shadow");"#)
            .expect_err("include_str");
        assert_eq!(err, ValidationError::DangerousCall("include_str".to_string()));
    }

    #[test]
    fn flags_calls_inside_format_macros() {
        let err = scan_source(
            r#"fn show() { println!("{:?}", std::fs::read_to_string("x")); }"#,
        )
        .expect_err("nested call");
        assert_eq!(
            err,
            ValidationError::DangerousCall("std::fs::read_to_string".to_string())
        );
    }

    #[test]
    fn allows_ordinary_code() {
        scan_source(
            r#"
use std::collections::HashMap;
use regex::Regex;

fn count(body: &str) -> usize {
    let mut seen = HashMap::new();
    for word in body.split_whitespace() {
        *seen.entry(word).or_insert(0) += 1;
    }
    println!("{}", seen.len());
    seen.len()
}
"#,
        )
        .expect("clean");
    }

    #[test]
    fn segment_match_is_whole_word() {
        assert!(matched_entry(&["CommandSpec".to_string(), "new".to_string()]).is_none());
        assert_eq!(
            matched_entry(&["process".to_string(), "Command".to_string()]),
            Some("process::Command")
        );
    }

    #[test]
    fn local_binding_bypass_is_not_detected() {
        // Documented limitation of the name-based scan.
        scan_source(
            r#"fn sneaky() { let spawn = std::process::Command::new; let _ = spawn("sh"); }"#,
        )
        .expect("path expression outside call position is not scanned");
    }
}
