//! Pre-installation gate for generated command and test sources.
//!
//! Stages run in order and stop at the first failure:
//! parse, denylist scan, structural conformance, lowering of the `command!`
//! registration. Once staged on disk, the artifact is also type-checked with
//! the rest of the crate ([`compile`]).
//!
//! The syntax-tree stages are a heuristic filter. They keep out accidental use
//! of dangerous APIs, but they are not a sandbox and can be bypassed on
//! purpose (see [`denylist`]).

pub mod compile;
pub mod denylist;
mod lowering;

use syn::visit::Visit;
use syn::{Item, ItemFn, UseTree};
use thiserror::Error;

pub use compile::{BuildCheck, CargoCheck};
pub use lowering::CommandMeta;

/// Why a source was rejected. The `Display` text is the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("dangerous function call detected: {0}")]
    DangerousCall(String),
    #[error("dangerous import detected: {0}")]
    DangerousImport(String),
    #[error("handler function '{0}' not found")]
    MissingHandler(String),
    #[error("handler function '{0}' is defined more than once")]
    DuplicateHandler(String),
    #[error("handler function '{0}' must be async")]
    HandlerNotAsync(String),
    #[error("handler function '{0}' must be registered with command!")]
    MissingMarker(String),
    #[error("command source must import crate::commands::prelude::*")]
    MissingPrelude,
    #[error("item name '{0}' is reserved for command registration")]
    ReservedItem(String),
    #[error("test source defines no test functions")]
    NoTests,
    #[error("failed to compile: {0}")]
    Compile(String),
}

/// Name of the registration macro every command artifact invokes.
pub const MARKER_MACRO: &str = "command";

/// Items defined by the expansion of `command!`.
const REGISTRATION_ITEMS: [&str; 2] = ["ENTRY", "__entry"];

pub fn handler_name(command_name: &str) -> String {
    format!("{command_name}_handler")
}

/// Full gate for a command artifact. On success returns the lowered metadata.
pub fn validate_command(source: &str, name: &str) -> Result<CommandMeta, ValidationError> {
    let file = parse(source)?;
    denylist::scan(&file)?;
    check_structure(&file, name)?;
    lowering::lower(&file, name)
}

/// Relaxed gate for a test artifact: no handler or marker requirements.
pub fn validate_test(source: &str) -> Result<(), ValidationError> {
    let file = parse(source)?;
    denylist::scan(&file)?;
    let mut finder = TestFinder::default();
    finder.visit_file(&file);
    if finder.found == 0 {
        return Err(ValidationError::NoTests);
    }
    Ok(())
}

/// Lower an installed artifact's metadata without re-running the full gate.
pub fn describe(source: &str, name: &str) -> Result<CommandMeta, ValidationError> {
    let file = parse(source)?;
    lowering::lower(&file, name)
}

fn parse(source: &str) -> Result<syn::File, ValidationError> {
    syn::parse_file(source).map_err(|error| {
        let start = error.span().start();
        ValidationError::Syntax(format!(
            "{error} (line {}, column {})",
            start.line,
            start.column + 1
        ))
    })
}

fn check_structure(file: &syn::File, name: &str) -> Result<(), ValidationError> {
    let expected = handler_name(name);
    let handlers: Vec<&ItemFn> = file
        .items
        .iter()
        .filter_map(|item| match item {
            Item::Fn(function) if function.sig.ident == expected => Some(function),
            _ => None,
        })
        .collect();

    let handler = match handlers.as_slice() {
        [] => return Err(ValidationError::MissingHandler(expected)),
        [handler] => handler,
        _ => return Err(ValidationError::DuplicateHandler(expected)),
    };
    if handler.sig.asyncness.is_none() {
        return Err(ValidationError::HandlerNotAsync(expected));
    }
    if lowering::markers(file).is_empty() {
        return Err(ValidationError::MissingMarker(expected));
    }
    if !imports_prelude(file) {
        return Err(ValidationError::MissingPrelude);
    }
    let reserved = file
        .items
        .iter()
        .filter_map(item_ident)
        .find(|ident| REGISTRATION_ITEMS.contains(&ident.as_str()));
    if let Some(ident) = reserved {
        return Err(ValidationError::ReservedItem(ident));
    }
    Ok(())
}

fn item_ident(item: &Item) -> Option<String> {
    let ident = match item {
        Item::Fn(item) => &item.sig.ident,
        Item::Const(item) => &item.ident,
        Item::Static(item) => &item.ident,
        Item::Struct(item) => &item.ident,
        Item::Enum(item) => &item.ident,
        Item::Union(item) => &item.ident,
        Item::Type(item) => &item.ident,
        Item::Trait(item) => &item.ident,
        Item::Mod(item) => &item.ident,
        Item::Macro(item) => item.ident.as_ref()?,
        _ => return None,
    };
    Some(ident.to_string())
}

fn imports_prelude(file: &syn::File) -> bool {
    file.items.iter().any(|item| match item {
        Item::Use(item) => glob_imports(&item.tree, Vec::new())
            .iter()
            .any(|path| path.join("::") == "crate::commands::prelude"),
        _ => false,
    })
}

/// Paths brought in with `*` by one `use` tree.
fn glob_imports(tree: &UseTree, mut prefix: Vec<String>) -> Vec<Vec<String>> {
    match tree {
        UseTree::Path(path) => {
            prefix.push(path.ident.to_string());
            glob_imports(&path.tree, prefix)
        }
        UseTree::Glob(_) => vec![prefix],
        UseTree::Group(group) => group
            .items
            .iter()
            .flat_map(|tree| glob_imports(tree, prefix.clone()))
            .collect(),
        UseTree::Name(_) | UseTree::Rename(_) => Vec::new(),
    }
}

#[derive(Default)]
struct TestFinder {
    found: usize,
}

impl<'ast> Visit<'ast> for TestFinder {
    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        let is_test = node.attrs.iter().any(|attr| {
            attr.path()
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "test")
        });
        if is_test {
            self.found += 1;
        }
        syn::visit::visit_item_fn(self, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFORMANT: &str = r#"
use crate::commands::prelude::*;

command! {
    name: "calcx",
    description: "adds two numbers",
    pattern: r"^!calcx\s*(.*)$",
    handler: calcx_handler,
}

pub async fn calcx_handler(body: &str) -> CoreResult<Option<String>> {
    let sum: i64 = body
        .trim_start_matches("!calcx")
        .split_whitespace()
        .filter_map(|part| part.parse::<i64>().ok())
        .sum();
    Ok(Some(sum.to_string()))
}
"#;

    #[test]
    fn accepts_conformant_source() {
        let meta = validate_command(CONFORMANT, "calcx").expect("valid");
        assert_eq!(meta.name, "calcx");
        assert_eq!(meta.description, "adds two numbers");
        assert_eq!(meta.pattern, r"^!calcx\s*(.*)$");
    }

    #[test]
    fn syntax_error_reported() {
        let err = validate_command("pub async fn broken(", "broken").expect_err("syntax");
        assert!(matches!(err, ValidationError::Syntax(_)));
        assert!(err.to_string().starts_with("syntax error"));
    }

    #[test]
    fn missing_handler_has_distinct_reason() {
        let source = CONFORMANT.replace("pub async fn calcx_handler", "pub async fn other_handler");
        let err = validate_command(&source, "calcx").expect_err("missing handler");
        assert_eq!(err, ValidationError::MissingHandler("calcx_handler".to_string()));
    }

    #[test]
    fn sync_handler_has_distinct_reason() {
        let source = CONFORMANT.replace("pub async fn calcx_handler", "pub fn calcx_handler");
        let err = validate_command(&source, "calcx").expect_err("not async");
        assert_eq!(err, ValidationError::HandlerNotAsync("calcx_handler".to_string()));
    }

    #[test]
    fn missing_marker_has_distinct_reason() {
        let source = r#"
pub async fn calcx_handler(body: &str) -> CoreResult<Option<String>> {
    Ok(Some(body.to_string()))
}
"#;
        let err = validate_command(source, "calcx").expect_err("no marker");
        assert_eq!(err, ValidationError::MissingMarker("calcx_handler".to_string()));
    }

    #[test]
    fn duplicate_handler_rejected() {
        let source = format!(
            "{CONFORMANT}\npub async fn calcx_handler(body: &str) -> CoreResult<Option<String>> {{ Ok(None) }}\n"
        );
        let err = validate_command(&source, "calcx").expect_err("duplicate");
        assert_eq!(err, ValidationError::DuplicateHandler("calcx_handler".to_string()));
    }

    #[test]
    fn missing_prelude_import_rejected() {
        let source = CONFORMANT.replace("use crate::commands::prelude::*;", "");
        let err = validate_command(&source, "calcx").expect_err("no prelude");
        assert_eq!(err, ValidationError::MissingPrelude);
        assert_eq!(
            err.to_string(),
            "command source must import crate::commands::prelude::*"
        );
    }

    #[test]
    fn grouped_prelude_import_accepted() {
        let source = CONFORMANT.replace(
            "use crate::commands::prelude::*;",
            "use crate::commands::{prelude::*};",
        );
        validate_command(&source, "calcx").expect("grouped import");
    }

    #[test]
    fn registration_item_names_rejected() {
        let source = format!("{CONFORMANT}\nconst ENTRY: u8 = 0;\n");
        let err = validate_command(&source, "calcx").expect_err("clashes with ENTRY");
        assert_eq!(err, ValidationError::ReservedItem("ENTRY".to_string()));

        let source = format!("{CONFORMANT}\nfn __entry() {{}}\n");
        let err = validate_command(&source, "calcx").expect_err("clashes with __entry");
        assert_eq!(err, ValidationError::ReservedItem("__entry".to_string()));
    }

    #[test]
    fn denylist_runs_before_structure() {
        let source = r#"
use std::process::Command;

pub fn calcx_handler() {}
"#;
        let err = validate_command(source, "calcx").expect_err("dangerous");
        assert_eq!(err, ValidationError::DangerousImport("std::process::Command".to_string()));
    }

    #[test]
    fn test_source_requires_a_test_function() {
        let ok = r#"
use architect::commands::calcx::calcx_handler;

#[tokio::test]
async fn calcx_sums() {
    let reply = calcx_handler("!calcx 1 2").await.expect("reply");
    assert_eq!(reply.as_deref(), Some("3"));
}
"#;
        validate_test(ok).expect("valid test source");

        let err = validate_test("fn helper() {}").expect_err("no tests");
        assert_eq!(err, ValidationError::NoTests);
    }

    #[test]
    fn test_source_is_scanned_for_dangerous_calls() {
        let source = r#"
#[test]
fn reads_file() {
    let _ = std::fs::read_to_string("/etc/passwd");
}
"#;
        let err = validate_test(source).expect_err("dangerous");
        assert_eq!(
            err,
            ValidationError::DangerousCall("std::fs::read_to_string".to_string())
        );
    }

    #[test]
    fn describe_skips_structure_checks() {
        let meta = describe(CONFORMANT, "calcx").expect("describe");
        assert_eq!(meta.name, "calcx");
    }
}
