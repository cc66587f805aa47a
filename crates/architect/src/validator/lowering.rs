//! Lowering of the `command!` registration into [`CommandMeta`].
//!
//! This is the stage that catches what parsing alone does not: arguments the
//! macro would not accept, a pattern that does not compile, a handler binding
//! that points at the wrong function, or a handler signature that does not fit
//! the entry point type.

use regex::Regex;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{FnArg, Ident, Item, ItemFn, ItemMacro, LitStr, ReturnType, Token, Type};

use super::{handler_name, ValidationError, MARKER_MACRO};

const EXPECTED_KEYS: [&str; 4] = ["name", "description", "pattern", "handler"];

/// Registration metadata lowered from an artifact's `command!` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMeta {
    pub name: String,
    pub description: String,
    pub pattern: String,
}

enum MarkerValue {
    Str(LitStr),
    Ident(Ident),
}

struct MarkerField {
    key: Ident,
    value: MarkerValue,
}

impl Parse for MarkerField {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let key: Ident = input.parse()?;
        input.parse::<Token![:]>()?;
        let value = if input.peek(LitStr) {
            MarkerValue::Str(input.parse()?)
        } else if input.peek(Ident) {
            MarkerValue::Ident(input.parse()?)
        } else {
            return Err(input.error("expected a string literal or an identifier"));
        };
        Ok(Self { key, value })
    }
}

/// Top-level `command!` invocations in declaration order.
pub(super) fn markers(file: &syn::File) -> Vec<&ItemMacro> {
    file.items
        .iter()
        .filter_map(|item| match item {
            Item::Macro(item)
                if item
                    .mac
                    .path
                    .segments
                    .last()
                    .is_some_and(|segment| segment.ident == MARKER_MACRO) =>
            {
                Some(item)
            }
            _ => None,
        })
        .collect()
}

pub(super) fn lower(file: &syn::File, name: &str) -> Result<CommandMeta, ValidationError> {
    let marker = match markers(file).as_slice() {
        [] => return Err(compile_error("no command! registration found")),
        [marker] => *marker,
        _ => return Err(compile_error("more than one command! registration")),
    };

    let fields = marker
        .mac
        .parse_body_with(Punctuated::<MarkerField, Token![,]>::parse_terminated)
        .map_err(|error| compile_error(format!("invalid command! arguments: {error}")))?;
    let keys: Vec<String> = fields.iter().map(|field| field.key.to_string()).collect();
    if keys != EXPECTED_KEYS {
        return Err(compile_error(format!(
            "command! expects `{}` in that order, found `{}`",
            EXPECTED_KEYS.join("`, `"),
            keys.join("`, `")
        )));
    }

    let mut fields = fields.into_iter();
    let declared_name = expect_str(fields.next(), "name")?;
    let description = expect_str(fields.next(), "description")?;
    let pattern = expect_str(fields.next(), "pattern")?;
    let handler = expect_ident(fields.next(), "handler")?;

    if declared_name != name {
        return Err(compile_error(format!(
            "command! name \"{declared_name}\" does not match expected name \"{name}\""
        )));
    }
    if description.trim().is_empty() {
        return Err(compile_error("command! description is empty"));
    }
    Regex::new(&pattern)
        .map_err(|error| compile_error(format!("invalid pattern {pattern:?}: {error}")))?;

    let expected_handler = handler_name(name);
    if handler != expected_handler {
        return Err(compile_error(format!(
            "command! handler `{handler}` is not `{expected_handler}`"
        )));
    }
    let function = find_function(file, &expected_handler)
        .ok_or_else(|| compile_error(format!("cannot find function `{expected_handler}`")))?;
    check_signature(function)?;

    Ok(CommandMeta {
        name: declared_name,
        description,
        pattern,
    })
}

fn find_function<'a>(file: &'a syn::File, ident: &str) -> Option<&'a ItemFn> {
    file.items.iter().find_map(|item| match item {
        Item::Fn(function) if function.sig.ident == ident => Some(function),
        _ => None,
    })
}

fn check_signature(function: &ItemFn) -> Result<(), ValidationError> {
    let ident = &function.sig.ident;
    let takes_str = match function.sig.inputs.iter().collect::<Vec<_>>().as_slice() {
        [FnArg::Typed(arg)] => is_str_ref(&arg.ty),
        _ => false,
    };
    if !takes_str {
        return Err(compile_error(format!(
            "handler `{ident}` must take exactly one `&str` parameter"
        )));
    }
    if matches!(function.sig.output, ReturnType::Default) {
        return Err(compile_error(format!(
            "handler `{ident}` must return CoreResult<Option<String>>"
        )));
    }
    Ok(())
}

fn is_str_ref(ty: &Type) -> bool {
    match ty {
        Type::Reference(reference) if reference.mutability.is_none() => {
            matches!(reference.elem.as_ref(), Type::Path(path) if path.path.is_ident("str"))
        }
        _ => false,
    }
}

fn expect_str(field: Option<MarkerField>, key: &str) -> Result<String, ValidationError> {
    match field.map(|field| field.value) {
        Some(MarkerValue::Str(value)) => Ok(value.value()),
        _ => Err(compile_error(format!("command! `{key}` must be a string literal"))),
    }
}

fn expect_ident(field: Option<MarkerField>, key: &str) -> Result<String, ValidationError> {
    match field.map(|field| field.value) {
        Some(MarkerValue::Ident(value)) => Ok(value.to_string()),
        _ => Err(compile_error(format!("command! `{key}` must be an identifier"))),
    }
}

fn compile_error(message: impl Into<String>) -> ValidationError {
    ValidationError::Compile(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower_source(source: &str, name: &str) -> Result<CommandMeta, ValidationError> {
        lower(&syn::parse_file(source).expect("parse"), name)
    }

    fn artifact(marker_body: &str, signature: &str) -> String {
        format!(
            "command! {{ {marker_body} }}\n\n{signature} {{ Ok(None) }}\n"
        )
    }

    const GOOD_MARKER: &str =
        r#"name: "echo", description: "echoes", pattern: r"^!echo\s*(.*)$", handler: echo_handler,"#;
    const GOOD_SIGNATURE: &str =
        "pub async fn echo_handler(body: &str) -> CoreResult<Option<String>>";

    #[test]
    fn lowers_metadata() {
        let meta = lower_source(&artifact(GOOD_MARKER, GOOD_SIGNATURE), "echo").expect("lower");
        assert_eq!(
            meta,
            CommandMeta {
                name: "echo".to_string(),
                description: "echoes".to_string(),
                pattern: r"^!echo\s*(.*)$".to_string(),
            }
        );
    }

    #[test]
    fn rejects_invalid_pattern() {
        let marker =
            r#"name: "echo", description: "echoes", pattern: "^!echo(", handler: echo_handler"#;
        let err = lower_source(&artifact(marker, GOOD_SIGNATURE), "echo").expect_err("pattern");
        assert!(err.to_string().starts_with("failed to compile: invalid pattern"));
    }

    #[test]
    fn rejects_name_mismatch() {
        let err = lower_source(&artifact(GOOD_MARKER, GOOD_SIGNATURE), "other")
            .expect_err("mismatch");
        assert!(matches!(err, ValidationError::Compile(message) if message.contains("does not match")));
    }

    #[test]
    fn rejects_wrong_handler_binding() {
        let marker =
            r#"name: "echo", description: "echoes", pattern: "^!echo", handler: helper"#;
        let err = lower_source(&artifact(marker, GOOD_SIGNATURE), "echo").expect_err("binding");
        assert!(matches!(err, ValidationError::Compile(message) if message.contains("`helper`")));
    }

    #[test]
    fn rejects_reordered_or_missing_keys() {
        let marker = r#"description: "echoes", name: "echo", pattern: "^!echo", handler: echo_handler"#;
        assert!(lower_source(&artifact(marker, GOOD_SIGNATURE), "echo").is_err());

        let marker = r#"name: "echo", pattern: "^!echo", handler: echo_handler"#;
        assert!(lower_source(&artifact(marker, GOOD_SIGNATURE), "echo").is_err());
    }

    #[test]
    fn rejects_bad_signature() {
        let err = lower_source(
            &artifact(GOOD_MARKER, "pub async fn echo_handler(body: String) -> CoreResult<Option<String>>"),
            "echo",
        )
        .expect_err("signature");
        assert!(matches!(err, ValidationError::Compile(message) if message.contains("&str")));

        let err = lower_source(
            &format!("command! {{ {GOOD_MARKER} }}\npub async fn echo_handler(body: &str) {{}}\n"),
            "echo",
        )
        .expect_err("return type");
        assert!(matches!(err, ValidationError::Compile(message) if message.contains("must return")));
    }

    #[test]
    fn rejects_multiple_markers() {
        let source = format!(
            "command! {{ {GOOD_MARKER} }}\n{}",
            artifact(GOOD_MARKER, GOOD_SIGNATURE)
        );
        let err = lower_source(&source, "echo").expect_err("two markers");
        assert!(matches!(err, ValidationError::Compile(message) if message.contains("more than one")));
    }
}
