//! Parsing of `/add -n <name> -d "<description>"` requests.

use crate::generation::GenerationRequest;

pub const ADD_PATTERN: &str = r"^/add(\s|$)";

pub const USAGE: &str = "Usage: /add -n <command_name> -d \"<description>\"\n\n\
Example: /add -n calculate -d \"Calculate mathematical expressions\"\n\n\
The command name must start with a letter and contain only lowercase letters, numbers, and underscores.\n\
The description should be in quotes.";

include!("reserved_names.rs");

/// Parse an add request. `None` means the fixed usage message applies.
/// The name is lower-cased before it is checked.
pub fn parse_add(body: &str) -> Option<GenerationRequest> {
    let name = flag_argument(body, "-n")?
        .split_whitespace()
        .next()?
        .to_lowercase();
    let description = quoted_argument(body, "-d")?;
    if !is_valid_name(&name) {
        return None;
    }
    Some(GenerationRequest {
        name,
        description: description.to_string(),
    })
}

/// `^[a-z][a-z0-9_]*$`, excluding reserved module names.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED_NAMES.contains(&name)
}

/// Text following the first `flag` that is separated from it by whitespace.
fn flag_argument<'a>(body: &'a str, flag: &str) -> Option<&'a str> {
    body.match_indices(flag).find_map(|(index, _)| {
        let after = &body[index + flag.len()..];
        let value = after.trim_start();
        (value.len() < after.len() && !value.is_empty()).then_some(value)
    })
}

fn quoted_argument<'a>(body: &'a str, flag: &str) -> Option<&'a str> {
    body.match_indices(flag).find_map(|(index, _)| {
        let after = &body[index + flag.len()..];
        let value = after.trim_start();
        if value.len() == after.len() {
            return None;
        }
        let quoted = value.strip_prefix('"')?;
        let end = quoted.find('"')?;
        (end > 0).then(|| &quoted[..end])
    })
}
