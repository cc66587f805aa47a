use crate::commands::prelude::*;
use rand::seq::IndexedRandom;

command! {
    name: "tldr",
    description: "Generate an uncomfortably honest 8-word summary of the current thread",
    pattern: r"^!tldr\b\s*(.*)$",
    handler: tldr_handler,
}

/// Canned summaries; the handler has no access to thread history.
pub const SUMMARIES: &[&str] = &[
    "Everyone argues but nobody actually reads the links",
    "Strong opinions expressed with zero supporting evidence provided",
    "Derailed into arguing about something completely different now",
    "Same debate recycled for the hundredth time today",
    "Everyone agrees violently while using different words exactly",
    "Nobody knows what they're talking about here honestly",
    "Confidently incorrect people explaining things to actual experts",
    "Could have been resolved with a simple search",
    "People talking past each other without realizing it",
    "Thread died when someone asked for actual sources",
    "Argument over semantics instead of the actual issue",
    "Everyone stopped reading after the first two messages",
    "Main point lost in increasingly pedantic side arguments",
    "Circular argument that went nowhere but wasted time",
    "Strong feelings about topic nobody will remember tomorrow",
    "Walls of text that nobody will actually read",
];

pub async fn tldr_handler(_body: &str) -> CoreResult<Option<String>> {
    let summary = SUMMARIES
        .choose(&mut rand::rng())
        .ok_or_else(|| CoreError::Internal("no summaries available".to_string()))?;
    Ok(Some((*summary).to_string()))
}
