use crate::commands::prelude::*;

command! {
    name: "greetings",
    description: "Responds to greetings (hi, hello, hey)",
    pattern: r"(?i)^(hi|hello|hey)$",
    handler: greetings_handler,
}

pub async fn greetings_handler(_body: &str) -> CoreResult<Option<String>> {
    Ok(Some(
        "Hello! I'm The Architect, a self-extending chat bot. Use !list to see available commands."
            .to_string(),
    ))
}
