use crate::commands::prelude::*;

command! {
    name: "ping",
    description: "Responds with 'pong'",
    pattern: r"^!ping$",
    handler: ping_handler,
}

pub async fn ping_handler(_body: &str) -> CoreResult<Option<String>> {
    Ok(Some("pong".to_string()))
}
