use architect::commands::vibecode::vibecode_handler;

async fn reply(body: &str) -> Option<String> {
    vibecode_handler(body).await.expect("handler")
}

#[tokio::test]
async fn empty_description_shows_usage() {
    for body in ["!vibecode", "!vibecode   "] {
        let text = reply(body).await.expect("reply");
        assert!(text.starts_with("Please provide a description"), "{body:?}");
        assert!(text.contains("Usage: !vibecode <description>"));
    }
}

#[tokio::test]
async fn unprefixed_text_is_ignored() {
    assert_eq!(reply("vibecode make a request").await, None);
}

#[tokio::test]
async fn http_requests() {
    let get = reply("!vibecode make an http get request").await.expect("reply");
    assert!(get.contains("reqwest::blocking::get"));
    assert!(get.starts_with("```rust"));

    let post = reply("!vibecode make a post request to api").await.expect("reply");
    assert!(post.contains(".post("));
}

#[tokio::test]
async fn collections_and_strings() {
    let sorted = reply("!vibecode sort a list").await.expect("reply");
    assert!(sorted.contains("items.sort()"));
    let reversed = reply("!vibecode reverse a string").await.expect("reply");
    assert!(reversed.contains(".rev()"));
}

#[tokio::test]
async fn unknown_request_asks_for_details() {
    let text = reply("!vibecode something vague").await.expect("reply");
    assert!(text.contains("I need more specific details"));
    assert!(text.contains("'something vague'"));
}
