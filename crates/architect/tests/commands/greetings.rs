use architect::commands::greetings::greetings_handler;

#[tokio::test]
async fn greeting_introduces_the_bot() {
    let reply = greetings_handler("hello").await.expect("reply").expect("text");
    assert!(reply.contains("The Architect"));
    assert!(reply.contains("!list"));
}
