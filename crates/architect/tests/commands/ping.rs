use architect::commands::ping::ping_handler;

#[tokio::test]
async fn ping_replies_pong() {
    let reply = ping_handler("!ping").await.expect("reply");
    assert_eq!(reply.as_deref(), Some("pong"));
}
