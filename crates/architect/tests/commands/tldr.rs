use architect::commands::tldr::{tldr_handler, SUMMARIES};

#[tokio::test]
async fn reply_is_one_of_the_summaries() {
    let reply = tldr_handler("!tldr").await.expect("handler").expect("reply");
    assert!(SUMMARIES.contains(&reply.as_str()));
}

#[test]
fn summaries_are_eight_words() {
    for summary in SUMMARIES {
        assert_eq!(summary.split_whitespace().count(), 8, "{summary}");
    }
}
