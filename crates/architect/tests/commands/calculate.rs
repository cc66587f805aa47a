use architect::commands::calculate::{calculate_handler, evaluate};

async fn reply(body: &str) -> String {
    calculate_handler(body)
        .await
        .expect("handler")
        .expect("reply")
}

#[tokio::test]
async fn basic_operations() {
    assert_eq!(reply("!calculate 3+4").await, "3+4 = 7");
    assert_eq!(reply("!calculate 5-5").await, "5-5 = 0");
    assert_eq!(reply("!calculate 7*7").await, "7*7 = 49");
    assert_eq!(reply("!calculate 10/4").await, "10/4 = 2.5");
}

#[tokio::test]
async fn precedence_and_parentheses() {
    assert_eq!(reply("!calculate 2+3*4").await, "2+3*4 = 14");
    assert_eq!(reply("!calculate (2+3)*4").await, "(2+3)*4 = 20");
    assert_eq!(reply("!calculate -(2+3)").await, "-(2+3) = -5");
}

#[tokio::test]
async fn whitespace_is_ignored() {
    assert_eq!(reply("!calculate  1 + 2 ").await, "1+2 = 3");
}

#[tokio::test]
async fn empty_expression_shows_usage() {
    assert!(reply("!calculate").await.starts_with("Usage: !calculate"));
}

#[tokio::test]
async fn errors_are_reported_in_the_reply() {
    assert_eq!(reply("!calculate 1/0").await, "Error: division by zero");
    assert!(reply("!calculate (1+2").await.starts_with("Error:"));
    assert!(reply("!calculate 2^3").await.starts_with("Error:"));
}

#[test]
fn evaluator_never_executes_code() {
    assert!(evaluate("__import__('os')").is_err());
    assert_eq!(evaluate("7 % 4").expect("modulo"), 3.0);
}
