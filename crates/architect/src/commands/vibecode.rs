use crate::commands::prelude::*;

command! {
    name: "vibecode",
    description: "reply with the smallest runnable snippet that accomplishes the user's described behavior",
    pattern: r"(?is)^!vibecode\b\s*(.*)$",
    handler: vibecode_handler,
}

const USAGE: &str =
    "Please provide a description of what you want the code to do.\n\nUsage: !vibecode <description>";

/// `(every keyword group must match, snippet)`; a group matches when any of
/// its words occurs in the description. First matching rule wins.
const SNIPPETS: &[(&[&[&str]], &str)] = &[
    (
        &[&["hello"], &["world"]],
        "fn main() {\n    println!(\"Hello, World!\");\n}",
    ),
    (
        &[&["read"], &["file"]],
        "fn main() -> std::io::Result<()> {\n    let content = std::fs::read_to_string(\"file.txt\")?;\n    println!(\"{content}\");\n    Ok(())\n}",
    ),
    (
        &[&["write"], &["file"]],
        "fn main() -> std::io::Result<()> {\n    std::fs::write(\"file.txt\", \"content\")\n}",
    ),
    (
        &[&["post"], &["http", "request", "api"]],
        "let body = reqwest::blocking::Client::new()\n    .post(\"https://example.com/api\")\n    .json(&serde_json::json!({ \"key\": \"value\" }))\n    .send()?\n    .text()?;",
    ),
    (
        &[&["http", "request", "api", "fetch", "get url"]],
        "let body = reqwest::blocking::get(\"https://example.com\")?.text()?;\nprintln!(\"{body}\");",
    ),
    (
        &[&["json"], &["parse", "read", "load"]],
        "let value: serde_json::Value = serde_json::from_str(r#\"{\"key\": \"value\"}\"#)?;\nprintln!(\"{}\", value[\"key\"]);",
    ),
    (
        &[&["json"], &["write", "dump", "serialize"]],
        "let text = serde_json::to_string(&serde_json::json!({ \"key\": \"value\" }))?;\nprintln!(\"{text}\");",
    ),
    (
        &[&["sort"], &["list", "array", "vec"]],
        "let mut items = vec![3, 1, 4, 1, 5];\nitems.sort();\nprintln!(\"{items:?}\");",
    ),
    (
        &[&["reverse"], &["list", "array", "vec"]],
        "let mut items = vec![1, 2, 3, 4, 5];\nitems.reverse();\nprintln!(\"{items:?}\");",
    ),
    (
        &[&["reverse"], &["string"]],
        "let reversed: String = \"hello\".chars().rev().collect();\nprintln!(\"{reversed}\");",
    ),
    (
        &[&["split"], &["string", "text"]],
        "let parts: Vec<&str> = \"a,b,c\".split(',').collect();\nprintln!(\"{parts:?}\");",
    ),
    (
        &[&["join"], &["list", "array", "vec", "string"]],
        "let joined = [\"a\", \"b\", \"c\"].join(\",\");\nprintln!(\"{joined}\");",
    ),
    (
        &[&["current"], &["time", "date"]],
        "println!(\"{}\", chrono::Local::now());",
    ),
    (
        &[&["random"], &["choice", "pick", "choose"]],
        "use rand::seq::IndexedRandom;\nlet pick = [\"a\", \"b\", \"c\"].choose(&mut rand::rng());\nprintln!(\"{pick:?}\");",
    ),
    (
        &[&["random"]],
        "let n = rand::random_range(1..=100);\nprintln!(\"{n}\");",
    ),
    (
        &[&["sleep", "wait"]],
        "std::thread::sleep(std::time::Duration::from_secs(1));",
    ),
    (
        &[&["environment", "env var"]],
        "let home = std::env::var(\"HOME\").unwrap_or_default();\nprintln!(\"{home}\");",
    ),
    (
        &[&["argument", "args"]],
        "let args: Vec<String> = std::env::args().skip(1).collect();\nprintln!(\"{args:?}\");",
    ),
    (
        &[&["loop", "iterate"]],
        "for i in 0..10 {\n    println!(\"{i}\");\n}",
    ),
    (
        &[&["struct", "class"]],
        "struct Item {\n    value: i32,\n}\n\nlet item = Item { value: 42 };\nprintln!(\"{}\", item.value);",
    ),
    (
        &[&["map", "dictionary", "dict"]],
        "let mut map = std::collections::HashMap::new();\nmap.insert(\"key\", \"value\");\nprintln!(\"{}\", map[\"key\"]);",
    ),
    (
        &[&["function", "fn"]],
        "fn double(x: i32) -> i32 {\n    x * 2\n}",
    ),
];

pub async fn vibecode_handler(body: &str) -> CoreResult<Option<String>> {
    let Some(rest) = body.trim().strip_prefix("!vibecode") else {
        return Ok(None);
    };
    let description = rest.trim();
    if description.is_empty() {
        return Ok(Some(USAGE.to_string()));
    }

    let lowered = description.to_lowercase();
    let snippet = SNIPPETS.iter().find_map(|(groups, snippet)| {
        groups
            .iter()
            .all(|words| words.iter().any(|word| lowered.contains(word)))
            .then_some(*snippet)
    });
    let reply = match snippet {
        Some(snippet) => format!("```rust\n{snippet}\n```"),
        None => format!(
            "I need more specific details to generate a code snippet for: '{description}'\n\n\
             Try describing a specific programming task like:\n\
             - read a file\n- make an HTTP request\n- sort a list\n- reverse a string"
        ),
    };
    Ok(Some(reply))
}
