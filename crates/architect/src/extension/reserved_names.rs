// Shared with build.rs through `include!`.

/// Names that cannot become artifact modules: Rust keywords and the roots an
/// artifact module would shadow.
pub const RESERVED_NAMES: &[&str] = &[
    "alloc", "as", "async", "await", "break", "const", "continue", "core", "crate", "dyn",
    "else", "enum", "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop",
    "match", "mod", "move", "mut", "prelude", "pub", "ref", "return", "self", "static", "std",
    "struct", "super", "trait", "true", "try", "type", "unsafe", "use", "where", "while",
    "yield",
];
