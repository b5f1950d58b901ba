// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\nParagraph with some content.\n\n-   Bullet point\n    -   Nested item\n-   Another item\n\n> Quoted line.\n\n> Second quote.\n\n```rust\nfn example() {\n    println!(\"Hello\");\n}\n```\n\n";
    base.repeat(size)
}

/// The same document with one word changed in every repetition.
#[allow(dead_code)]
pub fn generate_edited_content(size: usize) -> String {
    generate_markdown_content(size).replace("some content", "other content")
}
