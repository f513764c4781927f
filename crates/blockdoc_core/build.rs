use std::env;
use std::fs;
use std::path::PathBuf;

/// Markdown files rendered into rustdoc, as (source, name under OUT_DIR).
const DOC_PAGES: [(&str, &str); 2] = [
    ("README.md", "README.md"),
    ("src/store/README.md", "store_README.md"),
];

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    for (src, dest) in DOC_PAGES {
        println!("cargo:rerun-if-changed={}", src);
        let content = fs::read_to_string(src).unwrap_or_default();
        fs::write(out_dir.join(dest), without_frontmatter(&content))
            .unwrap_or_else(|e| panic!("Failed to write {}: {}", dest, e));
    }
}

/// Drop a leading `---` delimited YAML block, if present.
fn without_frontmatter(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("---") else {
        return content;
    };
    match rest.find("\n---") {
        Some(end) => rest[end + 4..].trim_start(),
        None => content,
    }
}
