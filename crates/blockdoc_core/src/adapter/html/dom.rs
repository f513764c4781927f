//! Minimal HTML tokenizer and tree builder.
//!
//! Enough HTML to read back our own output and ordinary pasted markup: tags
//! with quoted or bare attributes, void elements, comments, raw text inside
//! `script`/`style`, character references, and the implicit closing of
//! `p` and `li`. Element and attribute names are lower-cased; attribute
//! order is preserved.

/// A parsed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// An element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: impl Into<String>, attrs: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            attrs,
            children: Vec::new(),
        }
    }

    /// First attribute with this name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(key, _)| key == name)
    }

    /// Whether the `class` attribute lists this class.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    /// The first class starting with `prefix`, without the prefix.
    pub fn class_with_prefix(&self, prefix: &str) -> Option<&str> {
        self.attr("class")?
            .split_ascii_whitespace()
            .find_map(|c| c.strip_prefix(prefix))
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First descendant element (depth first) with this name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements()
            .find_map(|child| if child.name == name { Some(child) } else { child.find(name) })
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) if element.name == "br" => out.push('\n'),
            Node::Element(element) => collect_text(&element.children, out),
            Node::Comment(_) => {}
        }
    }
}

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: [&str; 3] = ["script", "style", "textarea"];

/// Elements that end an open `p`.
const CLOSES_PARAGRAPH: [&str; 17] = [
    "address", "article", "aside", "blockquote", "div", "figure", "footer", "h1", "h2", "h3",
    "h4", "h5", "h6", "hr", "ol", "pre", "ul",
];

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(String),
    Comment(String),
}

/// Parse a document or fragment into its top-level nodes.
pub(crate) fn parse(html: &str) -> Vec<Node> {
    build(tokenize(html))
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after.find("-->").unwrap_or(after.len());
            tokens.push(Token::Comment(after[..end].to_string()));
            rest = &after[(end + 3).min(after.len())..];
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            // Doctype or processing instruction.
            let end = rest.find('>').map_or(rest.len(), |i| i + 1);
            rest = &rest[end..];
        } else if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').unwrap_or(after.len());
            let name = after[..end].trim().to_ascii_lowercase();
            if !name.is_empty() {
                tokens.push(Token::Close(name));
            }
            rest = &after[(end + 1).min(after.len())..];
        } else if rest.len() > 1
            && rest.starts_with('<')
            && rest.as_bytes()[1].is_ascii_alphabetic()
        {
            let (token, consumed) = open_tag(rest);
            rest = &rest[consumed..];
            if let Token::Open {
                name,
                self_closing: false,
                ..
            } = &token
                && RAW_TEXT_ELEMENTS.contains(&name.as_str())
            {
                let closing = format!("</{}", name);
                let end = rest
                    .to_ascii_lowercase()
                    .find(&closing)
                    .unwrap_or(rest.len());
                let raw = rest[..end].to_string();
                tokens.push(token);
                if !raw.is_empty() {
                    tokens.push(Token::Text(raw));
                }
                rest = &rest[end..];
                continue;
            }
            tokens.push(token);
        } else {
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            let end = rest[skip..].find('<').map_or(rest.len(), |i| i + skip);
            tokens.push(Token::Text(decode_entities(&rest[..end])));
            rest = &rest[end..];
        }
    }
    tokens
}

/// Read an open tag starting at `<`. Returns the token and the bytes consumed.
fn open_tag(input: &str) -> (Token, usize) {
    let bytes = input.as_bytes();
    let mut pos = 1;
    let is_name_end = |b: u8| b.is_ascii_whitespace() || b == b'/' || b == b'>';

    let start = pos;
    while pos < bytes.len() && !is_name_end(bytes[pos]) {
        pos += 1;
    }
    let name = input[start..pos].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        match bytes[pos] {
            b'>' => {
                pos += 1;
                break;
            }
            b'/' => {
                pos += 1;
                if bytes.get(pos) == Some(&b'>') {
                    self_closing = true;
                    pos += 1;
                    break;
                }
                continue;
            }
            _ => {}
        }

        let key_start = pos;
        while pos < bytes.len() && !is_name_end(bytes[pos]) && bytes[pos] != b'=' {
            pos += 1;
        }
        let key = input[key_start..pos].to_ascii_lowercase();

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let mut value = String::new();
        if bytes.get(pos) == Some(&b'=') {
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            match bytes.get(pos) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let value_start = pos + 1;
                    let end = input[value_start..]
                        .find(quote as char)
                        .map_or(input.len(), |i| value_start + i);
                    value = decode_entities(&input[value_start..end]);
                    pos = (end + 1).min(input.len());
                }
                _ => {
                    let value_start = pos;
                    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>'
                    {
                        pos += 1;
                    }
                    value = decode_entities(&input[value_start..pos]);
                }
            }
        }
        if !key.is_empty() {
            attrs.push((key, value));
        }
    }

    (
        Token::Open {
            name,
            attrs,
            self_closing,
        },
        pos,
    )
}

/// Decode character references. Unknown references are kept literally.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => {
                    let code = if let Some(hex) =
                        entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X"))
                    {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        entity.strip_prefix('#').and_then(|dec| dec.parse().ok())
                    };
                    code.and_then(char::from_u32)
                }
            };
            c.map(|c| (c, end + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn build(tokens: Vec<Token>) -> Vec<Node> {
    let mut stack = vec![Element::new("#root", Vec::new())];

    for token in tokens {
        match token {
            Token::Open {
                name,
                attrs,
                self_closing,
            } => {
                let top = stack.last().map(|e| e.name.as_str());
                let closes_top = match top {
                    Some("p") => name == "p" || CLOSES_PARAGRAPH.contains(&name.as_str()),
                    Some("li") => name == "li",
                    _ => false,
                };
                if closes_top {
                    close_top(&mut stack);
                }

                let element = Element::new(name, attrs);
                if self_closing || VOID_ELEMENTS.contains(&element.name.as_str()) {
                    append(&mut stack, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Token::Close(name) => {
                if let Some(index) = stack.iter().rposition(|e| e.name == name)
                    && index > 0
                {
                    while stack.len() > index {
                        close_top(&mut stack);
                    }
                }
            }
            Token::Text(text) => {
                if let Some(Node::Text(previous)) =
                    stack.last_mut().and_then(|top| top.children.last_mut())
                {
                    previous.push_str(&text);
                } else {
                    append(&mut stack, Node::Text(text));
                }
            }
            Token::Comment(text) => append(&mut stack, Node::Comment(text)),
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn append(stack: &mut [Element], node: Node) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

fn close_top(stack: &mut Vec<Element>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(element) = stack.pop() {
        append(stack, Node::Element(element));
    }
}
