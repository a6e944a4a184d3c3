use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\u([0-9a-fA-F]{4})").unwrap());

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "blockquote", "figure", "figcaption", "section", "article", "header",
    "footer", "aside", "nav", "main", "table", "tr", "dl", "dt", "dd", "address",
];
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "img", "head", "title"];

/// Decode literal `\uXXXX` sequences, joining surrogate pairs.
/// Lone surrogates are left untouched.
pub fn decode_unicode_escapes(text: &str) -> String {
    let escapes: Vec<(usize, usize, u32)> = ESCAPE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let unit = u32::from_str_radix(&caps[1], 16).ok()?;
            Some((m.start(), m.end(), unit))
        })
        .collect();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut i = 0;
    while i < escapes.len() {
        let (start, end, unit) = escapes[i];
        out.push_str(&text[last..start]);

        if (0xD800..0xDC00).contains(&unit) {
            if let Some(&(next_start, next_end, low)) = escapes.get(i + 1) {
                if next_start == end && (0xDC00..0xE000).contains(&low) {
                    let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                    match char::from_u32(code) {
                        Some(c) => out.push(c),
                        None => out.push_str(&text[start..next_end]),
                    }
                    last = next_end;
                    i += 2;
                    continue;
                }
            }
        }

        match char::from_u32(unit) {
            Some(c) => out.push(c),
            None => out.push_str(&text[start..end]),
        }
        last = end;
        i += 1;
    }
    out.push_str(&text[last..]);
    out
}

/// Render an HTML fragment as plain text: blank line between blocks,
/// upper-cased headings, ` * ` / `1. ` list markers and `text [href]` links.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut writer = TextWriter::default();
    writer.walk(fragment.root_element(), false);
    writer.finish()
}

#[derive(Default)]
struct TextWriter {
    out: String,
    // newlines owed before the next piece of text
    pending_breaks: usize,
    pending_space: bool,
    list_depth: usize,
}

impl TextWriter {
    fn walk(&mut self, element: ElementRef<'_>, pre: bool) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.text(text, pre),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.element(el, pre);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>, pre: bool) {
        let name = el.value().name();
        match name {
            n if SKIPPED_TAGS.contains(&n) => {}
            "br" => {
                self.out.push('\n');
                self.pending_space = false;
            }
            "hr" => self.block_break(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.block_break();
                let start = self.out.len();
                self.walk(el, pre);
                let upper = self.out[start..].to_uppercase();
                self.out.truncate(start);
                self.out.push_str(&upper);
                self.block_break();
            }
            "ul" => self.list(el, false, pre),
            "ol" => self.list(el, true, pre),
            "li" => {
                self.line_start();
                self.push(" * ");
                self.walk(el, pre);
            }
            "pre" => {
                self.block_break();
                self.walk(el, true);
                self.block_break();
            }
            "a" => {
                let start = self.out.len();
                self.walk(el, pre);
                let href = el.value().attr("href").unwrap_or("").trim();
                let label = self.out[start..].trim();
                if !href.is_empty() && !href.starts_with('#') && href != label {
                    if label.is_empty() {
                        self.push(&format!("[{}]", href));
                    } else {
                        self.pending_space = true;
                        self.push(&format!("[{}]", href));
                    }
                }
            }
            "td" | "th" => {
                self.walk(el, pre);
                self.pending_space = true;
            }
            n if BLOCK_TAGS.contains(&n) => {
                self.block_break();
                self.walk(el, pre);
                self.block_break();
            }
            _ => self.walk(el, pre),
        }
    }

    fn list(&mut self, list: ElementRef<'_>, ordered: bool, pre: bool) {
        // a list inside an item continues the parent list on the next line
        let nested = self.list_depth > 0;
        if nested {
            self.line_start();
        } else {
            self.block_break();
        }
        self.list_depth += 1;
        let indent = "   ".repeat(self.list_depth - 1);

        let mut index = 0;
        for item in list.children().filter_map(ElementRef::wrap) {
            if item.value().name() != "li" {
                self.element(item, pre);
                continue;
            }
            index += 1;
            self.line_start();
            if ordered {
                self.push(&format!("{}{}. ", indent, index));
            } else {
                self.push(&format!("{} * ", indent));
            }
            self.walk(item, pre);
        }

        self.list_depth -= 1;
        if nested {
            self.line_start();
        } else {
            self.block_break();
        }
    }

    fn text(&mut self, raw: &str, pre: bool) {
        if pre {
            self.push(raw);
            return;
        }
        if raw.starts_with(char::is_whitespace) {
            self.pending_space = true;
        }
        let words = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        self.push(&words);
        if raw.ends_with(char::is_whitespace) {
            self.pending_space = true;
        }
    }

    fn block_break(&mut self) {
        self.pending_breaks = self.pending_breaks.max(2);
        self.pending_space = false;
    }

    fn line_start(&mut self) {
        self.pending_breaks = self.pending_breaks.max(1);
        self.pending_space = false;
    }

    fn push(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if !self.out.is_empty() {
            let trailing = self.out.chars().rev().take_while(|&c| c == '\n').count();
            if self.pending_breaks > trailing {
                for _ in trailing..self.pending_breaks {
                    self.out.push('\n');
                }
            } else if self.pending_space
                && !self.out.ends_with([' ', '\n'])
                && !s.starts_with(' ')
            {
                self.out.push(' ');
            }
        }
        self.pending_breaks = 0;
        self.pending_space = false;
        self.out.push_str(s);
    }

    fn finish(self) -> String {
        self.out
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n")
            .trim_matches('\n')
            .to_string()
    }
}
