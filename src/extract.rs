//! Visible-text extraction from fetched HTML pages.
//!
//! Uses `quick-xml` in a lenient mode: end tags are not checked, so void
//! elements (`<br>`, `<img>`) and sloppy nesting do not abort the parse.
//! Text inside `script`, `style`, `noscript`, and `template` is dropped;
//! runs of whitespace are collapsed to single spaces.
//!
//! Those elements hold raw text in HTML (`if (a<b)` is not a tag), so their
//! bodies are cut out of the page before the reader sees it.

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;

/// Elements whose text content is never visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extraction error. A page that fails to parse is skipped by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("HTML parse failed at byte {position}: {message}")]
    Html { position: u64, message: String },
}

/// Returns the visible text of `html`, whitespace-collapsed.
pub fn extract_text(html: &str) -> Result<String, ExtractError> {
    let html = strip_hidden(html);
    let mut reader = Reader::from_str(&html);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.check_comments = false;

    let mut out = String::new();
    let mut hidden_depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if is_hidden(e.local_name().as_ref()) {
                    hidden_depth += 1;
                }
            }
            Ok(Event::End(e)) => {
                if is_hidden(e.local_name().as_ref()) {
                    hidden_depth = hidden_depth.saturating_sub(1);
                }
            }
            Ok(Event::Text(te)) if hidden_depth == 0 => {
                // HTML named entities (&nbsp;, &copy;) are not XML; keep them verbatim.
                let text = match te.unescape() {
                    Ok(t) => t.into_owned(),
                    Err(_) => String::from_utf8_lossy(&te).into_owned(),
                };
                push_words(&mut out, &text);
            }
            Ok(Event::CData(cd)) if hidden_depth == 0 => {
                push_words(&mut out, &String::from_utf8_lossy(&cd));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Html {
                    position: reader.error_position() as u64,
                    message: e.to_string(),
                })
            }
            _ => {}
        }
    }
    Ok(out)
}

fn is_hidden(name: &[u8]) -> bool {
    HIDDEN_ELEMENTS
        .iter()
        .any(|hidden| hidden.as_bytes().eq_ignore_ascii_case(name))
}

/// Replaces every hidden element, tags included, with a single space.
///
/// An element without a closing tag runs to the end of the page.
fn strip_hidden(html: &str) -> Cow<'_, str> {
    // ASCII lowercasing keeps byte offsets identical to `html`.
    let lower = html.to_ascii_lowercase();
    let mut out = String::new();
    let mut copied = 0;
    let mut stripped = false;

    while let Some((start, name)) = next_hidden_open(&lower, copied) {
        let Some(open_end) = lower[start..].find('>').map(|i| start + i + 1) else {
            break;
        };
        let end = if lower[..open_end].ends_with("/>") {
            open_end
        } else {
            let close = format!("</{}", name);
            match lower[open_end..].find(&close) {
                Some(i) => {
                    let close_start = open_end + i;
                    lower[close_start..]
                        .find('>')
                        .map_or(lower.len(), |j| close_start + j + 1)
                }
                None => lower.len(),
            }
        };

        out.push_str(&html[copied..start]);
        out.push(' ');
        copied = end;
        stripped = true;
    }

    if !stripped {
        return Cow::Borrowed(html);
    }
    out.push_str(&html[copied..]);
    Cow::Owned(out)
}

/// Earliest opening tag of a hidden element at or after `from`.
fn next_hidden_open(lower: &str, from: usize) -> Option<(usize, &'static str)> {
    HIDDEN_ELEMENTS
        .iter()
        .filter_map(|&name| find_open_tag(lower, from, name).map(|at| (at, name)))
        .min_by_key(|&(at, _)| at)
}

fn find_open_tag(lower: &str, mut from: usize, name: &str) -> Option<usize> {
    let pattern = format!("<{}", name);
    while let Some(i) = lower[from..].find(&pattern) {
        let at = from + i;
        let next = from + i + pattern.len();
        match lower.as_bytes().get(next) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(at),
            Some(_) => from = next,
            None => return None,
        }
    }
    None
}

fn push_words(out: &mut String, text: &str) {
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_body_text() {
        let html = r#"<!DOCTYPE html>
<html><head><title>Hello</title></head>
<body><h1>Big   news</h1><p>Rust <b>is</b> here.</p></body></html>"#;
        assert_eq!(extract_text(html).unwrap(), "Hello Big news Rust is here.");
    }

    #[test]
    fn drops_scripts_and_styles() {
        let html = "<html><head><style>p { color: red }</style><script>var x = 1;</script></head><body><p>kept</p></body></html>";
        assert_eq!(extract_text(html).unwrap(), "kept");
    }

    #[test]
    fn markup_characters_inside_scripts_do_not_swallow_the_page() {
        let html = "<html><body><script>if (a<b) { x(); }</script><p>visible text</p></body></html>";
        assert_eq!(extract_text(html).unwrap(), "visible text");
    }

    #[test]
    fn hidden_elements_match_case_insensitively() {
        let html = "<p>before</p><SCRIPT type=\"text/javascript\">a <b && c</Script><style>p > a { }</style><p>after</p>";
        assert_eq!(extract_text(html).unwrap(), "before after");
    }

    #[test]
    fn scriptlike_tag_names_are_kept() {
        assert_eq!(
            extract_text("<scripture>psalm</scripture><p>one</p>").unwrap(),
            "psalm one"
        );
    }

    #[test]
    fn unclosed_script_drops_the_rest() {
        assert_eq!(extract_text("<p>kept</p><script>if (a<b)").unwrap(), "kept");
    }

    #[test]
    fn tolerates_void_elements() {
        let html = "<p>one<br>two<img src=\"x.png\">three</p>";
        assert_eq!(extract_text(html).unwrap(), "one two three");
    }

    #[test]
    fn decodes_xml_entities_and_keeps_html_ones() {
        assert_eq!(extract_text("<p>a &amp; b</p>").unwrap(), "a & b");
        assert_eq!(extract_text("<p>a&nbsp;b</p>").unwrap(), "a&nbsp;b");
    }

    #[test]
    fn skips_comments() {
        assert_eq!(extract_text("<p>x<!-- hidden --></p>").unwrap(), "x");
    }
}
