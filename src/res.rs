use axum::{http::StatusCode, response::{Html, IntoResponse, Response}};
use oauth2::url::Url;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// 404 page for a missing `thing`.
pub fn sorry(thing: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(fill(include_res!(str, "/pages/sorry.html"), &[("thing", &escape(thing))])),
    )
        .into_response()
}

/// Escapes text for use inside HTML element content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    html::push_html(&mut out, std::iter::once(Event::Text(CowStr::Borrowed(text))));
    out
}

/// Fills `{key}` placeholders of `template` in a single pass. Values are
/// never rescanned, so braces inside them come out verbatim. Unknown
/// placeholders are left as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| values.iter().find(|(key, _)| *key == &after[..close]).map(|(_, v)| (close, *v)));

        match value {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Path of the chat view for `room_id`, percent-encoded as one segment.
pub fn chat_path(room_id: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/chat") else {
        return "/".to_owned();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.push(room_id);
    }
    url.path().to_owned()
}

/// [`chat_path`] escaped for an attribute value.
pub fn chat_href(room_id: &str) -> String {
    escape(&chat_path(room_id))
}

/// Renders Markdown, showing any raw HTML in it as plain text. Link and
/// image targets outside http, https, mailto and relative URLs become `#`.
pub fn markdown(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image { link_type, dest_url, title, id }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        _ => event,
    });

    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&url) { url } else { CowStr::Borrowed("#") }
}

fn is_safe_url(url: &str) -> bool {
    // browsers drop whitespace and control characters before reading the scheme
    let cleaned: String = url.chars().filter(|c| !c.is_whitespace() && !c.is_control()).collect();
    match cleaned.find([':', '/', '?', '#']) {
        Some(at) if cleaned[at..].starts_with(':') => {
            matches!(cleaned[..at].to_ascii_lowercase().as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(escape("<b>hi & bye</b>"), "&lt;b&gt;hi &amp; bye&lt;/b&gt;");
    }

    #[test]
    fn markdown_renders_emphasis() {
        assert_eq!(markdown("*hey*"), "<p><em>hey</em></p>\n");
    }

    #[test]
    fn markdown_escapes_raw_html() {
        let out = markdown("hi <script>alert(1)</script>");
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
    }

    #[test]
    fn markdown_neutralizes_script_links() {
        for text in [
            "[x](javascript:alert(1))",
            "[x](JavaScript:alert(1))",
            "[x](<java script:alert(1)>)",
            "[x](javascript&#58;alert(1))",
            "[x][r]\n\n[r]: javascript:alert(1)",
            "![x](data:text/html;base64,PHNjcmlwdD4=)",
        ] {
            let out = markdown(text);
            assert!(!out.to_ascii_lowercase().contains("javascript:"), "{text} -> {out}");
            assert!(!out.contains("data:"), "{text} -> {out}");
            assert!(out.contains("\"#\""), "{text} -> {out}");
        }
    }

    #[test]
    fn markdown_keeps_ordinary_links() {
        assert_eq!(
            markdown("[docs](https://example.com/a?b=c)"),
            "<p><a href=\"https://example.com/a?b=c\">docs</a></p>\n"
        );
        assert!(markdown("[mail](mailto:ops@example.com)").contains("href=\"mailto:ops@example.com\""));
        assert!(markdown("[rel](/chat/abc)").contains("href=\"/chat/abc\""));
        assert!(markdown("[frag](#top)").contains("href=\"#top\""));
    }

    #[test]
    fn fill_substitutes_in_one_pass() {
        let out = fill("<a>{name}</a> by {creator_name}", &[("name", "{creator_name}"), ("creator_name", "Alice")]);
        assert_eq!(out, "<a>{creator_name}</a> by Alice");
    }

    #[test]
    fn fill_leaves_unknown_and_unclosed_braces() {
        assert_eq!(fill("{a} {b} {", &[("a", "1")]), "1 {b} {");
        assert_eq!(fill("x}{y}", &[("y", "2")]), "x}2");
    }

    #[test]
    fn chat_href_encodes_the_id_as_one_segment() {
        assert_eq!(chat_href("iXq5UM3XjUtRT6HCpQGI"), "/chat/iXq5UM3XjUtRT6HCpQGI");
        assert_eq!(chat_path("a/b\"c?d#e f"), "/chat/a%2Fb%22c%3Fd%23e%20f");
        assert_eq!(chat_href("a&b"), "/chat/a&amp;b");
    }

    #[test]
    fn sorry_is_not_found() {
        assert_eq!(sorry("room").status(), StatusCode::NOT_FOUND);
    }
}
