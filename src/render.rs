//! Markdown-to-HTML rendering for post bodies.

use pulldown_cmark::{html, Options, Parser};

/// Turns a post body into rich text.
pub trait Renderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// CommonMark renderer with tables, footnotes and strikethrough enabled.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let parser = Parser::new_ext(markdown, options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading() {
        let html = MarkdownRenderer.render("# title hello world");
        assert_eq!(html, "<h1>title hello world</h1>\n");
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(MarkdownRenderer.render(""), "");
    }

    #[test]
    fn test_table() {
        let html = MarkdownRenderer.render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }
}
