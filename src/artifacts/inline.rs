//! HTML email inlining.
//!
//! Email clients routinely strip `<style>` blocks, so the rendered message
//! body has its stylesheets rewritten into inline `style` attributes before
//! being persisted as the email artifact.

use thiserror::Error;

/// Error returned when the inlining transform fails.
#[derive(Debug, Error)]
#[error("CSS inlining failed: {0}")]
pub struct InlineCssError(String);

/// Rewrites embedded stylesheets into inline style attributes.
pub fn inline_email_css(html: &str) -> Result<String, InlineCssError> {
    css_inline::inline(html).map_err(|e| InlineCssError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_become_inline_attributes() {
        let html = r#"<html><head><style>p { color: red; }</style></head>
            <body><p>About your prescribing</p></body></html>"#;
        let inlined = inline_email_css(html).unwrap();
        assert!(inlined.contains(r#"style="color: red;""#));
    }

    #[test]
    fn plain_html_passes_through() {
        let html = "<html><body><p>hello</p></body></html>";
        let inlined = inline_email_css(html).unwrap();
        assert!(inlined.contains("<p>hello</p>"));
    }
}
