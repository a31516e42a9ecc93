//! Outbound email assembly.
//!
//! Rendered email bodies arrive as self-contained HTML with charts baked
//! in as base64 data URIs. Mail providers reject or mangle data URIs, so
//! each one is lifted into an inline attachment with a generated content
//! id and the tag rewritten to a `cid:` reference. A plain-text
//! alternative is derived from the HTML for clients that want one.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// One image lifted out of the HTML body, ready to attach inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// RFC 2045 content id, without the surrounding angle brackets.
    pub content_id: String,
    pub filename: String,
    pub data: Vec<u8>,
}

/// A fully assembled message for a [`MailTransport`](super::MailTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub from: String,
    pub reply_to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub inline_images: Vec<InlineImage>,
    /// Provider-side tags, used later to query the delivery event log.
    pub tags: Vec<String>,
}

static DATA_IMG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img[^>]*?src="data:image/png;base64,([^"]*)"[^>]*?>"#)
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

static CID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn make_content_id(index: usize) -> String {
    // Monotonic process-wide suffix keeps ids unique across messages.
    let serial = CID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("img{index}.{serial}.{}@outreach", chrono::Utc::now().timestamp_micros())
}

/// Converts embedded data-URI images to inline attachments, rewriting
/// each tag to reference its attachment by content id.
pub fn extract_inline_images(html: &str) -> (String, Vec<InlineImage>) {
    let mut images = Vec::new();
    let mut rewritten = html.to_string();
    for (i, captures) in DATA_IMG.captures_iter(html).enumerate() {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let Some(payload) = captures.get(1) else {
            continue;
        };
        let data = match BASE64.decode(payload.as_str()) {
            Ok(data) => data,
            Err(e) => {
                // Leave the tag as-is rather than attach garbage.
                warn!(index = i, error = %e, "undecodable inline image, leaving in place");
                continue;
            }
        };
        let content_id = make_content_id(i);
        rewritten = rewritten.replace(
            whole.as_str(),
            &format!(r#"<img src="cid:{content_id}">"#),
        );
        images.push(InlineImage {
            content_id,
            filename: format!("img{i}.png"),
            data,
        });
    }
    (rewritten, images)
}

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]+>").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static HEAD_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style[^>]*>.*?</style>|<script[^>]*>.*?</script>|<head[^>]*>.*?</head>")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|/p|/div|/tr|/h[1-6])[^>]*>")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Plain-text rendition of an HTML body.
pub fn email_as_text(html: &str) -> String {
    let text = HEAD_BLOCK.replace_all(html, "");
    let text = BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    BLANK_RUN
        .replace_all(lines.join("\n").trim(), "\n\n")
        .into_owned()
}

impl OutboundEmail {
    /// Assembles a message from rendered HTML, lifting data-URI images
    /// into inline attachments and deriving the text alternative.
    pub fn from_html(
        to: impl Into<String>,
        from: impl Into<String>,
        subject: impl Into<String>,
        html: &str,
    ) -> Self {
        let (html_body, inline_images) = extract_inline_images(html);
        let text_body = email_as_text(&html_body);
        let from = from.into();
        OutboundEmail {
            to: to.into(),
            reply_to: from.clone(),
            from,
            subject: subject.into(),
            html_body,
            text_body,
            inline_images,
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}
