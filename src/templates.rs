//! HTML rendering for archive pages.
//!
//! Small template functions building markup with `format!`; no template
//! engine. Stored content arrives entity-escaped from the content API and is
//! unescaped here, while titles and author names pass through
//! [`html::escape`]. Rendering is infallible for well-formed input.

use crate::html;
use crate::models::{ArchiveLink, ArchivedThread, CommentView};

/// Base HTML page wrapper.
fn base_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} - threadkeep</title>
    <link rel="stylesheet" href="/static/style.css">
</head>
<body>
    <header id="main-header">
        <nav>
            <a href="/" class="logo">threadkeep</a>
        </nav>
    </header>
    <main>
{}
    </main>
</body>
</html>"#,
        html::escape(title),
        content
    )
}

/// Latest-archives index page.
pub fn render_index(links: &[ArchiveLink]) -> String {
    let mut listing = String::from("<h1>Latest archives</h1>\n<ul class=\"archives\">\n");

    for link in links {
        listing.push_str(&format!(
            "<li><span class=\"date\">{}</span> <a href=\"/r/{}/{}\">{}</a> <span class=\"sub\">r/{}</span></li>\n",
            format_date(link.archive_timestamp),
            link.sub,
            link.thread_id,
            html::escape(&link.title),
            html::escape(&link.sub),
        ));
    }

    if links.is_empty() {
        listing.push_str("<li class=\"empty\">Nothing archived yet.</li>\n");
    }

    listing.push_str("</ul>");
    base_page("Latest archives", &listing)
}

/// Full archived thread page: metadata header, root content, ranked replies.
pub fn render_thread(thread: &ArchivedThread) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        "<article class=\"thread\">\n<h1>{}</h1>\n<div class=\"thread-meta\">r/{} &middot; {} &middot; archived {}</div>\n",
        html::escape(&thread.title),
        html::escape(&thread.sub),
        html::escape(&thread.author),
        format_date(thread.archive_timestamp),
    ));

    if !thread.anchor.is_empty() {
        body.push_str(&format!(
            "<div class=\"anchor-note\">Continuation of comment {} &middot; <a href=\"/r/{}/{}\">back to thread</a></div>\n",
            html::escape(&thread.anchor),
            thread.sub,
            thread.thread_id,
        ));
    }

    if !thread.content.is_empty() {
        body.push_str(&format!(
            "<div class=\"thread-body\">{}</div>\n",
            html::unescape(&thread.content)
        ));
    }

    if !thread.content_link.is_empty() {
        body.push_str(&format!(
            "<a class=\"thread-link\" href=\"{}\">{}</a>\n",
            html::escape(&thread.content_link),
            html::escape(&thread.content_link),
        ));
    }

    body.push_str("</article>\n<section class=\"replies\">\n");
    for reply in &thread.replies {
        render_comment(&mut body, thread, reply);
    }
    body.push_str("</section>");

    base_page(&thread.title, &body)
}

/// Page shown when a thread was never archived.
pub fn render_not_found(thread_id: &str) -> String {
    let body = format!(
        "<h1>Not archived</h1>\n<p>No archive exists for thread <code>{}</code>.</p>",
        html::escape(thread_id)
    );
    base_page("Not archived", &body)
}

fn render_comment(buf: &mut String, thread: &ArchivedThread, comment: &CommentView) {
    buf.push_str("<div class=\"comment\">\n");
    buf.push_str(&format!(
        "<div class=\"comment-meta\"><span class=\"author\">{}</span> <span class=\"score\">{} points</span></div>\n",
        html::escape(&comment.author),
        comment.score,
    ));
    buf.push_str(&format!(
        "<div class=\"comment-body\">{}</div>\n",
        html::unescape(&comment.content)
    ));

    if comment.continues {
        buf.push_str(&format!(
            "<a class=\"continued\" href=\"/r/{}/{}?from={}\">continued in a separate page</a>\n",
            thread.sub,
            thread.thread_id,
            html::escape(&comment.comment_id),
        ));
    }

    for reply in &comment.replies {
        render_comment(buf, thread, reply);
    }

    buf.push_str("</div>\n");
}

fn format_date(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%d %b %Y").to_string())
        .unwrap_or_else(|| ts.to_string())
}
