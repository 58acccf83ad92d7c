// src/publish/render.rs
//! Publish text: `title` + ` ({author})` + ` #{source}`, capped at a limit.
//!
//! Lengths are counted in `char`s. When over the limit only the title is cut:
//! `excess + 5` trailing chars are removed and [`ELLIPSIS`] appended, so the
//! attribution/hashtag suffix always survives intact.

use crate::post::Post;

pub const DEFAULT_LIMIT: usize = 280;
pub const ELLIPSIS: &str = "...";

/// Hashtag body from a source name: alphanumerics and `_` only.
pub fn hashtag(source: &str) -> Option<String> {
    let tag: String = source
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!tag.is_empty()).then_some(tag)
}

pub fn suffix(author: Option<&str>, tag: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(a) = author.map(str::trim).filter(|a| !a.is_empty()) {
        out.push_str(" (");
        out.push_str(a);
        out.push(')');
    }
    if let Some(t) = tag.filter(|t| !t.is_empty()) {
        out.push_str(" #");
        out.push_str(t);
    }
    out
}

pub fn render_text(title: &str, author: Option<&str>, tag: Option<&str>, limit: usize) -> String {
    let suffix = suffix(author, tag);
    let title_len = title.chars().count();
    let total = title_len + suffix.chars().count();
    if total <= limit {
        return format!("{title}{suffix}");
    }

    let excess = total - limit;
    let keep = title_len.saturating_sub(excess + 5);
    let cut: String = title.chars().take(keep).collect();
    format!("{}{ELLIPSIS}{suffix}", cut.trim_end())
}

/// Render a post the way an identity publishes it.
pub fn render_post(post: &Post, with_hashtag: bool, limit: usize) -> String {
    let tag = if with_hashtag {
        hashtag(&post.source_name)
    } else {
        None
    };
    render_text(&post.title, post.author.as_deref(), tag.as_deref(), limit)
}
