//! Tree-walk accessors over a fetched thread listing document.
//!
//! A thread listing arrives as a two-element JSON array: the first element
//! wraps the root post, the second wraps the forest of top-level replies.
//! The ingestors only ever see these accessors (fields, ordered children,
//! continuation marker), never the raw wire layout, so the flattening logic
//! stays independent of the listing format.
//!
//! Field extraction is best-effort: a missing or mistyped field yields an
//! empty string or zero rather than an error. Only a document that fails to
//! parse as JSON at all is rejected.

use serde_json::Value;

use crate::error::ArchiveError;

/// Sentinel `kind` marking a reply list that was paginated externally.
const CONTINUATION_KIND: &str = "more";

/// An owned, parsed thread listing document.
pub struct ThreadDoc {
    raw: Value,
}

impl ThreadDoc {
    pub fn parse(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let raw: Value =
            serde_json::from_slice(bytes).map_err(|err| ArchiveError::Document(err.to_string()))?;
        Ok(Self { raw })
    }

    fn root(&self) -> Option<&Value> {
        self.raw.pointer("/0/data/children/0/data")
    }

    /// External stable identifier of the root post.
    pub fn root_id(&self) -> String {
        str_field(self.root(), "id")
    }

    pub fn title(&self) -> String {
        str_field(self.root(), "title")
    }

    pub fn content(&self) -> String {
        str_field(self.root(), "selftext_html")
    }

    pub fn content_link(&self) -> String {
        str_field(self.root(), "url_overridden_by_dest")
    }

    pub fn author(&self) -> String {
        str_field(self.root(), "author")
    }

    /// Externally reported total reply count at fetch time.
    pub fn replies_num(&self) -> i64 {
        int_field(self.root(), "num_comments")
    }

    pub fn created_at(&self) -> i64 {
        int_field(self.root(), "created")
    }

    /// Top-level reply nodes in arrival order.
    pub fn replies(&self) -> Vec<ReplyNode<'_>> {
        child_nodes(self.raw.pointer("/1/data/children"))
    }
}

/// One node of the reply forest, borrowed from its [`ThreadDoc`].
#[derive(Clone, Copy)]
pub struct ReplyNode<'a> {
    raw: &'a Value,
}

impl<'a> ReplyNode<'a> {
    fn data(&self) -> Option<&'a Value> {
        self.raw.get("data")
    }

    pub fn external_id(&self) -> String {
        str_field(self.data(), "id")
    }

    pub fn content(&self) -> String {
        str_field(self.data(), "body_html")
    }

    pub fn author(&self) -> String {
        str_field(self.data(), "author")
    }

    pub fn created_at(&self) -> i64 {
        int_field(self.data(), "created")
    }

    pub fn score(&self) -> i64 {
        int_field(self.data(), "score")
    }

    fn reply_children(&self) -> Option<&'a Value> {
        self.raw.pointer("/data/replies/data/children")
    }

    /// True when the reply list was truncated externally: its first child is
    /// a pagination sentinel instead of a real comment.
    pub fn has_continuation(&self) -> bool {
        self.reply_children()
            .and_then(|children| children.get(0))
            .and_then(|first| first.get("kind"))
            .and_then(Value::as_str)
            == Some(CONTINUATION_KIND)
    }

    /// Concrete child replies in arrival order.
    pub fn replies(&self) -> Vec<ReplyNode<'a>> {
        child_nodes(self.reply_children())
    }
}

fn child_nodes(value: Option<&Value>) -> Vec<ReplyNode<'_>> {
    value
        .and_then(Value::as_array)
        .map(|children| children.iter().map(|raw| ReplyNode { raw }).collect())
        .unwrap_or_default()
}

fn str_field(data: Option<&Value>, key: &str) -> String {
    data.and_then(|d| d.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Numeric fields arrive as integers or floats depending on the field, so
/// both are accepted.
fn int_field(data: Option<&Value>, key: &str) -> i64 {
    match data.and_then(|d| d.get(key)) {
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        None => 0,
    }
}
