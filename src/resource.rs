//! Dynamic resource-path builder.
//!
//! APIv3 resource trees are unbounded and provider-defined, so no schema
//! is materialized up front. Instead a chain of [`Resource::access`] calls
//! grows a lazily-extended node tree: each property name visited for the
//! first time creates one child node, cached on its parent so repeated
//! traversal returns the same node at O(1) amortized cost. A terminal verb
//! call joins the accumulated segments into a path and issues a signed
//! request. Path validity is only discovered when that call executes.
//!
//! Segment names are normalized on access: `V3` becomes `v3`,
//! `BusiFavor` becomes `busi-favor`, and both `$transaction_id$` and
//! `{transaction_id}` denote a template segment that
//! [`Resource::with_entities`] can later substitute.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

use serde_json::Value;
use tracing::debug;

use crate::{
    client::ClientInner,
    error::Result,
    transport::{CompletedResponse, RequestBody, RequestOptions, Transport},
};

/// One node of the lazily-built resource tree.
///
/// `segments` is the path accumulated from the root. Children are created
/// on first traversal and cached under a lock, so concurrent first-time
/// traversal of the same name yields a single node.
pub(crate) struct Node {
    segments: Vec<String>,
    children: Mutex<HashMap<String, Arc<Node>>>,
}

impl Node {
    /// Creates the root node with no segments.
    pub(crate) fn root() -> Arc<Self> {
        Arc::new(Self { segments: Vec::new(), children: Mutex::new(HashMap::new()) })
    }

    /// Returns the cached child for `name`, creating it on first access.
    pub(crate) fn child(self: &Arc<Self>, name: &str) -> Arc<Self> {
        let mut children = self.children.lock().expect("resource node cache lock poisoned");
        Arc::clone(children.entry(name.to_owned()).or_insert_with(|| {
            let segment = normalize(name);
            debug!(segment, "resource node created");
            let mut segments = self.segments.clone();
            segments.push(segment);
            Arc::new(Self { segments, children: Mutex::new(HashMap::new()) })
        }))
    }

    pub(crate) fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// Normalizes an accessed property name into a URL segment.
///
/// `PascalCase` turns into `pascal-case`; a `$name$` or `{name}` spelling
/// is preserved as the `{name}` template form.
#[must_use]
pub fn normalize(name: &str) -> String {
    if name.len() > 1 && name.starts_with('$') && name.ends_with('$') {
        return format!("{{{}}}", &name[1..name.len() - 1]);
    }
    if name.starts_with('{') && name.ends_with('}') {
        return name.to_owned();
    }

    let mut segment = String::with_capacity(name.len() + 4);
    for (index, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 {
                segment.push('-');
            }
            segment.push(ch.to_ascii_lowercase());
        } else {
            segment.push(ch);
        }
    }
    segment
}

/// Joins path segments into an absolute URL path.
#[must_use]
pub fn pathname(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

fn is_template(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

/// A handle into the resource tree, terminated by an HTTP verb call.
///
/// The handle carries its own copy of the traversal's segment list:
/// [`with_entities`](Self::with_entities) rewrites template placeholders
/// on that copy only, never on the cached tree, so sibling handles are
/// unaffected.
pub struct Resource<T: Transport> {
    inner: Arc<ClientInner<T>>,
    node: Arc<Node>,
    segments: Vec<String>,
}

impl<T: Transport> Resource<T> {
    pub(crate) fn new(inner: Arc<ClientInner<T>>, node: Arc<Node>) -> Self {
        let segments = node.segments().to_vec();
        Self { inner, node, segments }
    }

    /// Steps into a child resource, creating it on first traversal.
    ///
    /// Repeated access through the same name returns the same underlying
    /// node; the accumulated segments never grow twice for one name.
    #[must_use]
    pub fn access(&self, name: &str) -> Self {
        Self::new(Arc::clone(&self.inner), self.node.child(name))
    }

    /// Substitutes `{name}` template segments from a mapping.
    ///
    /// Placeholders without a mapping entry are left untouched, as are all
    /// literal segments. Only this handle's segment copy changes.
    #[must_use]
    pub fn with_entities<I, K, V>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let entities: HashMap<String, String> = entities
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_owned(), value.as_ref().to_owned()))
            .collect();

        for segment in &mut self.segments {
            if is_template(segment) {
                let name = &segment[1..segment.len() - 1];
                if let Some(value) = entities.get(name) {
                    *segment = value.clone();
                }
            }
        }
        self
    }

    /// The segments this handle would join into a path.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The URL path a terminal verb call would request.
    #[must_use]
    pub fn pathname(&self) -> String {
        pathname(&self.segments)
    }

    /// Issues a signed `GET` request to the accumulated path.
    ///
    /// # Errors
    ///
    /// Propagates signing, transport and verification failures.
    pub async fn get(&self, options: RequestOptions) -> Result<CompletedResponse> {
        self.inner.execute("GET", self.pathname(), RequestBody::None, options).await
    }

    /// Issues a signed `POST` request with a JSON body.
    ///
    /// # Errors
    ///
    /// Propagates signing, transport and verification failures.
    pub async fn post(&self, data: Value, options: RequestOptions) -> Result<CompletedResponse> {
        self.inner.execute("POST", self.pathname(), RequestBody::Json(data), options).await
    }

    /// Issues a signed media upload to the accumulated path.
    ///
    /// Delegates to `POST`. The caller supplies the already-encoded
    /// multipart payload and its content type; only `meta` is covered by
    /// the request signature.
    ///
    /// # Errors
    ///
    /// Propagates signing, transport and verification failures.
    pub async fn upload(
        &self,
        meta: Value,
        payload: Vec<u8>,
        content_type: impl Into<String>,
        options: RequestOptions,
    ) -> Result<CompletedResponse> {
        let body = RequestBody::Form { meta, payload, content_type: content_type.into() };
        self.inner.execute("POST", self.pathname(), body, options).await
    }
}

impl<T: Transport> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            node: Arc::clone(&self.node),
            segments: self.segments.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource").field("segments", &self.segments).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn normalize_lowercases_pascal_case() {
        assert_eq!(normalize("V3"), "v3");
        assert_eq!(normalize("Transactions"), "transactions");
        assert_eq!(normalize("Native"), "native");
    }

    #[test]
    fn normalize_dashes_inner_uppercase() {
        assert_eq!(normalize("BusiFavor"), "busi-favor");
        assert_eq!(normalize("CombineTransactions"), "combine-transactions");
    }

    #[test]
    fn normalize_keeps_lowercase_untouched() {
        assert_eq!(normalize("certificates"), "certificates");
    }

    #[test]
    fn normalize_dollar_form_becomes_template() {
        assert_eq!(normalize("$transaction_id$"), "{transaction_id}");
    }

    #[test]
    fn normalize_brace_form_is_preserved() {
        assert_eq!(normalize("{transaction_id}"), "{transaction_id}");
    }

    #[test]
    fn node_traversal_accumulates_segments() {
        let root = Node::root();
        let native = root.child("V3").child("Pay").child("Transactions").child("Native");
        assert_eq!(native.segments(), ["v3", "pay", "transactions", "native"]);
    }

    #[test]
    fn node_traversal_is_cached() {
        let root = Node::root();
        let first = root.child("V3");
        let second = root.child("V3");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.segments(), ["v3"]);
    }

    #[test]
    fn concurrent_first_traversal_yields_one_node() {
        let root = Node::root();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let root = Arc::clone(&root);
                thread::spawn(move || root.child("Certificates"))
            })
            .collect();

        let nodes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for node in &nodes[1..] {
            assert!(Arc::ptr_eq(&nodes[0], node));
        }
    }

    #[test]
    fn pathname_joins_with_leading_slash() {
        let segments = vec!["v3".to_owned(), "pay".to_owned()];
        assert_eq!(pathname(&segments), "/v3/pay");
        assert_eq!(pathname(&[]), "/");
    }
}
