use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

use sitehook_core_types::{NodeId, Rect, SiteError};

use super::fixture::{ElementSpec, PageFixture, DEFAULT_RECT};
use super::selector::{ElementTree, SelectorList};
use crate::model::ElementContent;
use crate::ports::{DomEvent, DomMutation, DomPort};

#[derive(Clone, Debug)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    value: Option<String>,
    text: String,
    rect: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Event delivered to an element, kept for inspection.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchRecord {
    pub node: NodeId,
    pub event: DomEvent,
}

#[derive(Debug)]
struct Document {
    nodes: HashMap<NodeId, Node>,
    body: NodeId,
    next_id: u64,
    url: String,
    focused: Option<NodeId>,
    selection: Option<NodeId>,
    dispatched: Vec<DispatchRecord>,
    clicks: Vec<NodeId>,
    failing_clicks: HashSet<NodeId>,
    failing_layout: HashSet<NodeId>,
    failing_queries: bool,
}

impl ElementTree for Document {
    fn tag_of(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.tag.as_str())
    }

    fn attr_of(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(&node)?.attrs.get(name).map(String::as_str)
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node)?.parent
    }
}

impl Document {
    fn new(url: String) -> Self {
        let body = NodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(
            body,
            Node {
                tag: "body".into(),
                attrs: BTreeMap::new(),
                value: None,
                text: String::new(),
                rect: Rect::new(0.0, 0.0, 1280.0, 800.0),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            body,
            next_id: 2,
            url,
            focused: None,
            selection: None,
            dispatched: Vec::new(),
            clicks: Vec::new(),
            failing_clicks: HashSet::new(),
            failing_layout: HashSet::new(),
            failing_queries: false,
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node, SiteError> {
        self.nodes.get(&id).ok_or(SiteError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SiteError> {
        self.nodes.get_mut(&id).ok_or(SiteError::NodeNotFound(id))
    }

    fn alloc(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                tag: tag.to_ascii_lowercase(),
                attrs: BTreeMap::new(),
                value: None,
                text: String::new(),
                rect: DEFAULT_RECT,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn build(&mut self, spec: &ElementSpec) -> NodeId {
        let id = self.alloc(&spec.tag);
        let children: Vec<NodeId> = spec.children.iter().map(|c| self.build(c)).collect();
        for child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = Some(id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.attrs = spec.attrs.clone();
            if let Some(dom_id) = &spec.id {
                node.attrs.insert("id".into(), dom_id.clone());
            }
            if let Some(class) = &spec.class {
                node.attrs.insert("class".into(), class.clone());
            }
            node.value = spec
                .value
                .clone()
                .or_else(|| spec.is_form_field().then(String::new));
            node.text = spec.text.clone().unwrap_or_default();
            node.rect = spec.rect.unwrap_or(DEFAULT_RECT);
            node.children = children;
        }
        id
    }

    fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.body {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    /// Descendants of `root` in document order, excluding `root`.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&root)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn text_content(&self, id: NodeId) -> String {
        let mut text = self.nodes.get(&id).map(|n| n.text.clone()).unwrap_or_default();
        for child in self.nodes.get(&id).map(|n| n.children.clone()).unwrap_or_default() {
            text.push_str(&self.text_content(child));
        }
        text
    }

    fn detach(&mut self, id: NodeId) -> Result<Option<NodeId>, SiteError> {
        let parent = self.node(id)?.parent;
        if let Some(parent_id) = parent {
            self.node_mut(parent_id)?.children.retain(|c| *c != id);
        }
        self.node_mut(id)?.parent = None;
        Ok(parent)
    }

    fn query(&self, scope: Option<NodeId>, selector: &str) -> Result<Vec<NodeId>, SiteError> {
        let list = SelectorList::parse(selector)?;
        let root = scope.unwrap_or(self.body);
        self.node(root)?;
        Ok(self
            .descendants(root)
            .into_iter()
            .filter(|id| list.matches(self, *id))
            .collect())
    }

    /// Default action of an `insertText` input event: replace the selection, or append.
    fn apply_insert(&mut self, id: NodeId, data: &str) -> Result<Vec<NodeId>, SiteError> {
        let replace = self.selection == Some(id);
        let mut removed = Vec::new();
        if self.node(id)?.value.is_some() {
            let node = self.node_mut(id)?;
            let value = node.value.get_or_insert_with(String::new);
            if replace {
                value.clear();
            }
            value.push_str(data);
        } else if replace {
            removed = self.node(id)?.children.clone();
            for child in &removed {
                self.node_mut(*child)?.parent = None;
            }
            let node = self.node_mut(id)?;
            node.children.clear();
            node.text = data.to_string();
        } else {
            self.node_mut(id)?.text.push_str(data);
        }
        self.selection = None;
        Ok(removed)
    }
}

/// DOM kept in process memory. Mirrors the browser behaviour the adapter relies on
/// (selector queries, focus/selection, `insertText` default action, childList
/// mutation notifications) and records what was dispatched for inspection.
#[derive(Debug)]
pub struct MemoryDom {
    doc: Mutex<Document>,
    mutations: broadcast::Sender<DomMutation>,
}

impl MemoryDom {
    pub fn new(url: impl Into<String>) -> Self {
        let (mutations, _) = broadcast::channel(256);
        Self {
            doc: Mutex::new(Document::new(url.into())),
            mutations,
        }
    }

    pub fn from_fixture(fixture: &PageFixture) -> Self {
        let dom = Self::new(fixture.url.clone());
        {
            let mut doc = dom.doc.lock();
            let body = doc.body;
            let children: Vec<NodeId> = fixture.body.iter().map(|spec| doc.build(spec)).collect();
            for child in &children {
                if let Some(node) = doc.nodes.get_mut(child) {
                    node.parent = Some(body);
                }
            }
            if let Some(node) = doc.nodes.get_mut(&body) {
                node.children = children;
            }
        }
        dom
    }

    fn notify(&self, mutation: DomMutation) {
        trace!(target_node = %mutation.target, "dom mutation");
        let _ = self.mutations.send(mutation);
    }

    /// Simulate client-side navigation.
    pub fn set_url(&self, url: impl Into<String>) {
        self.doc.lock().url = url.into();
    }

    pub fn body_id(&self) -> NodeId {
        self.doc.lock().body
    }

    /// Build `spec` and append it to `parent`, notifying observers like the page would.
    pub fn append_spec(&self, parent: NodeId, spec: &ElementSpec) -> Result<NodeId, SiteError> {
        let id = {
            let mut doc = self.doc.lock();
            doc.node(parent)?;
            let id = doc.build(spec);
            doc.node_mut(id)?.parent = Some(parent);
            doc.node_mut(parent)?.children.push(id);
            id
        };
        self.notify(DomMutation {
            target: parent,
            added: vec![id],
            removed: Vec::new(),
        });
        Ok(id)
    }

    /// Remove the attached element carrying `id`, returning whether one existed.
    pub fn remove_by_id(&self, id: &str) -> bool {
        let found = {
            let doc = self.doc.lock();
            doc.descendants(doc.body)
                .into_iter()
                .find(|n| doc.attr_of(*n, "id") == Some(id))
        };
        match found {
            Some(node) => self.detach_and_notify(node).is_ok(),
            None => false,
        }
    }

    fn detach_and_notify(&self, node: NodeId) -> Result<(), SiteError> {
        let parent = self.doc.lock().detach(node)?;
        if let Some(parent) = parent {
            self.notify(DomMutation {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            });
        }
        Ok(())
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), SiteError> {
        self.doc
            .lock()
            .node_mut(node)?
            .attrs
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), SiteError> {
        self.doc.lock().node_mut(node)?.attrs.remove(name);
        Ok(())
    }

    pub fn set_rect(&self, node: NodeId, rect: Rect) -> Result<(), SiteError> {
        self.doc.lock().node_mut(node)?.rect = rect;
        Ok(())
    }

    pub fn set_value(&self, node: NodeId, value: &str) -> Result<(), SiteError> {
        self.doc.lock().node_mut(node)?.value = Some(value.to_string());
        Ok(())
    }

    /// `.value` for form fields, `.textContent` otherwise.
    pub fn content_of(&self, node: NodeId) -> Option<String> {
        let doc = self.doc.lock();
        let n = doc.nodes.get(&node)?;
        Some(match &n.value {
            Some(value) => value.clone(),
            None => doc.text_content(node),
        })
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.doc
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn find_first(&self, selector: &str) -> Option<NodeId> {
        self.doc.lock().query(None, selector).ok()?.into_iter().next()
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.doc.lock().is_attached(node)
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.doc.lock().focused
    }

    pub fn dispatched(&self) -> Vec<DispatchRecord> {
        self.doc.lock().dispatched.clone()
    }

    pub fn dispatched_to(&self, node: NodeId) -> Vec<DomEvent> {
        self.doc
            .lock()
            .dispatched
            .iter()
            .filter(|r| r.node == node)
            .map(|r| r.event.clone())
            .collect()
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.doc.lock().clicks.clone()
    }

    fn query_all(&self, scope: Option<NodeId>, selector: &str) -> Result<Vec<NodeId>, SiteError> {
        let doc = self.doc.lock();
        if doc.failing_queries {
            return Err(SiteError::new(format!("query '{selector}' failed")));
        }
        doc.query(scope, selector)
    }

    /// Make clicks on `node` fail, as a detached React handler would.
    pub fn fail_clicks_on(&self, node: NodeId) {
        self.doc.lock().failing_clicks.insert(node);
    }

    /// Make layout reads on `node` fail.
    pub fn fail_layout_on(&self, node: NodeId) {
        self.doc.lock().failing_layout.insert(node);
    }

    /// Make every selector query fail until switched off again.
    pub fn fail_queries(&self, failing: bool) {
        self.doc.lock().failing_queries = failing;
    }

    /// Live mutation subscriptions.
    pub fn observer_count(&self) -> usize {
        self.mutations.receiver_count()
    }
}

#[async_trait]
impl DomPort for MemoryDom {
    async fn current_url(&self) -> Result<String, SiteError> {
        Ok(self.doc.lock().url.clone())
    }

    async fn body(&self) -> Result<NodeId, SiteError> {
        Ok(self.doc.lock().body)
    }

    async fn query_selector(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Option<NodeId>, SiteError> {
        Ok(self.query_all(scope, selector)?.into_iter().next())
    }

    async fn query_selector_all(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Vec<NodeId>, SiteError> {
        self.query_all(scope, selector)
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<NodeId>, SiteError> {
        let doc = self.doc.lock();
        Ok(doc
            .descendants(doc.body)
            .into_iter()
            .find(|n| doc.attr_of(*n, "id") == Some(id)))
    }

    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, SiteError> {
        let list = SelectorList::parse(selector)?;
        let doc = self.doc.lock();
        doc.node(node)?;
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if list.matches(&*doc, current) {
                return Ok(Some(current));
            }
            cursor = doc.parent_of(current);
        }
        Ok(None)
    }

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, SiteError> {
        Ok(self.doc.lock().node(node)?.parent)
    }

    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, SiteError> {
        Ok(self.doc.lock().node(node)?.attrs.get(name).cloned())
    }

    async fn bounding_box(&self, node: NodeId) -> Result<Rect, SiteError> {
        let doc = self.doc.lock();
        let rect = doc.node(node)?.rect;
        if doc.failing_layout.contains(&node) {
            return Err(SiteError::new(format!("layout of {node} unavailable")));
        }
        if doc.is_attached(node) {
            Ok(rect)
        } else {
            Ok(Rect::default())
        }
    }

    async fn content(&self, node: NodeId) -> Result<ElementContent, SiteError> {
        let doc = self.doc.lock();
        Ok(match &doc.node(node)?.value {
            Some(value) => ElementContent::Value(value.clone()),
            None => ElementContent::Text(doc.text_content(node)),
        })
    }

    async fn focus(&self, node: NodeId) -> Result<(), SiteError> {
        let mut doc = self.doc.lock();
        if !doc.is_attached(node) {
            return Err(SiteError::Detached(node));
        }
        doc.focused = Some(node);
        Ok(())
    }

    async fn select_all(&self, node: NodeId) -> Result<(), SiteError> {
        let mut doc = self.doc.lock();
        doc.node(node)?;
        doc.selection = Some(node);
        Ok(())
    }

    async fn click(&self, node: NodeId) -> Result<(), SiteError> {
        let mut doc = self.doc.lock();
        doc.node(node)?;
        if doc.failing_clicks.contains(&node) {
            return Err(SiteError::new(format!("click handler on {node} threw")));
        }
        doc.clicks.push(node);
        Ok(())
    }

    async fn dispatch(&self, node: NodeId, event: DomEvent) -> Result<(), SiteError> {
        let removed = {
            let mut doc = self.doc.lock();
            doc.node(node)?;
            let removed = match &event {
                DomEvent::Input { input_type, data } if input_type == "insertText" => {
                    doc.apply_insert(node, data)?
                }
                _ => Vec::new(),
            };
            doc.dispatched.push(DispatchRecord { node, event });
            removed
        };
        if !removed.is_empty() {
            self.notify(DomMutation {
                target: node,
                added: Vec::new(),
                removed,
            });
        }
        Ok(())
    }

    async fn create_element(
        &self,
        tag: &str,
        id: Option<&str>,
        style: Option<&str>,
    ) -> Result<NodeId, SiteError> {
        let mut doc = self.doc.lock();
        let node = doc.alloc(tag);
        let entry = doc.node_mut(node)?;
        if let Some(id) = id {
            entry.attrs.insert("id".into(), id.to_string());
        }
        if let Some(style) = style {
            entry.attrs.insert("style".into(), style.to_string());
        }
        Ok(node)
    }

    async fn insert_after(&self, reference: NodeId, node: NodeId) -> Result<(), SiteError> {
        let parent = {
            let mut doc = self.doc.lock();
            let parent = doc
                .node(reference)?
                .parent
                .ok_or(SiteError::Detached(reference))?;
            doc.detach(node)?;
            let siblings = &mut doc.node_mut(parent)?.children;
            let index = siblings
                .iter()
                .position(|c| *c == reference)
                .map(|i| i + 1)
                .unwrap_or(siblings.len());
            siblings.insert(index, node);
            doc.node_mut(node)?.parent = Some(parent);
            parent
        };
        self.notify(DomMutation {
            target: parent,
            added: vec![node],
            removed: Vec::new(),
        });
        Ok(())
    }

    async fn append_child(&self, parent: NodeId, node: NodeId) -> Result<(), SiteError> {
        {
            let mut doc = self.doc.lock();
            doc.node(parent)?;
            doc.detach(node)?;
            doc.node_mut(parent)?.children.push(node);
            doc.node_mut(node)?.parent = Some(parent);
        }
        self.notify(DomMutation {
            target: parent,
            added: vec![node],
            removed: Vec::new(),
        });
        Ok(())
    }

    async fn remove(&self, node: NodeId) -> Result<(), SiteError> {
        self.detach_and_notify(node)
    }

    fn observe_mutations(&self) -> broadcast::Receiver<DomMutation> {
        self.mutations.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> MemoryDom {
        MemoryDom::from_fixture(&PageFixture {
            url: "https://chat.mistral.ai/chat".into(),
            body: vec![ElementSpec::new("main").child(
                ElementSpec::new("form")
                    .child(ElementSpec::new("textarea").id("prompt"))
                    .child(ElementSpec::new("div").attr("contenteditable", "true").child(
                        ElementSpec::new("p").text("draft"),
                    ))
                    .child(ElementSpec::new("button").attr("type", "submit")),
            )],
        })
    }

    #[tokio::test]
    async fn queries_follow_document_order() {
        let dom = page();
        let all = dom.query_selector_all(None, "*").await.unwrap();
        let tags: Vec<String> = {
            let doc = dom.doc.lock();
            all.iter().map(|n| doc.nodes[n].tag.clone()).collect()
        };
        assert_eq!(tags, vec!["main", "form", "textarea", "div", "p", "button"]);
    }

    #[tokio::test]
    async fn insert_text_replaces_selection() {
        let dom = page();
        let textarea = dom.find_first("#prompt").unwrap();
        dom.set_value(textarea, "old").unwrap();
        dom.select_all(textarea).await.unwrap();
        dom.dispatch(textarea, DomEvent::insert_text("new")).await.unwrap();
        assert_eq!(dom.content_of(textarea).as_deref(), Some("new"));

        dom.dispatch(textarea, DomEvent::insert_text("+")).await.unwrap();
        assert_eq!(dom.content_of(textarea).as_deref(), Some("new+"));
    }

    #[tokio::test]
    async fn contenteditable_content_is_text_content() {
        let dom = page();
        let editor = dom.find_first("div[contenteditable=\"true\"]").unwrap();
        assert_eq!(
            dom.content(editor).await.unwrap(),
            ElementContent::Text("draft".into())
        );
        dom.select_all(editor).await.unwrap();
        dom.dispatch(editor, DomEvent::insert_text("fresh")).await.unwrap();
        assert_eq!(dom.content_of(editor).as_deref(), Some("fresh"));
        assert!(dom.children_of(editor).is_empty());
    }

    #[tokio::test]
    async fn structural_changes_notify_observers() {
        let dom = page();
        let mut rx = dom.observe_mutations();
        assert_eq!(dom.observer_count(), 1);

        let form = dom.find_first("form").unwrap();
        let div = dom.create_element("div", Some("extra"), None).await.unwrap();
        dom.append_child(form, div).await.unwrap();
        let added = rx.recv().await.unwrap();
        assert_eq!(added.added, vec![div]);

        assert!(dom.remove_by_id("extra"));
        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.removed, vec![div]);
        assert!(!dom.is_attached(div));
        assert_eq!(dom.bounding_box(div).await.unwrap(), Rect::default());
    }

    #[tokio::test]
    async fn insert_after_places_node_next_to_reference() {
        let dom = page();
        let form = dom.find_first("form").unwrap();
        let textarea = dom.find_first("textarea").unwrap();
        let marker = dom.create_element("span", None, None).await.unwrap();
        dom.insert_after(textarea, marker).await.unwrap();
        assert_eq!(dom.children_of(form)[1], marker);
    }
}
