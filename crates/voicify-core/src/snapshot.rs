//! Static interface trees.
//!
//! A [`SnapshotTree`] is an immutable, fully materialized copy of a window's
//! element tree. It backs the CLI's dry-run replay (loaded from JSON) and
//! the engine's tests, where layouts are described with [`SnapshotSpec`]
//! builders.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::tree::{collect_nodes, NodeHandle, NodeId, UiNode};

fn default_true() -> bool {
    true
}

/// Serializable description of one element and its subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSpec {
    pub class_name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content_label: Option<String>,
    pub bounds: Rect,
    /// Whether a focus request on this element succeeds.
    #[serde(default = "default_true")]
    pub focusable: bool,
    #[serde(default)]
    pub children: Vec<SnapshotSpec>,
}

impl SnapshotSpec {
    pub fn new(class_name: impl Into<String>, bounds: Rect) -> Self {
        Self {
            class_name: class_name.into(),
            text: None,
            content_label: None,
            bounds,
            focusable: true,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_content_label(mut self, label: impl Into<String>) -> Self {
        self.content_label = Some(label.into());
        self
    }

    pub fn with_focusable(mut self, focusable: bool) -> Self {
        self.focusable = focusable;
        self
    }

    pub fn with_child(mut self, child: SnapshotSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// On-disk form of a captured window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub window_id: i64,
    pub app_identifier: String,
    pub root: SnapshotSpec,
}

/// A node of a [`SnapshotTree`].
pub struct SnapshotNode {
    id: NodeId,
    window_id: i64,
    app_identifier: Arc<str>,
    class_name: String,
    text: Option<String>,
    content_label: Option<String>,
    bounds: Rect,
    focusable: bool,
    parent: Weak<SnapshotNode>,
    children: Vec<Arc<SnapshotNode>>,
    focus_log: Arc<Mutex<Vec<NodeId>>>,
}

impl fmt::Debug for SnapshotNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotNode")
            .field("id", &self.id)
            .field("class_name", &self.class_name)
            .field("text", &self.text)
            .field("content_label", &self.content_label)
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl UiNode for SnapshotNode {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn window_id(&self) -> i64 {
        self.window_id
    }

    fn app_identifier(&self) -> Option<&str> {
        Some(&self.app_identifier)
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn content_label(&self) -> Option<&str> {
        self.content_label.as_deref()
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn children(&self) -> Vec<NodeHandle> {
        self.children
            .iter()
            .map(|child| Arc::clone(child) as NodeHandle)
            .collect()
    }

    fn parent(&self) -> Option<NodeHandle> {
        self.parent.upgrade().map(|parent| parent as NodeHandle)
    }

    fn focus(&self) -> bool {
        self.focus_log.lock().push(self.id);
        self.focusable
    }
}

struct BuildContext {
    next_id: NodeId,
    window_id: i64,
    app_identifier: Arc<str>,
    focus_log: Arc<Mutex<Vec<NodeId>>>,
}

fn build_node(spec: &SnapshotSpec, parent: Weak<SnapshotNode>, ctx: &mut BuildContext) -> Arc<SnapshotNode> {
    let id = ctx.next_id;
    ctx.next_id += 1;

    Arc::new_cyclic(|me| {
        let children = spec
            .children
            .iter()
            .map(|child| build_node(child, me.clone(), ctx))
            .collect();

        SnapshotNode {
            id,
            window_id: ctx.window_id,
            app_identifier: Arc::clone(&ctx.app_identifier),
            class_name: spec.class_name.clone(),
            text: spec.text.clone(),
            content_label: spec.content_label.clone(),
            bounds: spec.bounds,
            focusable: spec.focusable,
            parent,
            children,
            focus_log: Arc::clone(&ctx.focus_log),
        }
    })
}

/// An immutable window tree plus a log of focus requests made against it.
#[derive(Debug, Clone)]
pub struct SnapshotTree {
    root: Arc<SnapshotNode>,
    focus_log: Arc<Mutex<Vec<NodeId>>>,
}

impl SnapshotTree {
    /// Materialize a tree. Node ids are assigned in pre-order starting at 1.
    pub fn build(window_id: i64, app_identifier: &str, spec: SnapshotSpec) -> Self {
        let focus_log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = BuildContext {
            next_id: 1,
            window_id,
            app_identifier: Arc::from(app_identifier),
            focus_log: Arc::clone(&focus_log),
        };
        let root = build_node(&spec, Weak::new(), &mut ctx);
        Self { root, focus_log }
    }

    pub fn from_file(file: SnapshotFile) -> Self {
        Self::build(file.window_id, &file.app_identifier, file.root)
    }

    /// Read a [`SnapshotFile`] from JSON on disk.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: SnapshotFile = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self::from_file(file))
    }

    pub fn root(&self) -> NodeHandle {
        Arc::clone(&self.root) as NodeHandle
    }

    /// First node, in pre-order, whose text equals `text` exactly.
    pub fn find_text(&self, text: &str) -> Option<NodeHandle> {
        collect_nodes(&self.root(), None, |node| node.text() == Some(text))
            .into_iter()
            .next()
    }

    /// Ids of every node that received a focus request, in order.
    pub fn focus_requests(&self) -> Vec<NodeId> {
        self.focus_log.lock().clone()
    }
}
