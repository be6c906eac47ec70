pub const ROOT_ID: &str = "ROOT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Stable,
    Marking,
    Marked,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeapNode {
    pub id: String,
    pub parent: Option<String>,
    pub kind: NodeKind,
    /// Result of the last mark phase; stale between collections.
    pub reachable: bool,
    pub status: NodeStatus,
}

impl HeapNode {
    pub fn root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            parent: None,
            kind: NodeKind::Root,
            reachable: true,
            status: NodeStatus::Stable,
        }
    }

    pub fn object(id: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.into()),
            kind: NodeKind::Object,
            reachable: true,
            status: NodeStatus::Stable,
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }
}
