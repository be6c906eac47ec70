use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info};
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::error::HeapError;
use crate::heap::node::{HeapNode, NodeStatus, ROOT_ID};
use crate::pool::generator::base36_token;

pub const INITIAL_USAGE: f64 = 65.0;
/// Percentage points a single allocation adds to the usage gauge.
const ALLOC_COST: f64 = 10.0;
/// Node count the usage gauge treats as a full heap.
const FULL_HEAP_NODES: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcPhase {
    Idle,
    Marking,
    Marked,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub live: Vec<String>,
    pub swept: Vec<String>,
}

/// Parent-pointer object graph with a staged mark-and-sweep collector.
#[derive(Debug, Clone)]
pub struct Heap {
    nodes: Vec<HeapNode>,
    usage: f64,
    phase: GcPhase,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        let nodes = vec![
            HeapNode::root(),
            HeapNode::object("Window", ROOT_ID),
            HeapNode::object("Global_Vars", ROOT_ID),
            HeapNode::object("User_Profile", "Window"),
            HeapNode::object("Auth_Token", "Window"),
            HeapNode::object("Cache_Data", "Global_Vars"),
        ];
        Self {
            nodes,
            usage: INITIAL_USAGE,
            phase: GcPhase::Idle,
        }
    }

    pub fn nodes(&self) -> &[HeapNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&HeapNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn usage(&self) -> f64 {
        self.usage
    }

    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    /// Attaches a new object under a random node from the last known live
    /// set and returns its id. Ids are redrawn until unused.
    pub fn allocate<R: Rng>(&mut self, rng: &mut R) -> String {
        let parents: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.reachable)
            .map(|n| n.id.as_str())
            .collect();
        let parent = parents.choose(rng).copied().unwrap_or(ROOT_ID).to_string();
        let id = loop {
            let id = format!("Obj_{}", base36_token(rng, 3));
            if self.node(&id).is_none() {
                break id;
            }
        };
        debug!("Allocated {} under {}", id, parent);
        self.nodes.push(HeapNode::object(id.clone(), parent));
        self.usage = (self.usage + ALLOC_COST).min(100.0);
        id
    }

    /// Drops the node's parent reference. The root cannot be detached.
    pub fn detach(&mut self, id: &str) -> Result<(), HeapError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| HeapError::UnknownNode(id.to_string()))?;
        if node.is_root() {
            return Ok(());
        }
        node.parent = None;
        info!("Detached heap node '{}'.", id);
        Ok(())
    }

    pub fn begin_collection(&mut self) -> Result<(), HeapError> {
        if self.phase != GcPhase::Idle {
            return Err(HeapError::CollectionInProgress);
        }
        for node in &mut self.nodes {
            node.status = NodeStatus::Marking;
        }
        self.phase = GcPhase::Marking;
        Ok(())
    }

    /// Breadth-first flood fill from the root along parent pointers.
    pub fn mark(&mut self) -> Result<Vec<String>, HeapError> {
        if self.phase != GcPhase::Marking {
            return Err(HeapError::NoCollection);
        }
        let live: HashSet<String> = reachable_from_root(&self.nodes)
            .into_iter()
            .map(str::to_string)
            .collect();
        for node in &mut self.nodes {
            node.reachable = live.contains(node.id.as_str());
            node.status = if node.reachable {
                NodeStatus::Marked
            } else {
                NodeStatus::Unreachable
            };
        }
        self.phase = GcPhase::Marked;
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.reachable)
            .map(|n| n.id.clone())
            .collect())
    }

    pub fn sweep(&mut self) -> Result<Vec<String>, HeapError> {
        if self.phase != GcPhase::Marked {
            return Err(HeapError::NoCollection);
        }
        let (live, dead): (Vec<_>, Vec<_>) = self.nodes.drain(..).partition(|n| n.reachable);
        self.nodes = live;
        for node in &mut self.nodes {
            node.status = NodeStatus::Stable;
        }
        self.usage = (self.nodes.len() as f64 * 100.0 / FULL_HEAP_NODES).min(100.0);
        self.phase = GcPhase::Idle;
        let swept: Vec<String> = dead.into_iter().map(|n| n.id).collect();
        info!("Swept {} heap nodes.", swept.len());
        Ok(swept)
    }

    pub fn collect(&mut self) -> Result<CollectionReport, HeapError> {
        self.begin_collection()?;
        let live = self.mark()?;
        let swept = self.sweep()?;
        Ok(CollectionReport { live, swept })
    }
}

fn reachable_from_root(nodes: &[HeapNode]) -> HashSet<&str> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        if let Some(parent) = node.parent.as_deref() {
            children.entry(parent).or_default().push(node.id.as_str());
        }
    }

    let mut live = HashSet::new();
    let mut queue = VecDeque::new();
    if nodes.iter().any(|n| n.id == ROOT_ID) {
        live.insert(ROOT_ID);
        queue.push_back(ROOT_ID);
    }
    while let Some(id) = queue.pop_front() {
        for &child in children.get(id).into_iter().flatten() {
            if live.insert(child) {
                queue.push_back(child);
            }
        }
    }
    live
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::heap::node::NodeKind;

    #[test]
    fn fresh_heap_keeps_everything() {
        let mut heap = Heap::new();
        let report = heap.collect().unwrap();
        assert!(report.swept.is_empty());
        assert_eq!(report.live.len(), 6);
        assert_eq!(heap.usage(), 60.0);
        assert!(heap.nodes().iter().all(|n| n.status == NodeStatus::Stable));
    }

    #[test]
    fn detaching_subtree_sweeps_descendants() {
        let mut heap = Heap::new();
        heap.detach("Window").unwrap();
        let report = heap.collect().unwrap();
        let mut swept = report.swept.clone();
        swept.sort();
        assert_eq!(swept, ["Auth_Token", "User_Profile", "Window"]);
        assert_eq!(heap.nodes().len(), 3);
        assert_eq!(heap.usage(), 30.0);
        assert!(heap.node("Cache_Data").is_some());
    }

    #[test]
    fn root_cannot_be_detached() {
        let mut heap = Heap::new();
        heap.detach(ROOT_ID).unwrap();
        assert!(heap.collect().unwrap().swept.is_empty());
        assert_eq!(heap.node(ROOT_ID).map(|n| n.kind), Some(NodeKind::Root));
    }

    #[test]
    fn unknown_node_is_an_error() {
        let mut heap = Heap::new();
        assert_eq!(
            heap.detach("Nope"),
            Err(HeapError::UnknownNode("Nope".to_string()))
        );
    }

    #[test]
    fn staged_phases_expose_marking_state() {
        let mut heap = Heap::new();
        heap.detach("Cache_Data").unwrap();
        heap.begin_collection().unwrap();
        assert!(heap.nodes().iter().all(|n| n.status == NodeStatus::Marking));
        assert_eq!(heap.begin_collection(), Err(HeapError::CollectionInProgress));
        assert_eq!(heap.sweep(), Err(HeapError::NoCollection));

        heap.mark().unwrap();
        assert_eq!(
            heap.node("Cache_Data").map(|n| n.status),
            Some(NodeStatus::Unreachable)
        );
        assert_eq!(heap.node("Window").map(|n| n.status), Some(NodeStatus::Marked));

        assert_eq!(heap.sweep().unwrap(), ["Cache_Data"]);
        assert_eq!(heap.phase(), GcPhase::Idle);
    }

    #[test]
    fn allocation_attaches_to_live_node_and_caps_usage() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut heap = Heap::new();
        for _ in 0..6 {
            let id = heap.allocate(&mut rng);
            assert!(id.starts_with("Obj_"));
            assert_eq!(id.len(), 7);
            let parent = heap.node(&id).and_then(|n| n.parent.clone()).unwrap();
            assert!(heap.node(&parent).is_some());
        }
        assert_eq!(heap.usage(), 100.0);
        assert!(heap.collect().unwrap().swept.is_empty());
    }

    #[test]
    fn allocated_ids_are_unique() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut heap = Heap::new();
        for _ in 0..500 {
            heap.allocate(&mut rng);
        }
        let mut ids: Vec<_> = heap.nodes().iter().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), heap.nodes().len());
    }
}
