//! Plain-text views of the simulation. Each function returns lines so the
//! REPL can prefix them for raw mode.

use crate::heap::gc::{GcPhase, Heap};
use crate::heap::node::{HeapNode, NodeStatus, ROOT_ID};
use crate::models::task::TaskStatus;
use crate::pool::event_log::EventLog;
use crate::pool::scheduler::PoolState;
use crate::shaping::lab::ShapingStats;

const BAR_WIDTH: usize = 20;

pub fn progress_bar(progress: f64) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

pub fn render_pool(state: &PoolState) -> Vec<String> {
    let mut lines = Vec::new();
    let slots = state.concurrency().get();
    let running: Vec<_> = state.by_status(TaskStatus::Running).collect();

    lines.push(format!("Tick {}", state.ticks()));
    lines.push(format!(
        "Pending Buffer  N: {}",
        state.count(TaskStatus::Pending)
    ));
    for task in state.by_status(TaskStatus::Pending) {
        lines.push(format!("  ID: {}  WAITING", task.id));
    }

    lines.push(format!("Active Workers  N: {}/{}", running.len(), slots));
    // Running tasks above a lowered limit still get a row.
    for idx in 0..slots.max(running.len()) {
        match running.get(idx) {
            Some(task) => lines.push(format!(
                "  EXECUTING: {} {} {:>3}%",
                task.id,
                progress_bar(task.progress),
                task.progress.round()
            )),
            None => lines.push(format!("  Idle Slot {}", idx + 1)),
        }
    }

    lines.push(format!(
        "Completed  N: {}",
        state.count(TaskStatus::Completed)
    ));
    let completed: Vec<_> = state.by_status(TaskStatus::Completed).collect();
    for task in completed.iter().rev() {
        lines.push(format!("  TASK_{}  SUCCESS", task.id));
    }

    lines.extend(render_log(state.log()));
    lines
}

pub fn render_log(log: &EventLog) -> Vec<String> {
    let mut lines = vec!["System Engine Logs".to_string()];
    if log.is_empty() {
        lines.push("  (no events yet)".to_string());
    }
    lines.extend(log.entries().map(|entry| format!("  {}", entry)));
    lines
}

fn status_tag(node: &HeapNode) -> &'static str {
    match node.status {
        NodeStatus::Stable => "",
        NodeStatus::Marking => " (marking)",
        NodeStatus::Marked => " (marked)",
        NodeStatus::Unreachable => " (unreachable)",
    }
}

pub fn render_heap(heap: &Heap) -> Vec<String> {
    let mut lines = vec![match heap.phase() {
        GcPhase::Idle => format!("Heap Usage {}%", heap.usage().round()),
        _ => format!("Heap Usage {}%  GC RUNNING", heap.usage().round()),
    }];
    let mut shown = vec![false; heap.nodes().len()];
    if let Some(root) = heap.nodes().iter().position(|n| n.id == ROOT_ID) {
        render_subtree(heap, root, 0, &mut lines, &mut shown);
    }

    let detached: Vec<_> = heap
        .nodes()
        .iter()
        .zip(&shown)
        .filter(|(_, seen)| !**seen)
        .map(|(node, _)| node)
        .collect();
    if !detached.is_empty() {
        lines.push("Detached".to_string());
        for node in detached {
            lines.push(format!("  {}{}", node.id, status_tag(node)));
        }
    }
    lines
}

fn render_subtree(
    heap: &Heap,
    idx: usize,
    depth: usize,
    lines: &mut Vec<String>,
    shown: &mut [bool],
) {
    if shown[idx] {
        return;
    }
    shown[idx] = true;
    let node = &heap.nodes()[idx];
    lines.push(format!("{}{}{}", "  ".repeat(depth), node.id, status_tag(node)));
    for (child, _) in heap
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, n)| n.parent.as_deref() == Some(node.id.as_str()))
    {
        render_subtree(heap, child, depth + 1, lines, shown);
    }
}

pub fn render_shaping(stats: &ShapingStats, window_ms: u128) -> Vec<String> {
    vec![
        format!("Event Strategy  WINDOW: {}ms", window_ms),
        format!("  Raw        captured: {}", stats.counts.raw),
        format!(
            "  Debounced  captured: {}  efficiency: {}%",
            stats.counts.debounced, stats.debounce_saved
        ),
        format!(
            "  Throttled  captured: {}  efficiency: {}%",
            stats.counts.throttled, stats.throttle_saved
        ),
    ]
}
