//! Graph compilation: canvas snapshot in, ordered execution plan out.
//!
//! Compilation is all-or-nothing for *structure*: a missing or ambiguous
//! Input/Output, an unreachable Output, or a structural cycle aborts with a
//! [`ValidationError`] before any task exists. Content resolution, in
//! contrast, fails per task: the offending task carries its error, its
//! dependents are flagged blocked, and unaffected branches compile
//! normally.
//!
//! The pass is pure and deterministic: for a fixed snapshot and resolver,
//! repeated runs produce an identical plan. All tie-breaking is on node id
//! order; edge traversal follows stable (created_at, id) insertion order.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use super::resolver::ContentResolver;
use super::task::{ExecutionPlan, Task, TaskKind};
use super::GraphSnapshot;
use crate::buddy::Buddy;
use crate::canvas::{CanvasNode, NodeData, NodeType};
use crate::message::Message;
use crate::types::NodeId;

/// Iteration guard applied to Loop tasks whose node does not set its own
/// bound.
pub const DEFAULT_MAX_LOOP_ITERATIONS: u32 = 32;

/// Structural failures that abort compilation before any task is produced.
#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("graph has no Input node")]
    #[diagnostic(
        code(loomcanvas::compiler::missing_input),
        help("Add exactly one Input node to make the graph executable.")
    )]
    MissingInput,

    #[error("graph has no Output node")]
    #[diagnostic(
        code(loomcanvas::compiler::missing_output),
        help("Add exactly one Output node to make the graph executable.")
    )]
    MissingOutput,

    #[error("graph has {count} Input nodes; exactly one is required")]
    #[diagnostic(code(loomcanvas::compiler::ambiguous_input))]
    AmbiguousInput { count: usize },

    #[error("graph has {count} Output nodes; exactly one is required")]
    #[diagnostic(code(loomcanvas::compiler::ambiguous_output))]
    AmbiguousOutput { count: usize },

    #[error("the Output node is not reachable from the Input node")]
    #[diagnostic(
        code(loomcanvas::compiler::unreachable_output),
        help("Connect a path of edges from the Input node to the Output node.")
    )]
    UnreachableOutput,

    #[error("cycle detected between Input and Output")]
    #[diagnostic(
        code(loomcanvas::compiler::cycle),
        help("Only Loop nodes may close a cycle; break the edge or route it through a Loop node.")
    )]
    Cycle { nodes: Vec<NodeId> },
}

/// Compile a graph snapshot into an ordered execution plan.
///
/// See the module docs for the failure policy. The `resolver` supplies node
/// prose; `buddy` provides the system message fronting every Prompt task.
pub async fn compile(
    snapshot: &GraphSnapshot,
    buddy: &Buddy,
    resolver: &dyn ContentResolver,
) -> Result<ExecutionPlan, ValidationError> {
    let nodes_by_id: FxHashMap<NodeId, &CanvasNode> =
        snapshot.nodes.iter().map(|n| (n.id, n)).collect();

    let input = sole_node(&snapshot.nodes, NodeType::Input)
        .map_err(|count| match count {
            0 => ValidationError::MissingInput,
            count => ValidationError::AmbiguousInput { count },
        })?
        .id;
    let output = sole_node(&snapshot.nodes, NodeType::Output)
        .map_err(|count| match count {
            0 => ValidationError::MissingOutput,
            count => ValidationError::AmbiguousOutput { count },
        })?
        .id;

    // Edges in stable insertion order, dangling ones silently discarded.
    let mut live_edges: Vec<(NodeId, NodeId)> = {
        let mut edges: Vec<_> = snapshot
            .edges
            .iter()
            .filter(|e| nodes_by_id.contains_key(&e.source) && nodes_by_id.contains_key(&e.target))
            .collect();
        edges.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        edges.iter().map(|e| (e.source, e.target)).collect()
    };
    live_edges.dedup();

    let mut successors: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    for (from, to) in &live_edges {
        successors.entry(*from).or_default().push(*to);
    }

    let reachable = reachable_from(input, &successors);
    if !reachable.contains(&output) {
        return Err(ValidationError::UnreachableOutput);
    }

    // Edges that close a Loop are sanctioned feedback, not structure: an
    // edge u -> L where L is a Loop node and u is downstream of L.
    let loop_closing = find_loop_closing_edges(&nodes_by_id, &successors, &reachable);

    let structural: FxHashMap<NodeId, Vec<NodeId>> = successors
        .iter()
        .map(|(from, tos)| {
            let kept: Vec<NodeId> = tos
                .iter()
                .filter(|to| !loop_closing.contains(&(*from, **to)))
                .copied()
                .collect();
            (*from, kept)
        })
        .collect();

    detect_cycle(&reachable, &structural)?;

    let order = topological_sort(&reachable, &structural);

    let mut structural_predecessors: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    for (from, to) in &live_edges {
        if !loop_closing.contains(&(*from, *to)) {
            structural_predecessors.entry(*to).or_default().push(*from);
        }
    }

    // Task emission, with failure taint flowing forward in plan order.
    let mut tainted: FxHashSet<NodeId> = FxHashSet::default();
    let mut tasks = Vec::new();

    for id in &order {
        let node = nodes_by_id[id];
        let preds = structural_predecessors.get(id).cloned().unwrap_or_default();
        let inherits_taint = preds.iter().any(|p| tainted.contains(p));

        let Some(kind) = TaskKind::for_node_type(node.node_type()) else {
            if inherits_taint {
                tainted.insert(*id);
            }
            continue;
        };

        let input_nodes: Vec<CanvasNode> =
            preds.iter().map(|p| nodes_by_id[p].clone()).collect();
        let loop_body = if kind == TaskKind::Loop {
            loop_body_of(*id, &successors, &structural, &loop_closing, &order)
        } else {
            Vec::new()
        };
        let output_node = structural
            .get(id)
            .and_then(|succ| succ.iter().find(|s| !loop_body.contains(s)))
            .map(|s| nodes_by_id[s].clone());

        let mut task = Task {
            kind,
            prompt_node: node.clone(),
            title: snapshot.titles.get(id).cloned(),
            input_nodes,
            response_mode: output_node.as_ref().map(CanvasNode::node_type),
            output_node,
            messages: Vec::new(),
            query: None,
            loop_body,
            max_iterations: match (&node.data, kind) {
                (NodeData::Loop { max_iterations }, TaskKind::Loop) => {
                    Some(max_iterations.unwrap_or(DEFAULT_MAX_LOOP_ITERATIONS))
                }
                _ => None,
            },
            error: None,
            blocked: inherits_taint,
        };

        if task.blocked {
            tracing::debug!(node = %id, "task blocked by upstream failure");
        } else {
            match kind {
                TaskKind::Prompt => match build_messages(&task, buddy, resolver).await {
                    Ok(messages) => task.messages = messages,
                    Err(err) => task.error = Some(err),
                },
                TaskKind::PaperFinder | TaskKind::PaperQaCollection => {
                    match build_query(&task, resolver).await {
                        Ok(query) => task.query = Some(query),
                        Err(err) => task.error = Some(err),
                    }
                }
                TaskKind::Loop => {}
            }
        }

        if !task.is_runnable() {
            tainted.insert(*id);
            if let Some(out) = &task.output_node {
                tainted.insert(out.id);
            }
        }
        tasks.push(task);
    }

    Ok(ExecutionPlan { tasks })
}

/// The unique node of a type, or the offending count.
fn sole_node(nodes: &[CanvasNode], node_type: NodeType) -> Result<&CanvasNode, usize> {
    let matching: Vec<&CanvasNode> = nodes
        .iter()
        .filter(|n| n.node_type() == node_type)
        .collect();
    match matching.as_slice() {
        [one] => Ok(one),
        other => Err(other.len()),
    }
}

fn reachable_from(
    start: NodeId,
    successors: &FxHashMap<NodeId, Vec<NodeId>>,
) -> FxHashSet<NodeId> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(succ) = successors.get(&id) {
            stack.extend(succ.iter().copied());
        }
    }
    seen
}

fn find_loop_closing_edges(
    nodes_by_id: &FxHashMap<NodeId, &CanvasNode>,
    successors: &FxHashMap<NodeId, Vec<NodeId>>,
    reachable: &FxHashSet<NodeId>,
) -> FxHashSet<(NodeId, NodeId)> {
    let mut closing = FxHashSet::default();
    for (&id, node) in nodes_by_id {
        if node.node_type() != NodeType::Loop || !reachable.contains(&id) {
            continue;
        }
        let downstream = reachable_from(id, successors);
        for (from, tos) in successors {
            // An edge into the Loop from its own downstream closes it.
            if *from != id && downstream.contains(from) && tos.contains(&id) {
                closing.insert((*from, id));
            }
        }
    }
    closing
}

/// DFS three-color cycle check over the reachable structural subgraph.
fn detect_cycle(
    reachable: &FxHashSet<NodeId>,
    structural: &FxHashMap<NodeId, Vec<NodeId>>,
) -> Result<(), ValidationError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut color: FxHashMap<NodeId, Color> =
        reachable.iter().map(|id| (*id, Color::White)).collect();

    // Deterministic root order so the reported cycle is stable.
    let mut roots: Vec<NodeId> = reachable.iter().copied().collect();
    roots.sort();

    for root in roots {
        if color[&root] != Color::White {
            continue;
        }
        // Iterative DFS with an explicit path for cycle extraction.
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        let mut path: Vec<NodeId> = Vec::new();
        color.insert(root, Color::Gray);
        path.push(root);

        while let Some((id, next_child)) = stack.last().copied() {
            let children = structural.get(&id).map(Vec::as_slice).unwrap_or(&[]);
            let children: Vec<NodeId> = children
                .iter()
                .filter(|c| reachable.contains(c))
                .copied()
                .collect();

            if next_child < children.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let child = children[next_child];
                match color[&child] {
                    Color::Gray => {
                        let start = path
                            .iter()
                            .position(|n| *n == child)
                            .unwrap_or(0);
                        let mut nodes: Vec<NodeId> = path[start..].to_vec();
                        nodes.sort();
                        return Err(ValidationError::Cycle { nodes });
                    }
                    Color::White => {
                        color.insert(child, Color::Gray);
                        path.push(child);
                        stack.push((child, 0));
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(id, Color::Black);
                path.pop();
                stack.pop();
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm over the reachable structural subgraph. Nodes with no
/// ordering constraint between them are emitted in id order, so the result
/// is reproducible for a fixed graph.
fn topological_sort(
    reachable: &FxHashSet<NodeId>,
    structural: &FxHashMap<NodeId, Vec<NodeId>>,
) -> Vec<NodeId> {
    let mut in_degree: FxHashMap<NodeId, usize> =
        reachable.iter().map(|id| (*id, 0)).collect();
    for (from, tos) in structural {
        if !reachable.contains(from) {
            continue;
        }
        for to in tos {
            if let Some(deg) = in_degree.get_mut(to) {
                *deg += 1;
            }
        }
    }

    // Sorted ready set: the smallest unconstrained node id runs first, so
    // the order is reproducible for a fixed graph.
    let mut ready: std::collections::BTreeSet<NodeId> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(reachable.len());
    while let Some(id) = ready.pop_first() {
        order.push(id);

        if let Some(succ) = structural.get(&id) {
            for to in succ {
                if let Some(deg) = in_degree.get_mut(to) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.insert(*to);
                    }
                }
            }
        }
    }
    order
}

/// Nodes inside a Loop's feedback region: downstream of the Loop and able
/// to flow back into it through a loop-closing edge.
fn loop_body_of(
    loop_id: NodeId,
    successors: &FxHashMap<NodeId, Vec<NodeId>>,
    structural: &FxHashMap<NodeId, Vec<NodeId>>,
    loop_closing: &FxHashSet<(NodeId, NodeId)>,
    order: &[NodeId],
) -> Vec<NodeId> {
    let closing_sources: Vec<NodeId> = loop_closing
        .iter()
        .filter(|(_, to)| *to == loop_id)
        .map(|(from, _)| *from)
        .collect();
    if closing_sources.is_empty() {
        return Vec::new();
    }

    let downstream = reachable_from(loop_id, successors);

    // Reverse structural reachability from the closing sources.
    let mut reverse: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    for (from, tos) in structural {
        for to in tos {
            reverse.entry(*to).or_default().push(*from);
        }
    }
    let mut feeds_back = FxHashSet::default();
    let mut stack = closing_sources;
    while let Some(id) = stack.pop() {
        if !feeds_back.insert(id) {
            continue;
        }
        if let Some(preds) = reverse.get(&id) {
            stack.extend(preds.iter().copied());
        }
    }

    order
        .iter()
        .filter(|id| **id != loop_id && downstream.contains(id) && feeds_back.contains(id))
        .copied()
        .collect()
}

async fn build_messages(
    task: &Task,
    buddy: &Buddy,
    resolver: &dyn ContentResolver,
) -> Result<Vec<Message>, String> {
    let mut messages = vec![Message::system(&buddy.system_message)];
    for input in &task.input_nodes {
        // Inputs without a prose page (e.g. a Loop driving this node)
        // contribute their payload at run time, not at compile time.
        if !input.node_type().has_prose() {
            continue;
        }
        let text = resolver
            .resolve(input.id)
            .await
            .map_err(|err| err.to_string())?;
        messages.push(Message::user(&text));
    }
    let own = resolver
        .resolve(task.prompt_node.id)
        .await
        .map_err(|err| err.to_string())?;
    messages.push(Message::user(&own));
    Ok(messages)
}

async fn build_query(task: &Task, resolver: &dyn ContentResolver) -> Result<String, String> {
    let mut parts = Vec::new();
    for input in &task.input_nodes {
        if !input.node_type().has_prose() {
            continue;
        }
        parts.push(
            resolver
                .resolve(input.id)
                .await
                .map_err(|err| err.to_string())?,
        );
    }
    parts.push(
        resolver
            .resolve(task.prompt_node.id)
            .await
            .map_err(|err| err.to_string())?,
    );
    Ok(parts.join("\n\n"))
}
