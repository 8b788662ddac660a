// src/dag/cycle.rs

//! Cycle detection gate.
//!
//! Iterative depth-first search with White/Gray/Black colouring. The
//! exploration path is kept on an explicit stack of `(node, next_edge)`
//! frames, so stack depth does not depend on graph size and the offending
//! cycle can be read straight off the stack.

use tracing::{debug, warn};

use crate::dag::graph::GraphModel;
use crate::errors::CycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    /// Not visited yet.
    White,
    /// On the current exploration path.
    Gray,
    /// Fully explored; no cycle reachable through it.
    Black,
}

/// Prove the graph acyclic or return the first cycle found.
///
/// Roots are tried in declaration order and edges are followed in
/// declaration order, so the reported cycle is stable for a given
/// declaration list.
pub fn validate(graph: &GraphModel) -> Result<(), CycleError> {
    let n = graph.len();
    let mut colour = vec![Colour::White; n];
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if colour[root] != Colour::White {
            continue;
        }

        colour[root] = Colour::Gray;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let deps = graph.deps_at(node);

            if frame.1 >= deps.len() {
                colour[node] = Colour::Black;
                stack.pop();
                continue;
            }

            let next = deps[frame.1];
            frame.1 += 1;

            match colour[next] {
                Colour::White => {
                    colour[next] = Colour::Gray;
                    stack.push((next, 0));
                }
                Colour::Gray => {
                    let err = cycle_from_stack(graph, &stack, next);
                    warn!(path = ?err.path, "cycle detected");
                    return Err(err);
                }
                Colour::Black => {}
            }
        }
    }

    debug!(tasks = n, "task graph is acyclic");
    Ok(())
}

/// The gray node `closing` is somewhere on the stack; the cycle is the stack
/// from there to the top, closed by `closing` itself.
fn cycle_from_stack(graph: &GraphModel, stack: &[(usize, usize)], closing: usize) -> CycleError {
    let start = stack
        .iter()
        .position(|&(node, _)| node == closing)
        .unwrap_or(0);

    let mut path: Vec<String> = stack[start..]
        .iter()
        .map(|&(node, _)| graph.id_at(node).to_string())
        .collect();
    path.push(graph.id_at(closing).to_string());

    CycleError { path }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{build, TaskDeclaration};
    use crate::exec::work_fn;

    fn decl(id: &str, deps: &[&str]) -> TaskDeclaration {
        TaskDeclaration::new(id, work_fn(|| async { Ok(String::new()) }))
            .depends_on_all(deps.iter().copied())
    }

    #[test]
    fn diamond_is_acyclic() {
        let graph = build(vec![
            decl("A", &[]),
            decl("B", &["A"]),
            decl("C", &["A"]),
            decl("D", &["B", "C"]),
        ])
        .unwrap();
        assert!(validate(&graph).is_ok());
    }

    #[test]
    fn two_node_cycle_reports_path() {
        let graph = build(vec![decl("A", &["B"]), decl("B", &["A"])]).unwrap();
        let err = validate(&graph).unwrap_err();
        assert_eq!(err.path, vec!["A", "B", "A"]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let graph = build(vec![decl("A", &["A"])]).unwrap();
        let err = validate(&graph).unwrap_err();
        assert_eq!(err.path, vec!["A", "A"]);
    }

    #[test]
    fn cycle_in_disconnected_component_is_found() {
        let graph = build(vec![
            decl("ok1", &[]),
            decl("ok2", &["ok1"]),
            decl("x", &["z"]),
            decl("y", &["x"]),
            decl("z", &["y"]),
        ])
        .unwrap();
        let err = validate(&graph).unwrap_err();
        assert_eq!(err.path, vec!["x", "z", "y", "x"]);
    }

    #[test]
    fn cycle_path_excludes_the_tail_leading_into_it() {
        let graph = build(vec![
            decl("entry", &["a"]),
            decl("a", &["b"]),
            decl("b", &["a"]),
        ])
        .unwrap();
        let err = validate(&graph).unwrap_err();
        assert_eq!(err.path, vec!["a", "b", "a"]);
    }

    #[test]
    fn long_chain_does_not_overflow() {
        // t0 depends on t1 depends on t2 ..., so the first root walks the
        // whole chain.
        let n = 100_000;
        let mut decls = Vec::with_capacity(n);
        for i in 0..n - 1 {
            let next = format!("t{}", i + 1);
            decls.push(decl(&format!("t{i}"), &[next.as_str()]));
        }
        decls.push(decl(&format!("t{}", n - 1), &[]));
        let graph = build(decls).unwrap();
        assert!(validate(&graph).is_ok());
    }
}
