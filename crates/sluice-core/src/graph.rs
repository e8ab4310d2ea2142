//! The operation dependency graph.
//!
//! Built once per invocation from the operation definitions, validated
//! eagerly, and queried read-only afterwards. The topological order is
//! computed at build time so every consumer sees the identical order.

use crate::errors::GraphError;
use crate::model::{OpName, OperationDef};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug)]
pub struct OperationGraph {
    ops: Vec<OperationDef>,
    index: HashMap<OpName, usize>,
    predecessors: Vec<BTreeSet<usize>>,
    order: Vec<usize>,
}

impl OperationGraph {
    /// Validates the definitions and fixes the execution order. With
    /// `infer` set, an edge `u -> v` is added whenever the post-conditions
    /// of `u` are a superset of the (non-empty) pre-conditions of `v`,
    /// unless the relation also holds in the opposite direction.
    pub fn build(ops: Vec<OperationDef>, infer: bool) -> Result<Self, GraphError> {
        let mut index = HashMap::new();
        for (i, op) in ops.iter().enumerate() {
            if index.insert(op.name.clone(), i).is_some() {
                return Err(GraphError::DuplicateOperation(op.name.clone()));
            }
        }

        let mut predecessors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); ops.len()];
        for (i, op) in ops.iter().enumerate() {
            for pred in &op.after {
                let Some(&p) = index.get(pred) else {
                    return Err(GraphError::UnknownPredecessor {
                        op: op.name.clone(),
                        predecessor: pred.clone(),
                    });
                };
                if p == i {
                    return Err(GraphError::SelfReference(op.name.clone()));
                }
                predecessors[i].insert(p);
            }
        }

        if infer {
            for (u, producer) in ops.iter().enumerate() {
                for (v, consumer) in ops.iter().enumerate() {
                    if u == v {
                        continue;
                    }
                    if satisfies(producer, consumer) && !satisfies(consumer, producer) {
                        predecessors[v].insert(u);
                    }
                }
            }
        }

        let order = topological_order(&ops, &predecessors)?;

        Ok(OperationGraph {
            ops,
            index,
            predecessors,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get(&self, name: &OpName) -> Option<&OperationDef> {
        self.index.get(name).map(|&i| &self.ops[i])
    }

    /// Operations in topological order. Repeated calls yield the same
    /// order; ties are broken by declaration order in the project file.
    pub fn in_order(&self) -> impl Iterator<Item = &OperationDef> {
        self.order.iter().map(move |&i| &self.ops[i])
    }

    /// Direct predecessors of an operation, in declaration order.
    pub fn predecessors_of(&self, name: &OpName) -> impl Iterator<Item = &OperationDef> {
        let preds = self.index.get(name).map(|&i| &self.predecessors[i]);
        preds
            .into_iter()
            .flat_map(move |set| set.iter().map(move |&p| &self.ops[p]))
    }

    /// All transitive predecessors of an operation, in declaration order.
    /// This is what gates submission: a pair may only go out once every
    /// ancestor operation completed for its job.
    pub fn ancestors_of(&self, name: &OpName) -> impl Iterator<Item = &OperationDef> {
        let mut seen = BTreeSet::new();
        if let Some(&start) = self.index.get(name) {
            let mut stack: Vec<usize> = self.predecessors[start].iter().copied().collect();
            while let Some(u) = stack.pop() {
                if seen.insert(u) {
                    stack.extend(self.predecessors[u].iter().copied());
                }
            }
        }
        seen.into_iter().map(move |i| &self.ops[i])
    }
}

// `producer` discharges every pre-condition of `consumer`. Vacuous
// pre-condition lists do not count: an operation with no pre-conditions
// depends on nothing.
fn satisfies(producer: &OperationDef, consumer: &OperationDef) -> bool {
    !consumer.pre.is_empty()
        && consumer
            .pre
            .iter()
            .all(|needed| producer.post.contains(needed))
}

// Kahn's algorithm over declaration indexes. The ready set is a BTreeSet,
// so among simultaneously-ready operations the lowest declaration index
// always leaves first. That makes the order total and reproducible.
fn topological_order(
    ops: &[OperationDef],
    predecessors: &[BTreeSet<usize>],
) -> Result<Vec<usize>, GraphError> {
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ops.len()];
    let mut in_degree: Vec<usize> = vec![0; ops.len()];
    for (v, preds) in predecessors.iter().enumerate() {
        in_degree[v] = preds.len();
        for &u in preds {
            successors[u].push(v);
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(ops.len());
    while let Some(&next) = ready.iter().next() {
        ready.remove(&next);
        order.push(next);
        for &v in &successors[next] {
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                ready.insert(v);
            }
        }
    }

    if order.len() < ops.len() {
        // Name the first declared operation stuck on the cycle.
        let stuck = in_degree
            .iter()
            .position(|&d| d > 0)
            .map(|i| ops[i].name.clone())
            .unwrap_or_else(|| OpName(String::new()));
        return Err(GraphError::Cycle(stuck));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Condition;
    use crate::model::Directives;

    fn op(name: &str, after: Vec<&str>) -> OperationDef {
        OperationDef {
            name: OpName(name.to_string()),
            command: format!("run {name}"),
            pre: vec![],
            post: vec![],
            after: after.into_iter().map(|a| OpName(a.to_string())).collect(),
            directives: Directives::default(),
        }
    }

    fn names(graph: &OperationGraph) -> Vec<String> {
        graph.in_order().map(|o| o.name.0.clone()).collect()
    }

    #[test]
    fn test_diamond_order_respects_edges() {
        let graph = OperationGraph::build(
            vec![
                op("a", vec![]),
                op("b", vec!["a"]),
                op("c", vec!["a"]),
                op("d", vec!["b", "c"]),
            ],
            false,
        )
        .unwrap();
        assert_eq!(names(&graph), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_ties_broken_by_declaration_order() {
        // No edges at all: the order must be exactly the declaration order.
        let graph = OperationGraph::build(
            vec![op("zeta", vec![]), op("alpha", vec![]), op("mid", vec![])],
            false,
        )
        .unwrap();
        assert_eq!(names(&graph), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_order_is_stable_across_calls() {
        let graph = OperationGraph::build(
            vec![op("c", vec![]), op("a", vec!["c"]), op("b", vec!["c"])],
            false,
        )
        .unwrap();
        assert_eq!(names(&graph), names(&graph));
        assert_eq!(names(&graph), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_ancestors_are_transitive() {
        let graph = OperationGraph::build(
            vec![
                op("a", vec![]),
                op("b", vec!["a"]),
                op("c", vec!["b"]),
                op("d", vec![]),
            ],
            false,
        )
        .unwrap();
        let ancestors: Vec<String> = graph
            .ancestors_of(&OpName("c".into()))
            .map(|o| o.name.0.clone())
            .collect();
        assert_eq!(ancestors, vec!["a", "b"]);
        assert_eq!(graph.ancestors_of(&OpName("a".into())).count(), 0);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = OperationGraph::build(
            vec![op("a", vec!["c"]), op("b", vec!["a"]), op("c", vec!["b"])],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let err = OperationGraph::build(vec![op("a", vec!["a"])], false).unwrap_err();
        assert!(matches!(err, GraphError::SelfReference(_)));
    }

    #[test]
    fn test_unknown_predecessor_is_rejected() {
        let err = OperationGraph::build(vec![op("a", vec!["ghost"])], false).unwrap_err();
        assert!(matches!(err, GraphError::UnknownPredecessor { .. }));
    }

    #[test]
    fn test_duplicate_operation_is_rejected() {
        let err = OperationGraph::build(vec![op("a", vec![]), op("a", vec![])], false).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateOperation(_)));
    }

    fn op_with_conditions(name: &str, pre: Vec<Condition>, post: Vec<Condition>) -> OperationDef {
        OperationDef {
            name: OpName(name.to_string()),
            command: format!("run {name}"),
            pre,
            post,
            after: vec![],
            directives: Directives::default(),
        }
    }

    #[test]
    fn test_inference_links_producer_to_consumer() {
        let fetch = op_with_conditions(
            "fetch",
            vec![],
            vec![Condition::FileExists("raw.txt".into())],
        );
        let clean = op_with_conditions(
            "clean",
            vec![Condition::FileExists("raw.txt".into())],
            vec![Condition::FileExists("clean.txt".into())],
        );
        let graph = OperationGraph::build(vec![clean, fetch], true).unwrap();
        assert_eq!(names(&graph), vec!["fetch", "clean"]);
        let preds: Vec<String> = graph
            .predecessors_of(&OpName("clean".into()))
            .map(|o| o.name.0.clone())
            .collect();
        assert_eq!(preds, vec!["fetch"]);
    }

    #[test]
    fn test_inference_off_adds_no_edges() {
        let fetch = op_with_conditions(
            "fetch",
            vec![],
            vec![Condition::FileExists("raw.txt".into())],
        );
        let clean = op_with_conditions(
            "clean",
            vec![Condition::FileExists("raw.txt".into())],
            vec![],
        );
        let graph = OperationGraph::build(vec![clean, fetch], false).unwrap();
        assert_eq!(names(&graph), vec!["clean", "fetch"]);
        assert_eq!(graph.predecessors_of(&OpName("clean".into())).count(), 0);
    }

    #[test]
    fn test_inference_ignores_empty_pre_lists() {
        // An empty pre-condition list is vacuously satisfied by everything;
        // inferring edges from it would serialize unrelated operations.
        let a = op_with_conditions("a", vec![], vec![Condition::FileExists("a.done".into())]);
        let b = op_with_conditions("b", vec![], vec![]);
        let graph = OperationGraph::build(vec![a, b], true).unwrap();
        assert_eq!(graph.predecessors_of(&OpName("b".into())).count(), 0);
    }

    #[test]
    fn test_inference_skips_symmetric_pairs() {
        let shared = vec![Condition::DocFlag("ready".into())];
        let a = op_with_conditions("a", shared.clone(), shared.clone());
        let b = op_with_conditions("b", shared.clone(), shared);
        let graph = OperationGraph::build(vec![a, b], true).unwrap();
        assert_eq!(graph.predecessors_of(&OpName("a".into())).count(), 0);
        assert_eq!(graph.predecessors_of(&OpName("b".into())).count(), 0);
    }

    #[test]
    fn test_explicit_and_inferred_edges_combine() {
        let fetch = op_with_conditions(
            "fetch",
            vec![],
            vec![Condition::FileExists("raw.txt".into())],
        );
        let mut clean = op_with_conditions(
            "clean",
            vec![Condition::FileExists("raw.txt".into())],
            vec![],
        );
        clean.after.push(OpName("audit".into()));
        let audit = op_with_conditions("audit", vec![], vec![]);
        let graph = OperationGraph::build(vec![fetch, audit, clean], true).unwrap();
        let preds: Vec<String> = graph
            .predecessors_of(&OpName("clean".into()))
            .map(|o| o.name.0.clone())
            .collect();
        assert_eq!(preds, vec!["fetch", "audit"]);
    }
}
