// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Per-bit depth counters. A gate touching a set of qubits advances each of
// their counters to 1 + max over the touched set; a branch or box advances
// every bit touched inside it by a single unit.

use hashbrown::HashMap;

pub type BitKey = (String, usize);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QubitDepthNode {
    pub depth: usize,
    pub num_resets: usize,
    pub num_measurements: usize,
    pub num_gates: usize,
    pub num_barriers: usize,
}

impl QubitDepthNode {
    pub fn total_ops(&self) -> usize {
        self.num_resets + self.num_measurements + self.num_gates + self.num_barriers
    }

    pub fn is_idle(&self) -> bool {
        self.total_ops() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClbitDepthNode {
    pub depth: usize,
    pub num_measurements: usize,
}

impl ClbitDepthNode {
    pub fn is_idle(&self) -> bool {
        self.num_measurements == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct DepthTracker {
    pub qubits: HashMap<BitKey, QubitDepthNode>,
    pub clbits: HashMap<BitKey, ClbitDepthNode>,
}

/// State captured at `branch_begin`; consumed by `branch_end`.
#[derive(Clone, Debug)]
pub struct DepthSnapshot {
    qubits: HashMap<BitKey, (usize, usize)>, // (depth, total_ops)
    clbits: HashMap<BitKey, (usize, usize)>,
}

impl DepthTracker {
    pub fn new() -> DepthTracker {
        DepthTracker::default()
    }

    pub fn add_qubit(&mut self, reg: &str, index: usize) {
        self.qubits
            .insert((reg.to_string(), index), QubitDepthNode::default());
    }

    pub fn add_clbit(&mut self, reg: &str, index: usize) {
        self.clbits
            .insert((reg.to_string(), index), ClbitDepthNode::default());
    }

    fn qubit_mut(&mut self, reg: &str, index: usize) -> &mut QubitDepthNode {
        self.qubits
            .entry((reg.to_string(), index))
            .or_default()
    }

    fn clbit_mut(&mut self, reg: &str, index: usize) -> &mut ClbitDepthNode {
        self.clbits
            .entry((reg.to_string(), index))
            .or_default()
    }

    /// One gate applied to `bits`: all touched counters move together to
    /// 1 + max over the touched set.
    pub fn gate(&mut self, bits: &[(String, usize)]) {
        let mut max_depth = 0;
        for (reg, idx) in bits {
            let node = self.qubit_mut(reg, *idx);
            node.num_gates += 1;
            max_depth = max_depth.max(node.depth + 1);
        }
        for (reg, idx) in bits {
            self.qubit_mut(reg, *idx).depth = max_depth;
        }
    }

    pub fn reset(&mut self, reg: &str, index: usize) {
        let node = self.qubit_mut(reg, index);
        node.depth += 1;
        node.num_resets += 1;
    }

    pub fn measure(&mut self, qubit: (&str, usize), clbit: (&str, usize)) {
        let qnode = self.qubit_mut(qubit.0, qubit.1);
        qnode.depth += 1;
        qnode.num_measurements += 1;
        let qdepth = qnode.depth;

        let cnode = self.clbit_mut(clbit.0, clbit.1);
        cnode.depth += 1;
        cnode.num_measurements += 1;
        let joined = qdepth.max(cnode.depth);
        cnode.depth = joined;
        self.qubit_mut(qubit.0, qubit.1).depth = joined;
    }

    /// Barriers advance every touched qubit to the common maximum.
    pub fn barrier(&mut self, bits: &[(String, usize)]) {
        let mut max_depth = 0;
        for (reg, idx) in bits {
            let node = self.qubit_mut(reg, *idx);
            node.depth += 1;
            node.num_barriers += 1;
            max_depth = max_depth.max(node.depth);
        }
        for (reg, idx) in bits {
            self.qubit_mut(reg, *idx).depth = max_depth;
        }
    }

    pub fn branch_begin(&self) -> DepthSnapshot {
        DepthSnapshot {
            qubits: self
                .qubits
                .iter()
                .map(|(k, v)| (k.clone(), (v.depth, v.total_ops())))
                .collect(),
            clbits: self
                .clbits
                .iter()
                .map(|(k, v)| (k.clone(), (v.depth, v.num_measurements)))
                .collect(),
        }
    }

    /// Close a branch or box: every bit touched since the snapshot advances
    /// by exactly one unit over the maximum depth the touched set had at the
    /// snapshot, regardless of the inner gate count.
    pub fn branch_end(&mut self, snapshot: &DepthSnapshot) {
        let touched_qubits: Vec<BitKey> = self
            .qubits
            .iter()
            .filter(|(k, v)| {
                snapshot
                    .qubits
                    .get(*k)
                    .map_or(true, |(_, ops)| v.total_ops() != *ops)
            })
            .map(|(k, _)| k.clone())
            .collect();
        let touched_clbits: Vec<BitKey> = self
            .clbits
            .iter()
            .filter(|(k, v)| {
                snapshot
                    .clbits
                    .get(*k)
                    .map_or(true, |(_, ops)| v.num_measurements != *ops)
            })
            .map(|(k, _)| k.clone())
            .collect();

        let mut base = 0;
        for key in &touched_qubits {
            base = base.max(snapshot.qubits.get(key).map_or(0, |(d, _)| *d));
        }
        for key in &touched_clbits {
            base = base.max(snapshot.clbits.get(key).map_or(0, |(d, _)| *d));
        }
        let unit_depth = base + 1;
        for key in &touched_qubits {
            self.qubits.get_mut(key).unwrap().depth = unit_depth;
        }
        for key in &touched_clbits {
            self.clbits.get_mut(key).unwrap().depth = unit_depth;
        }
    }

    /// Module-level depth: maximum over all counters.
    pub fn max_depth(&self) -> usize {
        let q = self.qubits.values().map(|n| n.depth).max().unwrap_or(0);
        let c = self.clbits.values().map(|n| n.depth).max().unwrap_or(0);
        q.max(c)
    }

    pub fn idle_qubit_indices(&self) -> HashMap<String, Vec<usize>> {
        let mut idle: HashMap<String, Vec<usize>> = HashMap::new();
        for ((reg, idx), node) in &self.qubits {
            if node.is_idle() {
                idle.entry(reg.clone()).or_default().push(*idx);
            }
        }
        for indices in idle.values_mut() {
            indices.sort_unstable();
        }
        idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(pairs: &[(&str, usize)]) -> Vec<(String, usize)> {
        pairs.iter().map(|(r, i)| (r.to_string(), *i)).collect()
    }

    #[test]
    fn test_gate_depth_advances_to_max() {
        let mut tracker = DepthTracker::new();
        for i in 0..3 {
            tracker.add_qubit("q", i);
        }
        tracker.gate(&bits(&[("q", 0)]));
        tracker.gate(&bits(&[("q", 0)]));
        tracker.gate(&bits(&[("q", 0), ("q", 1)]));
        assert_eq!(tracker.qubits[&("q".to_string(), 0)].depth, 3);
        assert_eq!(tracker.qubits[&("q".to_string(), 1)].depth, 3);
        assert_eq!(tracker.qubits[&("q".to_string(), 2)].depth, 0);
        assert_eq!(tracker.max_depth(), 3);
    }

    #[test]
    fn test_branch_counts_once() {
        let mut tracker = DepthTracker::new();
        for i in 0..2 {
            tracker.add_qubit("q", i);
        }
        let snapshot = tracker.branch_begin();
        tracker.gate(&bits(&[("q", 0)]));
        tracker.gate(&bits(&[("q", 0)]));
        tracker.gate(&bits(&[("q", 1)]));
        tracker.branch_end(&snapshot);
        assert_eq!(tracker.qubits[&("q".to_string(), 0)].depth, 1);
        assert_eq!(tracker.qubits[&("q".to_string(), 1)].depth, 1);
    }

    #[test]
    fn test_measure_joins_depths() {
        let mut tracker = DepthTracker::new();
        tracker.add_qubit("q", 0);
        tracker.add_clbit("c", 0);
        tracker.gate(&bits(&[("q", 0)]));
        tracker.measure(("q", 0), ("c", 0));
        assert_eq!(tracker.qubits[&("q".to_string(), 0)].depth, 2);
        assert_eq!(tracker.clbits[&("c".to_string(), 0)].depth, 2);
    }

    #[test]
    fn test_idle_detection() {
        let mut tracker = DepthTracker::new();
        tracker.add_qubit("q", 0);
        tracker.add_qubit("q", 1);
        tracker.gate(&bits(&[("q", 1)]));
        let idle = tracker.idle_qubit_indices();
        assert_eq!(idle["q"], vec![0]);
    }
}
