//! Configuration types for harness synthesis

use serde::{Deserialize, Serialize};

/// Environment assumptions placed on the symbolic backing arrays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssumptionPolicy {
    /// No assumptions: arrays are fully unconstrained
    None,

    /// The last cell of every backing array holds `value`, so a
    /// sentinel-terminated scan always finds its terminator in bounds
    Sentinel { value: i64 },

    /// Caller-supplied predicates, each wrapped in `__CPROVER_assume`.
    /// A predicate containing `{ptr}` is emitted once per pointer with the
    /// pointer name substituted; others are emitted once.
    Custom { predicates: Vec<String> },
}

impl Default for AssumptionPolicy {
    fn default() -> Self {
        AssumptionPolicy::Sentinel { value: 0 }
    }
}

/// Configuration for the harness template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Capacity of every backing array (default: 100)
    pub array_capacity: usize,

    /// Element type of the backing arrays
    pub element_type: String,

    /// Type of the `<p>_idx` index variables
    pub index_type: String,

    /// Type given to every discovered scalar
    pub scalar_type: String,

    /// Declare read-before-write scalars as unconstrained inputs
    pub symbolic_scalars: bool,

    /// Assumptions on symbolic inputs
    pub assumptions: AssumptionPolicy,

    /// Prefix of the generated entry function
    pub entry_prefix: String,

    /// Headers included at the top of the harness
    pub includes: Vec<String>,

    /// Longest candidate invariant accepted, in bytes
    pub max_invariant_len: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            array_capacity: 100,
            element_type: "unsigned char".to_string(),
            index_type: "int".to_string(),
            scalar_type: "long".to_string(),
            symbolic_scalars: true,
            assumptions: AssumptionPolicy::default(),
            entry_prefix: "loopabs_".to_string(),
            includes: vec![
                "assert.h".to_string(),
                "stddef.h".to_string(),
                "limits.h".to_string(),
            ],
            max_invariant_len: 1000,
        }
    }
}

impl HarnessConfig {
    /// Set the backing array capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.array_capacity = capacity;
        self
    }

    /// Set the assumption policy
    pub fn with_assumptions(mut self, assumptions: AssumptionPolicy) -> Self {
        self.assumptions = assumptions;
        self
    }

    /// Name of the nondet function returning a scalar
    pub(crate) fn nondet_function(&self) -> String {
        let suffix: String = self
            .scalar_type
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        format!("nondet_{suffix}")
    }
}
