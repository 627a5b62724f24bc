//! Harness rendering

use crate::config::{AssumptionPolicy, HarnessConfig};
use crate::error::HarnessError;
use crate::invariant::{default_invariant, sanitize_invariant};
use crate::scalars::{discover_scalars, Scalar, ScalarInit};
use loopabs_core::AbstractionResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Where the asserted invariant came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantOrigin {
    /// Supplied candidate passed sanitisation
    Candidate,
    /// Bounds-only fallback
    Default,
}

/// A self-contained verification unit for one loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessSource {
    pub loop_id: String,
    /// Name of the function CBMC should start from
    pub entry_function: String,
    /// Invariant text asserted before and after the loop
    pub invariant: String,
    pub invariant_origin: InvariantOrigin,
    pub scalars: Vec<Scalar>,
    /// Complete C translation unit
    pub text: String,
}

/// Renders harnesses from abstraction results
#[derive(Debug, Clone, Default)]
pub struct HarnessSynthesizer {
    config: HarnessConfig,
}

impl HarnessSynthesizer {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Entry function name for a loop id: `<prefix><id>` with every
    /// character outside `[A-Za-z0-9_]` replaced by `_`.
    pub fn entry_function(&self, loop_id: &str) -> String {
        let mut name = self.config.entry_prefix.clone();
        name.extend(
            loop_id
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }),
        );
        name
    }

    /// Build the harness for `result`, asserting `candidate` if it survives
    /// sanitisation and the bounds-only invariant otherwise.
    pub fn synthesize(
        &self,
        result: &AbstractionResult,
        candidate: Option<&str>,
    ) -> Result<HarnessSource, HarnessError> {
        let body = result
            .abstracted_body
            .as_deref()
            .ok_or_else(|| HarnessError::NotAbstracted(result.loop_id.clone()))?;
        if self.config.array_capacity == 0 {
            return Err(HarnessError::ZeroCapacity);
        }

        let pointers: BTreeSet<String> = result.pointer_index_map.keys().cloned().collect();
        let scalars = discover_scalars(body, &pointers);

        let (invariant, invariant_origin) = match candidate {
            Some(text) => {
                let known = declared_names(&pointers, &scalars);
                match sanitize_invariant(text, &known, self.config.max_invariant_len) {
                    Ok(inv) => (inv, InvariantOrigin::Candidate),
                    Err(e) => {
                        warn!(id = %result.loop_id, error = %e, "discarding candidate invariant");
                        (default_invariant(result.pointers()), InvariantOrigin::Default)
                    }
                }
            }
            None => (default_invariant(result.pointers()), InvariantOrigin::Default),
        };

        let entry_function = self.entry_function(&result.loop_id);
        let text = self.render(&entry_function, body, &pointers, &scalars, &invariant);
        debug!(id = %result.loop_id, entry = %entry_function, "synthesized harness");

        Ok(HarnessSource {
            loop_id: result.loop_id.clone(),
            entry_function,
            invariant,
            invariant_origin,
            scalars,
            text,
        })
    }

    fn render(
        &self,
        entry: &str,
        body: &str,
        pointers: &BTreeSet<String>,
        scalars: &[Scalar],
        invariant: &str,
    ) -> String {
        let cfg = &self.config;
        let nondet = cfg.nondet_function();
        let mut code = String::new();

        for header in &cfg.includes {
            code.push_str(&format!("#include <{header}>\n"));
        }
        code.push('\n');
        if cfg.symbolic_scalars && scalars.iter().any(|s| s.init == ScalarInit::Symbolic) {
            code.push_str(&format!("{} {nondet}(void);\n\n", cfg.scalar_type));
        }

        code.push_str(&format!("void {entry}(void)\n{{\n"));
        for p in pointers {
            code.push_str(&format!("    {} {p}_idx = 0;\n", cfg.index_type));
            code.push_str(&format!(
                "    {} arr_{p}[{}];\n",
                cfg.element_type, cfg.array_capacity
            ));
        }
        for s in scalars {
            let init = match s.init {
                ScalarInit::Symbolic if cfg.symbolic_scalars => format!("{nondet}()"),
                _ => "0".to_string(),
            };
            code.push_str(&format!("    {} {} = {init};\n", cfg.scalar_type, s.name));
        }

        let assumptions = self.assumptions(pointers);
        if !assumptions.is_empty() {
            code.push('\n');
            for a in assumptions {
                code.push_str(&format!("    __CPROVER_assume({a});\n"));
            }
        }

        let body = body.trim();
        let terminator = if body.is_empty() || body.ends_with(';') || body.ends_with('}') {
            ""
        } else {
            ";"
        };
        code.push('\n');
        code.push_str(&format!("    assert({invariant});\n"));
        code.push_str(&format!("    {body}{terminator}\n"));
        code.push_str(&format!("    assert({invariant});\n"));
        code.push_str("}\n");
        code
    }

    fn assumptions(&self, pointers: &BTreeSet<String>) -> Vec<String> {
        match &self.config.assumptions {
            AssumptionPolicy::None => Vec::new(),
            AssumptionPolicy::Sentinel { value } => pointers
                .iter()
                .map(|p| format!("arr_{p}[{}] == {value}", self.config.array_capacity - 1))
                .collect(),
            AssumptionPolicy::Custom { predicates } => predicates
                .iter()
                .flat_map(|pred| {
                    if pred.contains("{ptr}") {
                        pointers.iter().map(|p| pred.replace("{ptr}", p)).collect()
                    } else {
                        vec![pred.clone()]
                    }
                })
                .collect(),
        }
    }
}

fn declared_names(pointers: &BTreeSet<String>, scalars: &[Scalar]) -> BTreeSet<String> {
    pointers
        .iter()
        .flat_map(|p| [format!("{p}_idx"), format!("arr_{p}")])
        .chain(scalars.iter().map(|s| s.name.clone()))
        .collect()
}
