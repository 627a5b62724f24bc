//! The abstraction stage: gate, classify, rewrite, check

use crate::classify::{classifier_for, VariableClassification};
use crate::completeness::residual;
use crate::config::AbstractionConfig;
use crate::error::CoreError;
use crate::gate::{self, Rejection};
use crate::lexer::{identifiers, mask};
use crate::record::LoopRecord;
use crate::rewrite::{rewrite_order, rewrite_variable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Outcome of abstracting one loop.
///
/// `abstracted_body` is `None` when the loop could not be abstracted soundly;
/// `rejection` then says why. An empty string is a valid (empty) body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractionResult {
    #[serde(rename = "id")]
    pub loop_id: String,
    /// Pointer name to index variable name
    #[serde(rename = "ptr_vars", default)]
    pub pointer_index_map: BTreeMap<String, String>,
    #[serde(rename = "abstracted_code")]
    pub abstracted_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl AbstractionResult {
    pub fn rejected(loop_id: impl Into<String>, rejection: Rejection) -> Self {
        Self {
            loop_id: loop_id.into(),
            pointer_index_map: BTreeMap::new(),
            abstracted_body: None,
            rejection: Some(rejection),
        }
    }

    pub fn is_abstracted(&self) -> bool {
        self.abstracted_body.is_some()
    }

    /// Pointer variables, in name order
    pub fn pointers(&self) -> impl Iterator<Item = &str> {
        self.pointer_index_map.keys().map(String::as_str)
    }
}

/// Stateless abstraction engine holding its configuration
#[derive(Debug, Clone, Default)]
pub struct Abstractor {
    config: AbstractionConfig,
}

impl Abstractor {
    pub fn new(config: AbstractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AbstractionConfig {
        &self.config
    }

    /// Abstract one loop. Disqualified and incompletely rewritten loops come
    /// back as `Ok` results without a body; `Err` means the rewrite itself
    /// could not be attempted.
    pub fn abstract_loop(&self, record: &LoopRecord) -> Result<AbstractionResult, CoreError> {
        let masked = mask(&record.source_code);

        if let Some(rejection) = gate::check(record, &masked, &self.config) {
            debug!(id = %record.id, %rejection, "loop disqualified");
            return Ok(AbstractionResult::rejected(&record.id, rejection));
        }

        let classifier = classifier_for(record, &self.config);
        let classification = classifier.classify(record, &masked);
        debug!(
            id = %record.id,
            classifier = classifier.name(),
            pointers = ?classification.pointers,
            opaque = ?classification.opaque,
            "classified variables"
        );

        if let Some(name) = generated_name_collision(&masked, &classification) {
            return Ok(AbstractionResult::rejected(
                &record.id,
                Rejection::NameCollision(name),
            ));
        }

        let mut body = record.source_code.clone();
        for var in rewrite_order(&classification.pointers) {
            let (rewritten, _) = rewrite_variable(&body, var)?;
            body = rewritten;
            let left = residual(&body, classification.pointers.get(var));
            if !left.is_empty() {
                debug!(id = %record.id, var, "residual occurrence after rewrite");
                return Ok(AbstractionResult::rejected(
                    &record.id,
                    Rejection::IncompleteRewrite(left),
                ));
            }
        }

        let left = residual(&body, classification.guarded());
        if !left.is_empty() {
            return Ok(AbstractionResult::rejected(
                &record.id,
                Rejection::IncompleteRewrite(left),
            ));
        }

        let pointer_index_map = classification
            .pointers
            .iter()
            .map(|p| (p.clone(), format!("{p}_idx")))
            .collect();

        Ok(AbstractionResult {
            loop_id: record.id.clone(),
            pointer_index_map,
            abstracted_body: Some(body),
            rejection: None,
        })
    }
}

/// Abstract one loop with the given configuration
pub fn abstract_loop(
    record: &LoopRecord,
    config: &AbstractionConfig,
) -> Result<AbstractionResult, CoreError> {
    Abstractor::new(config.clone()).abstract_loop(record)
}

/// A generated `p_idx` or `arr_p` that the loop already uses
fn generated_name_collision(masked: &str, classification: &VariableClassification) -> Option<String> {
    let present: BTreeSet<&str> = identifiers(masked).map(|id| id.text).collect();
    classification.pointers.iter().find_map(|p| {
        [format!("{p}_idx"), format!("arr_{p}")]
            .into_iter()
            .find(|name| present.contains(name.as_str()))
    })
}
