//! Editor-side model of a sequence.
//!
//! Steps are kept in an arena addressed by stable [`StepKey`]s, so edits
//! never depend on array positions. Orders are derived only when saving.

use std::{collections::HashMap, fmt};

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    model::{SequenceModel, StepModel, StepType},
    sequence::{
        SequenceService,
        config::{ConditionConfig, StepConfig},
    },
};

/// Stable identity of a step inside one builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepKey(u64);

impl fmt::Display for StepKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "step-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Validation failure reported to the editor. `Display` is the user-facing text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SaveError {
    #[error("Nome é obrigatório.")]
    EmptyName,
    #[error("Adicione pelo menos um step.")]
    NoSteps,
    #[error("{0}")]
    Service(String),
}

/// Message shown when the persistence service rejects a save.
pub const SERVICE_ERROR_MESSAGE: &str = "Erro ao salvar sequência.";

/// Materialized view of one step at its current position.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub key: StepKey,
    /// 1-based position.
    pub order: u32,
    pub config: StepConfig,
}

impl Step {
    pub fn step_type(&self) -> StepType {
        self.config.step_type()
    }
}

#[derive(Debug, Clone)]
struct StepDraft {
    config: StepConfig,
    /// Condition branch targets, parallel to the config's branches.
    targets: Vec<Option<StepKey>>,
}

#[derive(Debug, Clone)]
pub struct SequenceBuilder {
    id: String,
    name: String,
    description: Option<String>,
    active: bool,

    steps: HashMap<StepKey, StepDraft>,
    positions: Vec<StepKey>,
    next_key: u64,
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: None,
            active: true,
            steps: HashMap::new(),
            positions: Vec::new(),
            next_key: 1,
        }
    }

    /// Builder holding the content of `model`.
    pub fn from_model(model: &SequenceModel) -> Self {
        let mut builder = Self::new();
        builder.load(model);
        builder
    }

    /// Replace the builder content with `model`.
    ///
    /// Branch targets given as orders are bound to the keys of the steps at
    /// those positions; targets pointing past the end are dropped.
    pub fn load(
        &mut self,
        model: &SequenceModel,
    ) {
        self.id = model.id.clone();
        self.name = model.name.clone();
        self.description = model.description.clone();
        self.active = model.active;
        self.steps.clear();
        self.positions.clear();

        for step in model.ordered_steps() {
            let key = self.alloc_key();
            self.steps.insert(
                key,
                StepDraft {
                    config: StepConfig::decode(step.step_type, step.config.as_deref()),
                    targets: Vec::new(),
                },
            );
            self.positions.push(key);
        }

        for key in self.positions.clone() {
            self.bind_targets(key);
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn set_name(
        &mut self,
        name: &str,
    ) {
        self.name = name.to_string();
    }

    pub fn set_description(
        &mut self,
        description: Option<&str>,
    ) {
        self.description = description.map(str::to_string);
    }

    pub fn set_active(
        &mut self,
        active: bool,
    ) {
        self.active = active;
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append a step of `step_type` with its editor template config.
    pub fn add_step(
        &mut self,
        step_type: StepType,
    ) -> StepKey {
        let key = self.alloc_key();
        let config = StepConfig::template(step_type);
        let targets = branch_count(&config).map(|n| vec![None; n]).unwrap_or_default();
        self.steps.insert(
            key,
            StepDraft {
                config,
                targets,
            },
        );
        self.positions.push(key);
        key
    }

    /// Swap the step with its neighbour. No-op at the edges or for unknown keys.
    pub fn move_step(
        &mut self,
        key: StepKey,
        direction: Direction,
    ) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.positions.len() => index + 1,
            _ => return false,
        };
        self.positions.swap(index, target);
        true
    }

    /// Delete a step. Branches that targeted it fall through afterwards.
    pub fn remove_step(
        &mut self,
        key: StepKey,
    ) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        self.positions.remove(index);
        self.steps.remove(&key);
        for draft in self.steps.values_mut() {
            for target in draft.targets.iter_mut() {
                if *target == Some(key) {
                    *target = None;
                }
            }
        }
        true
    }

    /// Replace the config of a step. Condition targets are rebound from the given orders.
    pub fn update_config(
        &mut self,
        key: StepKey,
        config: StepConfig,
    ) -> bool {
        let Some(draft) = self.steps.get_mut(&key) else {
            return false;
        };
        draft.config = config;
        self.bind_targets(key);
        true
    }

    /// Patch a single field of a step's raw config, then re-decode it.
    pub fn update_config_field(
        &mut self,
        key: StepKey,
        field: &str,
        value: Value,
    ) -> bool {
        let Some(step) = self.step(key) else {
            return false;
        };
        let mut obj = step.config.to_object();
        obj.insert(field.to_string(), value);
        let config = StepConfig::from_object(step.step_type(), &obj);
        self.update_config(key, config)
    }

    /// Point branch `branch` of condition `key` at `target` (`None` falls through).
    pub fn set_branch_target(
        &mut self,
        key: StepKey,
        branch: usize,
        target: Option<StepKey>,
    ) -> bool {
        if target.is_some_and(|t| !self.steps.contains_key(&t)) {
            return false;
        }
        match self.steps.get_mut(&key) {
            Some(draft) if branch < draft.targets.len() => {
                draft.targets[branch] = target;
                true
            }
            _ => false,
        }
    }

    /// Current target of branch `branch` of condition `key`.
    pub fn branch_target(
        &self,
        key: StepKey,
        branch: usize,
    ) -> Option<StepKey> {
        self.steps.get(&key).and_then(|d| d.targets.get(branch).copied().flatten())
    }

    /// Key of the step at 1-based `order`.
    pub fn key_at(
        &self,
        order: u32,
    ) -> Option<StepKey> {
        (order as usize).checked_sub(1).and_then(|i| self.positions.get(i).copied())
    }

    pub fn step(
        &self,
        key: StepKey,
    ) -> Option<Step> {
        let index = self.position(key)?;
        Some(self.materialize(index, key))
    }

    /// Steps in position order with their derived orders.
    pub fn steps(&self) -> Vec<Step> {
        self.positions.iter().enumerate().map(|(index, key)| self.materialize(index, *key)).collect()
    }

    /// Validate and produce the wire model with dense `1..=N` orders.
    pub fn save(&self) -> Result<SequenceModel, SaveError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(SaveError::EmptyName);
        }
        if self.positions.is_empty() {
            return Err(SaveError::NoSteps);
        }

        let steps = self
            .steps()
            .into_iter()
            .map(|step| StepModel {
                order: step.order,
                step_type: step.step_type(),
                config: Some(step.config.encode()),
            })
            .collect();

        Ok(SequenceModel {
            id: self.id.clone(),
            name: name.to_string(),
            description: self.description.as_deref().map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
            active: self.active,
            steps,
            execution_count: 0,
        })
    }

    /// Save, then create (`id` is `None`) or update through `service`.
    ///
    /// A service failure leaves the builder untouched.
    pub async fn persist<S>(
        &mut self,
        service: &S,
        id: Option<&str>,
    ) -> Result<SequenceModel, SaveError>
    where
        S: SequenceService + ?Sized,
    {
        let model = self.save()?;
        let saved = match id {
            Some(id) => service.update_sequence(id, &model).await,
            None => service.create_sequence(&model).await,
        }
        .map_err(|err| {
            warn!("failed to save sequence '{}': {}", model.name, err);
            SaveError::Service(SERVICE_ERROR_MESSAGE.to_string())
        })?;

        info!("sequence '{}' saved as {}", saved.name, saved.id);
        self.id = saved.id.clone();
        Ok(saved)
    }

    fn alloc_key(&mut self) -> StepKey {
        let key = StepKey(self.next_key);
        self.next_key += 1;
        key
    }

    fn position(
        &self,
        key: StepKey,
    ) -> Option<usize> {
        self.positions.iter().position(|k| *k == key)
    }

    /// Rebind a condition's targets from the orders in its config.
    fn bind_targets(
        &mut self,
        key: StepKey,
    ) {
        let targets: Vec<Option<StepKey>> = match self.steps.get(&key).map(|d| &d.config) {
            Some(StepConfig::Condition(c)) => c.branches.iter().map(|b| if b.go_to_step > 0 { self.key_at(b.go_to_step) } else { None }).collect(),
            _ => Vec::new(),
        };
        if let Some(draft) = self.steps.get_mut(&key) {
            draft.targets = targets;
        }
    }

    fn materialize(
        &self,
        index: usize,
        key: StepKey,
    ) -> Step {
        let mut config = self.steps.get(&key).map(|d| d.config.clone()).unwrap_or(StepConfig::ClassifyResponse);
        if let (StepConfig::Condition(c), Some(draft)) = (&mut config, self.steps.get(&key)) {
            self.write_targets(c, &draft.targets);
        }
        Step {
            key,
            order: index as u32 + 1,
            config,
        }
    }

    fn write_targets(
        &self,
        config: &mut ConditionConfig,
        targets: &[Option<StepKey>],
    ) {
        for (i, branch) in config.branches.iter_mut().enumerate() {
            branch.go_to_step = targets.get(i).copied().flatten().and_then(|t| self.position(t)).map(|p| p as u32 + 1).unwrap_or(0);
        }
    }
}

fn branch_count(config: &StepConfig) -> Option<usize> {
    match config {
        StepConfig::Condition(c) => Some(c.branches.len()),
        _ => None,
    }
}
