use serde::{Deserialize, Serialize};

use crate::action::ScheduledAction;

/// Actions that fire together at one offset, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStep {
    pub offset: f64,
    pub actions: Vec<ScheduledAction>,
}

/// Parsed pattern timeline, kept sorted by offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    steps: Vec<ScheduleStep>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `action` to the step at `offset`, creating the step if needed.
    pub fn push(&mut self, offset: f64, action: ScheduledAction) {
        let index = self.ensure_step(offset);
        self.steps[index].actions.push(action);
    }

    /// Makes sure a step exists at `offset` and returns its index.
    pub fn ensure_step(&mut self, offset: f64) -> usize {
        match self
            .steps
            .binary_search_by(|step| step.offset.total_cmp(&offset))
        {
            Ok(index) => index,
            Err(index) => {
                self.steps.insert(
                    index,
                    ScheduleStep {
                        offset,
                        actions: Vec::new(),
                    },
                );
                index
            }
        }
    }

    pub fn steps(&self) -> &[ScheduleStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&ScheduleStep> {
        self.steps.get(index)
    }

    pub fn actions_at(&self, offset: f64) -> Option<&[ScheduledAction]> {
        self.steps
            .binary_search_by(|step| step.offset.total_cmp(&offset))
            .ok()
            .map(|index| self.steps[index].actions.as_slice())
    }

    pub fn offsets(&self) -> Vec<f64> {
        self.steps.iter().map(|step| step.offset).collect()
    }

    /// Largest offset in the schedule, i.e. the terminal entry.
    pub fn duration(&self) -> Option<f64> {
        self.steps.last().map(|step| step.offset)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn action_count(&self) -> usize {
        self.steps.iter().map(|step| step.actions.len()).sum()
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
