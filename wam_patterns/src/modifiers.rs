use serde::Serialize;

use crate::host::{EyePatch, ModifierControl};

/// A modifier that changed, with its new value rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifierUpdate {
    pub name: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModifierSnapshot {
    pub eye_patch: EyePatch,
    pub mirror_effect: bool,
    pub dual_task: bool,
    pub prism_effect: f64,
    pub right_controller_main: bool,
}

impl Default for ModifierSnapshot {
    fn default() -> Self {
        Self {
            eye_patch: EyePatch::None,
            mirror_effect: false,
            dual_task: false,
            prism_effect: 0.0,
            right_controller_main: true,
        }
    }
}

type Observer = Box<dyn FnMut(&ModifierUpdate)>;

/// In-memory modifier settings that notify subscribers on every change.
///
/// Re-applying the current value is ignored, except for the prism angle,
/// which is published every time it is set.
#[derive(Default)]
pub struct ModifierState {
    current: ModifierSnapshot,
    observers: Vec<Observer>,
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&ModifierUpdate) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn snapshot(&self) -> ModifierSnapshot {
        self.current
    }

    fn publish(&mut self, name: &'static str, value: String) {
        let update = ModifierUpdate { name, value };
        for observer in &mut self.observers {
            observer(&update);
        }
    }
}

impl ModifierControl for ModifierState {
    fn set_eye_patch(&mut self, eye_patch: EyePatch) {
        if self.current.eye_patch == eye_patch {
            return;
        }
        self.current.eye_patch = eye_patch;
        self.publish("EyePatch", eye_patch.to_string());
    }

    fn set_mirror_effect(&mut self, enabled: bool) {
        if self.current.mirror_effect == enabled {
            return;
        }
        self.current.mirror_effect = enabled;
        self.publish("MirrorEffect", enabled.to_string());
    }

    fn set_dual_task(&mut self, enabled: bool) {
        if self.current.dual_task == enabled {
            return;
        }
        self.current.dual_task = enabled;
        self.publish("DualTask", enabled.to_string());
    }

    fn set_prism_effect(&mut self, angle: f64) {
        self.current.prism_effect = angle;
        self.publish("PrismEffect", angle.to_string());
    }

    fn set_main_controller(&mut self, right_is_main: bool) {
        if self.current.right_controller_main == right_is_main {
            return;
        }
        self.current.right_controller_main = right_is_main;
        self.publish("RightControllerMain", right_is_main.to_string());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{ModifierState, ModifierUpdate};
    use crate::host::{EyePatch, ModifierControl};

    fn observed() -> (ModifierState, Rc<RefCell<Vec<ModifierUpdate>>>) {
        let mut state = ModifierState::new();
        let updates = Rc::new(RefCell::new(Vec::new()));
        let sink = updates.clone();
        state.subscribe(move |update| sink.borrow_mut().push(update.clone()));
        (state, updates)
    }

    #[test]
    fn unchanged_values_are_not_published() {
        let (mut state, updates) = observed();
        state.set_mirror_effect(false);
        state.set_main_controller(true);
        state.set_eye_patch(EyePatch::None);
        assert!(updates.borrow().is_empty());

        state.set_eye_patch(EyePatch::Right);
        state.set_dual_task(true);
        state.set_dual_task(true);
        let names: Vec<_> = updates.borrow().iter().map(|update| update.name).collect();
        assert_eq!(names, vec!["EyePatch", "DualTask"]);
        assert_eq!(updates.borrow()[0].value, "Right");
    }

    #[test]
    fn prism_angle_always_publishes() {
        let (mut state, updates) = observed();
        state.set_prism_effect(0.0);
        state.set_prism_effect(15.5);
        state.set_prism_effect(15.5);
        let values: Vec<_> = updates
            .borrow()
            .iter()
            .map(|update| update.value.clone())
            .collect();
        assert_eq!(values, vec!["0", "15.5", "15.5"]);
        assert_eq!(state.snapshot().prism_effect, 15.5);
    }
}
