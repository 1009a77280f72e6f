//! Modify action - stamp configured fields onto every document
//!
//! Sets each configured `field = value` pair on the document root.
//! Non-object roots pass through untouched.

use std::sync::Arc;

use serde_json::Value;

use lumber_pipeline::{ActionFactory, ActionPlugin, ActionResult, Event};

#[derive(Clone)]
pub struct ModifyAction {
    fields: Vec<(String, String)>,
}

impl ModifyAction {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn factory(fields: Vec<(String, String)>) -> ActionFactory {
        let action = ModifyAction::new(fields);
        Arc::new(move || Box::new(action.clone()))
    }
}

impl ActionPlugin for ModifyAction {
    fn handle(&mut self, mut event: Box<Event>) -> ActionResult {
        if let Value::Object(map) = &mut event.root {
            for (field, value) in &self.fields {
                map.insert(field.clone(), Value::String(value.clone()));
            }
        }
        ActionResult::Pass(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumber_pipeline::EventKind;
    use serde_json::json;

    #[test]
    fn test_sets_fields_on_object_roots() {
        let mut action = ModifyAction::new(vec![
            ("env".to_string(), "prod".to_string()),
            ("log".to_string(), "overwritten".to_string()),
        ]);

        let mut event = Event::synthetic(EventKind::Normal);
        event.root = json!({"log": "x"});

        match action.handle(event) {
            ActionResult::Pass(event) => {
                assert_eq!(event.root, json!({"log": "overwritten", "env": "prod"}));
            }
            _ => panic!("modify must pass events on"),
        }
    }

    #[test]
    fn test_leaves_non_object_roots_alone() {
        let mut action = ModifyAction::new(vec![("k".to_string(), "v".to_string())]);

        let mut event = Event::synthetic(EventKind::Normal);
        event.root = json!("scalar");

        match action.handle(event) {
            ActionResult::Pass(event) => assert_eq!(event.root, json!("scalar")),
            _ => panic!("modify must pass events on"),
        }
    }
}
