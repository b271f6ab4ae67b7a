//! Timing methods: the built-in catalogue plus user-defined methods.
//!
//! Custom methods are stored as a JSON array under
//! [`CUSTOM_METHODS_KEY`]. Built-ins are immutable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{CoreError, StorageError, ValidationError};
use crate::storage::{KvStore, CUSTOM_METHODS_KEY};

const CUSTOM_PREFIX: &str = "custom_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub work_duration_minutes: u32,
    #[serde(default)]
    pub break_duration_minutes: Option<u32>,
}

impl Method {
    pub fn is_custom(&self) -> bool {
        self.id.starts_with(CUSTOM_PREFIX)
    }
}

/// Fields a user supplies for a custom method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDraft {
    pub name: String,
    pub description: String,
    pub work_duration_minutes: u32,
    pub break_duration_minutes: Option<u32>,
}

impl MethodDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.work_duration_minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "work_duration_minutes".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    fn into_method(self, id: String) -> Method {
        Method {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            work_duration_minutes: self.work_duration_minutes,
            break_duration_minutes: self.break_duration_minutes.filter(|&m| m > 0),
        }
    }
}

/// The methods shipped with the app.
pub fn builtin_methods() -> Vec<Method> {
    vec![
        Method {
            id: "1".into(),
            name: "Pomodoro".into(),
            description: "Work in 25 minute intervals with 5 minute breaks.".into(),
            work_duration_minutes: 25,
            break_duration_minutes: Some(5),
        },
        Method {
            id: "2".into(),
            name: "Deep Work".into(),
            description: "Focus intensely for 90 minutes.".into(),
            work_duration_minutes: 90,
            break_duration_minutes: None,
        },
        Method {
            id: "3".into(),
            name: "52/17".into(),
            description: "Work for 52 minutes, then take a 17 minute break.".into(),
            work_duration_minutes: 52,
            break_duration_minutes: Some(17),
        },
    ]
}

pub struct MethodRegistry {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl MethodRegistry {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Built-ins first, then custom methods in creation order.
    pub fn all(&self) -> Result<Vec<Method>, CoreError> {
        let mut methods = builtin_methods();
        methods.extend(self.custom()?);
        Ok(methods)
    }

    pub fn get(&self, id: &str) -> Result<Option<Method>, CoreError> {
        Ok(self.all()?.into_iter().find(|m| m.id == id))
    }

    pub fn add(&self, draft: MethodDraft) -> Result<Method, CoreError> {
        draft.validate()?;
        let mut custom = self.custom()?;

        let mut stamp = self.clock.now_ms();
        let id = loop {
            let candidate = format!("{CUSTOM_PREFIX}{stamp}");
            if !custom.iter().any(|m| m.id == candidate) {
                break candidate;
            }
            stamp += 1;
        };

        let method = draft.into_method(id);
        custom.push(method.clone());
        self.write(&custom)?;
        Ok(method)
    }

    pub fn update(&self, id: &str, draft: MethodDraft) -> Result<Method, CoreError> {
        draft.validate()?;
        let mut custom = self.custom()?;
        let slot = custom
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found(id))?;
        *slot = draft.into_method(id.to_string());
        let updated = slot.clone();
        self.write(&custom)?;
        Ok(updated)
    }

    pub fn remove(&self, id: &str) -> Result<Method, CoreError> {
        let mut custom = self.custom()?;
        let index = custom
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| not_found(id))?;
        let removed = custom.remove(index);
        self.write(&custom)?;
        Ok(removed)
    }

    fn custom(&self) -> Result<Vec<Method>, CoreError> {
        match self.store.get(CUSTOM_METHODS_KEY)? {
            None => Ok(Vec::new()),
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                StorageError::Corrupted {
                    key: CUSTOM_METHODS_KEY.into(),
                    message: e.to_string(),
                }
                .into()
            }),
        }
    }

    fn write(&self, custom: &[Method]) -> Result<(), CoreError> {
        self.store
            .set(CUSTOM_METHODS_KEY, &serde_json::to_string(custom)?)?;
        Ok(())
    }
}

fn not_found(id: &str) -> CoreError {
    ValidationError::NotFound {
        kind: "custom method",
        id: id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    fn registry() -> MethodRegistry {
        MethodRegistry::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        )
    }

    fn draft(name: &str, work: u32, brk: Option<u32>) -> MethodDraft {
        MethodDraft {
            name: name.into(),
            description: String::new(),
            work_duration_minutes: work,
            break_duration_minutes: brk,
        }
    }

    #[test]
    fn builtins_are_listed_first() {
        let all = registry().all().unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(all[1].break_duration_minutes, None);
    }

    #[test]
    fn add_assigns_unique_custom_ids() {
        let reg = registry();
        let a = reg.add(draft("Sprint", 15, Some(3))).unwrap();
        let b = reg.add(draft("Sprint 2", 20, None)).unwrap();
        assert_eq!(a.id, "custom_1700000000000");
        assert_eq!(b.id, "custom_1700000000001");
        assert!(a.is_custom());
        assert_eq!(reg.all().unwrap().len(), 5);
        assert_eq!(reg.get(&b.id).unwrap().unwrap().name, "Sprint 2");
    }

    #[test]
    fn add_validates_draft() {
        let reg = registry();
        assert!(reg.add(draft("  ", 10, None)).is_err());
        assert!(reg.add(draft("Zero", 0, None)).is_err());
        let m = reg.add(draft("No break", 10, Some(0))).unwrap();
        assert_eq!(m.break_duration_minutes, None);
    }

    #[test]
    fn update_and_remove_only_touch_custom_methods() {
        let reg = registry();
        let m = reg.add(draft("Sprint", 15, Some(3))).unwrap();

        let updated = reg.update(&m.id, draft("Long sprint", 30, Some(5))).unwrap();
        assert_eq!(updated.work_duration_minutes, 30);
        assert!(reg.update("1", draft("Hacked", 1, None)).is_err());
        assert!(reg.remove("2").is_err());

        reg.remove(&m.id).unwrap();
        assert!(reg.get(&m.id).unwrap().is_none());
        assert_eq!(reg.get("1").unwrap().unwrap().name, "Pomodoro");
    }
}
