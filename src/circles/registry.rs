use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::info;

use super::circle::Circle;

/// Process-wide map from circle id to its live [`Circle`].
///
/// Circles are created on first reference and dropped once their last member
/// leaves. A circle closed by its last leave is never handed out again, so at
/// most one open circle exists per id.
#[derive(Debug)]
pub struct Registry {
    circles: Mutex<HashMap<String, Arc<Circle>>>,
    history_capacity: usize,
}

impl Registry {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            circles: Mutex::new(HashMap::new()),
            history_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Circle>>> {
        self.circles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_or_create(&self, id: &str) -> Arc<Circle> {
        let mut circles = self.lock();
        if let Some(circle) = circles.get(id) {
            if !circle.is_closed() {
                return Arc::clone(circle);
            }
        }

        let circle = Arc::new(Circle::new(id, self.history_capacity));
        circles.insert(id.to_owned(), Arc::clone(&circle));
        info!(circle = id, "circle created");
        circle
    }

    pub fn get(&self, id: &str) -> Option<Arc<Circle>> {
        self.lock().get(id).cloned()
    }

    /// Drops the entry for `id` if its circle has been closed. An entry that
    /// was already replaced by a fresh circle is left alone.
    pub fn remove(&self, id: &str) -> bool {
        let mut circles = self.lock();
        match circles.get(id) {
            Some(circle) if circle.is_closed() => {
                circles.remove(id);
                info!(circle = id, "circle removed");
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}
