//! In-memory conversation sessions.
//!
//! Each session keeps its most recent `max_history` exchanges; older ones
//! are dropped first. Nothing is persisted, so sessions end with the
//! process.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// One user question and the assistant's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

#[derive(Default)]
struct Sessions {
    next_id: u64,
    history: HashMap<String, VecDeque<Exchange>>,
}

pub struct SessionStore {
    max_history: usize,
    inner: Mutex<Sessions>,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            inner: Mutex::new(Sessions::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a session. Ids are `session_1`, `session_2`, ...
    pub fn create_session(&self) -> String {
        let mut sessions = self.lock();
        sessions.next_id += 1;
        let id = format!("session_{}", sessions.next_id);
        sessions.history.insert(id.clone(), VecDeque::new());
        id
    }

    /// Record an exchange. Unknown ids start a new history under that id.
    pub fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) {
        let mut sessions = self.lock();
        let history = sessions.history.entry(session_id.to_string()).or_default();
        history.push_back(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// History rendered for the prompt, oldest first:
    ///
    /// ```text
    /// User: ...
    /// Assistant: ...
    /// ```
    ///
    /// `None` for unknown or empty sessions.
    pub fn get_conversation_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.lock();
        let history = sessions.history.get(session_id)?;
        if history.is_empty() {
            return None;
        }
        let lines: Vec<String> = history
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.user, e.assistant))
            .collect();
        Some(lines.join("\n"))
    }

    /// Forget a session's history. The id stays valid.
    pub fn clear_session(&self, session_id: &str) {
        if let Some(history) = self.lock().history.get_mut(session_id) {
            history.clear();
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().history.len()
    }
}
