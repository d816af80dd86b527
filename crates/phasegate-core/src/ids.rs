use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn from_str(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(TaskId);
id_newtype!(EventId);

impl TaskId {
    /// Opaque id derived from the task description and its start timestamp.
    pub fn derive(description: &str, start_unix: i64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(description.as_bytes());
        hasher.update(b"\0");
        hasher.update(start_unix.to_be_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("task-{}", &digest[..12]))
    }
}

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_is_stable_for_same_inputs() {
        let a = TaskId::derive("login page", 1_700_000_000);
        let b = TaskId::derive("login page", 1_700_000_000);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("task-"));
        assert_eq!(a.as_str().len(), "task-".len() + 12);
    }

    #[test]
    fn task_id_changes_with_timestamp() {
        let a = TaskId::derive("login page", 1);
        let b = TaskId::derive("login page", 2);
        assert_ne!(a, b);
    }
}
