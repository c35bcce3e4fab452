//! Active identity of a dashboard session

/// Who the local model currently belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Identity {
    /// Cold start: nothing is known yet about the session
    #[default]
    Unknown,
    /// Nobody is signed in; the public dashboard is shown
    Guest,
    /// A signed-in user
    User(String),
}

impl Identity {
    /// Identity reported by the server for an optional username
    pub fn from_username(username: Option<String>) -> Self {
        match username {
            Some(name) if !name.is_empty() => Identity::User(name),
            _ => Identity::Guest,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Identity::User(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Identity::Unknown)
    }

    /// Whether data owned by `owner` (None = public data) may be shown to
    /// this identity. An unknown identity accepts anything.
    pub fn may_read(&self, owner: Option<&str>) -> bool {
        match self {
            Identity::Unknown => true,
            Identity::Guest => owner.is_none(),
            Identity::User(name) => owner == Some(name.as_str()),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Unknown => f.write_str("<unknown>"),
            Identity::Guest => f.write_str("<guest>"),
            Identity::User(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_may_read() {
        let alice = Identity::User("alice".to_string());
        assert!(alice.may_read(Some("alice")));
        assert!(!alice.may_read(Some("bob")));
        assert!(!alice.may_read(None));

        assert!(Identity::Guest.may_read(None));
        assert!(!Identity::Guest.may_read(Some("bob")));

        assert!(Identity::Unknown.may_read(Some("bob")));
        assert!(Identity::Unknown.may_read(None));
    }

    #[test]
    fn test_from_username() {
        assert_eq!(Identity::from_username(None), Identity::Guest);
        assert_eq!(Identity::from_username(Some(String::new())), Identity::Guest);
        assert_eq!(
            Identity::from_username(Some("bob".to_string())),
            Identity::User("bob".to_string())
        );
    }
}
