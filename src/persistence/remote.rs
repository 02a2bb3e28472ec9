//! Account tier
//!
//! Snapshots stored per signed-in user by an external Auth/Storage service.
//! The lab only consumes the small contract in [`AccountService`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::{PersistenceAdapter, PersistenceError, Snapshot};

/// Signed-in user as reported by the account service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Contract consumed from the Auth/Storage collaborator
pub trait AccountService {
    fn current_user(&self) -> Option<User>;
    fn load_user_snapshots(&self, user_id: &str) -> Result<Vec<Snapshot>, PersistenceError>;
    fn save_user_snapshots(&mut self, user_id: &str, snapshots: &[Snapshot]) -> Result<(), PersistenceError>;
    /// Store one new snapshot for its owner; returns the recorded id
    fn create_snapshot(&mut self, snapshot: &Snapshot) -> Result<String, PersistenceError>;
}

/// Account service for hosts without sign-in
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedOut;

impl AccountService for SignedOut {
    fn current_user(&self) -> Option<User> {
        None
    }

    fn load_user_snapshots(&self, _user_id: &str) -> Result<Vec<Snapshot>, PersistenceError> {
        Err(PersistenceError::NotAuthenticated)
    }

    fn save_user_snapshots(&mut self, _user_id: &str, _snapshots: &[Snapshot]) -> Result<(), PersistenceError> {
        Err(PersistenceError::NotAuthenticated)
    }

    fn create_snapshot(&mut self, _snapshot: &Snapshot) -> Result<String, PersistenceError> {
        Err(PersistenceError::NotAuthenticated)
    }
}

/// The account tier seen through `PersistenceAdapter`, scoped to whoever
/// is signed in at call time
pub struct RemoteTier {
    account: Box<dyn AccountService>,
}

impl RemoteTier {
    pub fn new(account: Box<dyn AccountService>) -> Self {
        Self { account }
    }

    pub fn current_user(&self) -> Option<User> {
        self.account.current_user()
    }
}

impl PersistenceAdapter for RemoteTier {
    /// Empty when nobody is signed in
    fn load_all(&self) -> Result<Vec<Snapshot>, PersistenceError> {
        match self.account.current_user() {
            Some(user) => self.account.load_user_snapshots(&user.id),
            None => Ok(Vec::new()),
        }
    }

    fn save_all(&mut self, snapshots: &[Snapshot]) -> Result<(), PersistenceError> {
        let user = self.account.current_user().ok_or(PersistenceError::NotAuthenticated)?;
        self.account.save_user_snapshots(&user.id, snapshots)
    }

    fn create(&mut self, snapshot: Snapshot) -> Result<String, PersistenceError> {
        if self.account.current_user().is_none() {
            return Err(PersistenceError::NotAuthenticated);
        }
        self.account.create_snapshot(&snapshot)
    }
}

/// In-process account service (tests, headless runs). Clones share state so
/// a caller can sign users in and out while the lab holds another handle.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccounts {
    inner: Rc<RefCell<AccountsInner>>,
}

#[derive(Debug, Default)]
struct AccountsInner {
    current: Option<User>,
    snapshots: HashMap<String, Vec<Snapshot>>,
    offline: bool,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: User) {
        log::info!("Signed in as {}", user.id);
        self.inner.borrow_mut().current = Some(user);
    }

    pub fn sign_out(&self) {
        self.inner.borrow_mut().current = None;
    }

    /// Simulate a network failure on every storage call
    pub fn set_offline(&self, offline: bool) {
        self.inner.borrow_mut().offline = offline;
    }

    /// Stored snapshots for a user, bypassing the offline flag
    pub fn stored(&self, user_id: &str) -> Vec<Snapshot> {
        self.inner
            .borrow()
            .snapshots
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    fn check_online(&self) -> Result<(), PersistenceError> {
        if self.inner.borrow().offline {
            Err(PersistenceError::Remote("network unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl AccountService for InMemoryAccounts {
    fn current_user(&self) -> Option<User> {
        self.inner.borrow().current.clone()
    }

    fn load_user_snapshots(&self, user_id: &str) -> Result<Vec<Snapshot>, PersistenceError> {
        self.check_online()?;
        Ok(self.stored(user_id))
    }

    fn save_user_snapshots(&mut self, user_id: &str, snapshots: &[Snapshot]) -> Result<(), PersistenceError> {
        self.check_online()?;
        self.inner
            .borrow_mut()
            .snapshots
            .insert(user_id.to_string(), snapshots.to_vec());
        Ok(())
    }

    fn create_snapshot(&mut self, snapshot: &Snapshot) -> Result<String, PersistenceError> {
        self.check_online()?;
        let owner = snapshot.owner.as_str().to_string();
        let mut inner = self.inner.borrow_mut();
        let list = inner.snapshots.entry(owner).or_default();
        list.retain(|s| s.id != snapshot.id);
        list.push(snapshot.clone());
        Ok(snapshot.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Owner;
    use crate::sim::{ConfigPatch, OscillatorKind};

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    fn snap(id: &str, owner: &str) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            kind: OscillatorKind::Spring,
            parameters: ConfigPatch::default(),
            time: 0.0,
            running: false,
            created_at: 0.0,
            owner: Owner::from(owner.to_string()),
            recent_samples: Vec::new(),
        }
    }

    #[test]
    fn test_signed_out_tier_is_empty_and_read_only() {
        let accounts = InMemoryAccounts::new();
        let mut tier = RemoteTier::new(Box::new(accounts));
        assert!(tier.load_all().unwrap().is_empty());
        assert!(matches!(
            tier.create(snap("a", "u1")),
            Err(PersistenceError::NotAuthenticated)
        ));
        assert!(matches!(tier.save_all(&[]), Err(PersistenceError::NotAuthenticated)));
    }

    #[test]
    fn test_tier_scoped_to_current_user() {
        let accounts = InMemoryAccounts::new();
        let mut tier = RemoteTier::new(Box::new(accounts.clone()));

        accounts.sign_in(user("u1"));
        tier.create(snap("a", "u1")).unwrap();
        accounts.sign_in(user("u2"));
        assert!(tier.load_all().unwrap().is_empty());
        tier.create(snap("b", "u2")).unwrap();

        accounts.sign_in(user("u1"));
        let ids: Vec<String> = tier.load_all().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_offline_reports_remote_error() {
        let accounts = InMemoryAccounts::new();
        accounts.sign_in(user("u1"));
        accounts.set_offline(true);
        let tier = RemoteTier::new(Box::new(accounts));
        assert!(matches!(tier.load_all(), Err(PersistenceError::Remote(_))));
    }

    #[test]
    fn test_user_json_tolerates_missing_fields() {
        let u: User = serde_json::from_str(r#"{"id": "u9"}"#).unwrap();
        assert_eq!(u.id, "u9");
        assert!(u.email.is_empty());
    }
}
