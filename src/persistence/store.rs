//! Snapshot store
//!
//! Merges the device tier and the account tier into one view:
//! - signed in: every account snapshot, plus device snapshots owned by
//!   `anonymous` or by the signed-in user
//! - signed out: device snapshots owned by `anonymous`
//!
//! Ids are de-duplicated with the account entry preferred. The view is
//! ordered newest first by `createdAt`.
//!
//! Persistence failures come back as `StoreError`; the session is never
//! touched by a failed write.

use std::collections::HashSet;

use thiserror::Error;

use super::export::{ImportError, SnapshotExport};
use super::remote::{AccountService, RemoteTier, User};
use super::{Owner, PersistenceAdapter, PersistenceError, Snapshot, SnapshotIds};
use crate::platform::TimeSource;
use crate::sim::{ClockState, SessionCapture, Simulation};

/// Title used when the user leaves it blank
pub const UNTITLED: &str = "Untitled snapshot";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not save snapshot: {0}")]
    Save(#[source] PersistenceError),

    #[error("could not delete snapshot: {0}")]
    Delete(#[source] PersistenceError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Merge rule shared by `list` and the tests
pub fn merge_views(remote: Vec<Snapshot>, local: Vec<Snapshot>, user: Option<&User>) -> Vec<Snapshot> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(remote.len() + local.len());

    if user.is_some() {
        for snapshot in remote {
            if seen.insert(snapshot.id.clone()) {
                merged.push(snapshot);
            }
        }
    }

    for snapshot in local {
        if !visible_locally(&snapshot.owner, user) {
            continue;
        }
        if seen.insert(snapshot.id.clone()) {
            merged.push(snapshot);
        } else {
            log::debug!("Snapshot id {} present in both tiers; account copy kept", snapshot.id);
        }
    }

    merged.sort_by(|a, b| {
        b.created_at
            .total_cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}

fn visible_locally(owner: &Owner, user: Option<&User>) -> bool {
    match (owner, user) {
        (Owner::Anonymous, _) => true,
        (Owner::User(id), Some(user)) => *id == user.id,
        (Owner::User(_), None) => false,
    }
}

pub struct SnapshotStore {
    local: Box<dyn PersistenceAdapter>,
    remote: RemoteTier,
    ids: SnapshotIds,
    time: Box<dyn TimeSource>,
}

impl SnapshotStore {
    pub fn new(
        local: Box<dyn PersistenceAdapter>,
        account: Box<dyn AccountService>,
        time: Box<dyn TimeSource>,
        ids: SnapshotIds,
    ) -> Self {
        Self {
            local,
            remote: RemoteTier::new(account),
            ids,
            time,
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.remote.current_user()
    }

    /// Merged view, newest first. A tier that cannot be read contributes
    /// nothing.
    pub fn list(&self) -> Vec<Snapshot> {
        let user = self.current_user();
        let remote = if user.is_some() {
            self.remote.load_all().unwrap_or_else(|e| {
                log::warn!("Account snapshots unavailable: {}", e);
                Vec::new()
            })
        } else {
            Vec::new()
        };
        let local = self.local.load_all().unwrap_or_else(|e| {
            log::warn!("Device snapshots unavailable: {}", e);
            Vec::new()
        });
        merge_views(remote, local, user.as_ref())
    }

    pub fn find(&self, id: &str) -> Option<Snapshot> {
        self.list().into_iter().find(|s| s.id == id)
    }

    /// Capture the session into a new snapshot owned by the current user
    /// (or `anonymous`) and write it to that owner's tier.
    pub fn save(&mut self, title: &str, description: &str, sim: &Simulation) -> Result<String, StoreError> {
        self.save_capture(title, description, sim.capture())
    }

    fn save_capture(
        &mut self,
        title: &str,
        description: &str,
        capture: SessionCapture,
    ) -> Result<String, StoreError> {
        let user = self.current_user();
        let created_at = self.time.now_ms();
        let title = match title.trim() {
            "" => UNTITLED,
            t => t,
        };
        let snapshot = Snapshot::from_capture(
            self.ids.next_id(created_at),
            title.to_string(),
            description.trim().to_string(),
            capture,
            created_at,
            Owner::for_user(user.as_ref()),
        );

        let result = match user {
            Some(_) => self.remote.create(snapshot),
            None => self.local.create(snapshot),
        };
        match result {
            Ok(id) => {
                log::info!("Saved snapshot {} ({})", id, title);
                Ok(id)
            }
            Err(e) => {
                log::warn!("Snapshot save failed: {}", e);
                Err(StoreError::Save(e))
            }
        }
    }

    /// Restore a snapshot into the session. False if the id is not in the
    /// merged view.
    pub fn load(&self, id: &str, sim: &mut Simulation) -> bool {
        let Some(snapshot) = self.find(id) else {
            log::info!("Snapshot {} not found", id);
            return false;
        };
        let outcome = sim.restore(&snapshot.to_capture());
        if !outcome.rejected.is_empty() || !outcome.ignored.is_empty() {
            log::debug!(
                "Snapshot {}: {} fields rejected, {} ignored",
                id,
                outcome.rejected.len(),
                outcome.ignored.len()
            );
        }
        log::info!("Loaded snapshot {} ({})", id, snapshot.title);
        true
    }

    /// Remove `id` from every visible tier that holds it. Returns whether
    /// anything was removed; unknown ids are a no-op. A tier that cannot be
    /// read is skipped, and only fails the call when no other tier removed
    /// the id.
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let user = self.current_user();
        let mut removed = false;
        let mut unreadable = None;

        if user.is_some() {
            match self.remote.load_all() {
                Ok(remote) if remote.iter().any(|s| s.id == id) => {
                    let kept: Vec<Snapshot> = remote.into_iter().filter(|s| s.id != id).collect();
                    self.remote.save_all(&kept).map_err(StoreError::Delete)?;
                    removed = true;
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("Account snapshots unavailable for delete: {}", e);
                    unreadable = Some(e);
                }
            }
        }

        let visible_match = |s: &Snapshot| s.id == id && visible_locally(&s.owner, user.as_ref());
        match self.local.load_all() {
            Ok(local) if local.iter().any(visible_match) => {
                let kept: Vec<Snapshot> = local.into_iter().filter(|s| !visible_match(s)).collect();
                self.local.save_all(&kept).map_err(StoreError::Delete)?;
                removed = true;
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("Device snapshots unavailable for delete: {}", e);
                if unreadable.is_none() {
                    unreadable = Some(e);
                }
            }
        }

        match (removed, unreadable) {
            (true, _) => log::info!("Deleted snapshot {}", id),
            (false, Some(e)) => return Err(StoreError::Delete(e)),
            (false, None) => log::info!("Delete: snapshot {} not found", id),
        }
        Ok(removed)
    }

    /// Export file JSON for a visible snapshot
    pub fn export(&self, id: &str) -> Option<String> {
        let snapshot = self.find(id)?;
        let export = SnapshotExport::from_snapshot(&snapshot, self.time.now_ms());
        match export.to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                log::warn!("Export of {} failed: {}", id, e);
                None
            }
        }
    }

    /// Save an export file as a new, stopped snapshot for the current owner
    pub fn import(&mut self, json: &str) -> Result<String, StoreError> {
        let export = SnapshotExport::parse(json)?;
        let capture = SessionCapture {
            kind: export.kind,
            parameters: export.parameters,
            clock: ClockState::default(),
            recent_samples: Vec::new(),
        };
        self.save_capture(&export.title, &export.description, capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryAccounts, LocalTier};
    use crate::platform::{ManualTime, MemoryStorage};
    use crate::settings::LabSettings;
    use crate::sim::{ConfigPatch, ManualFrames, OscillatorKind, ParamName};
    use proptest::prelude::*;

    struct Fixture {
        store: SnapshotStore,
        sim: Simulation,
        storage: MemoryStorage,
        accounts: InMemoryAccounts,
    }

    fn fixture() -> Fixture {
        let storage = MemoryStorage::new();
        let accounts = InMemoryAccounts::new();
        let store = SnapshotStore::new(
            Box::new(LocalTier::new(Box::new(storage.clone()))),
            Box::new(accounts.clone()),
            Box::new(ManualTime::new(1_000.0, 10.0)),
            SnapshotIds::seeded(1),
        );
        let sim = Simulation::new(&LabSettings::default(), Box::new(ManualFrames::new()));
        Fixture {
            store,
            sim,
            storage,
            accounts,
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: id.to_string(),
            email: String::new(),
        }
    }

    fn snap(id: &str, owner: Owner, created_at: f64) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            kind: OscillatorKind::Spring,
            parameters: ConfigPatch::default(),
            time: 0.0,
            running: false,
            created_at,
            owner,
            recent_samples: Vec::new(),
        }
    }

    #[test]
    fn test_anonymous_save_goes_to_device() {
        let mut f = fixture();
        let id = f.store.save("  ", "", &f.sim).unwrap();
        let list = f.store.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert_eq!(list[0].title, UNTITLED);
        assert_eq!(list[0].owner, Owner::Anonymous);
        assert!(f.storage.raw(LocalTier::STORAGE_KEY).is_some());
    }

    #[test]
    fn test_signed_in_save_goes_to_account() {
        let mut f = fixture();
        f.accounts.sign_in(user("u1"));
        let id = f.store.save("Mine", "", &f.sim).unwrap();
        assert_eq!(f.accounts.stored("u1")[0].id, id);
        assert_eq!(f.accounts.stored("u1")[0].owner, Owner::User("u1".to_string()));
        assert!(f.storage.raw(LocalTier::STORAGE_KEY).is_none());
    }

    #[test]
    fn test_save_failure_leaves_session_untouched() {
        let mut f = fixture();
        f.sim.set_parameter("mass", "4").unwrap();
        f.storage.set_fail_writes(true);
        let before = f.sim.config().clone();
        assert!(matches!(f.store.save("x", "", &f.sim), Err(StoreError::Save(_))));
        assert_eq!(f.sim.config(), &before);
        // Retry succeeds once storage recovers
        f.storage.set_fail_writes(false);
        assert!(f.store.save("x", "", &f.sim).is_ok());
    }

    #[test]
    fn test_remote_failure_is_non_fatal() {
        let mut f = fixture();
        f.accounts.sign_in(user("u1"));
        f.accounts.set_offline(true);
        assert!(matches!(
            f.store.save("x", "", &f.sim),
            Err(StoreError::Save(PersistenceError::Remote(_)))
        ));
        assert!(f.store.list().is_empty());
    }

    #[test]
    fn test_load_unknown_id_returns_false() {
        let mut f = fixture();
        let before = f.sim.config().clone();
        assert!(!f.store.load("missing", &mut f.sim));
        assert_eq!(f.sim.config(), &before);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut f = fixture();
        f.sim.set_oscillator(OscillatorKind::Pendulum);
        f.sim.set_parameter("length", "2").unwrap();
        f.sim.set_parameter("angle", "8").unwrap();
        let saved = f.sim.params().active_patch();
        let id = f.store.save("Pendulum", "", &f.sim).unwrap();

        f.sim.set_oscillator(OscillatorKind::Spring);
        f.sim.set_parameter("mass", "9").unwrap();
        assert!(f.store.load(&id, &mut f.sim));
        assert_eq!(f.sim.params().active_patch(), saved);
    }

    #[test]
    fn test_user_snapshots_hidden_after_sign_out() {
        let mut f = fixture();
        let mut local = LocalTier::new(Box::new(f.storage.clone()));
        local
            .save_all(&[
                snap("anon", Owner::Anonymous, 1.0),
                snap("u1-local", Owner::User("u1".to_string()), 2.0),
                snap("u2-local", Owner::User("u2".to_string()), 3.0),
            ])
            .unwrap();

        let ids = |store: &SnapshotStore| -> Vec<String> { store.list().into_iter().map(|s| s.id).collect() };
        assert_eq!(ids(&f.store), vec!["anon"]);
        f.accounts.sign_in(user("u1"));
        assert_eq!(ids(&f.store), vec!["u1-local", "anon"]);
        f.accounts.sign_out();
        assert!(!f.store.load("u1-local", &mut f.sim));
    }

    #[test]
    fn test_collision_prefers_account_copy() {
        let f = fixture();
        f.accounts.sign_in(user("u1"));
        let mut remote_copy = snap("same", Owner::User("u1".to_string()), 5.0);
        remote_copy.title = "account".to_string();
        let mut local_copy = snap("same", Owner::Anonymous, 6.0);
        local_copy.title = "device".to_string();

        let merged = merge_views(vec![remote_copy], vec![local_copy], Some(&user("u1")));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "account");
    }

    #[test]
    fn test_list_newest_first() {
        let merged = merge_views(
            Vec::new(),
            vec![
                snap("old", Owner::Anonymous, 1.0),
                snap("new", Owner::Anonymous, 3.0),
                snap("mid", Owner::Anonymous, 2.0),
            ],
            None,
        );
        let ids: Vec<&str> = merged.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_delete_removes_only_that_id() {
        let mut f = fixture();
        let a = f.store.save("A", "", &f.sim).unwrap();
        let b = f.store.save("B", "", &f.sim).unwrap();
        let before = f.store.list();
        f.store.delete(&a).unwrap();
        let after = f.store.list();
        assert_eq!(after.len(), before.len() - 1);
        assert!(after.iter().all(|s| s.id != a));
        assert_eq!(after, before.into_iter().filter(|s| s.id == b).collect::<Vec<_>>());
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut f = fixture();
        f.store.save("A", "", &f.sim).unwrap();
        let before = f.store.list();
        assert!(!f.store.delete("nope").unwrap());
        assert_eq!(f.store.list(), before);
    }

    #[test]
    fn test_delete_collision_clears_both_tiers() {
        let mut f = fixture();
        f.accounts.sign_in(user("u1"));
        let mut local = LocalTier::new(Box::new(f.storage.clone()));
        local.save_all(&[snap("same", Owner::Anonymous, 1.0)]).unwrap();
        let mut accounts = f.accounts.clone();
        accounts
            .save_user_snapshots("u1", &[snap("same", Owner::User("u1".to_string()), 2.0)])
            .unwrap();

        assert_eq!(f.store.list().len(), 1);
        assert!(f.store.delete("same").unwrap());
        assert!(f.store.list().is_empty());
    }

    #[test]
    fn test_delete_device_snapshot_while_account_offline() {
        let mut f = fixture();
        let id = f.store.save("Offline", "", &f.sim).unwrap();
        f.accounts.sign_in(user("u1"));
        f.accounts.set_offline(true);
        assert_eq!(f.store.list().len(), 1);

        assert!(f.store.delete(&id).unwrap());
        assert!(f.store.list().is_empty());
    }

    #[test]
    fn test_delete_fails_when_no_tier_readable() {
        let mut f = fixture();
        f.accounts.sign_in(user("u1"));
        f.accounts.set_offline(true);
        f.storage.set_fail_reads(true);
        assert!(matches!(f.store.delete("any"), Err(StoreError::Delete(_))));
    }

    #[test]
    fn test_list_survives_unreadable_device_tier() {
        let mut f = fixture();
        f.store.save("Device", "", &f.sim).unwrap();
        f.accounts.sign_in(user("u1"));
        let mine = f.store.save("Account", "", &f.sim).unwrap();

        f.storage.set_fail_reads(true);
        let ids: Vec<String> = f.store.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![mine]);
    }

    #[test]
    fn test_delete_does_not_touch_hidden_entries() {
        let mut f = fixture();
        let mut local = LocalTier::new(Box::new(f.storage.clone()));
        local
            .save_all(&[snap("theirs", Owner::User("u2".to_string()), 1.0)])
            .unwrap();
        f.store.delete("theirs").unwrap();
        assert_eq!(local.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_export_then_import() {
        let mut f = fixture();
        f.sim.set_parameter("mass", "3").unwrap();
        let id = f.store.save("Demo", "desc", &f.sim).unwrap();
        let json = f.store.export(&id).unwrap();

        let imported = f.store.import(&json).unwrap();
        assert_ne!(imported, id);
        let copy = f.store.find(&imported).unwrap();
        assert_eq!(copy.title, "Demo");
        assert_eq!(copy.parameters.get(ParamName::Mass), Some(3.0));
        assert!(!copy.running);
        assert!(f.store.export("missing").is_none());
    }

    proptest! {
        #[test]
        fn prop_merge_has_no_duplicate_ids(
            remote_ids in proptest::collection::vec(0u8..12, 0..12),
            local in proptest::collection::vec((0u8..12, 0u8..3), 0..12),
        ) {
            let me = user("me");
            let remote: Vec<Snapshot> = remote_ids
                .iter()
                .map(|i| snap(&format!("s{i}"), Owner::User("me".to_string()), f64::from(*i)))
                .collect();
            let local: Vec<Snapshot> = local
                .iter()
                .map(|(i, o)| {
                    let owner = match o {
                        0 => Owner::Anonymous,
                        1 => Owner::User("me".to_string()),
                        _ => Owner::User("other".to_string()),
                    };
                    snap(&format!("s{i}"), owner, f64::from(*i))
                })
                .collect();

            let merged = merge_views(remote, local, Some(&me));
            let mut seen = HashSet::new();
            for s in &merged {
                prop_assert!(seen.insert(s.id.clone()), "duplicate id {}", s.id);
                prop_assert!(s.owner != Owner::User("other".to_string()));
            }
        }
    }
}
