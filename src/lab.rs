//! Presentation-facing facade
//!
//! The UI talks to `Lab` only: parameter edits, clock control, current
//! values and series, snapshot save/load/delete/list. Failures become a
//! transient [`Status`] message; nothing here panics or corrupts the
//! session.

use glam::DVec2;

use crate::persistence::{
    AccountService, InMemoryAccounts, LocalTier, PersistenceAdapter, Snapshot, SnapshotIds, SnapshotStore,
    StoreError, User,
};
use crate::platform::{KeyValueStore, MemoryStorage, WallClock};
use crate::settings::LabSettings;
use crate::sim::{
    ConfigPatch, FrameOutcome, FrameScheduler, FrameToken, Kinematics, OscillatorKind, Preset, PresetOutcome,
    Quantity, Sample, Simulation,
};

/// Outcome shown to the user after a snapshot operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub success: bool,
    pub message: String,
}

impl Status {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// A load waiting for the user to confirm (e.g. arrived via navigation
/// while they were editing)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLoad {
    pub id: String,
    pub title: String,
}

pub struct Lab {
    sim: Simulation,
    snapshots: SnapshotStore,
    pending: Option<PendingLoad>,
    status: Option<Status>,
}

impl Lab {
    pub fn new(settings: LabSettings, scheduler: Box<dyn FrameScheduler>, snapshots: SnapshotStore) -> Self {
        Self {
            sim: Simulation::new(&settings.normalized(), scheduler),
            snapshots,
            pending: None,
            status: None,
        }
    }

    /// Lab backed by the given device store and account service, wall clock
    /// timestamps and random snapshot ids
    pub fn with_storage(
        settings: LabSettings,
        scheduler: Box<dyn FrameScheduler>,
        storage: Box<dyn KeyValueStore>,
        account: Box<dyn AccountService>,
    ) -> Self {
        let local: Box<dyn PersistenceAdapter> = Box::new(LocalTier::new(storage));
        let snapshots = SnapshotStore::new(local, account, Box::new(WallClock), SnapshotIds::from_entropy());
        Self::new(settings, scheduler, snapshots)
    }

    /// Fully in-memory lab (headless runs)
    pub fn in_memory(scheduler: Box<dyn FrameScheduler>) -> Self {
        Self::with_storage(
            LabSettings::default(),
            scheduler,
            Box::new(MemoryStorage::new()),
            Box::new(InMemoryAccounts::new()),
        )
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn current_user(&self) -> Option<User> {
        self.snapshots.current_user()
    }

    // === Parameters ===

    /// Apply a UI edit. Invalid input is ignored and the previous value kept.
    pub fn set_parameter(&mut self, name: &str, raw: &str) {
        if let Err(e) = self.sim.set_parameter(name, raw) {
            log::debug!("Edit ignored: {}", e);
        }
    }

    pub fn set_oscillator(&mut self, kind: OscillatorKind) {
        self.sim.set_oscillator(kind);
    }

    pub fn apply_preset(&mut self, patch: &ConfigPatch) -> PresetOutcome {
        self.sim.apply_preset(patch)
    }

    pub fn apply_named_preset(&mut self, preset: Preset) -> PresetOutcome {
        log::info!("Preset: {}", preset.name());
        self.sim.apply_preset(&preset.patch())
    }

    // === Clock ===

    pub fn start(&mut self) {
        self.sim.start();
    }

    pub fn stop(&mut self) {
        self.sim.stop();
    }

    pub fn toggle(&mut self) {
        self.sim.toggle();
    }

    pub fn reset(&mut self) {
        self.sim.reset();
    }

    pub fn is_running(&self) -> bool {
        self.sim.is_running()
    }

    pub fn virtual_time(&self) -> f64 {
        self.sim.clock_state().virtual_time
    }

    /// Host frame callback
    pub fn on_frame(&mut self, token: FrameToken, timestamp_ms: f64) -> FrameOutcome {
        self.sim.on_frame(token, timestamp_ms)
    }

    // === Readouts ===

    pub fn current_values(&self) -> Kinematics {
        self.sim.current_values()
    }

    pub fn sample_series(&self) -> Vec<Sample> {
        self.sim.sample_series()
    }

    /// `(time, value)` pairs of one graphed quantity
    pub fn series_points(&self, quantity: Quantity) -> Vec<(f64, f64)> {
        self.sim.recorder().points(quantity)
    }

    /// Axis range of one graphed quantity; `None` before the first sample
    pub fn series_bounds(&self, quantity: Quantity) -> Option<(f64, f64)> {
        self.sim.recorder().bounds(quantity)
    }

    /// Where to draw the mass or bob, relative to its anchor
    pub fn body_position(&self) -> DVec2 {
        self.sim.body_position()
    }

    pub fn period(&self) -> f64 {
        self.sim.period()
    }

    pub fn frequency(&self) -> f64 {
        self.sim.frequency()
    }

    // === Snapshots ===

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.list()
    }

    pub fn save(&mut self, title: &str, description: &str) -> Result<String, StoreError> {
        let result = self.snapshots.save(title, description, &self.sim);
        self.status = Some(match &result {
            Ok(_) => Status::ok("Snapshot saved"),
            Err(e) => Status::failed(e.to_string()),
        });
        result
    }

    pub fn load(&mut self, id: &str) -> bool {
        let loaded = self.snapshots.load(id, &mut self.sim);
        self.status = Some(if loaded {
            Status::ok("Snapshot loaded")
        } else {
            Status::failed("Snapshot not found")
        });
        loaded
    }

    /// Delete a snapshot. `Ok(false)` when no visible snapshot had that id.
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = self.snapshots.delete(id);
        self.status = Some(match &result {
            Ok(true) => Status::ok("Snapshot deleted"),
            Ok(false) => Status::failed("Snapshot not found"),
            Err(e) => Status::failed(e.to_string()),
        });
        if result.is_ok() && self.pending.as_ref().is_some_and(|p| p.id == id) {
            self.pending = None;
        }
        result
    }

    pub fn export_snapshot(&self, id: &str) -> Option<String> {
        self.snapshots.export(id)
    }

    pub fn import_snapshot(&mut self, json: &str) -> Result<String, StoreError> {
        let result = self.snapshots.import(json);
        self.status = Some(match &result {
            Ok(_) => Status::ok("Snapshot imported"),
            Err(e) => Status::failed(e.to_string()),
        });
        result
    }

    // === Pending load prompt ===

    /// Record a load request without touching the session. Returns false if
    /// the id is not visible.
    pub fn queue_load(&mut self, id: &str) -> bool {
        match self.snapshots.find(id) {
            Some(snapshot) => {
                self.pending = Some(PendingLoad {
                    id: snapshot.id,
                    title: snapshot.title,
                });
                true
            }
            None => {
                log::info!("Queued load of unknown snapshot {} dropped", id);
                false
            }
        }
    }

    pub fn pending_load(&self) -> Option<&PendingLoad> {
        self.pending.as_ref()
    }

    pub fn confirm_pending_load(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => self.load(&pending.id),
            None => false,
        }
    }

    pub fn dismiss_pending_load(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::debug!("Pending load of {} dismissed", pending.id);
        }
    }

    // === Status ===

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    /// Take the status message (the UI shows it once)
    pub fn take_status(&mut self) -> Option<Status> {
        self.status.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualFrames, ParamName};

    fn lab() -> (Lab, ManualFrames) {
        let frames = ManualFrames::new();
        (Lab::in_memory(Box::new(frames.clone())), frames)
    }

    #[test]
    fn test_invalid_edit_ignored() {
        let (mut lab, _) = lab();
        lab.set_parameter("mass", "heavy");
        lab.set_parameter("gizmo", "1");
        assert_eq!(lab.simulation().params().get(ParamName::Mass), 1.0);
        assert!(lab.status().is_none());
    }

    #[test]
    fn test_pending_load_requires_confirmation() {
        let (mut lab, _) = lab();
        lab.set_parameter("mass", "3");
        let id = lab.save("Three", "").unwrap();
        lab.set_parameter("mass", "7");

        assert!(lab.queue_load(&id));
        assert_eq!(lab.pending_load().map(|p| p.title.as_str()), Some("Three"));
        // Editing while the prompt is up keeps the edit
        lab.set_parameter("mass", "8");
        assert_eq!(lab.simulation().params().get(ParamName::Mass), 8.0);

        lab.dismiss_pending_load();
        assert!(!lab.confirm_pending_load());
        assert_eq!(lab.simulation().params().get(ParamName::Mass), 8.0);

        lab.queue_load(&id);
        assert!(lab.confirm_pending_load());
        assert_eq!(lab.simulation().params().get(ParamName::Mass), 3.0);
        assert!(lab.pending_load().is_none());
    }

    #[test]
    fn test_queue_unknown_id() {
        let (mut lab, _) = lab();
        assert!(!lab.queue_load("ghost"));
        assert!(lab.pending_load().is_none());
    }

    #[test]
    fn test_status_messages() {
        let (mut lab, _) = lab();
        assert!(!lab.load("ghost"));
        assert_eq!(lab.take_status().map(|s| s.success), Some(false));
        assert!(lab.status().is_none());
        lab.save("A", "").unwrap();
        assert_eq!(lab.status().map(|s| s.message.as_str()), Some("Snapshot saved"));
    }

    #[test]
    fn test_delete_clears_matching_pending_load() {
        let (mut lab, _) = lab();
        let id = lab.save("A", "").unwrap();
        lab.queue_load(&id);
        lab.delete(&id).unwrap();
        assert!(lab.pending_load().is_none());
        assert!(lab.snapshots().is_empty());
    }
}
