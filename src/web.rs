//! Browser bindings
//!
//! - `requestAnimationFrame` scheduler for the clock
//! - Bridge to a JS account service object
//! - `LabHandle`: the lab exported to the page (JSON in, JSON out)

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Deserialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::lab::Lab;
use crate::persistence::{AccountService, PersistenceError, SignedOut, Snapshot, User};
use crate::platform::{BrowserStorage, KeyValueStore};
use crate::settings::LabSettings;
use crate::sim::{ConfigPatch, FrameScheduler, FrameToken, OscillatorKind, Quantity};

/// Install the panic hook and console logger
pub fn init() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialized".into());
    }
}

fn js_message(err: JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::Reflect::get(&err, &"message".into())
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", err))
}

// ── Frame scheduling ────────────────────────────────────────────────────

/// Schedules clock frames with `requestAnimationFrame`
struct BrowserFrames {
    lab: Weak<RefCell<Lab>>,
    pending: Option<(FrameToken, i32)>,
}

impl FrameScheduler for BrowserFrames {
    fn schedule(&mut self, token: FrameToken) {
        let Some(window) = web_sys::window() else {
            log::warn!("No window; clock frame not scheduled");
            return;
        };
        let lab = self.lab.clone();
        let closure = Closure::once(move |time: f64| {
            let Some(lab) = lab.upgrade() else { return };
            match lab.try_borrow_mut() {
                Ok(mut lab) => {
                    lab.on_frame(token, time);
                }
                Err(_) => log::warn!("Frame {:?} dropped: lab busy", token),
            };
        });
        match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
            Ok(id) => self.pending = Some((token, id)),
            Err(e) => log::warn!("requestAnimationFrame failed: {}", js_message(e)),
        }
        closure.forget();
    }

    fn cancel(&mut self, token: FrameToken) {
        match self.pending.take() {
            Some((pending, id)) if pending == token => {
                if let Some(window) = web_sys::window() {
                    let _ = window.cancel_animation_frame(id);
                }
            }
            other => self.pending = other,
        }
    }
}

// ── Account bridge ──────────────────────────────────────────────────────

/// Reply shape of `createSnapshot`
#[derive(Deserialize)]
struct CreateReply {
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Account service implemented by a JS object exposing `currentUser()`,
/// `loadUserSnapshots(userId)`, `saveUserSnapshots(userId, snapshots)` and
/// `createSnapshot(data)`
struct JsAccount {
    target: JsValue,
}

impl JsAccount {
    fn call(&self, method: &str, args: &[JsValue]) -> Result<JsValue, PersistenceError> {
        let func = js_sys::Reflect::get(&self.target, &method.into())
            .map_err(|e| PersistenceError::Remote(js_message(e)))?
            .dyn_into::<js_sys::Function>()
            .map_err(|_| PersistenceError::Remote(format!("{method} is not a function")))?;
        let args: js_sys::Array = args.iter().collect();
        func.apply(&self.target, &args)
            .map_err(|e| PersistenceError::Remote(js_message(e)))
    }

    fn decode<T: for<'de> Deserialize<'de>>(value: &JsValue) -> Result<T, PersistenceError> {
        let json = js_sys::JSON::stringify(value)
            .map_err(|e| PersistenceError::Remote(js_message(e)))?
            .as_string()
            .unwrap_or_default();
        Ok(serde_json::from_str(&json)?)
    }

    fn encode(snapshot_json: &str) -> Result<JsValue, PersistenceError> {
        js_sys::JSON::parse(snapshot_json).map_err(|e| PersistenceError::Remote(js_message(e)))
    }
}

impl AccountService for JsAccount {
    fn current_user(&self) -> Option<User> {
        let value = match self.call("currentUser", &[]) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("currentUser failed: {}", e);
                return None;
            }
        };
        if value.is_null() || value.is_undefined() {
            return None;
        }
        match Self::decode(&value) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("currentUser reply unreadable, treating as signed out: {}", e);
                None
            }
        }
    }

    fn load_user_snapshots(&self, user_id: &str) -> Result<Vec<Snapshot>, PersistenceError> {
        let value = self.call("loadUserSnapshots", &[user_id.into()])?;
        if value.is_null() || value.is_undefined() {
            return Ok(Vec::new());
        }
        let json = js_sys::JSON::stringify(&value)
            .map_err(|e| PersistenceError::Remote(js_message(e)))?
            .as_string()
            .unwrap_or_default();
        Ok(crate::persistence::parse_snapshot_list(&json))
    }

    fn save_user_snapshots(&mut self, user_id: &str, snapshots: &[Snapshot]) -> Result<(), PersistenceError> {
        let payload = Self::encode(&serde_json::to_string(snapshots)?)?;
        self.call("saveUserSnapshots", &[user_id.into(), payload])?;
        Ok(())
    }

    fn create_snapshot(&mut self, snapshot: &Snapshot) -> Result<String, PersistenceError> {
        let payload = Self::encode(&serde_json::to_string(snapshot)?)?;
        let reply: CreateReply = Self::decode(&self.call("createSnapshot", &[payload])?)?;
        if !reply.success {
            return Err(PersistenceError::Remote(
                reply.error.unwrap_or_else(|| "createSnapshot failed".to_string()),
            ));
        }
        Ok(reply.id.unwrap_or_else(|| snapshot.id.clone()))
    }
}

// ── Exported handle ─────────────────────────────────────────────────────

#[wasm_bindgen]
pub struct LabHandle {
    inner: Rc<RefCell<Lab>>,
}

impl LabHandle {
    fn build(account: Box<dyn AccountService>) -> Self {
        let storage = BrowserStorage::new();
        let settings = LabSettings::load(&storage);
        let inner = Rc::new_cyclic(|weak: &Weak<RefCell<Lab>>| {
            let frames = BrowserFrames {
                lab: weak.clone(),
                pending: None,
            };
            let storage: Box<dyn KeyValueStore> = Box::new(storage);
            RefCell::new(Lab::with_storage(settings, Box::new(frames), storage, account))
        });
        log::info!("SHM lab ready");
        Self { inner }
    }

    fn to_json<T: serde::Serialize>(value: &T) -> String {
        serde_json::to_string(value).unwrap_or_else(|e| {
            log::warn!("Serialization failed: {}", e);
            "null".to_string()
        })
    }
}

#[wasm_bindgen]
impl LabHandle {
    /// Lab without sign-in
    #[wasm_bindgen(constructor)]
    pub fn new() -> LabHandle {
        Self::build(Box::new(SignedOut))
    }

    /// Lab using a JS account service object
    #[wasm_bindgen(js_name = withAccount)]
    pub fn with_account(account: JsValue) -> LabHandle {
        Self::build(Box::new(JsAccount { target: account }))
    }

    #[wasm_bindgen(js_name = setParameter)]
    pub fn set_parameter(&self, name: &str, value: &str) {
        self.inner.borrow_mut().set_parameter(name, value);
    }

    #[wasm_bindgen(js_name = setOscillator)]
    pub fn set_oscillator(&self, kind: &str) -> bool {
        match OscillatorKind::from_str(kind) {
            Some(kind) => {
                self.inner.borrow_mut().set_oscillator(kind);
                true
            }
            None => false,
        }
    }

    /// Apply a partial configuration given as JSON
    #[wasm_bindgen(js_name = applyPreset)]
    pub fn apply_preset(&self, json: &str) -> bool {
        match serde_json::from_str::<ConfigPatch>(json) {
            Ok(patch) => {
                self.inner.borrow_mut().apply_preset(&patch);
                true
            }
            Err(e) => {
                log::warn!("Preset ignored: {}", e);
                false
            }
        }
    }

    pub fn start(&self) {
        self.inner.borrow_mut().start();
    }

    pub fn stop(&self) {
        self.inner.borrow_mut().stop();
    }

    pub fn toggle(&self) {
        self.inner.borrow_mut().toggle();
    }

    pub fn reset(&self) {
        self.inner.borrow_mut().reset();
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.inner.borrow().is_running()
    }

    #[wasm_bindgen(js_name = virtualTime)]
    pub fn virtual_time(&self) -> f64 {
        self.inner.borrow().virtual_time()
    }

    pub fn period(&self) -> f64 {
        self.inner.borrow().period()
    }

    pub fn frequency(&self) -> f64 {
        self.inner.borrow().frequency()
    }

    /// `[x, y]` of the mass or bob relative to its anchor (metres, y up)
    #[wasm_bindgen(js_name = bodyPosition)]
    pub fn body_position(&self) -> Vec<f64> {
        self.inner.borrow().body_position().to_array().to_vec()
    }

    #[wasm_bindgen(js_name = config)]
    pub fn config_json(&self) -> String {
        Self::to_json(self.inner.borrow().simulation().config())
    }

    #[wasm_bindgen(js_name = currentValues)]
    pub fn current_values_json(&self) -> String {
        Self::to_json(&self.inner.borrow().current_values())
    }

    #[wasm_bindgen(js_name = sampleSeries)]
    pub fn sample_series_json(&self) -> String {
        Self::to_json(&self.inner.borrow().sample_series())
    }

    /// `[[time, value], ...]` for one quantity (`position`, `velocity`,
    /// `acceleration`, `kinetic`, `potential`, `total`)
    #[wasm_bindgen(js_name = seriesPoints)]
    pub fn series_points_json(&self, quantity: &str) -> String {
        match Quantity::from_str(quantity) {
            Some(q) => Self::to_json(&self.inner.borrow().series_points(q)),
            None => "[]".to_string(),
        }
    }

    /// `[min, max]` of one quantity, or `null` before the first sample
    #[wasm_bindgen(js_name = seriesBounds)]
    pub fn series_bounds_json(&self, quantity: &str) -> String {
        let bounds = Quantity::from_str(quantity).and_then(|q| self.inner.borrow().series_bounds(q));
        Self::to_json(&bounds)
    }

    #[wasm_bindgen(js_name = getSnapshots)]
    pub fn snapshots_json(&self) -> String {
        Self::to_json(&self.inner.borrow().snapshots())
    }

    pub fn save(&self, title: &str, description: &str) -> Result<String, JsValue> {
        self.inner
            .borrow_mut()
            .save(title, description)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn load(&self, id: &str) -> bool {
        self.inner.borrow_mut().load(id)
    }

    pub fn delete(&self, id: &str) -> bool {
        matches!(self.inner.borrow_mut().delete(id), Ok(true))
    }

    #[wasm_bindgen(js_name = exportSnapshot)]
    pub fn export_snapshot(&self, id: &str) -> Option<String> {
        self.inner.borrow().export_snapshot(id)
    }

    #[wasm_bindgen(js_name = importSnapshot)]
    pub fn import_snapshot(&self, json: &str) -> Result<String, JsValue> {
        self.inner
            .borrow_mut()
            .import_snapshot(json)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = queueLoad)]
    pub fn queue_load(&self, id: &str) -> bool {
        self.inner.borrow_mut().queue_load(id)
    }

    /// Title of the load awaiting confirmation, if any
    #[wasm_bindgen(js_name = pendingLoad)]
    pub fn pending_load(&self) -> Option<String> {
        self.inner.borrow().pending_load().map(|p| p.title.clone())
    }

    #[wasm_bindgen(js_name = confirmPendingLoad)]
    pub fn confirm_pending_load(&self) -> bool {
        self.inner.borrow_mut().confirm_pending_load()
    }

    #[wasm_bindgen(js_name = dismissPendingLoad)]
    pub fn dismiss_pending_load(&self) {
        self.inner.borrow_mut().dismiss_pending_load();
    }

    /// Status message to show once, as `{success, message}` JSON
    #[wasm_bindgen(js_name = takeStatus)]
    pub fn take_status(&self) -> Option<String> {
        self.inner.borrow_mut().take_status().map(|s| {
            serde_json::json!({ "success": s.success, "message": s.message }).to_string()
        })
    }
}

impl Default for LabHandle {
    fn default() -> Self {
        Self::new()
    }
}
