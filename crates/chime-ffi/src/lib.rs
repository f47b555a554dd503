//! C FFI surface for chime.
//!
//! Pattern: opaque ManagerHandle + C strings + JSON serialization.
//!
//! The host drives the manager by calling `chime_tick` from its own loop
//! and drains sound notifications with `chime_poll_events`. A handle is
//! single-threaded: call it from the thread that opened it.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::rc::Rc;
use std::sync::Arc;

use chime_core::{Manager, SoundCommand, SoundEvent, SoundInfo, SoundOptions, SystemClock};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Error handling (thread-local last error)
// ---------------------------------------------------------------------------

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_error(msg: String) {
    log::debug!("chime-ffi: {}", msg);
    LAST_ERROR.with(|cell| *cell.borrow_mut() = Some(msg));
}

fn clear_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = None);
}

/// Returns the last error message (caller frees with `chime_string_free`).
#[no_mangle]
pub extern "C" fn chime_last_error() -> *mut c_char {
    LAST_ERROR.with(|cell| {
        cell.borrow_mut()
            .take()
            .and_then(|s| CString::new(s).ok())
            .map(|s| s.into_raw())
            .unwrap_or(ptr::null_mut())
    })
}

/// Frees a string returned from chime FFI.
///
/// # Safety
/// Must be a pointer returned from this FFI and not already freed.
#[no_mangle]
pub unsafe extern "C" fn chime_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

// ---------------------------------------------------------------------------
// Opaque handle
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct ManagerHandle {
    _private: [u8; 0],
}

type EventFeed = Rc<RefCell<Vec<Value>>>;

struct ManagerHandleInner {
    manager: Manager,
    events: EventFeed,
}

impl ManagerHandleInner {
    /// Create a sound and route its notifications into the event feed.
    fn create(&mut self, opts: SoundOptions) -> chime_core::Result<SoundInfo> {
        let feed = Rc::clone(&self.events);
        let sound = self.manager.create_sound(opts)?;
        sound.on_event(move |info, event| feed.borrow_mut().push(event_json(info, event)));
        Ok(sound.info())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Opens a manager. `config_json` is a setup object or NULL for defaults.
/// Backend initialization starts immediately; watch `chime_status`.
///
/// # Safety
/// `config_json` must be NULL or a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn chime_open(config_json: *const c_char) -> *mut ManagerHandle {
    clear_error();
    let mut manager = chime_core::standard_manager(Arc::new(SystemClock::new()));

    if !config_json.is_null() {
        let config = match read_json(config_json) {
            Ok(v) => v,
            Err(e) => return err_null_handle(e),
        };
        if let Err(e) = manager.setup_json(&config) {
            return err_null_handle(e.to_string());
        }
    }
    if let Err(e) = manager.start() {
        return err_null_handle(e.to_string());
    }

    let inner = ManagerHandleInner {
        manager,
        events: Rc::new(RefCell::new(Vec::new())),
    };
    Box::into_raw(Box::new(inner)) as *mut ManagerHandle
}

/// Destructs the manager and releases the handle.
#[no_mangle]
pub extern "C" fn chime_close(handle: *mut ManagerHandle) {
    if !handle.is_null() {
        unsafe {
            let mut inner = Box::from_raw(handle as *mut ManagerHandleInner);
            inner.manager.destruct();
        }
    }
}

/// Applies a setup object. Before initialization it takes effect at
/// once; afterwards it is staged for the next reboot.
/// Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn chime_setup(handle: *mut ManagerHandle, json: *const c_char) -> i32 {
    clear_error();
    let inner = match handle_mut(handle) {
        Ok(h) => h,
        Err(e) => return err_zero(e),
    };
    let value = match read_json(json) {
        Ok(v) => v,
        Err(e) => return err_zero(e),
    };
    status_code(inner.manager.setup_json(&value))
}

/// Advances timers, polling and queued backend signals.
/// Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn chime_tick(handle: *mut ManagerHandle) -> i32 {
    clear_error();
    match handle_mut(handle) {
        Ok(inner) => {
            inner.manager.tick();
            1
        }
        Err(e) => err_zero(e),
    }
}

/// Readiness snapshot as JSON (caller frees).
#[no_mangle]
pub extern "C" fn chime_status(handle: *mut ManagerHandle) -> *mut c_char {
    clear_error();
    match handle_mut(handle) {
        Ok(inner) => json_to_cstr(&inner.manager.status()),
        Err(e) => err_null(e),
    }
}

/// Destroys every sound and initializes again. `reset_events` != 0 also
/// drops the ready/timeout subscriptions. Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn chime_reboot(handle: *mut ManagerHandle, reset_events: i32) -> i32 {
    clear_error();
    match handle_mut(handle) {
        Ok(inner) => {
            inner.events.borrow_mut().clear();
            status_code(inner.manager.reboot(reset_events != 0))
        }
        Err(e) => err_zero(e),
    }
}

/// Destructs the manager without releasing the handle. Later calls fail
/// until `chime_close`.
#[no_mangle]
pub extern "C" fn chime_destruct(handle: *mut ManagerHandle) -> i32 {
    clear_error();
    match handle_mut(handle) {
        Ok(inner) => {
            inner.manager.destruct();
            1
        }
        Err(e) => err_zero(e),
    }
}

// ---------------------------------------------------------------------------
// Sounds
// ---------------------------------------------------------------------------

/// Create a sound from a SoundOptions JSON object.
/// Returns the sound state JSON (caller frees), or NULL on error.
#[no_mangle]
pub extern "C" fn chime_create_sound(handle: *mut ManagerHandle, json: *const c_char) -> *mut c_char {
    clear_error();
    let inner = match handle_mut(handle) {
        Ok(h) => h,
        Err(e) => return err_null(e),
    };
    let value = match read_json(json) {
        Ok(v) => v,
        Err(e) => return err_null(e),
    };
    let opts: SoundOptions = match serde_json::from_value(value) {
        Ok(o) => o,
        Err(e) => return err_null(e.to_string()),
    };
    match inner.create(opts) {
        Ok(info) => json_to_cstr(&info),
        Err(e) => err_null(e.to_string()),
    }
}

/// Send a command. `json` is a SoundCommand JSON.
/// Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn chime_command(handle: *mut ManagerHandle, json: *const c_char) -> i32 {
    clear_error();
    let inner = match handle_mut(handle) {
        Ok(h) => h,
        Err(e) => return err_zero(e),
    };
    let json_str = match read_cstr(json) {
        Ok(s) => s,
        Err(e) => return err_zero(e),
    };
    let cmd: SoundCommand = match serde_json::from_str(&json_str) {
        Ok(c) => c,
        Err(e) => return err_zero(e.to_string()),
    };
    match cmd {
        SoundCommand::Create(opts) => status_code(inner.create(opts).map(|_| ())),
        other => status_code(inner.manager.command(other)),
    }
}

/// State of one sound as JSON (caller frees), or NULL if unknown.
#[no_mangle]
pub extern "C" fn chime_sound_state(handle: *mut ManagerHandle, id: *const c_char) -> *mut c_char {
    clear_error();
    let inner = match handle_mut(handle) {
        Ok(h) => h,
        Err(e) => return err_null(e),
    };
    let id = match read_cstr(id) {
        Ok(s) => s,
        Err(e) => return err_null(e),
    };
    match inner.manager.sound_info(&id) {
        Some(info) => json_to_cstr(&info),
        None => err_null(format!("sound not found: {}", id)),
    }
}

/// Live sound ids as a JSON array, in creation order (caller frees).
#[no_mangle]
pub extern "C" fn chime_sound_ids(handle: *mut ManagerHandle) -> *mut c_char {
    clear_error();
    match handle_mut(handle) {
        Ok(inner) => json_to_cstr(&inner.manager.sound_ids()),
        Err(e) => err_null(e),
    }
}

/// Report `{"id", "event": "position_reached"}` through the event feed
/// when the sound's position reaches `threshold_ms`. `once` != 0 fires a
/// single time; otherwise the watch re-arms after each seek or loop.
/// Returns 1 on success, 0 on error.
#[no_mangle]
pub extern "C" fn chime_watch_position(
    handle: *mut ManagerHandle,
    id: *const c_char,
    threshold_ms: u64,
    once: i32,
) -> i32 {
    clear_error();
    let inner = match handle_mut(handle) {
        Ok(h) => h,
        Err(e) => return err_zero(e),
    };
    let id = match read_cstr(id) {
        Ok(s) => s,
        Err(e) => return err_zero(e),
    };
    let feed = Rc::clone(&inner.events);
    let sound = match inner.manager.sound_mut(&id) {
        Some(s) => s,
        None => return err_zero(format!("sound not found: {}", id)),
    };
    let report = move |info: &SoundInfo| {
        feed.borrow_mut().push(json!({
            "id": info.id,
            "event": "position_reached",
            "threshold_ms": threshold_ms,
            "position_ms": info.position_ms,
        }));
    };
    if once != 0 {
        sound.on_position_once(threshold_ms, report);
    } else {
        sound.on_position(threshold_ms, report);
    }
    1
}

/// Drain sound notifications collected since the last call, as a JSON
/// array (caller frees).
#[no_mangle]
pub extern "C" fn chime_poll_events(handle: *mut ManagerHandle) -> *mut c_char {
    clear_error();
    match handle_mut(handle) {
        Ok(inner) => {
            let drained: Vec<Value> = inner.events.borrow_mut().drain(..).collect();
            json_to_cstr(&drained)
        }
        Err(e) => err_null(e),
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Returns the FFI API version.
#[no_mangle]
pub extern "C" fn chime_version() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn event_json(info: &SoundInfo, event: &SoundEvent) -> Value {
    let (name, extra) = match event {
        SoundEvent::Loaded => ("loaded", Value::Null),
        SoundEvent::LoadFailed(e) => ("load_failed", json!({ "error": e.to_string() })),
        SoundEvent::Play => ("play", Value::Null),
        SoundEvent::Pause => ("pause", Value::Null),
        SoundEvent::Resume => ("resume", Value::Null),
        SoundEvent::Stop => ("stop", Value::Null),
        SoundEvent::Finish => ("finish", Value::Null),
        SoundEvent::Position(ms) => ("position", json!({ "position_ms": ms })),
        SoundEvent::Error(msg) => ("error", json!({ "error": msg })),
    };
    let mut out = json!({ "id": info.id, "event": name });
    if let (Some(out), Value::Object(extra)) = (out.as_object_mut(), extra) {
        out.extend(extra);
    }
    out
}

fn handle_mut<'a>(handle: *mut ManagerHandle) -> Result<&'a mut ManagerHandleInner, String> {
    if handle.is_null() {
        return Err("null manager handle".into());
    }
    Ok(unsafe { &mut *(handle as *mut ManagerHandleInner) })
}

fn read_cstr(ptr: *const c_char) -> Result<String, String> {
    if ptr.is_null() {
        return Err("null string pointer".into());
    }
    unsafe {
        CStr::from_ptr(ptr)
            .to_str()
            .map(String::from)
            .map_err(|_| "invalid utf-8".into())
    }
}

fn read_json(ptr: *const c_char) -> Result<Value, String> {
    let s = read_cstr(ptr)?;
    serde_json::from_str(&s).map_err(|e| e.to_string())
}

fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => to_cstr(json),
        Err(e) => err_null(e.to_string()),
    }
}

fn to_cstr(s: String) -> *mut c_char {
    CString::new(s)
        .map(|c| c.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn err_null(msg: String) -> *mut c_char {
    set_error(msg);
    ptr::null_mut()
}

fn err_null_handle(msg: String) -> *mut ManagerHandle {
    set_error(msg);
    ptr::null_mut()
}

fn err_zero(msg: String) -> i32 {
    set_error(msg);
    0
}

fn status_code(result: chime_core::Result<()>) -> i32 {
    match result {
        Ok(()) => 1,
        Err(e) => err_zero(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// FFI Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Open a plugin-only manager; the headless bridge answers at once.
    fn ffi_manager() -> *mut ManagerHandle {
        let config = c(r#"{"backend_mode":"plugin_only","plugin_poll_interval_ms":10}"#);
        let handle = unsafe { chime_open(config.as_ptr()) };
        assert!(!handle.is_null(), "chime_open returned null");
        handle
    }

    /// Read a *mut c_char into a String and free it.
    fn read_ffi_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null(), "FFI returned null string");
        let s = unsafe { CStr::from_ptr(ptr).to_str().unwrap().to_string() };
        unsafe { chime_string_free(ptr) };
        s
    }

    fn read_ffi_json(ptr: *mut c_char) -> Value {
        serde_json::from_str(&read_ffi_string(ptr)).unwrap()
    }

    fn last_error() -> String {
        read_ffi_string(chime_last_error())
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    #[test]
    fn ffi_version() {
        assert_eq!(chime_version(), 1);
    }

    #[test]
    fn ffi_open_reports_ready_plugin() {
        let handle = ffi_manager();
        let status = read_ffi_json(chime_status(handle));
        assert_eq!(status["state"], "ready");
        assert_eq!(status["backend"], "plugin");
        chime_close(handle);
    }

    #[test]
    fn ffi_open_rejects_bad_config() {
        let bad = c(r#"{"backend_mode":"vinyl"}"#);
        let handle = unsafe { chime_open(bad.as_ptr()) };
        assert!(handle.is_null());
        assert!(last_error().contains("invalid options"));
    }

    #[test]
    fn ffi_null_handle_returns_error() {
        assert!(chime_status(ptr::null_mut()).is_null());
        assert!(last_error().contains("null"));
        assert_eq!(chime_tick(ptr::null_mut()), 0);
    }

    #[test]
    fn ffi_setup_after_start_is_staged() {
        let handle = ffi_manager();
        let patch = c(r#"{"load_timeout_ms":500}"#);
        assert_eq!(chime_setup(handle, patch.as_ptr()), 1);
        chime_close(handle);
    }

    // -------------------------------------------------------------------
    // Sounds
    // -------------------------------------------------------------------

    #[test]
    fn ffi_create_and_query() {
        let handle = ffi_manager();
        let opts = c(r#"{"id":"click","url":"click.mp3","volume":40}"#);
        let info = read_ffi_json(chime_create_sound(handle, opts.as_ptr()));
        assert_eq!(info["id"], "click");
        assert_eq!(info["volume"], 40);
        assert_eq!(info["play_state"], "stopped");

        let dup = chime_create_sound(handle, opts.as_ptr());
        assert!(dup.is_null());
        assert!(last_error().contains("duplicate"));

        let create = c(r#"{"action":"create","id":"bell","url":"bell.mp3"}"#);
        assert_eq!(chime_command(handle, create.as_ptr()), 1);
        let ids: Vec<String> = serde_json::from_value(read_ffi_json(chime_sound_ids(handle))).unwrap();
        assert_eq!(ids, vec!["click", "bell"]);
        chime_close(handle);
    }

    #[test]
    fn ffi_play_reports_events() {
        let handle = ffi_manager();
        let opts = c(r#"{"id":"loop","url":"loop.ogg"}"#);
        read_ffi_string(chime_create_sound(handle, opts.as_ptr()));

        let play = c(r#"{"action":"play","id":"loop"}"#);
        assert_eq!(chime_command(handle, play.as_ptr()), 1);
        assert_eq!(chime_tick(handle), 1);

        let events = read_ffi_json(chime_poll_events(handle));
        let names: Vec<&str> = events
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["event"].as_str())
            .collect();
        assert!(names.contains(&"loaded"));
        assert!(names.contains(&"play"));
        assert!(events.as_array().unwrap().iter().all(|e| e["id"] == "loop"));

        let drained = read_ffi_json(chime_poll_events(handle));
        assert!(drained.as_array().unwrap().iter().all(|e| e["event"] != "loaded"));

        let state = read_ffi_json(chime_sound_state(handle, c("loop").as_ptr()));
        assert_eq!(state["play_state"], "playing");
        chime_close(handle);
    }

    #[test]
    fn ffi_unknown_sound_errors() {
        let handle = ffi_manager();
        assert!(chime_sound_state(handle, c("ghost").as_ptr()).is_null());
        assert!(last_error().contains("ghost"));

        let stop = c(r#"{"action":"stop","id":"ghost"}"#);
        assert_eq!(chime_command(handle, stop.as_ptr()), 0);
        assert!(last_error().contains("not found"));

        assert_eq!(chime_watch_position(handle, c("ghost").as_ptr(), 100, 1), 0);
        chime_close(handle);
    }

    #[test]
    fn ffi_malformed_command_errors() {
        let handle = ffi_manager();
        let junk = c(r#"{"action":"explode"}"#);
        assert_eq!(chime_command(handle, junk.as_ptr()), 0);
        assert!(!last_error().is_empty());
        chime_close(handle);
    }

    #[test]
    fn ffi_destruct_refuses_later_calls() {
        let handle = ffi_manager();
        assert_eq!(chime_destruct(handle), 1);
        let opts = c(r#"{"id":"late","url":"late.mp3"}"#);
        assert!(chime_create_sound(handle, opts.as_ptr()).is_null());
        assert!(last_error().contains("destructed"));
        assert_eq!(chime_reboot(handle, 0), 0);
        chime_close(handle);
    }

    #[test]
    fn ffi_reboot_clears_sounds() {
        let handle = ffi_manager();
        let opts = c(r#"{"id":"a","url":"a.mp3"}"#);
        read_ffi_string(chime_create_sound(handle, opts.as_ptr()));
        assert_eq!(chime_reboot(handle, 1), 1);
        let ids = read_ffi_json(chime_sound_ids(handle));
        assert_eq!(ids, json!([]));
        let status = read_ffi_json(chime_status(handle));
        assert_eq!(status["state"], "ready");
        chime_close(handle);
    }
}
