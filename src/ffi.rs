//! C FFI: bridges [`VisemeEngine`] to native hosts (game engines, iOS /
//! Android apps).
//!
//! Functions are `#[no_mangle] extern "C"`.  Structured data crosses the
//! boundary as UTF-8 JSON strings.
//!
//! ## Memory contract
//!
//! | Function                           | Caller frees with          |
//! |------------------------------------|----------------------------|
//! | [`visemix_engine_new`]             | [`visemix_engine_free`]    |
//! | [`visemix_engine_load_morphs`]     | [`visemix_free_string`]    |
//! | [`visemix_engine_influences`]      | [`visemix_free_string`]    |
//! | [`visemix_engine_export_profile`]  | [`visemix_free_string`]    |
//! | [`visemix_create_animation`]       | [`visemix_free_string`]    |
//! | [`visemix_engine_apply_viseme`]    | [`visemix_free_error`]     |
//! | [`visemix_engine_import_profile`]  | [`visemix_free_error`]     |

use std::ffi::{c_char, CStr, CString};

use anyhow::{Context, Result};

use crate::{
    config::EngineConfig,
    engine::VisemeEngine,
    interpolate::Phase,
    schedule::AnimationOptions,
    viseme::Viseme,
};

// ─────────────────────────────────────────────────────────────────────────────

/// Opaque handle to one engine session.
pub struct VisemixEngine {
    engine: VisemeEngine,
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Convert a non-null `*const c_char` to an owned `String`.
/// Returns `None` if `ptr` is null; invalid UTF-8 is replaced lossily.
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Heap-allocate an owned C string.  Returns null on interior nul bytes.
fn to_c_str(s: &str) -> *const c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => std::ptr::null(),
    }
}

/// `Ok` → null, `Err` → heap-allocated message.
fn to_c_error(result: Result<()>) -> *const c_char {
    match result {
        Ok(()) => std::ptr::null(),
        Err(e) => to_c_str(&format!("{e:#}")),
    }
}

/// `Ok(json)` → heap string, `Err` → null (logged).
fn to_c_json(what: &str, result: Result<String>) -> *const c_char {
    match result {
        Ok(json) => to_c_str(&json),
        Err(e) => {
            tracing::error!("{what}: {e:#}");
            std::ptr::null()
        }
    }
}

fn new_engine(config_json: Option<String>) -> Result<VisemeEngine> {
    let config = match config_json {
        Some(json) => EngineConfig::from_json_str(&json).context("parsing engine config")?,
        None => EngineConfig::default(),
    };
    Ok(VisemeEngine::new(config))
}

fn load_morphs(engine: &mut VisemeEngine, names_json: &str) -> Result<String> {
    let names: Vec<String> =
        serde_json::from_str(names_json).context("morph inventory must be a JSON array of strings")?;
    let report = engine.load_morph_inventory(names);
    Ok(serde_json::to_string(report)?)
}

fn apply_viseme(engine: &mut VisemeEngine, viseme: &str, intensity: f32, immediate: bool) -> Result<()> {
    let viseme: Viseme = viseme.parse()?;
    engine
        .apply_viseme(viseme, intensity, immediate)
        .with_context(|| format!("applying viseme {viseme}"))
}

fn influences_json(engine: &VisemeEngine) -> Result<String> {
    let map: serde_json::Map<String, serde_json::Value> = engine
        .influences()?
        .into_iter()
        .map(|(name, value)| (name, serde_json::Value::from(value)))
        .collect();
    Ok(serde_json::to_string(&map)?)
}

fn animation_json(engine: &VisemeEngine, text: &str, options_json: Option<String>) -> Result<String> {
    let options = match options_json {
        Some(json) => serde_json::from_str::<AnimationOptions>(&json).context("parsing animation options")?,
        None => AnimationOptions::default(),
    };
    let frames = engine.create_animation(text, &options);
    Ok(serde_json::to_string(&frames)?)
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Create an engine.
///
/// @param config_json  UTF-8 JSON [`EngineConfig`] (partial is fine), or
///                     `NULL` for defaults.
/// @return             Opaque handle, or `NULL` if the config does not parse.
///                     Free with [`visemix_engine_free`].
#[no_mangle]
pub unsafe extern "C" fn visemix_engine_new(config_json: *const c_char) -> *mut VisemixEngine {
    match new_engine(unsafe { cstr_to_string(config_json) }) {
        Ok(engine) => Box::into_raw(Box::new(VisemixEngine { engine })),
        Err(e) => {
            tracing::error!("visemix_engine_new: {e:#}");
            std::ptr::null_mut()
        }
    }
}

/// Load (or swap to) an asset's morph inventory.
///
/// ```c
/// const char *report = visemix_engine_load_morphs(h, "[\"V_Open\",\"V_Wide\"]");
/// ```
///
/// @param names_json  JSON array of morph names, in mesh order.
/// @return            The resolution report as JSON, or `NULL` on error.
///                    Free with [`visemix_free_string`].
#[no_mangle]
pub unsafe extern "C" fn visemix_engine_load_morphs(
    engine: *mut VisemixEngine,
    names_json: *const c_char,
) -> *const c_char {
    if engine.is_null() {
        return std::ptr::null();
    }
    let Some(json) = (unsafe { cstr_to_string(names_json) }) else {
        tracing::error!("visemix_engine_load_morphs: null argument");
        return std::ptr::null();
    };
    let h = unsafe { &mut *engine };
    to_c_json("visemix_engine_load_morphs", load_morphs(&mut h.engine, &json))
}

/// Target a viseme.
///
/// @param viseme     Viseme name (`"aa"`, `"PP"`, …) or numeric code.
/// @param intensity  `[0, 1]`; out-of-range values are clamped.
/// @param immediate  Jump straight to the target instead of easing.
/// @return           `NULL` on success; otherwise an error message to free
///                   with [`visemix_free_error`].
#[no_mangle]
pub unsafe extern "C" fn visemix_engine_apply_viseme(
    engine: *mut VisemixEngine,
    viseme: *const c_char,
    intensity: f32,
    immediate: bool,
) -> *const c_char {
    if engine.is_null() {
        return to_c_str("null engine handle");
    }
    let Some(viseme) = (unsafe { cstr_to_string(viseme) }) else {
        return to_c_str("null viseme");
    };
    let h = unsafe { &mut *engine };
    to_c_error(apply_viseme(&mut h.engine, &viseme, intensity, immediate))
}

/// Advance interpolation by one tick.
///
/// @return `0` idle, `1` transitioning, `-1` if no inventory is loaded or the
///         handle is null.
#[no_mangle]
pub unsafe extern "C" fn visemix_engine_update(engine: *mut VisemixEngine) -> i32 {
    if engine.is_null() {
        return -1;
    }
    let h = unsafe { &mut *engine };
    match h.engine.update() {
        Ok(Phase::Idle) => 0,
        Ok(Phase::Transitioning) => 1,
        Err(_) => -1,
    }
}

/// Ease every morph back to rest.
#[no_mangle]
pub unsafe extern "C" fn visemix_engine_reset(engine: *mut VisemixEngine) {
    if !engine.is_null() {
        unsafe { &mut *engine }.engine.reset();
    }
}

/// Current influence of every morph as a JSON object `{ "name": value }`.
///
/// @return Heap-allocated JSON, or `NULL` if not ready.
///         Free with [`visemix_free_string`].
#[no_mangle]
pub unsafe extern "C" fn visemix_engine_influences(engine: *const VisemixEngine) -> *const c_char {
    if engine.is_null() {
        return std::ptr::null();
    }
    let h = unsafe { &*engine };
    to_c_json("visemix_engine_influences", influences_json(&h.engine))
}

/// Export the current tuning profile as JSON.
#[no_mangle]
pub unsafe extern "C" fn visemix_engine_export_profile(
    engine: *const VisemixEngine,
) -> *const c_char {
    if engine.is_null() {
        return std::ptr::null();
    }
    let h = unsafe { &*engine };
    let json = h.engine.export_profile().and_then(|p| p.to_json());
    to_c_json("visemix_engine_export_profile", json.map_err(Into::into))
}

/// Import a tuning profile.  Nothing changes unless the whole profile is
/// valid for the loaded asset.
///
/// @return `NULL` on success; otherwise an error message to free with
///         [`visemix_free_error`].
#[no_mangle]
pub unsafe extern "C" fn visemix_engine_import_profile(
    engine: *mut VisemixEngine,
    profile_json: *const c_char,
) -> *const c_char {
    if engine.is_null() {
        return to_c_str("null engine handle");
    }
    let Some(json) = (unsafe { cstr_to_string(profile_json) }) else {
        return to_c_str("null profile");
    };
    let h = unsafe { &mut *engine };
    to_c_error(h.engine.import_profile_json(&json).map_err(Into::into))
}

/// Schedule `text` and return the frames as a JSON array.
///
/// @param options_json  JSON `{ "duration_ms", "intensity",
///                      "words_per_minute", "pause_duration_ms" }`
///                      (all optional), or `NULL`.
#[no_mangle]
pub unsafe extern "C" fn visemix_create_animation(
    engine: *const VisemixEngine,
    text: *const c_char,
    options_json: *const c_char,
) -> *const c_char {
    if engine.is_null() {
        return std::ptr::null();
    }
    let Some(text) = (unsafe { cstr_to_string(text) }) else {
        return std::ptr::null();
    };
    let h = unsafe { &*engine };
    let options = unsafe { cstr_to_string(options_json) };
    to_c_json("visemix_create_animation", animation_json(&h.engine, &text, options))
}

/// Free a string returned by this library.
#[no_mangle]
pub unsafe extern "C" fn visemix_free_string(s: *const c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s as *mut c_char) });
    }
}

/// Free an error string returned by an apply / import call.
#[no_mangle]
pub unsafe extern "C" fn visemix_free_error(s: *const c_char) {
    unsafe { visemix_free_string(s) };
}

/// Destroy an engine handle.
#[no_mangle]
pub unsafe extern "C" fn visemix_engine_free(engine: *mut VisemixEngine) {
    if !engine.is_null() {
        drop(unsafe { Box::from_raw(engine) });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Take ownership of a returned string.
    unsafe fn take(ptr: *const c_char) -> Option<String> {
        let s = unsafe { cstr_to_string(ptr) };
        unsafe { visemix_free_string(ptr) };
        s
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn test_engine_round_trip() {
        unsafe {
            let h = visemix_engine_new(std::ptr::null());
            assert!(!h.is_null());

            // Not ready yet.
            assert_eq!(visemix_engine_update(h), -1);
            let err = take(visemix_engine_apply_viseme(h, c("aa").as_ptr(), 1.0, true));
            assert!(err.unwrap().contains("not ready"));

            let report = take(visemix_engine_load_morphs(h, c(r#"["V_Open","Jaw_Open"]"#).as_ptr()))
                .unwrap();
            assert!(report.contains("\"resolved\""));

            assert!(visemix_engine_apply_viseme(h, c("aa").as_ptr(), 1.0, true).is_null());
            assert_eq!(visemix_engine_update(h), 0);

            let json = take(visemix_engine_influences(h)).unwrap();
            let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&json).unwrap();
            assert_eq!(map.len(), 2);
            assert_eq!(map["V_Open"].as_f64(), Some(1.0));

            visemix_engine_free(h);
        }
    }

    #[test]
    fn test_bad_input_is_reported() {
        unsafe {
            let bad = visemix_engine_new(c("{ \"transition_speed\": \"fast\" }").as_ptr());
            assert!(bad.is_null());

            let h = visemix_engine_new(std::ptr::null());
            assert!(visemix_engine_load_morphs(h, c("not json").as_ptr()).is_null());
            visemix_engine_free(h);

            let h = visemix_engine_new(std::ptr::null());
            take(visemix_engine_load_morphs(h, c(r#"["V_Open"]"#).as_ptr()));
            let err = take(visemix_engine_apply_viseme(h, c("XX").as_ptr(), 1.0, true));
            assert!(err.is_some());
            let err = take(visemix_engine_import_profile(h, c(r#"{"version":9}"#).as_ptr()));
            assert!(err.is_some());
            visemix_engine_free(h);
        }
    }

    #[test]
    fn test_create_animation_json() {
        unsafe {
            let h = visemix_engine_new(std::ptr::null());
            let json = take(visemix_create_animation(
                h,
                c("hi there").as_ptr(),
                c(r#"{ "words_per_minute": 120 }"#).as_ptr(),
            ))
            .unwrap();
            let frames: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
            assert!(!frames.is_empty());
            assert_eq!(frames[0]["timestamp_ms"].as_f64(), Some(0.0));
            visemix_engine_free(h);
        }
    }
}
