//! C-compatible API for host applications.
//!
//! Every string returned here is owned by Rust and must be released with
//! [`nutri_free_str`]. Responses are JSON envelopes:
//! `{"ok":true,"result":...}` or `{"ok":false,"code":n,"error":"..."}` where
//! `code` is a [`ScreenCode`](crate::common::ScreenCode).

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;
use serde_json::json;

use crate::common::config::AppCfg;
use crate::common::error::{ScreenError, ScreenResult};
use crate::common::log;
use crate::data::domain::Sex;
use crate::inference::domain::AssessmentInput;
use crate::inference::service::Assessor;
use crate::training::repo_fs::FsModelRepo;
use crate::training::service as training_service;

/// ABI version to coordinate with host bindings.
#[no_mangle]
pub extern "C" fn nutri_api_version() -> u32 {
    1
}

/// Loaded assessors keyed by `data_root`. Retraining through [`nutri_train`] evicts the entry.
static ASSESSORS: OnceLock<Mutex<HashMap<String, Arc<Assessor>>>> = OnceLock::new();

fn assessors() -> ScreenResult<std::sync::MutexGuard<'static, HashMap<String, Arc<Assessor>>>> {
    ASSESSORS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .map_err(|_| ScreenError::internal("assessor cache lock poisoned"))
}

/// Cached assessor for `root`, loading artefacts from disk on first use.
fn cached_assessor(root: &str) -> ScreenResult<Arc<Assessor>> {
    let mut cache = assessors()?;
    if let Some(assessor) = cache.get(root) {
        return Ok(Arc::clone(assessor));
    }
    let mut cfg = AppCfg::load()?;
    log::init_logging(&cfg.log_filter);
    cfg.data_root = root.to_owned();
    let assessor = Arc::new(Assessor::load(&FsModelRepo::new(&cfg))?);
    cache.insert(root.to_owned(), Arc::clone(&assessor));
    Ok(assessor)
}

fn evict(root: &str) -> ScreenResult<()> {
    assessors()?.remove(root);
    Ok(())
}

/// Generate a seeded cohort under `data_root`, train, persist. Returns the manifest.
#[no_mangle]
pub extern "C" fn nutri_train(data_root: *const c_char, seed: u64) -> *const c_char {
    respond(|| {
        let mut cfg = host_cfg(data_root)?;
        cfg.seed = Some(seed);
        let manifest = training_service::run_pipeline(&cfg)?;
        evict(&cfg.data_root)?;
        Ok(manifest)
    })
}

/// Assess one child against the artefacts under `data_root`, loaded once and cached.
#[no_mangle]
pub extern "C" fn nutri_assess(
    data_root: *const c_char,
    age: u32,
    sex: u8,
    weight: f64,
    height: f64,
    muac: f64,
    hb: f64,
) -> *const c_char {
    respond(|| {
        let root = read_str(data_root, "data_root")?;
        let sex = Sex::try_from(sex)
            .map_err(|_| ScreenError::invalid(format!("sex must be 0 or 1, got {sex}")))?;
        let input = AssessmentInput {
            age,
            sex,
            weight,
            height,
            muac,
            hb,
        };
        cached_assessor(&root)?.assess(&input)
    })
}

/// Free strings allocated by Rust.
#[no_mangle]
pub extern "C" fn nutri_free_str(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: `ptr` came from `CString::into_raw` in `string_to_raw`.
    unsafe {
        drop(CString::from_raw(ptr as *mut c_char));
    }
}

fn host_cfg(data_root: *const c_char) -> ScreenResult<AppCfg> {
    let mut cfg = AppCfg::load()?;
    log::init_logging(&cfg.log_filter);
    cfg.data_root = read_str(data_root, "data_root")?;
    Ok(cfg)
}

fn read_str(ptr: *const c_char, name: &str) -> ScreenResult<String> {
    if ptr.is_null() {
        return Err(ScreenError::invalid(format!("{name} is null")));
    }
    // SAFETY: caller passes a NUL-terminated string that outlives this call.
    let raw = unsafe { CStr::from_ptr(ptr) };
    raw.to_str()
        .map(str::to_owned)
        .map_err(|_| ScreenError::invalid(format!("{name} is not valid UTF-8")))
}

fn respond<T, F>(f: F) -> *const c_char
where
    T: Serialize,
    F: FnOnce() -> ScreenResult<T>,
{
    string_to_raw(envelope(f()))
}

fn envelope<T: Serialize>(outcome: ScreenResult<T>) -> String {
    let body = outcome
        .and_then(|value| Ok(serde_json::to_value(value)?))
        .map(|value| json!({ "ok": true, "result": value }))
        .unwrap_or_else(|err| {
            tracing::warn!(ev = "ffi_error", code = err.code() as u32, error = %err);
            json!({ "ok": false, "code": err.code() as u32, "error": err.to_string() })
        });
    body.to_string()
}

fn string_to_raw(s: String) -> *const c_char {
    match CString::new(s) {
        Ok(cstring) => cstring.into_raw(),
        // serde_json escapes NUL, so this arm is unreachable in practice
        Err(_) => CString::default().into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{GeneratorCfg, TrainingCfg};
    use serde_json::Value;
    use tempfile::tempdir;

    fn take(ptr: *const c_char) -> Value {
        assert!(!ptr.is_null());
        let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned();
        nutri_free_str(ptr);
        serde_json::from_str(&text).unwrap()
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    #[test]
    fn version_is_one() {
        assert_eq!(nutri_api_version(), 1);
    }

    #[test]
    fn null_root_is_a_validation_error() {
        let v = take(nutri_assess(std::ptr::null(), 24, 0, 12.0, 85.0, 130.0, 11.5));
        assert_eq!(v["ok"], false);
        assert_eq!(v["code"], 1);
    }

    #[test]
    fn untrained_root_reports_missing_artifacts() {
        let dir = tempdir().unwrap();
        let root = c(dir.path().to_str().unwrap());
        let v = take(nutri_assess(root.as_ptr(), 24, 0, 12.0, 85.0, 130.0, 11.5));
        assert_eq!(v["ok"], false);
        assert_eq!(v["code"], 3);
        assert!(v["error"].as_str().unwrap().contains("acute_model.json"));
    }

    #[test]
    fn bad_sex_code_is_rejected() {
        let dir = tempdir().unwrap();
        let root = c(dir.path().to_str().unwrap());
        let v = take(nutri_assess(root.as_ptr(), 24, 7, 12.0, 85.0, 130.0, 11.5));
        assert_eq!(v["ok"], false);
        assert_eq!(v["code"], 1);
        assert!(v["error"].as_str().unwrap().contains("sex"));
    }

    #[test]
    fn assessor_is_loaded_once_per_root() {
        let dir = tempdir().unwrap();
        let cfg = AppCfg {
            data_root: dir.path().display().to_string(),
            seed: Some(3),
            generator: GeneratorCfg {
                cohort_size: 200,
                noise_rate: 0.05,
            },
            training: TrainingCfg {
                n_estimators: 5,
                max_depth: Some(6),
                ..TrainingCfg::default()
            },
            ..AppCfg::default()
        };
        training_service::run_pipeline(&cfg).unwrap();
        let root = c(&cfg.data_root);

        let first = take(nutri_assess(root.as_ptr(), 24, 0, 12.0, 85.0, 130.0, 11.5));
        assert_eq!(first["ok"], true);

        // served from memory once loaded
        std::fs::remove_dir_all(dir.path().join("models")).unwrap();
        let second = take(nutri_assess(root.as_ptr(), 24, 0, 12.0, 85.0, 130.0, 11.5));
        assert_eq!(second, first);

        evict(&cfg.data_root).unwrap();
        let third = take(nutri_assess(root.as_ptr(), 24, 0, 12.0, 85.0, 130.0, 11.5));
        assert_eq!(third["code"], 3);
    }

    #[test]
    fn envelope_shapes() {
        let ok: Value = serde_json::from_str(&envelope(Ok(3_u8))).unwrap();
        assert_eq!(ok, json!({ "ok": true, "result": 3 }));
        let err: Value =
            serde_json::from_str(&envelope::<u8>(Err(ScreenError::invalid("weight")))).unwrap();
        assert_eq!(err["code"], 1);
        assert!(err["error"].as_str().unwrap().contains("weight"));
    }

    #[test]
    fn free_tolerates_null() {
        nutri_free_str(std::ptr::null());
    }
}
