//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`JobStorePort`] for the growbox.
//!
//! - Settings are a `postcard` blob under `growbox/settings`.
//! - The job list is a JSON array under `growbox/jobs`, one object per job
//!   with the client field names (`id`, `type`, `starttime`, ...).
//! - Settings are validated before persistence; invalid values are
//!   rejected, never clamped.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//!
//! On the host the backend is an in-memory map (dev/test only).

use core::ffi::CStr;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, JobStorePort, StorageError};
use crate::config::Settings;
use crate::jobs::JobRecord;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const NAMESPACE: &CStr = c"growbox";
const SETTINGS_KEY: &CStr = c"settings";
const JOBS_KEY: &CStr = c"jobs";

/// Largest blob accepted on read.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 8192;

/// Backend failure, carrying the ESP-IDF error code on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NvsFault(i32);

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as esp_err_t {
                return Err(ConfigError::IoError);
            }
            info!("NVS: flash initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NVS: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    // ── Blob primitives ───────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn get_blob(&self, key: &CStr) -> Result<Option<Vec<u8>>, NvsFault> {
        Ok(self.store.borrow().get(&*key.to_string_lossy()).cloned())
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_blob(&self, key: &CStr, data: &[u8]) -> Result<(), NvsFault> {
        self.store
            .borrow_mut()
            .insert(key.to_string_lossy().into_owned(), data.to_vec());
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn erase_key(&self, key: &CStr) -> Result<(), NvsFault> {
        self.store.borrow_mut().remove(&*key.to_string_lossy());
        Ok(())
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, NvsFault>,
    ) -> Result<T, NvsFault> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(NAMESPACE.as_ptr(), mode, &mut handle) };
        if ret != ESP_OK as esp_err_t {
            return Err(NvsFault(ret));
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn get_blob(&self, key: &CStr) -> Result<Option<Vec<u8>>, NvsFault> {
        let result = Self::with_handle(false, |handle| {
            let mut size: usize = 0;
            let ret =
                unsafe { nvs_get_blob(handle, key.as_ptr(), core::ptr::null_mut(), &mut size) };
            if ret == (ESP_ERR_NVS_NOT_FOUND as esp_err_t) {
                return Ok(None);
            }
            if ret != ESP_OK as esp_err_t || size > MAX_BLOB_SIZE {
                return Err(NvsFault(ret));
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr(), buf.as_mut_ptr() as *mut _, &mut size)
            };
            if ret != ESP_OK as esp_err_t {
                return Err(NvsFault(ret));
            }
            buf.truncate(size);
            Ok(Some(buf))
        });
        match result {
            // A namespace that was never written does not exist yet.
            Err(NvsFault(e)) if e == (ESP_ERR_NVS_NOT_FOUND as esp_err_t) => Ok(None),
            other => other,
        }
    }

    #[cfg(target_os = "espidf")]
    fn set_blob(&self, key: &CStr, data: &[u8]) -> Result<(), NvsFault> {
        Self::with_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, key.as_ptr(), data.as_ptr() as *const _, data.len())
            };
            if ret != ESP_OK as esp_err_t {
                return Err(NvsFault(ret));
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as esp_err_t {
                return Err(NvsFault(ret));
            }
            Ok(())
        })
    }

    #[cfg(target_os = "espidf")]
    fn erase_key(&self, key: &CStr) -> Result<(), NvsFault> {
        Self::with_handle(true, |handle| {
            let ret = unsafe { nvs_erase_key(handle, key.as_ptr()) };
            if ret != ESP_OK as esp_err_t && ret != (ESP_ERR_NVS_NOT_FOUND as esp_err_t) {
                return Err(NvsFault(ret));
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as esp_err_t {
                return Err(NvsFault(ret));
            }
            Ok(())
        })
    }
}

#[cfg(target_os = "espidf")]
fn is_full(fault: NvsFault) -> bool {
    fault.0 == (ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t)
}

#[cfg(not(target_os = "espidf"))]
fn is_full(_fault: NvsFault) -> bool {
    false
}

// ── ConfigPort ────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<Settings, ConfigError> {
        match self.get_blob(SETTINGS_KEY) {
            Ok(Some(bytes)) => {
                let settings: Settings =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                settings.validate().map_err(ConfigError::ValidationFailed)?;
                info!("NVS: settings loaded ({} bytes)", bytes.len());
                Ok(settings)
            }
            Ok(None) => {
                info!("NVS: no stored settings, using defaults");
                Ok(Settings::default())
            }
            Err(NvsFault(e)) => {
                warn!("NVS: settings read error {}, using defaults", e);
                Ok(Settings::default())
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        settings.validate().map_err(ConfigError::ValidationFailed)?;
        let bytes = postcard::to_allocvec(settings).map_err(|_| ConfigError::IoError)?;
        self.set_blob(SETTINGS_KEY, &bytes).map_err(|fault| {
            warn!("NVS: settings write error {}", fault.0);
            if is_full(fault) {
                ConfigError::StorageFull
            } else {
                ConfigError::IoError
            }
        })?;
        info!("NVS: settings saved ({} bytes)", bytes.len());
        Ok(())
    }
}

// ── JobStorePort ──────────────────────────────────────────────

impl JobStorePort for NvsAdapter {
    fn load_jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        match self.get_blob(JOBS_KEY) {
            Ok(Some(bytes)) => {
                // Records decode one by one; a bad one is skipped.
                let values: Vec<serde_json::Value> =
                    serde_json::from_slice(&bytes).map_err(|_| StorageError::Corrupted)?;
                let stored = values.len();
                let jobs: Vec<JobRecord> = values
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, value)| match serde_json::from_value(value) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            warn!("NVS: job record {} unreadable ({}), skipped", i, e);
                            None
                        }
                    })
                    .collect();
                info!("NVS: {} of {} job records loaded", jobs.len(), stored);
                Ok(jobs)
            }
            Ok(None) => Ok(Vec::new()),
            Err(NvsFault(e)) => {
                warn!("NVS: job list read error {}", e);
                Err(StorageError::IoError)
            }
        }
    }

    fn save_jobs(&self, jobs: &[JobRecord]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(jobs).map_err(|_| StorageError::IoError)?;
        self.set_blob(JOBS_KEY, &bytes).map_err(|fault| {
            warn!("NVS: job list write error {}", fault.0);
            if is_full(fault) {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }

    fn delete_jobs(&self) -> Result<(), StorageError> {
        self.erase_key(JOBS_KEY).map_err(|_| StorageError::IoError)?;
        info!("NVS: stored job list deleted");
        Ok(())
    }
}
