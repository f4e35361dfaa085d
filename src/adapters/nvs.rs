//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`PersistencePort`] as a flat byte image addressed by offset.
//! The image is cached in RAM; every write patches the cache and commits
//! the whole image as a single NVS blob, so a record either lands
//! completely or not at all.
//!
//! # Layout
//!
//! - Namespace `esurl`, key `image`, `NVM_IMAGE_SIZE` bytes.
//! - Offsets mean the same thing on ESP-IDF and in simulation.
//! - Until the first successful write the image does not exist and every
//!   read fails with [`StorageError::NotFound`].

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::PersistencePort;
use crate::error::StorageError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Size of the persistent image.  Room for two record slots.
pub const NVM_IMAGE_SIZE: usize = 256;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"esurl\0";
#[cfg(target_os = "espidf")]
const IMAGE_KEY: &[u8] = b"image\0";

pub struct NvsAdapter {
    image: Vec<u8>,
    present: bool,
}

impl NvsAdapter {
    /// Initialise NVS flash and load the image.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, StorageError> {
        // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
        // single main-task context before any concurrent NVS access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("NVS: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                return Err(StorageError::IoError);
            }
        } else if ret != ESP_OK {
            return Err(StorageError::IoError);
        }

        let mut image = vec![0u8; NVM_IMAGE_SIZE];
        let present = match Self::with_nvs_handle(false, |handle| {
            let mut size = image.len();
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    IMAGE_KEY.as_ptr() as *const _,
                    image.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        }) {
            Ok(size) => {
                info!("NvsAdapter: loaded image ({} bytes)", size);
                true
            }
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                info!("NvsAdapter: no stored image");
                false
            }
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}, starting blank", e);
                image.fill(0);
                false
            }
        };
        Ok(Self { image, present })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, StorageError> {
        info!("NvsAdapter: simulation backend");
        Ok(Self {
            image: vec![0u8; NVM_IMAGE_SIZE],
            present: false,
        })
    }

    /// Simulation backend pre-loaded with `image` (zero-extended).
    #[cfg(not(target_os = "espidf"))]
    pub fn with_image(bytes: &[u8]) -> Self {
        let mut image = vec![0u8; NVM_IMAGE_SIZE];
        let n = bytes.len().min(NVM_IMAGE_SIZE);
        image[..n].copy_from_slice(&bytes[..n]);
        Self { image, present: true }
    }

    /// The cached image.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    fn range(&self, offset: u16, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let start = usize::from(offset);
        let end = start.checked_add(len).ok_or(StorageError::OutOfRange)?;
        if end > self.image.len() {
            return Err(StorageError::OutOfRange);
        }
        Ok(start..end)
    }

    /// Open the namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn commit(image: &[u8]) -> Result<(), StorageError> {
        Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    IMAGE_KEY.as_ptr() as *const _,
                    image.as_ptr() as *const _,
                    image.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            StorageError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn commit(_image: &[u8]) -> Result<(), StorageError> {
        Ok(())
    }
}

impl PersistencePort for NvsAdapter {
    fn read(&self, offset: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        if !self.present {
            return Err(StorageError::NotFound);
        }
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.image[range]);
        Ok(())
    }

    fn write(&mut self, offset: u16, data: &[u8]) -> Result<(), StorageError> {
        let range = self.range(offset, data.len())?;
        let mut next = self.image.clone();
        next[range].copy_from_slice(data);
        Self::commit(&next)?;
        self.image = next;
        self.present = true;
        info!("NvsAdapter: {} bytes committed at offset {}", data.len(), offset);
        Ok(())
    }
}
