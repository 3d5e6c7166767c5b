// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Platform-abstract shared-library handles.
//!
//! On debug builds the module file is first copied to a uniquely named
//! shadow path and the copy is opened instead, leaving the original
//! writable for hot reload while the process runs. The shadow file is
//! deleted when the handle is dropped.

use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a shared library could not be used.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The module file could not be opened by the dynamic linker.
    #[error("failed to load plugin library '{}': {source}", .path.display())]
    Open {
        /// Module path.
        path: PathBuf,
        /// Underlying loader error.
        #[source]
        source: libloading::Error,
    },
    /// The hot-reload shadow copy could not be created.
    #[error("failed to stage plugin library '{}' for hot reload: {source}", .path.display())]
    Stage {
        /// Module path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A required symbol was missing from the module.
    #[error("symbol '{symbol}' not found in plugin library '{}': {source}", .path.display())]
    Symbol {
        /// Module path.
        path: PathBuf,
        /// The symbol that was looked up.
        symbol: String,
        /// Underlying loader error.
        #[source]
        source: libloading::Error,
    },
}

/// An open shared library.
pub struct SharedLibrary {
    // ManuallyDrop lets Drop close the handle before deleting the shadow
    // copy.
    library: ManuallyDrop<libloading::Library>,
    path: PathBuf,
    shadow: Option<PathBuf>,
}

impl SharedLibrary {
    /// Opens the module at `path`.
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        let (open_path, shadow) = if cfg!(debug_assertions) {
            let shadow = Self::stage_shadow_copy(path)?;
            (shadow.clone(), Some(shadow))
        } else {
            (path.to_owned(), None)
        };

        let library =
            unsafe { libloading::Library::new(&open_path) }.map_err(|source| {
                if let Some(shadow) = &shadow {
                    let _ = std::fs::remove_file(shadow);
                }
                LibraryError::Open {
                    path: path.to_owned(),
                    source,
                }
            })?;

        Ok(Self {
            library: ManuallyDrop::new(library),
            path: path.to_owned(),
            shadow,
        })
    }

    /// The module path this handle was opened from (not the shadow copy).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the handle is open. A constructed handle is always open —
    /// open failures never produce one — so this only exists for callers
    /// probing a handle stored behind an `Option`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        true
    }

    /// Whether the module exports `symbol`.
    #[must_use]
    pub fn has_symbol(&self, symbol: &str) -> bool {
        unsafe { self.library.get::<unsafe extern "C" fn()>(symbol.as_bytes()) }.is_ok()
    }

    /// Resolves `symbol` to a function pointer of type `T`.
    ///
    /// The returned pointer is only valid while this handle is alive.
    ///
    /// # Safety
    ///
    /// `T` must match the actual signature of the exported symbol.
    pub unsafe fn get_fn<T: Copy>(&self, symbol: &str) -> Result<T, LibraryError> {
        let resolved =
            self.library
                .get::<T>(symbol.as_bytes())
                .map_err(|source| LibraryError::Symbol {
                    path: self.path.clone(),
                    symbol: symbol.to_owned(),
                    source,
                })?;
        Ok(*resolved)
    }

    /// Copies the module next to the temp directory under a unique name so
    /// the original stays writable.
    fn stage_shadow_copy(path: &Path) -> Result<PathBuf, LibraryError> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("module"));
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let shadow = std::env::temp_dir().join(format!(
            "{stem}-{}{extension}",
            uuid::Uuid::new_v4().simple()
        ));

        std::fs::copy(path, &shadow).map_err(|source| LibraryError::Stage {
            path: path.to_owned(),
            source,
        })?;
        Ok(shadow)
    }
}

impl Drop for SharedLibrary {
    fn drop(&mut self) {
        // Close the handle before touching the shadow file.
        unsafe {
            ManuallyDrop::drop(&mut self.library);
        }
        if let Some(shadow) = self.shadow.take() {
            if let Err(error) = std::fs::remove_file(&shadow) {
                log::warn!(
                    "Failed to remove shadow copy '{}': {error}",
                    shadow.display()
                );
            }
        }
    }
}

impl std::fmt::Debug for SharedLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedLibrary")
            .field("path", &self.path)
            .field("shadowed", &self.shadow.is_some())
            .finish()
    }
}
