//! scoreimport: MusicXML importer that builds a staff/measure/layer score
//! tree for a notation layout engine.
//!
//! Supports both uncompressed MusicXML (.musicxml) and compressed MXL (.mxl) files.
//! Anything the importer cannot represent is skipped with a warning; only a
//! document that cannot be read or parsed is an error.
//!
//! # Example
//! ```no_run
//! use scoreimport::import_file;
//!
//! let import = import_file("path/to/score.musicxml").unwrap();
//! println!("Title: {:?}", import.score.title);
//! println!("Measures: {}", import.score.measure_count());
//! println!("Warnings: {}", import.warnings.len());
//! ```

pub mod attributes;
pub mod context;
pub mod cursor;
pub mod diagnostics;
pub mod direction;
pub mod error;
pub mod importer;
pub mod layer;
pub mod lookup;
pub mod measure;
pub mod model;
pub mod mxl;
pub mod nesting;
pub mod note;
pub mod resolver;
pub mod xml;

use std::path::Path;

pub use context::ImportOptions;
pub use diagnostics::{Warning, WarningKind};
pub use error::ImportError;
pub use importer::{FlatDocument, Import, MusicXmlInput, ScoreDocument};
pub use model::*;
pub use mxl::extract_musicxml_from_mxl;

/// Import a MusicXML string with default options.
pub fn import_str(xml: &str) -> Result<Import, ImportError> {
    import_str_with_options(xml, ImportOptions::default())
}

/// Import a MusicXML string with caller-supplied options.
pub fn import_str_with_options(xml: &str, options: ImportOptions) -> Result<Import, ImportError> {
    importer::convert(xml, options)
}

/// Import a MusicXML file from a file path.
/// Automatically detects format based on file extension:
/// - `.musicxml` or `.xml` → uncompressed MusicXML
/// - `.mxl` → compressed MXL (ZIP archive)
pub fn import_file<P: AsRef<Path>>(path: P) -> Result<Import, ImportError> {
    import_file_with_options(path, ImportOptions::default())
}

/// Import a MusicXML or MXL file with caller-supplied options.
/// The format is chosen from the extension as in [`import_file`].
pub fn import_file_with_options<P: AsRef<Path>>(path: P, options: ImportOptions) -> Result<Import, ImportError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| ImportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    import_bytes_with_options(&data, path.extension().and_then(|e| e.to_str()), options)
}

/// Import MusicXML from raw bytes with an optional format hint.
/// If `extension` is None, tries to auto-detect the format.
pub fn import_bytes(data: &[u8], extension: Option<&str>) -> Result<Import, ImportError> {
    import_bytes_with_options(data, extension, ImportOptions::default())
}

/// Import MusicXML bytes with caller-supplied options.
/// The format is chosen as in [`import_bytes`].
pub fn import_bytes_with_options(
    data: &[u8],
    extension: Option<&str>,
    options: ImportOptions,
) -> Result<Import, ImportError> {
    match extension {
        Some("mxl") => {
            let xml = extract_musicxml_from_mxl(data)?;
            importer::convert(&xml, options)
        }
        Some("musicxml") | Some("xml") => importer::convert(std::str::from_utf8(data)?, options),
        _ => {
            // Auto-detect: try as XML first, then as MXL
            if let Ok(xml) = std::str::from_utf8(data) {
                if xml.trim_start().starts_with('<') {
                    return importer::convert(xml, options);
                }
            }
            let xml = extract_musicxml_from_mxl(data)?;
            importer::convert(&xml, options)
        }
    }
}

/// Convert an imported score to a JSON string.
/// Useful for passing data across FFI boundaries.
pub fn score_to_json(score: &Score) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(score)
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI for iOS (static library) and other native hosts
// ═══════════════════════════════════════════════════════════════════════

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

fn import_to_c_string(result: Result<Import, ImportError>) -> *mut c_char {
    let json = match result {
        Ok(import) => score_to_json(&import.score),
        Err(e) => {
            log::error!("MusicXML import failed: {e}");
            return std::ptr::null_mut();
        }
    };
    match json {
        Ok(json) => CString::new(json).unwrap_or_default().into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Import a MusicXML file and return the score as a JSON C string.
/// The caller must free the returned string with `scoreimport_free_string`.
///
/// # Safety
/// `path` must be a valid null-terminated UTF-8 C string.
#[no_mangle]
pub unsafe extern "C" fn scoreimport_import_file(path: *const c_char) -> *mut c_char {
    if path.is_null() {
        return std::ptr::null_mut();
    }
    let c_str = unsafe { CStr::from_ptr(path) };
    let path_str = match c_str.to_str() {
        Ok(s) => s,
        Err(_) => return std::ptr::null_mut(),
    };
    import_to_c_string(import_file(path_str))
}

/// Import MusicXML bytes and return the score as a JSON C string.
/// The caller must free the returned string with `scoreimport_free_string`.
///
/// # Safety
/// `data` must point to `len` valid bytes. `extension` may be null.
#[no_mangle]
pub unsafe extern "C" fn scoreimport_import_bytes(
    data: *const u8,
    len: usize,
    extension: *const c_char,
) -> *mut c_char {
    if data.is_null() || len == 0 {
        return std::ptr::null_mut();
    }
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    let ext = if extension.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(extension) }.to_str().ok()
    };
    import_to_c_string(import_bytes(bytes, ext))
}

/// Free a string previously returned by scoreimport functions.
///
/// # Safety
/// `ptr` must be a string previously returned by a scoreimport function, or null.
#[no_mangle]
pub unsafe extern "C" fn scoreimport_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}
