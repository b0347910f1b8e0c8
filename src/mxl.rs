//! Compressed MusicXML (.mxl) containers.
//!
//! An .mxl file is a ZIP archive whose `META-INF/container.xml` names the
//! root score through `rootfile/@full-path`. Archives without a container
//! fall back to their first MusicXML entry outside `META-INF/`.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::error::ImportError;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Extract the root MusicXML document from .mxl bytes.
pub fn extract_musicxml_from_mxl(data: &[u8]) -> Result<String, ImportError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| ImportError::Archive(format!("cannot open archive: {e}")))?;

    let root_path = match read_entry(&mut archive, "META-INF/container.xml")? {
        Some(container) => root_file_path(&container)?,
        None => first_score_entry(&mut archive)?,
    };
    log::debug!("reading '{root_path}' from MXL archive");

    read_entry(&mut archive, &root_path)?
        .ok_or_else(|| ImportError::Archive(format!("root file '{root_path}' not found")))
}

/// Text of an archive entry, `None` when there is no such entry.
fn read_entry(archive: &mut Archive, name: &str) -> Result<Option<String>, ImportError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ImportError::Archive(format!("cannot open '{name}': {e}"))),
    };
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| ImportError::Archive(format!("cannot read '{name}': {e}")))?;
    Ok(Some(text))
}

fn root_file_path(container: &str) -> Result<String, ImportError> {
    let doc = roxmltree::Document::parse(container)?;
    let path = doc
        .descendants()
        .filter(|n| n.has_tag_name("rootfile"))
        .find_map(|n| n.attribute("full-path"))
        .map(String::from);
    path.ok_or_else(|| ImportError::Archive("no rootfile in container.xml".to_string()))
}

fn first_score_entry(archive: &mut Archive) -> Result<String, ImportError> {
    let names: Vec<String> = archive.file_names().map(String::from).collect();
    names
        .iter()
        .find(|name| !name.starts_with("META-INF/") && (name.ends_with(".xml") || name.ends_with(".musicxml")))
        .cloned()
        .ok_or_else(|| ImportError::Archive(format!("no MusicXML file in archive, entries: {names:?}")))
}
