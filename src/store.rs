//! Single-file model persistence.
//!
//! Layout, all little-endian:
//!
//! ```text
//! [K: u32][D: u32][V: u32][theta: D*K f64][phi: K*V f64]
//! ```
//!
//! Writes go to a temporary sibling file that is renamed into place, so a
//! crash never leaves a half-written model under the target name.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{LdaError, Result};
use crate::model::TopicModel;

const HEADER_LEN: usize = 3 * 4;
const VALUE_LEN: usize = 8;

pub fn save<P: AsRef<Path>>(model: &TopicModel, path: P) -> Result<()> {
    let path = path.as_ref();
    let dims = [model.num_topics(), model.num_docs(), model.num_terms()];
    let mut header = [0u8; HEADER_LEN];
    for (chunk, dim) in header.chunks_exact_mut(4).zip(dims) {
        let dim = u32::try_from(dim).map_err(|_| {
            LdaError::InvalidModel(format!("dimension {dim} does not fit the model header"))
        })?;
        chunk.copy_from_slice(&dim.to_le_bytes());
    }

    let tmp_path = tmp_path(path);
    let written =
        write_file(&tmp_path, &header, model).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        // nothing useful to report if the temp file was never created
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    log::info!(
        "Saved topic model to {} (K={}, D={}, V={})",
        path.display(),
        dims[0],
        dims[1],
        dims[2]
    );
    Ok(())
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<TopicModel> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LdaError::FileNotFound(path.to_path_buf()),
        _ => LdaError::Io(e),
    })?;
    let corrupt = |reason: String| LdaError::CorruptModel {
        path: path.to_path_buf(),
        reason,
    };

    if raw.len() < HEADER_LEN {
        return Err(corrupt(format!(
            "file is {} bytes, shorter than the {HEADER_LEN}-byte header",
            raw.len()
        )));
    }
    let mut dims = [0usize; 3];
    for (dim, chunk) in dims.iter_mut().zip(raw[..HEADER_LEN].chunks_exact(4)) {
        *dim = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
    }
    let [k, d, v] = dims;
    if k == 0 || d == 0 || v == 0 {
        return Err(corrupt(format!(
            "header has a zero dimension (K={k}, D={d}, V={v})"
        )));
    }

    let values = d
        .checked_mul(k)
        .and_then(|dk| k.checked_mul(v).and_then(|kv| dk.checked_add(kv)));
    let expected = values.and_then(|n| n.checked_mul(VALUE_LEN));
    let payload = &raw[HEADER_LEN..];
    if expected != Some(payload.len()) {
        return Err(corrupt(format!(
            "header K={k}, D={d}, V={v} needs {} payload bytes, found {}",
            expected.map_or_else(|| "overflowing".to_string(), |n| n.to_string()),
            payload.len()
        )));
    }

    let mut floats = payload.chunks_exact(VALUE_LEN).map(|c| {
        let mut bytes = [0u8; VALUE_LEN];
        bytes.copy_from_slice(c);
        f64::from_le_bytes(bytes)
    });
    let theta: Vec<f64> = floats.by_ref().take(d * k).collect();
    let phi: Vec<f64> = floats.collect();

    let model = TopicModel::from_parts(k, d, v, theta, phi)?;
    log::info!(
        "Loaded topic model from {} (K={k}, D={d}, V={v})",
        path.display()
    );
    Ok(model)
}

fn write_file(path: &Path, header: &[u8], model: &TopicModel) -> io::Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    out.write_all(header)?;
    for v in model.theta().iter().chain(model.phi()) {
        out.write_all(&v.to_le_bytes())?;
    }
    out.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn model() -> TopicModel {
        TopicModel::from_parts(
            2,
            3,
            2,
            vec![0.5, 0.5, 0.1, 0.9, 1.0 / 3.0, 2.0 / 3.0],
            vec![0.25, 0.75, 0.6, 0.4],
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lda-cvb0.model");
        let m = model();
        save(&m, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, m);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_file_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m");
        save(&model(), &path).unwrap();
        let raw = fs::read(&path).unwrap();
        assert_eq!(raw.len(), HEADER_LEN + (3 * 2 + 2 * 2) * 8);
        assert_eq!(&raw[0..4], &2u32.to_le_bytes());
        assert_eq!(&raw[4..8], &3u32.to_le_bytes());
        assert_eq!(&raw[8..12], &2u32.to_le_bytes());
        assert_eq!(&raw[12..20], &0.5f64.to_le_bytes());
        assert_eq!(&raw[raw.len() - 8..], &0.4f64.to_le_bytes());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope");
        match load(&path) {
            Err(LdaError::FileNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m");
        save(&model(), &path).unwrap();
        let raw = fs::read(&path).unwrap();
        fs::write(&path, &raw[..raw.len() - 3]).unwrap();
        assert!(matches!(load(&path), Err(LdaError::CorruptModel { .. })));
    }

    #[test]
    fn test_trailing_bytes_are_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m");
        save(&model(), &path).unwrap();
        let mut raw = fs::read(&path).unwrap();
        raw.extend_from_slice(&[0u8; 8]);
        fs::write(&path, &raw).unwrap();
        assert!(matches!(load(&path), Err(LdaError::CorruptModel { .. })));
    }

    #[test]
    fn test_short_header_and_zero_dims_are_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m");
        fs::write(&path, [1u8, 0, 0]).unwrap();
        assert!(matches!(load(&path), Err(LdaError::CorruptModel { .. })));

        let mut raw = Vec::new();
        for dim in [0u32, 1, 1] {
            raw.extend_from_slice(&dim.to_le_bytes());
        }
        fs::write(&path, &raw).unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("zero dimension"));
    }

    #[test]
    fn test_huge_header_does_not_overflow() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m");
        let mut raw = Vec::new();
        for dim in [u32::MAX, u32::MAX, u32::MAX] {
            raw.extend_from_slice(&dim.to_le_bytes());
        }
        fs::write(&path, &raw).unwrap();
        assert!(matches!(load(&path), Err(LdaError::CorruptModel { .. })));
    }

    #[test]
    fn test_negative_value_is_invalid_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m");
        let mut raw = Vec::new();
        for dim in [1u32, 1, 1] {
            raw.extend_from_slice(&dim.to_le_bytes());
        }
        raw.extend_from_slice(&1.0f64.to_le_bytes());
        raw.extend_from_slice(&(-1.0f64).to_le_bytes());
        fs::write(&path, &raw).unwrap();
        assert!(matches!(load(&path), Err(LdaError::InvalidModel(_))));
    }

    #[test]
    fn test_unnormalized_rows_are_invalid_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m");
        let mut raw = Vec::new();
        for dim in [1u32, 1, 2] {
            raw.extend_from_slice(&dim.to_le_bytes());
        }
        for v in [1.0f64, 0.7, 0.7] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        fs::write(&path, &raw).unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, LdaError::InvalidModel(_)));
        assert!(err.to_string().contains("phi row 0"));
    }

    #[test]
    fn test_failed_save_removes_temp_file() {
        let dir = tempdir().unwrap();
        // renaming a file over a directory fails after the temp file is written
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inside"), b"x").unwrap();

        let err = save(&model(), &path).unwrap_err();
        assert!(matches!(err, LdaError::Io(_)));
        assert!(!tmp_path(&path).exists());
        assert!(path.join("inside").exists());
    }

    #[test]
    fn test_failed_create_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("m");
        assert!(matches!(save(&model(), &path), Err(LdaError::Io(_))));
        assert!(!tmp_path(&path).exists());
        assert!(!path.exists());
    }
}
