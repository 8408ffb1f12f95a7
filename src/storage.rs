//! Flat, path-addressed blob buckets on the local filesystem.
//!
//! A key is a bare file name inside the bucket directory. Keys with path
//! separators or parent components are rejected so a stored reference can
//! never point outside its bucket.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BlobStore {
  root: PathBuf,
}

impl BlobStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    BlobStore { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Store bytes under a fresh random key with the given extension.
  pub fn store(&self, bytes: &[u8], extension: &str) -> io::Result<String> {
    let key = random_key(extension);
    self.store_named(bytes, &key)
  }

  /// Copy an existing file into the bucket under a fresh random key.
  pub fn store_file(&self, source: &Path, extension: &str) -> io::Result<String> {
    let key = random_key(extension);
    let target = self.prepare(&key)?;
    fs::copy(source, &target)?;
    Ok(key)
  }

  /// Store bytes under a caller-chosen file name, replacing any existing blob.
  pub fn store_named(&self, bytes: &[u8], filename: &str) -> io::Result<String> {
    let target = self.prepare(filename)?;
    fs::write(&target, bytes)?;
    Ok(filename.to_string())
  }

  /// Remove a blob. Returns whether anything was deleted.
  pub fn delete(&self, key: &str) -> io::Result<bool> {
    let path = self.path(key)?;
    match fs::remove_file(&path) {
      Ok(()) => Ok(true),
      Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(err) => Err(err),
    }
  }

  pub fn path(&self, key: &str) -> io::Result<PathBuf> {
    validate_key(key)?;
    Ok(self.root.join(key))
  }

  pub fn exists(&self, key: &str) -> bool {
    self.path(key).map(|path| path.is_file()).unwrap_or(false)
  }

  fn prepare(&self, key: &str) -> io::Result<PathBuf> {
    let path = self.path(key)?;
    fs::create_dir_all(&self.root)?;
    Ok(path)
  }
}

fn random_key(extension: &str) -> String {
  let extension = extension.trim_start_matches('.').to_lowercase();
  if extension.is_empty() {
    Uuid::new_v4().simple().to_string()
  } else {
    format!("{}.{}", Uuid::new_v4().simple(), extension)
  }
}

fn validate_key(key: &str) -> io::Result<()> {
  let invalid = key.is_empty()
    || key == "."
    || key == ".."
    || key.contains('/')
    || key.contains('\\')
    || key.contains('\0');
  if invalid {
    return Err(io::Error::new(
      io::ErrorKind::InvalidInput,
      format!("invalid blob key: {:?}", key),
    ));
  }
  Ok(())
}
