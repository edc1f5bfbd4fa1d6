//! Keyed persistent store for step state.
//!
//! Each key is bound to one file and one value type. Values are written as a
//! single encoded string, replaced atomically, and decoded back to the bound type
//! on read. A key whose file does not exist has no value; callers use
//! [`KeyedStore::get_or`] to supply a default for that case only.
//!
//! # Example Layout
//!
//! ```text
//! <build>/kindle/
//! ├── status_configure.txt      kindle_lib::process.StepStatus.Successful
//! ├── configure_command.txt     cmake -DCMAKE_CONFIGURATION_TYPES=Release ...
//! └── Release/
//!     └── checksum.txt          9f86d081884c7d659a2feaa0c55ad015...
//! ```

pub mod serializer;

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

pub use serializer::{
  CodecError, EnumCapability, EnumMember, Persist, PersistentEnum, Serializer, SerializerRegistry, enum_lineage,
  enum_member,
};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("internal error: key `{key}` is not connected to a file")]
  KeyNotBound { key: String },

  /// The key is bound but its file does not exist.
  #[error("no value stored for key `{key}` at {path}")]
  ValueAbsent { key: String, path: PathBuf },

  #[error("internal error: key `{key}` holds `{bound}` but `{requested}` was used")]
  TypeMismatch {
    key: String,
    bound: &'static str,
    requested: &'static str,
  },

  #[error("cannot encode value for key `{key}`: {source}")]
  Encode {
    key: String,
    #[source]
    source: CodecError,
  },

  #[error("cannot decode value for key `{key}` from {path}: {source}")]
  Decode {
    key: String,
    path: PathBuf,
    #[source]
    source: CodecError,
  },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl StoreError {
  pub fn is_absent(&self) -> bool {
    matches!(self, StoreError::ValueAbsent { .. })
  }
}

#[derive(Debug, Clone)]
struct Binding {
  path: PathBuf,
  type_id: TypeId,
  type_name: &'static str,
}

/// Mapping from keys to typed values, each persisted in its own file.
#[derive(Debug)]
pub struct KeyedStore {
  bindings: HashMap<String, Binding>,
  registry: SerializerRegistry,
}

impl Default for KeyedStore {
  fn default() -> Self {
    Self::new()
  }
}

impl KeyedStore {
  /// Store using the path, enum and string serializers.
  pub fn new() -> Self {
    Self::with_registry(SerializerRegistry::with_defaults())
  }

  pub fn with_registry(registry: SerializerRegistry) -> Self {
    Self {
      bindings: HashMap::new(),
      registry,
    }
  }

  pub fn registry(&self) -> &SerializerRegistry {
    &self.registry
  }

  pub fn registry_mut(&mut self) -> &mut SerializerRegistry {
    &mut self.registry
  }

  /// Binds `key` to `path` holding values of type `T`. Rebinding replaces the earlier binding.
  pub fn connect<T: Persist>(&mut self, key: &str, path: impl Into<PathBuf>) {
    let path = path.into();
    T::register(&mut self.registry);
    debug!(key, path = %path.display(), value_type = type_name::<T>(), "connecting store key");
    self.bindings.insert(
      key.to_string(),
      Binding {
        path,
        type_id: TypeId::of::<T>(),
        type_name: type_name::<T>(),
      },
    );
  }

  pub fn is_connected(&self, key: &str) -> bool {
    self.bindings.contains_key(key)
  }

  /// File backing `key`, if connected.
  pub fn path(&self, key: &str) -> Option<&Path> {
    self.bindings.get(key).map(|binding| binding.path.as_path())
  }

  pub fn get<T: Persist>(&self, key: &str) -> Result<T, StoreError> {
    let binding = self.binding::<T>(key)?;

    let text = match fs::read_to_string(&binding.path) {
      Ok(text) => text,
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        return Err(StoreError::ValueAbsent {
          key: key.to_string(),
          path: binding.path.clone(),
        });
      }
      Err(source) => {
        return Err(StoreError::Read {
          path: binding.path.clone(),
          source,
        });
      }
    };

    self.registry.decode::<T>(&text).map_err(|source| StoreError::Decode {
      key: key.to_string(),
      path: binding.path.clone(),
      source,
    })
  }

  /// Like [`get`](Self::get) but returns `default` when no value is stored.
  /// Every other failure is still reported.
  pub fn get_or<T: Persist>(&self, key: &str, default: T) -> Result<T, StoreError> {
    match self.get(key) {
      Err(StoreError::ValueAbsent { .. }) => Ok(default),
      other => other,
    }
  }

  /// Encodes `value` and atomically replaces the file bound to `key`.
  pub fn set<T: Persist>(&self, key: &str, value: &T) -> Result<(), StoreError> {
    let binding = self.binding::<T>(key)?;
    let text = self.registry.encode(value).map_err(|source| StoreError::Encode {
      key: key.to_string(),
      source,
    })?;

    write_atomic(&binding.path, &text).map_err(|source| StoreError::Write {
      path: binding.path.clone(),
      source,
    })?;

    debug!(key, path = %binding.path.display(), "stored value");
    Ok(())
  }

  fn binding<T: Persist>(&self, key: &str) -> Result<&Binding, StoreError> {
    let binding = self.bindings.get(key).ok_or_else(|| StoreError::KeyNotBound { key: key.to_string() })?;

    if binding.type_id != TypeId::of::<T>() {
      return Err(StoreError::TypeMismatch {
        key: key.to_string(),
        bound: binding.type_name,
        requested: type_name::<T>(),
      });
    }

    Ok(binding)
  }
}

fn write_atomic(path: &Path, text: &str) -> io::Result<()> {
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  fs::create_dir_all(dir)?;

  let mut temp = NamedTempFile::new_in(dir)?;
  temp.write_all(text.as_bytes())?;
  temp.flush()?;
  temp.persist(path).map_err(|err| err.error)?;
  Ok(())
}
