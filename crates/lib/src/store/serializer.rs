//! Type-dispatched serializers for persisted values.
//!
//! Every persisted value is a single string on disk. The codec that turns a value
//! into that string is chosen by walking the value's lineage: its own type first,
//! then the capability markers it declares (for example [`EnumCapability`]). The
//! first lineage entry with a registered serializer wins, so one serializer for the
//! enum capability covers every persistable enum without per-type registration.
//!
//! # Built-in encodings
//!
//! | Type | Encoded as | Decoded as |
//! |------|------------|------------|
//! | `String` | itself | itself |
//! | `PathBuf` | its string form | absolute path relative to the current directory |
//! | enums | `<module>.<TypeName>.<Member>` | resolved module, type, then member |

use std::any::{Any, TypeId, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A value that can be stored in a [`KeyedStore`](super::KeyedStore).
pub trait Persist: Any + fmt::Debug + Sized {
  /// Type identities this value is encoded through, most specific first.
  fn lineage() -> Vec<TypeId> {
    vec![TypeId::of::<Self>()]
  }

  /// Called when a key of this type is connected to a store.
  fn register(_registry: &mut SerializerRegistry) {}

  /// The enum member this value represents, for types encoded through the enum capability.
  fn enum_member(&self) -> Option<EnumMember> {
    None
  }
}

impl Persist for String {}

impl Persist for PathBuf {}

/// Lineage marker for "any persistable enum".
pub enum EnumCapability {}

/// An enum whose members are persisted by name.
///
/// Implementors usually forward [`Persist`] to [`enum_lineage`], [`SerializerRegistry::register_enum`]
/// and [`enum_member`].
pub trait PersistentEnum: Persist {
  /// Module path the type lives in, normally `module_path!()`.
  const MODULE: &'static str;
  const QUALIFIED_NAME: &'static str;

  fn member_name(&self) -> &'static str;

  fn from_member_name(name: &str) -> Option<Self>;
}

pub fn enum_lineage<T: PersistentEnum>() -> Vec<TypeId> {
  vec![TypeId::of::<T>(), TypeId::of::<EnumCapability>()]
}

pub fn enum_member<T: PersistentEnum>(value: &T) -> EnumMember {
  EnumMember {
    module: T::MODULE,
    qualified_name: T::QUALIFIED_NAME,
    member: value.member_name(),
  }
}

/// Fully qualified reference to one enum member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumMember {
  pub module: &'static str,
  pub qualified_name: &'static str,
  pub member: &'static str,
}

impl fmt::Display for EnumMember {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.module, self.qualified_name, self.member)
  }
}

/// Errors raised while encoding or decoding a value.
#[derive(Debug, Error)]
pub enum CodecError {
  /// No serializer for the type or any type in its lineage. Always a programming error.
  #[error("internal error: no serializer registered for type `{type_name}`")]
  SerializerNotRegistered { type_name: &'static str },

  #[error("internal error: the {serializer} serializer cannot encode a value of type `{type_name}`")]
  UnsupportedValue {
    serializer: &'static str,
    type_name: &'static str,
  },

  #[error("malformed enum reference \"{text}\", expected <module>.<type>.<member>")]
  MalformedEnum { text: String },

  #[error("enum module `{module}` does not exist")]
  UnknownModule { module: String },

  #[error("enum type `{qualified_name}` does not exist in module `{module}`")]
  UnknownEnumType { module: String, qualified_name: String },

  #[error("enum `{qualified_name}` has no member `{member}`")]
  UnknownEnumMember { qualified_name: String, member: String },

  #[error("\"{text}\" does not decode to a value of type `{expected}`")]
  UnexpectedType { expected: &'static str, text: String },

  #[error("cannot resolve path \"{text}\": {source}")]
  InvalidPath {
    text: String,
    #[source]
    source: io::Error,
  },
}

/// A value on its way to a serializer.
pub struct Encodable<'a> {
  pub value: &'a dyn Any,
  pub type_name: &'static str,
  pub enum_member: Option<EnumMember>,
}

pub type EncodeFn = for<'a> fn(&Encodable<'a>) -> Result<String, CodecError>;
pub type DecodeFn = fn(&str, &SerializerRegistry) -> Result<Box<dyn Any>, CodecError>;

type MemberDecodeFn = fn(&str) -> Option<Box<dyn Any>>;

#[derive(Clone, Copy)]
pub struct Serializer {
  pub encode: EncodeFn,
  pub decode: DecodeFn,
}

impl fmt::Debug for Serializer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Serializer").finish_non_exhaustive()
  }
}

/// Ordered registry of serializers keyed by type identity.
#[derive(Debug, Clone, Default)]
pub struct SerializerRegistry {
  serializers: Vec<(TypeId, Serializer)>,
  enums: BTreeMap<&'static str, BTreeMap<&'static str, MemberDecodeFn>>,
}

impl SerializerRegistry {
  /// An empty registry. Every lookup fails until serializers are registered.
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry with the path, enum and string serializers.
  pub fn with_defaults() -> Self {
    let mut registry = Self::new();
    registry.register::<PathBuf>(path_serializer());
    registry.register::<EnumCapability>(enum_serializer());
    registry.register::<String>(string_serializer());
    registry
  }

  /// Registers `serializer` for `T`, replacing any previous registration.
  pub fn register<T: ?Sized + 'static>(&mut self, serializer: Serializer) {
    let id = TypeId::of::<T>();
    match self.serializers.iter_mut().find(|(existing, _)| *existing == id) {
      Some(slot) => slot.1 = serializer,
      None => self.serializers.push((id, serializer)),
    }
  }

  /// Makes the members of `T` resolvable by the enum serializer.
  pub fn register_enum<T: PersistentEnum>(&mut self) {
    self
      .enums
      .entry(T::MODULE)
      .or_default()
      .insert(T::QUALIFIED_NAME, decode_member::<T>);
  }

  /// Finds the serializer for the first lineage entry that has one.
  pub fn dispatch(&self, lineage: &[TypeId], type_name: &'static str) -> Result<Serializer, CodecError> {
    lineage
      .iter()
      .find_map(|id| {
        self
          .serializers
          .iter()
          .find(|(registered, _)| registered == id)
          .map(|(_, serializer)| *serializer)
      })
      .ok_or(CodecError::SerializerNotRegistered { type_name })
  }

  pub fn encode<T: Persist>(&self, value: &T) -> Result<String, CodecError> {
    let serializer = self.dispatch(&T::lineage(), type_name::<T>())?;
    (serializer.encode)(&Encodable {
      value,
      type_name: type_name::<T>(),
      enum_member: value.enum_member(),
    })
  }

  pub fn decode<T: Persist>(&self, text: &str) -> Result<T, CodecError> {
    let serializer = self.dispatch(&T::lineage(), type_name::<T>())?;
    let decoded = (serializer.decode)(text, self)?;
    decoded
      .downcast::<T>()
      .map(|value| *value)
      .map_err(|_| CodecError::UnexpectedType {
        expected: type_name::<T>(),
        text: text.to_string(),
      })
  }

  fn resolve_enum(&self, text: &str) -> Result<Box<dyn Any>, CodecError> {
    let malformed = || CodecError::MalformedEnum { text: text.to_string() };

    let (type_path, member) = text.rsplit_once('.').ok_or_else(malformed)?;
    let (module, qualified_name) = type_path.split_once('.').ok_or_else(malformed)?;

    let types = self.enums.get(module).ok_or_else(|| CodecError::UnknownModule {
      module: module.to_string(),
    })?;
    let decode = types.get(qualified_name).ok_or_else(|| CodecError::UnknownEnumType {
      module: module.to_string(),
      qualified_name: qualified_name.to_string(),
    })?;

    decode(member).ok_or_else(|| CodecError::UnknownEnumMember {
      qualified_name: qualified_name.to_string(),
      member: member.to_string(),
    })
  }
}

fn decode_member<T: PersistentEnum>(name: &str) -> Option<Box<dyn Any>> {
  T::from_member_name(name).map(|value| Box::new(value) as Box<dyn Any>)
}

pub fn string_serializer() -> Serializer {
  Serializer {
    encode: |input| {
      input
        .value
        .downcast_ref::<String>()
        .cloned()
        .ok_or(CodecError::UnsupportedValue {
          serializer: "string",
          type_name: input.type_name,
        })
    },
    decode: |text, _| Ok(Box::new(text.to_string())),
  }
}

pub fn path_serializer() -> Serializer {
  Serializer {
    encode: |input| {
      input
        .value
        .downcast_ref::<PathBuf>()
        .map(|path| path.to_string_lossy().into_owned())
        .ok_or(CodecError::UnsupportedValue {
          serializer: "path",
          type_name: input.type_name,
        })
    },
    decode: |text, _| {
      let absolute = std::path::absolute(text).map_err(|source| CodecError::InvalidPath {
        text: text.to_string(),
        source,
      })?;
      let resolved = dunce::canonicalize(&absolute).unwrap_or(absolute);
      Ok(Box::new(resolved))
    },
  }
}

pub fn enum_serializer() -> Serializer {
  Serializer {
    encode: |input| {
      input
        .enum_member
        .map(|member| member.to_string())
        .ok_or(CodecError::UnsupportedValue {
          serializer: "enum",
          type_name: input.type_name,
        })
    },
    decode: |text, registry| registry.resolve_enum(text),
  }
}
