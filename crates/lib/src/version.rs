//! Compatibility check between the running tool and a build directory.

use semver::Version;

/// Whether a build directory written by `stored` can be reused by `current`.
///
/// Versions are compatible when their major and minor components agree;
/// pre-release and build metadata are ignored. `1` and `1.2` are read as `1.0.0`
/// and `1.2.0`. Anything else that is not a semantic version is incompatible,
/// which forces a clean build.
pub fn is_compatible(stored: &str, current: &str) -> bool {
  match (parse(stored), parse(current)) {
    (Some(stored), Some(current)) => (stored.major, stored.minor) == (current.major, current.minor),
    _ => false,
  }
}

fn parse(version: &str) -> Option<Version> {
  let version = version.trim();
  if let Ok(parsed) = Version::parse(version) {
    return Some(parsed);
  }

  let padded = match version.split('.').count() {
    1 => format!("{version}.0.0"),
    2 => format!("{version}.0"),
    _ => return None,
  };
  Version::parse(&padded).ok()
}
