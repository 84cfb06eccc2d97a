// src/materialize.rs

//! Turning configuration values into the JSON files a tap is invoked with.
//!
//! A tap only understands file arguments (`-c config.json`, `--state
//! state.json`, ...). Inputs may arrive as a structured mapping, as inline
//! JSON text, or as a path to a file that already exists:
//!
//! | value                     | result                                  |
//! |---------------------------|-----------------------------------------|
//! | absent / `null` / `""`    | no path, no I/O                         |
//! | object                    | serialized into `dest`, returns `dest`  |
//! | string starting with `{`  | written verbatim to `dest`              |
//! | any other string          | returned unchanged (existing file path) |
//! | anything else             | [`DriverError::UnrecognizedShape`]      |

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{DriverError, Result};
use crate::fs::FileSystem;

/// Materialize `value` as a JSON file at `dest` when needed.
///
/// Returns `Ok(None)` when the value is absent.
pub fn materialize(
    fs: &dyn FileSystem,
    dest: &Path,
    value: Option<&Value>,
) -> Result<Option<PathBuf>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => {
            let payload = serde_json::to_vec(map)?;
            fs.write(dest, &payload)?;
            debug!(path = %dest.display(), "materialized JSON mapping");
            Ok(Some(dest.to_path_buf()))
        }
        Some(Value::String(s)) => materialize_str(fs, dest, s),
        Some(_) => Err(DriverError::UnrecognizedShape),
    }
}

/// String-only variant, used for per-run state overrides.
pub fn materialize_str(fs: &dyn FileSystem, dest: &Path, value: &str) -> Result<Option<PathBuf>> {
    if value.is_empty() {
        return Ok(None);
    }

    if value.starts_with('{') {
        fs.write(dest, value.as_bytes())?;
        debug!(path = %dest.display(), "materialized inline JSON");
        return Ok(Some(dest.to_path_buf()));
    }

    // already a file
    Ok(Some(PathBuf::from(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use serde_json::json;

    #[test]
    fn absent_value_has_no_side_effect() {
        let fs = MockFileSystem::new();
        let dest = Path::new("/root/config.json");

        assert_eq!(materialize(&fs, dest, None).unwrap(), None);
        assert_eq!(materialize(&fs, dest, Some(&Value::Null)).unwrap(), None);
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn mapping_is_serialized_to_dest() {
        let fs = MockFileSystem::new();
        let dest = Path::new("/root/config.json");
        let value = json!({"key": "v", "nested": {"n": 1}});

        let path = materialize(&fs, dest, Some(&value)).unwrap();

        assert_eq!(path.as_deref(), Some(dest));
        let written: Value = serde_json::from_slice(&fs.contents(dest).unwrap()).unwrap();
        assert_eq!(written, value);
    }

    #[test]
    fn inline_json_string_is_written_verbatim() {
        let fs = MockFileSystem::new();
        let dest = Path::new("/root/state.json");
        let raw = r#"{"bookmark":1}"#;

        let path = materialize(&fs, dest, Some(&json!(raw))).unwrap();

        assert_eq!(path.as_deref(), Some(dest));
        assert_eq!(fs.contents(dest).unwrap(), raw.as_bytes());
    }

    #[test]
    fn plain_string_passes_through_as_path() {
        let fs = MockFileSystem::new();
        let dest = Path::new("/root/catalog.json");

        let path = materialize(&fs, dest, Some(&json!("/etc/taps/catalog.json"))).unwrap();

        assert_eq!(path, Some(PathBuf::from("/etc/taps/catalog.json")));
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn other_shapes_are_rejected() {
        let fs = MockFileSystem::new();
        let dest = Path::new("/root/config.json");

        for value in [json!(42), json!(true), json!(["a"])] {
            let err = materialize(&fs, dest, Some(&value)).unwrap_err();
            assert!(matches!(err, DriverError::UnrecognizedShape), "got {err:?}");
        }
    }

    #[test]
    fn write_failure_is_reported() {
        let fs = MockFileSystem::new();
        fs.set_read_only(true);

        let err =
            materialize(&fs, Path::new("/root/config.json"), Some(&json!({"a": 1}))).unwrap_err();
        assert!(matches!(err, DriverError::Other(_)), "got {err:?}");
    }
}
