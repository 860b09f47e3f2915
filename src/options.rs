use serde::{Deserialize, Serialize};

/// Per-call options for [`Store::set`](crate::Store::set) and friends.
///
/// Missing fields take their defaults when deserialized, so an empty
/// object `{}` is the same as `SetOptions::default()`.
///
/// ```
/// use sovran_datastore::SetOptions;
///
/// let opts: SetOptions = serde_json::from_str(r#"{ "silent": true }"#).unwrap();
/// assert_eq!(opts, SetOptions::silent());
///
/// let opts: SetOptions = serde_json::from_str("{}").unwrap();
/// assert!(!opts.silent);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetOptions {
    /// Suppress change notifications for this call
    pub silent: bool,
}

impl SetOptions {
    /// Options that store the value without emitting any events
    pub fn silent() -> Self {
        Self { silent: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_loud() {
        assert!(!SetOptions::default().silent);
        assert!(SetOptions::silent().silent);
    }

    #[test]
    fn test_round_trips_through_json() {
        let json = serde_json::to_string(&SetOptions::silent()).unwrap();
        assert_eq!(json, r#"{"silent":true}"#);

        let parsed: SetOptions = serde_json::from_str(r#"{"silent":false,"other":1}"#).unwrap();
        assert_eq!(parsed, SetOptions::default());
    }
}
