use crate::error::{ListenerError, StoreError};
use crate::notifier::{ListenerId, Notifier};
use crate::options::SetOptions;
use parking_lot::ReentrantMutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Name of the event emitted for every change, with arguments `[key, value]`
pub const CHANGED: &str = "changed";

/// Arguments carried by store events.
///
/// `None` stands for an absent value, i.e. a key that was deleted.
pub type Args = [Option<Value>];

/// Returns the name of the key-scoped change event, `"changed::" + key`.
///
/// Listeners on this event receive `[value]`.
pub fn changed_event(key: &str) -> String {
    format!("{}::{}", CHANGED, key)
}

/// An in-memory key/value store that announces its changes.
///
/// Values are [`serde_json::Value`] trees. Everything that crosses the store
/// boundary is an independent copy: [`set`](Store::set) keeps its own copy,
/// [`get`](Store::get) hands out a fresh one on every call, and each emitted
/// event carries yet another. A write that leaves the value structurally
/// unchanged is a no-op and emits nothing.
///
/// `Store` is a handle; clones share the same data and listeners. Writes are
/// serialized per store: a `set` holds a re-entrant writer lock from the
/// comparison through the last listener, so listeners observe changes in the
/// order they were stored. Listeners may still call `set` on the same store.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sovran_datastore::{SetOptions, Store, StoreError};
/// use std::sync::{Arc, Mutex};
///
/// let store = Store::create();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// store.on_changed(move |key, value| {
///     sink.lock().unwrap().push((key.to_string(), value.cloned()));
///     Ok(())
/// })?;
///
/// store.set("user", json!({ "name": "ada" }), SetOptions::default())?;
/// store.set("user", json!({ "name": "ada" }), SetOptions::default())?;
/// store.unset("user", SetOptions::default())?;
///
/// assert_eq!(
///     *seen.lock().unwrap(),
///     vec![
///         ("user".to_string(), Some(json!({ "name": "ada" }))),
///         ("user".to_string(), None),
///     ]
/// );
/// # Ok::<(), StoreError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Store {
    data: Arc<Mutex<HashMap<String, Value>>>,
    writer: Arc<ReentrantMutex<()>>,
    events: Notifier<Args>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            writer: Arc::new(ReentrantMutex::new(())),
            events: Notifier::new(),
        }
    }
}

impl Store {
    /// Creates a new, empty store with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty store with no listeners; alias of [`Store::new`]
    pub fn create() -> Self {
        Self::new()
    }

    /// Retrieves a copy of the value stored under `key`.
    ///
    /// Returns `Ok(None)` for keys that were never set or have been deleted.
    /// Every call returns a new copy, so mutating the result never affects the
    /// store or any other caller.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::LockError)?;
        Ok(data.get(key).cloned())
    }

    /// Stores `value` under `key`, or deletes the key when `value` is `None`.
    ///
    /// If the new value is structurally equal to the current one (absent and
    /// absent count as equal, and numbers compare by numeric value, so `1`
    /// equals `1.0`) nothing happens at all. Otherwise the value is
    /// stored and, unless `options.silent` is set, two events are emitted
    /// before this call returns:
    ///
    /// - [`CHANGED`] with `[Some(key), value]`
    /// - [`changed_event(key)`](changed_event) with `[value]`
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::{json, Value};
    /// use sovran_datastore::{SetOptions, Store};
    ///
    /// let store = Store::create();
    /// store.set("tags", json!(["a", "b"]), SetOptions::default())?;
    /// assert_eq!(store.get("tags")?, Some(json!(["a", "b"])));
    ///
    /// // An absent value deletes the key
    /// store.set("tags", None::<Value>, SetOptions::default())?;
    /// assert_eq!(store.get("tags")?, None);
    /// # Ok::<(), sovran_datastore::StoreError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// - Returns `StoreError::LockError` if an internal lock cannot be acquired
    /// - Returns `StoreError::Listener` if a listener fails; the value stays stored
    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<Option<Value>>,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        let key = key.into();
        let value = value.into();
        let _writer = self.writer.lock();

        {
            let mut data = self.data.lock().map_err(|_| StoreError::LockError)?;
            if same_value(data.get(&key), value.as_ref()) {
                trace!(key = %key, "value unchanged");
                return Ok(());
            }
            match &value {
                Some(v) => {
                    data.insert(key.clone(), v.clone());
                }
                None => {
                    data.remove(&key);
                }
            }
        }

        if options.silent {
            trace!(key = %key, "value stored silently");
            return Ok(());
        }

        trace!(key = %key, deleted = value.is_none(), "value stored");
        self.events
            .emit(CHANGED, &[Some(Value::String(key.clone())), value.clone()])?;
        self.events.emit(&changed_event(&key), &[value])?;
        Ok(())
    }

    /// Deletes `key`; shorthand for setting it to `None`
    ///
    /// # Errors
    ///
    /// Same as [`Store::set`].
    pub fn unset(&self, key: impl Into<String>, options: SetOptions) -> Result<(), StoreError> {
        self.set(key, None::<Value>, options)
    }

    /// Sets several keys, one [`set`](Store::set) per entry in iteration order.
    ///
    /// This is not a transaction. Each entry is compared and announced on its
    /// own, and if an entry fails the entries before it stay applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use sovran_datastore::{SetOptions, Store};
    ///
    /// let store = Store::create();
    /// store.set_many([("a", json!(1)), ("b", json!(2))], SetOptions::default())?;
    /// assert_eq!(store.get("a")?, Some(json!(1)));
    /// assert_eq!(store.get("b")?, Some(json!(2)));
    /// # Ok::<(), sovran_datastore::StoreError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an individual [`set`](Store::set).
    pub fn set_many<I, K, V>(&self, bag: I, options: SetOptions) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Option<Value>>,
    {
        for (key, value) in bag {
            self.set(key, value, options)?;
        }
        Ok(())
    }

    /// Applies a JSON object as a batch of key/value pairs.
    ///
    /// Each member of the object goes through [`set`](Store::set) in document
    /// order. Any other JSON value is rejected.
    ///
    /// # Errors
    ///
    /// - Returns `StoreError::NotAnObject` if `bag` is not a JSON object
    /// - Otherwise the same as [`Store::set_many`]
    pub fn set_value(&self, bag: Value, options: SetOptions) -> Result<(), StoreError> {
        match bag {
            Value::Object(entries) => self.set_many(entries, options),
            other => Err(StoreError::NotAnObject(json_type(&other).to_string())),
        }
    }

    /// Returns true if a value is stored under `key`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn contains_key(&self, key: &str) -> Result<bool, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::LockError)?;
        Ok(data.contains_key(key))
    }

    /// Returns all stored keys, sorted
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::LockError)?;
        let mut keys: Vec<String> = data.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Returns the number of stored keys
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn len(&self) -> Result<usize, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::LockError)?;
        Ok(data.len())
    }

    /// Returns true if nothing is stored
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::LockError)?;
        Ok(data.is_empty())
    }

    /// Returns the notifier the store emits on
    pub fn notifier(&self) -> &Notifier<Args> {
        &self.events
    }

    /// See [`Notifier::on`]
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(&Args) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.events.on(name, listener)
    }

    /// See [`Notifier::once`]
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(&Args) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.events.once(name, listener)
    }

    /// See [`Notifier::off`]
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn off(&self, name: &str, id: ListenerId) -> Result<bool, StoreError> {
        self.events.off(name, id)
    }

    /// See [`Notifier::off_all`]
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn off_all(&self, name: &str) -> Result<usize, StoreError> {
        self.events.off_all(name)
    }

    /// See [`Notifier::emit`]
    ///
    /// # Errors
    ///
    /// - Returns `StoreError::LockError` if the internal lock cannot be acquired
    /// - Returns `StoreError::Listener` if a listener returns an error
    pub fn emit(&self, name: &str, args: &Args) -> Result<usize, StoreError> {
        self.events.emit(name, args)
    }

    /// See [`Notifier::listener_count`]
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn listener_count(&self, name: &str) -> Result<usize, StoreError> {
        self.events.listener_count(name)
    }

    /// Listens to [`CHANGED`] with the arguments unpacked into key and value
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn on_changed<F>(&self, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(&str, Option<&Value>) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.events.on(CHANGED, move |args: &Args| match args.first() {
            Some(Some(Value::String(key))) => {
                listener(key.as_str(), args.get(1).and_then(Option::as_ref))
            }
            _ => Ok(()),
        })
    }

    /// Listens to changes of a single key
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn on_key_changed<F>(&self, key: &str, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(Option<&Value>) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.events.on(changed_event(key), move |args: &Args| {
            listener(args.first().and_then(Option::as_ref))
        })
    }
}

fn same_value(current: Option<&Value>, next: Option<&Value>) -> bool {
    match (current, next) {
        (None, None) => true,
        (Some(a), Some(b)) => json_eq(a, b),
        _ => false,
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y || matches!((x.as_f64(), y.as_f64()), (Some(l), Some(r)) if l == r)
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_eq(x, y)))
        }
        _ => a == b,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter(store: &Store, name: &str) -> Arc<Mutex<usize>> {
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        store
            .on(name, move |_| {
                *sink.lock().unwrap() += 1;
                Ok(())
            })
            .unwrap();
        count
    }

    #[test]
    fn test_changed_event_name() {
        assert_eq!(changed_event("foo"), "changed::foo");
        assert_eq!(changed_event(""), "changed::");
    }

    #[test]
    fn test_null_is_not_absent() -> Result<(), StoreError> {
        let store = Store::new();
        let changes = counter(&store, CHANGED);

        store.set("foo", Value::Null, SetOptions::default())?;
        assert_eq!(store.get("foo")?, Some(Value::Null));
        assert!(store.contains_key("foo")?);

        store.unset("foo", SetOptions::default())?;
        assert_eq!(store.get("foo")?, None);
        assert!(!store.contains_key("foo")?);

        assert_eq!(*changes.lock().unwrap(), 2);
        Ok(())
    }

    #[test]
    fn test_unset_missing_key_is_silent_noop() -> Result<(), StoreError> {
        let store = Store::new();
        let changes = counter(&store, CHANGED);

        store.unset("never", SetOptions::default())?;
        assert_eq!(*changes.lock().unwrap(), 0);
        assert!(store.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_changed_payload_shape() -> Result<(), StoreError> {
        let store = Store::new();
        let global = Arc::new(Mutex::new(Vec::new()));
        let scoped = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&global);
        store.on(CHANGED, move |args: &Args| {
            sink.lock().unwrap().push(args.to_vec());
            Ok(())
        })?;
        let sink = Arc::clone(&scoped);
        store.on("changed::foo", move |args: &Args| {
            sink.lock().unwrap().push(args.to_vec());
            Ok(())
        })?;

        store.set("foo", json!({ "bar": "baz" }), SetOptions::default())?;

        assert_eq!(
            *global.lock().unwrap(),
            vec![vec![Some(json!("foo")), Some(json!({ "bar": "baz" }))]]
        );
        assert_eq!(
            *scoped.lock().unwrap(),
            vec![vec![Some(json!({ "bar": "baz" }))]]
        );
        Ok(())
    }

    #[test]
    fn test_silent_still_stores() -> Result<(), StoreError> {
        let store = Store::new();
        let changes = counter(&store, CHANGED);
        let scoped = counter(&store, "changed::foo");

        store.set("foo", json!("bar"), SetOptions::silent())?;

        assert_eq!(store.get("foo")?, Some(json!("bar")));
        assert_eq!(*changes.lock().unwrap(), 0);
        assert_eq!(*scoped.lock().unwrap(), 0);
        Ok(())
    }

    #[test]
    fn test_set_value_rejects_non_objects() {
        let store = Store::new();

        match store.set_value(json!([1, 2]), SetOptions::default()) {
            Err(StoreError::NotAnObject(kind)) => assert_eq!(kind, "array"),
            other => panic!("Should have gotten NotAnObject, got {:?}", other),
        }
        match store.set_value(json!("foo"), SetOptions::default()) {
            Err(StoreError::NotAnObject(kind)) => assert_eq!(kind, "string"),
            other => panic!("Should have gotten NotAnObject, got {:?}", other),
        }
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_listener_failure_keeps_value() {
        let store = Store::new();
        store.on_key_changed("foo", |_| Err("rejected".into())).unwrap();

        let result = store.set("foo", json!(1), SetOptions::default());
        assert!(matches!(
            result,
            Err(StoreError::Listener { ref event, .. }) if event == "changed::foo"
        ));
        assert_eq!(store.get("foo").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_clones_share_state() -> Result<(), StoreError> {
        let store = Store::new();
        let other = store.clone();
        let changes = counter(&other, CHANGED);

        store.set("foo", json!(true), SetOptions::default())?;

        assert_eq!(other.get("foo")?, Some(json!(true)));
        assert_eq!(*changes.lock().unwrap(), 1);
        Ok(())
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(json_eq(&json!({ "a": [1, 2.5] }), &json!({ "a": [1.0, 2.5] })));
        assert!(!json_eq(&json!(1), &json!(1.5)));
        assert!(!json_eq(&json!(1), &json!("1")));
        assert!(!json_eq(&json!([1]), &json!([1, 1])));
        assert!(!json_eq(&json!({ "a": 1 }), &json!({ "b": 1 })));
        assert!(same_value(None, None));
        assert!(!same_value(None, Some(&Value::Null)));
    }

    #[test]
    fn test_integer_over_equal_float_is_unchanged() -> Result<(), StoreError> {
        let store = Store::new();
        let changes = counter(&store, CHANGED);

        store.set("foo", json!(1), SetOptions::default())?;
        store.set("foo", json!(1.0), SetOptions::default())?;

        assert_eq!(*changes.lock().unwrap(), 1);
        assert_eq!(store.get("foo")?, Some(json!(1)));
        Ok(())
    }
}
