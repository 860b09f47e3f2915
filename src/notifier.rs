use crate::error::{ListenerError, StoreError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

type Listener<A> = Arc<dyn Fn(&A) -> Result<(), ListenerError> + Send + Sync>;

/// Handle identifying one registration, used to remove it again with [`Notifier::off`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Registration<A: ?Sized> {
    id: ListenerId,
    once: bool,
    listener: Listener<A>,
}

struct Registry<A: ?Sized> {
    next_id: u64,
    events: HashMap<String, Vec<Registration<A>>>,
}

/// A synchronous publish/subscribe dispatcher keyed by exact event name.
///
/// Listeners receive a shared reference to the emitted arguments and run on the
/// caller's thread, in registration order, before [`emit`](Notifier::emit)
/// returns. Each dispatch round works on a snapshot of the listener list, so
/// listeners may freely register, remove, or emit from inside a callback.
/// Changes made that way take effect from the next round, except that a
/// `once` listener removed or already fired mid-round is not invoked again.
///
/// # Examples
///
/// ```
/// use sovran_datastore::{Notifier, StoreError};
/// use std::sync::{Arc, Mutex};
///
/// let notifier = Notifier::<str>::new();
/// let log = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&log);
/// notifier.on("greet", move |name: &str| {
///     sink.lock().unwrap().push(format!("hello {}", name));
///     Ok(())
/// })?;
///
/// let sink = Arc::clone(&log);
/// notifier.once("greet", move |name: &str| {
///     sink.lock().unwrap().push(format!("first {}", name));
///     Ok(())
/// })?;
///
/// assert_eq!(notifier.emit("greet", "ada")?, 2);
/// assert_eq!(notifier.emit("greet", "bob")?, 1);
/// assert_eq!(
///     *log.lock().unwrap(),
///     vec!["hello ada", "first ada", "hello bob"]
/// );
/// # Ok::<(), StoreError>(())
/// ```
pub struct Notifier<A: ?Sized> {
    registry: Arc<Mutex<Registry<A>>>,
}

impl<A: ?Sized> Notifier<A> {
    /// Creates a notifier with no listeners
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                events: HashMap::new(),
            })),
        }
    }

    /// Registers a listener that fires on every emit of `name`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(&A) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(name.into(), false, Arc::new(listener))
    }

    /// Registers a listener that fires on the next emit of `name` only.
    ///
    /// The registration is removed right before the listener runs, so a
    /// re-entrant emit from inside the listener does not invoke it again. If an
    /// earlier listener fails the round, the registration stays in place.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> Result<ListenerId, StoreError>
    where
        F: Fn(&A) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(name.into(), true, Arc::new(listener))
    }

    fn register(
        &self,
        name: String,
        once: bool,
        listener: Listener<A>,
    ) -> Result<ListenerId, StoreError> {
        let mut registry = self.registry.lock().map_err(|_| StoreError::LockError)?;
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        trace!(event = %name, ?id, once, "listener registered");
        registry
            .events
            .entry(name)
            .or_default()
            .push(Registration { id, once, listener });
        Ok(id)
    }

    /// Removes a single registration
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` if the listener was registered under `name` and removed,
    /// `Ok(false)` otherwise.
    pub fn off(&self, name: &str, id: ListenerId) -> Result<bool, StoreError> {
        let mut registry = self.registry.lock().map_err(|_| StoreError::LockError)?;
        let Some(registrations) = registry.events.get_mut(name) else {
            return Ok(false);
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            registry.events.remove(name);
        }
        if removed {
            trace!(event = %name, ?id, "listener removed");
        }
        Ok(removed)
    }

    /// Removes every listener registered under `name`, returning how many there were
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn off_all(&self, name: &str) -> Result<usize, StoreError> {
        let mut registry = self.registry.lock().map_err(|_| StoreError::LockError)?;
        let removed = registry.events.remove(name).map_or(0, |r| r.len());
        trace!(event = %name, removed, "listeners cleared");
        Ok(removed)
    }

    /// Returns the number of listeners currently registered under `name`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn listener_count(&self, name: &str) -> Result<usize, StoreError> {
        let registry = self.registry.lock().map_err(|_| StoreError::LockError)?;
        Ok(registry.events.get(name).map_or(0, Vec::len))
    }

    /// Returns the names that currently have at least one listener, sorted
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockError` if the internal lock cannot be acquired.
    pub fn event_names(&self) -> Result<Vec<String>, StoreError> {
        let registry = self.registry.lock().map_err(|_| StoreError::LockError)?;
        let mut names: Vec<String> = registry.events.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Delivers `args` to every listener registered under `name`.
    ///
    /// Listeners run synchronously in registration order. The first listener
    /// to fail ends the round: its error is returned and the remaining
    /// listeners are not invoked.
    ///
    /// # Errors
    ///
    /// - Returns `StoreError::LockError` if the internal lock cannot be acquired
    /// - Returns `StoreError::Listener` if a listener returns an error
    ///
    /// # Returns
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, name: &str, args: &A) -> Result<usize, StoreError> {
        let snapshot: Vec<(ListenerId, bool, Listener<A>)> = {
            let registry = self.registry.lock().map_err(|_| StoreError::LockError)?;
            let Some(registrations) = registry.events.get(name) else {
                trace!(event = %name, "emit with no listeners");
                return Ok(0);
            };
            registrations
                .iter()
                .map(|r| (r.id, r.once, Arc::clone(&r.listener)))
                .collect()
        };

        debug!(event = %name, listeners = snapshot.len(), "emitting");
        let mut invoked = 0;
        for (id, once, listener) in &snapshot {
            // a once listener already consumed by a re-entrant emit is skipped
            if *once && !self.off(name, *id)? {
                continue;
            }
            invoked += 1;
            listener(args).map_err(|source| {
                debug!(event = %name, error = %source, "listener failed");
                StoreError::Listener {
                    event: name.to_string(),
                    source,
                }
            })?;
        }
        Ok(invoked)
    }
}

impl<A: ?Sized> Clone for Notifier<A> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<A: ?Sized> Default for Notifier<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> fmt::Debug for Notifier<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Notifier");
        match self.registry.lock() {
            Ok(registry) => {
                let counts: HashMap<&str, usize> = registry
                    .events
                    .iter()
                    .map(|(name, r)| (name.as_str(), r.len()))
                    .collect();
                out.field("listeners", &counts);
            }
            Err(_) => {
                out.field("listeners", &"<poisoned>");
            }
        }
        out.finish()
    }
}
