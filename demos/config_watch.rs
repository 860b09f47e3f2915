use serde_json::{json, Value};
use sovran_datastore::{SetOptions, Store, StoreError, CHANGED};
use tracing_subscriber::EnvFilter;

/// Demonstrates loading configuration into a store and reacting to reloads.
///
/// Run with `RUST_LOG=sovran_datastore=trace` to see the store's own tracing.
fn main() -> Result<(), StoreError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Store::create();

    // Audit every change
    config.on(CHANGED, |args| {
        if let [Some(Value::String(key)), value] = args {
            tracing::info!(key = %key, value = ?value, "config changed");
        }
        Ok(())
    })?;

    // Refuse to apply an unusable port
    config.on_key_changed("server.port", |port| match port {
        Some(Value::Number(n)) if n.as_u64().is_some_and(|p| p <= 65535) => Ok(()),
        None => Ok(()),
        other => Err(format!("invalid port {:?}", other).into()),
    })?;

    // The first load is silent: nothing has "changed" yet
    let defaults = json!({
        "server.host": "127.0.0.1",
        "server.port": 8080,
        "log.level": "info"
    });
    config.set_value(defaults, SetOptions::silent())?;

    // A reload only announces what differs
    let reload = json!({
        "server.host": "127.0.0.1",
        "server.port": 9090,
        "log.level": "debug"
    });
    config.set_value(reload, SetOptions::default())?;

    // A failing listener stops the batch; the bad entry and everything before it stay applied
    let broken = json!({
        "log.level": "trace",
        "server.port": 70000,
        "server.host": "0.0.0.0"
    });
    if let Err(e) = config.set_value(broken, SetOptions::default()) {
        tracing::warn!(error = %e, "reload rejected");
    }

    for key in config.keys()? {
        println!("{} = {}", key, config.get(&key)?.unwrap_or(Value::Null));
    }

    Ok(())
}
