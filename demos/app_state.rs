use serde_json::{json, Value};
use sovran_datastore::{SetOptions, Store, StoreError};

/// Demonstrates independent modules sharing application state through one store
fn main() -> Result<(), StoreError> {
    let app_state = Store::create();

    // Modules get their own handle to the same state
    let user_module = UserModule::new(app_state.clone());
    let stats_module = StatsModule::new(app_state.clone());
    let header = Header::attach(&app_state)?;

    user_module.add_user("alice")?;
    user_module.add_user("bob")?;
    user_module.add_user("bob")?; // already present, nothing changes

    stats_module.record_page_view("home")?;
    stats_module.record_page_view("profile")?;
    stats_module.record_page_view("home")?;

    // Reset counters without waking anyone up
    app_state.set("page_views", json!({}), SetOptions::silent())?;

    println!("\nHeader rendered {} times", header.renders()?);
    print_app_state(&app_state)?;

    Ok(())
}

struct UserModule {
    store: Store,
}

impl UserModule {
    fn new(store: Store) -> Self {
        Self { store }
    }

    fn add_user(&self, name: &str) -> Result<(), StoreError> {
        let mut users = self.store.get("users")?.unwrap_or_else(|| json!([]));
        if let Value::Array(list) = &mut users {
            if !list.iter().any(|u| u == name) {
                list.push(json!(name));
            }
        }
        self.store.set("users", users, SetOptions::default())
    }
}

struct StatsModule {
    store: Store,
}

impl StatsModule {
    fn new(store: Store) -> Self {
        Self { store }
    }

    fn record_page_view(&self, page: &str) -> Result<(), StoreError> {
        let mut views = self.store.get("page_views")?.unwrap_or_else(|| json!({}));
        let count = views[page].as_u64().unwrap_or(0);
        views[page] = json!(count + 1);
        self.store.set("page_views", views, SetOptions::default())
    }
}

/// Re-renders whenever the user list changes
struct Header {
    store: Store,
}

impl Header {
    fn attach(store: &Store) -> Result<Self, StoreError> {
        let renders = store.clone();
        store.on_key_changed("users", move |users| {
            let count = users.and_then(Value::as_array).map_or(0, Vec::len);
            println!("[header] {} user(s) online", count);
            let rendered = renders.get("header_renders")?.and_then(|v| v.as_u64()).unwrap_or(0);
            renders.set("header_renders", json!(rendered + 1), SetOptions::silent())?;
            Ok(())
        })?;
        Ok(Self { store: store.clone() })
    }

    fn renders(&self) -> Result<u64, StoreError> {
        Ok(self
            .store
            .get("header_renders")?
            .and_then(|v| v.as_u64())
            .unwrap_or(0))
    }
}

fn print_app_state(store: &Store) -> Result<(), StoreError> {
    println!("APPLICATION STATE:");
    println!("=================");
    for key in store.keys()? {
        if let Some(value) = store.get(&key)? {
            println!("{}: {}", key, value);
        }
    }
    Ok(())
}
