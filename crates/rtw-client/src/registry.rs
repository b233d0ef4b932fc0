//! Listener registry and dispatch.
//!
//! One registry per polling session. It owns a slot per declared field
//! (current value plus on-change callback), a wildcard callback receiving
//! each record's full field map, and per-channel subscriber lists keyed by
//! lower-cased field name.
//!
//! Registration and subscription may happen concurrently with dispatch:
//! callbacks are cloned out of the maps before being invoked, so a
//! listener added mid-dispatch simply starts seeing records from the next
//! one onward.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rtw_core::record::Record;
use tracing::trace;

use crate::error::{ClientError, ClientResult};

/// Callback invoked with a field's new raw value.
pub type ValueCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked once per record with its field → value map.
pub type RecordCallback = Arc<dyn Fn(&HashMap<String, String>) + Send + Sync>;

/// Handle identifying one channel subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// State kept per declared field.
#[derive(Default)]
struct FieldSlot {
    last_value: Option<String>,
    on_change: Option<ValueCallback>,
}

/// Per-session listener state. See the module docs.
#[derive(Default)]
pub struct ListenerRegistry {
    fields: RwLock<HashMap<String, FieldSlot>>,
    wildcard: RwLock<Option<RecordCallback>>,
    channels: RwLock<HashMap<String, Vec<(SubscriptionId, ValueCallback)>>>,
    next_subscription: AtomicU64,
}

impl ListenerRegistry {
    /// Create a registry with one empty slot per declared field.
    #[must_use]
    pub fn new(expected_fields: &[String]) -> Self {
        let registry = Self::default();
        {
            let mut fields = registry.fields.write();
            for name in expected_fields {
                let _ = fields.entry(name.clone()).or_default();
            }
        }
        registry
    }

    /// Bind the on-change callback for a declared field.
    ///
    /// Replaces any prior binding for that field. Fails with
    /// [`ClientError::UnknownField`] when the name was never declared;
    /// the wildcard has its own entry point, [`register_wildcard`].
    ///
    /// [`register_wildcard`]: Self::register_wildcard
    pub fn register<F>(&self, name: &str, callback: F) -> ClientResult<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut fields = self.fields.write();
        match fields.get_mut(name) {
            Some(slot) => {
                slot.on_change = Some(Arc::new(callback));
                Ok(())
            }
            None => Err(ClientError::UnknownField { name: name.into() }),
        }
    }

    /// Bind the wildcard callback, replacing any prior one.
    ///
    /// It fires exactly once per dispatched record with the map of fields
    /// present in that record — possibly empty.
    pub fn register_wildcard<F>(&self, callback: F)
    where
        F: Fn(&HashMap<String, String>) + Send + Sync + 'static,
    {
        *self.wildcard.write() = Some(Arc::new(callback));
    }

    /// Append a subscriber to a channel. Channel names are lower-cased.
    pub fn subscribe_channel<F>(&self, channel: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.channels
            .write()
            .entry(channel.to_lowercase())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove one subscriber from a channel.
    ///
    /// Removing a subscription that is not present (or a channel that was
    /// never subscribed) is a no-op.
    pub fn unsubscribe_channel(&self, channel: &str, id: SubscriptionId) {
        if let Some(subscribers) = self.channels.write().get_mut(&channel.to_lowercase()) {
            subscribers.retain(|(subscription, _)| *subscription != id);
        }
    }

    /// Last dispatched value of a declared field, if any.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<String> {
        self.fields.read().get(name)?.last_value.clone()
    }

    /// Whether a field was declared at construction.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.read().contains_key(name)
    }

    /// Dispatch one record to every interested listener.
    ///
    /// For each declared field present: the value is stored, its on-change
    /// callback fires, and channel subscribers under the lower-cased name
    /// fire in registration order unless the value is empty. Fields never
    /// declared are silently ignored. The wildcard fires last, once, with
    /// the map of declared fields seen in this record.
    pub fn update(&self, record: &Record) {
        let mut seen: HashMap<String, String> = HashMap::new();

        for (name, value) in record.iter() {
            let on_change = {
                let mut fields = self.fields.write();
                match fields.get_mut(name) {
                    Some(slot) => {
                        slot.last_value = Some(value.to_string());
                        slot.on_change.clone()
                    }
                    None => {
                        trace!(field = name, "ignoring undeclared field");
                        continue;
                    }
                }
            };
            let _ = seen.insert(name.to_string(), value.to_string());

            if let Some(callback) = on_change {
                callback(value);
            }

            if !value.is_empty() {
                let subscribers: Vec<ValueCallback> = self
                    .channels
                    .read()
                    .get(&name.to_lowercase())
                    .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
                    .unwrap_or_default();
                for callback in subscribers {
                    callback(value);
                }
            }
        }

        let wildcard = self.wildcard.read().clone();
        if let Some(callback) = wildcard {
            callback(&seen);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
