use std::collections::BTreeMap;
use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kvsync_encoding::{
    delete_key_object, prefix_collision, update_key_object, EncodingError, Format,
    SharedObject,
};
use kvsync_kvs::{ChangeSource, Update};

use crate::config::{CallbackErrorPolicy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::event::ChangeEvent;

/// Error type callbacks may return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Called with the event of every change applied to a synchronized object.
///
/// The object stays locked while the callback runs.
pub type SyncCallback = Box<dyn FnMut(&ChangeEvent<'_>) -> Result<(), CallbackError> + Send>;

/// Identifies one synchronized object within a router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistrationId(u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An object kept in sync with the keys under `format`.
pub struct SyncObject {
    pub format: String,
    pub object: SharedObject,
    pub callback: SyncCallback,
}

impl SyncObject {
    pub fn new<F>(format: impl Into<String>, object: SharedObject, callback: F) -> Self
    where
        F: FnMut(&ChangeEvent<'_>) -> Result<(), CallbackError> + Send + 'static,
    {
        Self {
            format: format.into(),
            object,
            callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for SyncObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncObject")
            .field("format", &self.format)
            .field("object", &self.object)
            .finish_non_exhaustive()
    }
}

/// Routes the changes of a key-value store to the synchronized objects
/// whose key space they fall in.
///
/// Key spaces of synchronized objects never overlap. Updates are consumed
/// one at a time by [`SyncRouter::next`].
pub struct SyncRouter<S> {
    source: S,
    config: SyncConfig,
    objects: BTreeMap<RegistrationId, SyncObject>,
    next_id: u64,
}

impl<S: ChangeSource> SyncRouter<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, SyncConfig::default())
    }

    pub fn with_config(source: S, config: SyncConfig) -> Self {
        Self {
            source,
            config,
            objects: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of synchronized objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Formats of the synchronized objects, in registration order.
    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.objects.values().map(|o| o.format.as_str())
    }

    /// Starts synchronizing an object.
    ///
    /// Fails with [`SyncError::Overlap`] if the key space of the object
    /// overlaps the key space of an object already synchronized.
    pub fn sync_object(&mut self, object: SyncObject) -> SyncResult<RegistrationId> {
        let format = Format::parse(&object.format);
        if let Some(existing) = self
            .objects
            .values()
            .find(|o| prefix_collision(&format, &Format::parse(&o.format)))
        {
            return Err(SyncError::Overlap {
                format: object.format,
                existing: existing.format.clone(),
            });
        }

        let id = RegistrationId(self.next_id);
        self.next_id += 1;
        info!(%id, format = %object.format, "Synchronizing object");
        self.objects.insert(id, object);
        Ok(id)
    }

    /// Stops synchronizing the object registered with exactly `format`.
    pub fn unsync_object(&mut self, format: &str) -> SyncResult<SyncObject> {
        let id = self
            .objects
            .iter()
            .find(|(_, o)| o.format == format)
            .map(|(id, _)| *id);
        let (id, object) = id
            .and_then(|id| self.objects.remove_entry(&id))
            .ok_or_else(|| SyncError::NotRegistered(format.to_string()))?;
        info!(%id, format, "Stopped synchronizing object");
        Ok(object)
    }

    /// Waits for the next change of the store and applies it.
    ///
    /// A deletion is routed to the first object holding a map entry at the
    /// deleted key. Any other change, including the deletion of a plain
    /// field, which resets it to its zero value, is applied to every object
    /// whose key space contains the key. Changes that concern no object are
    /// consumed silently.
    pub async fn next(&mut self, cancel: &CancellationToken) -> SyncResult<()> {
        let update = self.source.next(cancel).await?;
        debug!(key = %update.key, deletion = update.is_deletion(), "Routing update");

        if update.is_deletion() {
            if let Some(failures) = self.route_deletion(&update)? {
                return self.settle(failures);
            }
        }

        let value = update.value.as_deref().unwrap_or("");
        let mut failures = Vec::new();
        for (id, registration) in self.objects.iter_mut() {
            let mut guard = registration.object.lock()?;
            let descriptor = registration.object.descriptor();
            let fields = match update_key_object(
                &mut guard,
                descriptor,
                &registration.format,
                &update.key,
                value,
                self.config.ignore_unmarshal_failure,
            ) {
                Ok(fields) => fields,
                Err(error) => {
                    debug!(%id, key = %update.key, %error, "Update does not apply");
                    continue;
                }
            };
            let event = ChangeEvent::new(&guard, descriptor, &fields);
            if let Err(error) = (registration.callback)(&event) {
                failures.push((*id, error));
            }
        }
        self.settle(failures)
    }

    /// Removes the map entry at the deleted key from the first object that
    /// has one. Returns `None` when no object holds such an entry.
    fn route_deletion(
        &mut self,
        update: &Update,
    ) -> SyncResult<Option<Vec<(RegistrationId, CallbackError)>>> {
        let key = match update.key.strip_suffix('/') {
            Some(stripped) if self.config.strip_trailing_slash => stripped,
            _ => update.key.as_str(),
        };
        for (id, registration) in self.objects.iter_mut() {
            let mut guard = registration.object.lock()?;
            let descriptor = registration.object.descriptor();
            let fields = match delete_key_object(&mut guard, descriptor, &registration.format, key)
            {
                Ok(fields) => fields,
                Err(EncodingError::ObjectNotFound) => {
                    return Err(EncodingError::ObjectNotFound.into())
                }
                Err(error) => {
                    debug!(%id, key, %error, "Deletion does not apply");
                    continue;
                }
            };
            let event = ChangeEvent::new(&guard, descriptor, &fields);
            let failures = (registration.callback)(&event)
                .err()
                .map(|e| (*id, e))
                .into_iter()
                .collect();
            return Ok(Some(failures));
        }
        Ok(None)
    }

    fn settle(&self, failures: Vec<(RegistrationId, CallbackError)>) -> SyncResult<()> {
        match self.config.callback_errors {
            CallbackErrorPolicy::Surface => match failures.into_iter().next() {
                Some((id, error)) => Err(SyncError::Callback {
                    id,
                    message: error.to_string(),
                }),
                None => Ok(()),
            },
            CallbackErrorPolicy::Log => {
                for (id, error) in failures {
                    warn!(%id, %error, "Callback failed");
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvsync_encoding::{Describe, Descriptor, StructDescriptor};
    use kvsync_kvs::{MemoryKvs, Store};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct Leaf;

    impl Describe for Leaf {
        fn describe() -> Descriptor {
            StructDescriptor::new("Leaf")
                .field::<i64>("A")
                .field_with_format::<HashMap<String, i64>>("M", "m/{key}")
                .build()
        }
    }

    fn noop(format: &str) -> SyncObject {
        SyncObject::new(format, SharedObject::zeroed::<Leaf>(), |_| Ok(()))
    }

    fn recording(format: &str, log: &Arc<Mutex<Vec<String>>>) -> (SharedObject, SyncObject) {
        let object = SharedObject::zeroed::<Leaf>();
        let log = Arc::clone(log);
        let sync = SyncObject::new(format, object.clone(), move |event| {
            let mut log = log.lock().unwrap();
            if let Ok(a) = event.field("A").as_int() {
                log.push(format!("A={a}"));
            }
            let mut key = String::new();
            let entry = event.field("M").map_value_with_key(&mut key);
            if entry.is_deleted() {
                log.push(format!("deleted {key}"));
            } else if let Ok(v) = entry.as_int() {
                log.push(format!("{key}={v}"));
            }
            Ok(())
        });
        (object, sync)
    }

    #[test]
    fn overlapping_formats_are_rejected() {
        let mut router = SyncRouter::new(MemoryKvs::new());
        router.sync_object(noop("/a/")).unwrap();
        assert!(matches!(
            router.sync_object(noop("/a/b/")),
            Err(SyncError::Overlap { .. })
        ));
        router.sync_object(noop("/b/")).unwrap();
        assert_eq!(router.formats().collect::<Vec<_>>(), vec!["/a/", "/b/"]);

        router.unsync_object("/a/").unwrap();
        router.sync_object(noop("/a/")).unwrap();
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn rooted_and_unrooted_formats_overlap() {
        let kvs = Arc::new(MemoryKvs::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut router = SyncRouter::new(Arc::clone(&kvs));
        let (_, rooted) = recording("/a/", &log);
        router.sync_object(rooted).unwrap();
        assert!(matches!(
            router.sync_object(noop("a/")),
            Err(SyncError::Overlap { .. })
        ));
        assert!(matches!(
            router.sync_object(noop("a/m/")),
            Err(SyncError::Overlap { .. })
        ));

        kvs.set("/a/A", "4").await.unwrap();
        router.next(&CancellationToken::new()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["A=4".to_string()]);
    }

    #[test]
    fn unsync_requires_exact_format() {
        let mut router = SyncRouter::new(MemoryKvs::new());
        router.sync_object(noop("/test/key")).unwrap();
        router.sync_object(noop("/test/key2")).unwrap();
        assert!(matches!(
            router.unsync_object("/test/"),
            Err(SyncError::NotRegistered(_))
        ));
        router.unsync_object("/test/key").unwrap();
        assert!(matches!(
            router.unsync_object("/test/key"),
            Err(SyncError::NotRegistered(_))
        ));
        router.unsync_object("/test/key2").unwrap();
        assert!(router.is_empty());
    }

    #[tokio::test]
    async fn routes_to_matching_object_only() {
        let kvs = Arc::new(MemoryKvs::new());
        let log_x = Arc::new(Mutex::new(Vec::new()));
        let log_y = Arc::new(Mutex::new(Vec::new()));
        let mut router = SyncRouter::new(Arc::clone(&kvs));
        let (x, sync_x) = recording("/x/", &log_x);
        let (_, sync_y) = recording("/y/", &log_y);
        router.sync_object(sync_x).unwrap();
        router.sync_object(sync_y).unwrap();

        let cancel = CancellationToken::new();
        kvs.set("/x/A", "4").await.unwrap();
        kvs.set("/x/m/k", "9").await.unwrap();
        kvs.set("/elsewhere", "1").await.unwrap();
        for _ in 0..3 {
            router.next(&cancel).await.unwrap();
        }

        assert_eq!(*log_x.lock().unwrap(), vec!["A=4", "k=9"]);
        assert!(log_y.lock().unwrap().is_empty());
        assert_eq!(x.lock().unwrap()["M"]["k"], 9);
    }

    #[tokio::test]
    async fn deletions_remove_map_entries() {
        let kvs = Arc::new(MemoryKvs::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut router = SyncRouter::new(Arc::clone(&kvs));
        let (object, sync) = recording("/x/", &log);
        router.sync_object(sync).unwrap();

        let cancel = CancellationToken::new();
        kvs.set("/x/m/k", "1").await.unwrap();
        kvs.set("/x/m/j", "2").await.unwrap();
        kvs.set("/x/A", "3").await.unwrap();
        kvs.delete("/x/m/k").await.unwrap();
        kvs.delete("/x/A").await.unwrap();
        for _ in 0..5 {
            router.next(&cancel).await.unwrap();
        }

        assert_eq!(
            *log.lock().unwrap(),
            vec!["k=1", "j=2", "A=3", "deleted k", "A=0"]
        );
        let value = object.lock().unwrap().clone();
        assert_eq!(value["M"], serde_json::json!({"j": 2}));
        assert_eq!(value["A"], 0);
    }

    #[tokio::test]
    async fn deleting_a_missing_entry_is_an_error() {
        let kvs = Arc::new(MemoryKvs::new());
        let mut router = SyncRouter::new(Arc::clone(&kvs));
        let object = SharedObject::zeroed::<Leaf>();
        router
            .sync_object(SyncObject::new("/x/", object.clone(), |_| Ok(())))
            .unwrap();

        let cancel = CancellationToken::new();
        kvs.set("/x/m/k", "1").await.unwrap();
        kvs.delete("/x/m/k").await.unwrap();
        router.next(&cancel).await.unwrap();

        object.lock().unwrap()["M"] = serde_json::json!({});
        assert!(matches!(
            router.next(&cancel).await,
            Err(SyncError::Encoding(EncodingError::ObjectNotFound))
        ));
    }

    #[tokio::test]
    async fn callback_errors_follow_policy() {
        let kvs = Arc::new(MemoryKvs::new());
        let failing = || {
            SyncObject::new("/x/", SharedObject::zeroed::<Leaf>(), |_| {
                Err("callback refused".into())
            })
        };
        let cancel = CancellationToken::new();

        let mut router = SyncRouter::new(Arc::clone(&kvs));
        router.sync_object(failing()).unwrap();
        kvs.set("/x/A", "1").await.unwrap();
        assert!(matches!(
            router.next(&cancel).await,
            Err(SyncError::Callback { .. })
        ));

        let config = SyncConfig {
            callback_errors: CallbackErrorPolicy::Log,
            ..SyncConfig::default()
        };
        let mut router = SyncRouter::with_config(Arc::clone(&kvs), config);
        router.sync_object(failing()).unwrap();
        kvs.set("/x/A", "2").await.unwrap();
        router.next(&cancel).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_values_follow_config() {
        let kvs = Arc::new(MemoryKvs::new());
        let cancel = CancellationToken::new();
        let object = SharedObject::zeroed::<Leaf>();
        object.lock().unwrap()["A"] = serde_json::json!(7);

        let config = SyncConfig {
            ignore_unmarshal_failure: false,
            ..SyncConfig::default()
        };
        let mut router = SyncRouter::with_config(Arc::clone(&kvs), config);
        router
            .sync_object(SyncObject::new("/x/", object.clone(), |_| Ok(())))
            .unwrap();
        kvs.set("/x/A", "seven").await.unwrap();
        router.next(&cancel).await.unwrap();
        assert_eq!(object.lock().unwrap()["A"], 7);

        let mut router = SyncRouter::new(Arc::clone(&kvs));
        router
            .sync_object(SyncObject::new("/x/", object.clone(), |_| Ok(())))
            .unwrap();
        kvs.set("/x/A", "seven").await.unwrap();
        router.next(&cancel).await.unwrap();
        assert_eq!(object.lock().unwrap()["A"], 0);
    }

    #[tokio::test]
    async fn cancellation_is_propagated() {
        let mut router = SyncRouter::new(MemoryKvs::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            router.next(&cancel).await,
            Err(SyncError::Kvs(kvsync_kvs::KvsError::Cancelled))
        ));
    }
}
