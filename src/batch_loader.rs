use crate::cache::CacheStore;
use crate::{Fetcher, LoadError};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Loads values through a [`Fetcher`] on first access and caches them for the
/// rest of its lifetime. Cloning a `BatchLoader` is shallow and will use the
/// same [`Fetcher`] and cache.
///
/// A `BatchLoader` plays the part of an ORM persistence context for lazy
/// collections: keys are [`register`](BatchLoader::register)ed when their
/// owners are read, and the first [`load`](BatchLoader::load) of a registered
/// key also fetches up to `batch_size - 1` other registered keys that have not
/// been loaded yet. With a batch size of 1 every load issues its own fetch,
/// which is the N+1 access pattern.
///
/// A `BatchLoader` is designed to be ephemeral: create one per request. There
/// is no invalidation, so values are kept until the loader is dropped.
///
/// ## Load semantics
///
/// If the underlying [`Fetcher`] returns an error, the pending
/// [`load`](BatchLoader::load) or [`load_many`](BatchLoader::load_many) call
/// fails with [`FetchError`](LoadError::FetchError). Nothing is cached, so a
/// later call with the same keys **will retry**.
///
/// If the [`Fetcher`] succeeds but does not return a value for a key, the key
/// is marked "not found" and [`NotFound`](LoadError::NotFound) is returned. The
/// "not found" status is preserved, so later calls **will not retry**.
pub struct BatchLoader<F>
where
    F: Fetcher,
{
    label: Cow<'static, str>,
    batch_size: usize,
    fetcher: Arc<F>,
    cache_store: CacheStore<F::Key, F::Value>,
    /// Registered keys not yet taken into a batch, in registration order.
    registered: Arc<Mutex<VecDeque<F::Key>>>,
}

impl<F> BatchLoader<F>
where
    F: Fetcher + Send + Sync + 'static,
{
    /// Create a new `BatchLoader` that uses the given [`Fetcher`] to retrieve
    /// data. Returns a [`BatchLoaderBuilder`]; call
    /// [`.finish()`](BatchLoaderBuilder::finish) to create the `BatchLoader`.
    pub fn build(fetcher: F) -> BatchLoaderBuilder<F> {
        BatchLoaderBuilder {
            fetcher,
            batch_size: 100,
            label: "unlabeled-batch-loader".into(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Record keys whose values may be loaded later. Registration order
    /// decides which keys ride along when a batch is filled.
    pub fn register(&self, keys: &[F::Key]) {
        let mut registered = self
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registered.extend(
            keys.iter()
                .filter(|key| !self.cache_store.contains(key))
                .cloned(),
        );
        tracing::trace!(
            batch_loader = %self.label,
            num_registered_keys = registered.len(),
            "registered keys",
        );
    }

    pub fn is_loaded(&self, key: &F::Key) -> bool {
        self.cache_store.contains(key)
    }

    /// Number of keys with a cached result, found or not.
    pub fn num_loaded(&self) -> usize {
        self.cache_store.len()
    }

    /// Load the value for the given key, either from the cache or by calling
    /// the [`Fetcher`] with a batch that starts with this key.
    #[tracing::instrument(skip_all, fields(batch_loader = %self.label))]
    pub async fn load(&self, key: F::Key) -> Result<F::Value, LoadError> {
        let mut values = self.load_keys(std::slice::from_ref(&key), true).await?;
        Ok(values.remove(0))
    }

    /// Load all the values for the given keys. Values are returned in the same
    /// order as the input keys. All uncached keys are fetched in one call,
    /// even if there are more than `batch_size` of them. Returns an error if
    /// _any_ load fails.
    #[tracing::instrument(skip_all, fields(batch_loader = %self.label, num_keys = keys.len()))]
    pub async fn load_many(&self, keys: &[F::Key]) -> Result<Vec<F::Value>, LoadError> {
        self.load_keys(keys, false).await
    }

    async fn load_keys(&self, keys: &[F::Key], fill_batch: bool) -> Result<Vec<F::Value>, LoadError> {
        let mut pending_keys = self.cache_store.pending_keys(keys);
        if pending_keys.is_empty() {
            tracing::debug!(batch_loader = %self.label, "all keys have already been loaded");
            return self.lookup(keys);
        }

        let num_requested = pending_keys.len();
        if fill_batch {
            self.fill_batch(&mut pending_keys);
        }

        tracing::debug!(
            batch_loader = %self.label,
            num_pending_keys = pending_keys.len(),
            "fetching a batch of keys",
        );

        let result = {
            let mut cache = self.cache_store.as_cache();
            let result = self
                .fetcher
                .fetch(&pending_keys, &mut cache)
                .await
                .map_err(|error| error.to_string());

            if result.is_ok() {
                cache.mark_keys_not_found(&pending_keys);
            }

            result
        };

        if let Err(fetch_error) = result {
            self.requeue(&pending_keys[num_requested..]);
            tracing::info!("error returned while fetching keys: {fetch_error}");
            return Err(LoadError::FetchError(fetch_error));
        }

        self.lookup(keys)
    }

    /// Top up `pending_keys` with registered keys that are still unloaded.
    /// Keys are taken off the front of the queue, so each registered key is
    /// looked at once.
    fn fill_batch(&self, pending_keys: &mut Vec<F::Key>) {
        if pending_keys.len() >= self.batch_size {
            return;
        }

        let mut registered = self
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while pending_keys.len() < self.batch_size {
            let Some(key) = registered.pop_front() else {
                break;
            };
            if !self.cache_store.contains(&key) && !pending_keys.contains(&key) {
                pending_keys.push(key);
            }
        }

        tracing::trace!(
            batch_loader = %self.label,
            num_pending_keys = pending_keys.len(),
            batch_size = self.batch_size,
            num_registered_keys = registered.len(),
            "filled batch from registered keys",
        );
    }

    /// Put keys taken by a failed batch back at the front of the queue.
    fn requeue(&self, keys: &[F::Key]) {
        if keys.is_empty() {
            return;
        }

        let mut registered = self
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for key in keys.iter().rev() {
            registered.push_front(key.clone());
        }
    }

    fn lookup(&self, keys: &[F::Key]) -> Result<Vec<F::Value>, LoadError> {
        // Every key was either cached already or part of a successful fetch,
        // which marks whatever it did not return as not found.
        self.cache_store
            .lookup(keys)
            .unwrap_or(Err(LoadError::NotFound))
    }
}

impl<F> Clone for BatchLoader<F>
where
    F: Fetcher,
{
    fn clone(&self) -> Self {
        BatchLoader {
            label: self.label.clone(),
            batch_size: self.batch_size,
            fetcher: self.fetcher.clone(),
            cache_store: self.cache_store.clone(),
            registered: self.registered.clone(),
        }
    }
}

/// Used to configure a new [`BatchLoader`]. A `BatchLoaderBuilder` is
/// returned from [`BatchLoader::build`].
pub struct BatchLoaderBuilder<F>
where
    F: Fetcher + Send + Sync + 'static,
{
    fetcher: F,
    batch_size: usize,
    label: Cow<'static, str>,
}

impl<F> BatchLoaderBuilder<F>
where
    F: Fetcher + Send + Sync + 'static,
{
    /// The maximum number of keys a single [`load`](BatchLoader::load) will
    /// fetch. Values below 1 are treated as 1.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set a label for the [`BatchLoader`]. This is only used to improve
    /// diagnostic messages, such as log messages.
    pub fn label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Create and return a [`BatchLoader`] with the given options.
    pub fn finish(self) -> BatchLoader<F> {
        BatchLoader {
            label: self.label,
            batch_size: self.batch_size,
            fetcher: Arc::new(self.fetcher),
            cache_store: CacheStore::new(),
            registered: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}
