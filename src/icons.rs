use std::{
    collections::HashMap,
    fmt,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
};

use egui::{mutex::Mutex, ColorImage, Context, TextureHandle, TextureOptions};
use futures::{
    executor::ThreadPool,
    future::{self, BoxFuture, Shared},
    FutureExt,
};
use log::{debug, warn};

use crate::errors::IconError;

/// Shared handle to a pending or settled icon load. Every clone resolves to the same result.
pub type IconFuture = Shared<BoxFuture<'static, Result<Arc<Icon>, IconError>>>;

/// Supplies raw image bytes for a key.
pub trait IconSource: Send + Sync {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, IconError>;
}

impl<F> IconSource for F
where
    F: Fn(&str) -> Result<Vec<u8>, IconError> + Send + Sync,
{
    fn fetch(&self, key: &str) -> Result<Vec<u8>, IconError> {
        self(key)
    }
}

/// Reads `<dir>/<key>.png`.
#[derive(Debug, Clone)]
pub struct FileIconSource {
    dir: PathBuf,
}

impl FileIconSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl IconSource for FileIconSource {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, IconError> {
        std::fs::read(self.dir.join(format!("{key}.png"))).map_err(|err| IconError::Fetch {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Decoded icon. The texture is uploaded on first draw and reused afterwards.
pub struct Icon {
    key: String,
    image: ColorImage,
    texture: OnceLock<TextureHandle>,
    draw_failed: AtomicBool,
}

impl fmt::Debug for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Icon")
            .field("key", &self.key)
            .field("size", &self.image.size)
            .field("uploaded", &self.texture.get().is_some())
            .finish()
    }
}

impl Icon {
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self, IconError> {
        let rgba = image::load_from_memory(bytes)
            .map_err(|err| IconError::Decode {
                key: key.to_string(),
                reason: err.to_string(),
            })?
            .to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        if rgba.as_raw().len() != size[0] * size[1] * 4 {
            return Err(IconError::Corrupt {
                key: key.to_string(),
            });
        }
        Ok(Self::from_image(key, ColorImage::from_rgba_unmultiplied(size, rgba.as_raw())))
    }

    pub fn from_image(key: &str, image: ColorImage) -> Self {
        Self {
            key: key.to_string(),
            image,
            texture: OnceLock::new(),
            draw_failed: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn size(&self) -> [usize; 2] {
        self.image.size
    }

    /// Marks the icon as undrawable. True only the first time, so callers log once.
    pub(crate) fn mark_draw_failed(&self) -> bool {
        !self.draw_failed.swap(true, Ordering::Relaxed)
    }

    /// Texture for drawing, uploading it on first use.
    pub fn texture(&self, ctx: &Context) -> Result<&TextureHandle, IconError> {
        if let Some(tex) = self.texture.get() {
            return Ok(tex);
        }
        let [w, h] = self.image.size;
        if w == 0 || h == 0 || self.image.pixels.len() != w * h {
            return Err(IconError::Corrupt {
                key: self.key.clone(),
            });
        }
        Ok(self.texture.get_or_init(|| {
            ctx.load_texture(
                format!("icon:{}", self.key),
                self.image.clone(),
                TextureOptions::LINEAR,
            )
        }))
    }
}

#[derive(Default)]
struct CacheState {
    ready: HashMap<String, Arc<Icon>>,
    in_flight: HashMap<String, IconFuture>,
    /// Last error per key. Frame requests skip these until an explicit preload.
    failed: HashMap<String, IconError>,
    /// Bumped by `clear`; loads started before a clear do not write back.
    generation: u64,
}

/// Icon cache with single-flight loading per key.
///
/// Concurrent requests for a key share one load. Successful loads stay cached until
/// [`ImageCache::clear`]. Failed ones are remembered: [`ImageCache::request`] leaves
/// them alone, [`ImageCache::preload_image`] retries.
pub struct ImageCache {
    source: Arc<dyn IconSource>,
    state: Arc<Mutex<CacheState>>,
    pool: Option<ThreadPool>,
}

impl ImageCache {
    /// Loads run eagerly on a small owned thread pool.
    pub fn new(source: impl IconSource + 'static) -> Self {
        let pool = ThreadPool::builder()
            .pool_size(2)
            .name_prefix("icon-loader-")
            .create()
            .map_err(|err| warn!("icon thread pool unavailable, loads run on await: {err}"))
            .ok();
        Self {
            source: Arc::new(source),
            state: Arc::default(),
            pool,
        }
    }

    /// Starts loading `key` unless it is cached or already loading, and returns the
    /// shared load. A key that failed before is retried.
    pub fn preload_image(&self, key: &str) -> IconFuture {
        let mut state = self.state.lock();
        state.failed.remove(key);
        if let Some(icon) = state.ready.get(key) {
            return future::ready(Ok(Arc::clone(icon))).boxed().shared();
        }
        if let Some(pending) = state.in_flight.get(key) {
            return pending.clone();
        }

        let fut = self.load(key.to_string(), state.generation);
        state.in_flight.insert(key.to_string(), fut.clone());
        drop(state);

        if let Some(pool) = &self.pool {
            pool.spawn_ok(fut.clone().map(|_| ()));
        }
        fut
    }

    /// Fire-and-forget variant of [`Self::preload_image`], for use while drawing.
    /// Keys whose last load failed are not fetched again.
    pub fn request(&self, key: &str) {
        if self.pool.is_none() || self.state.lock().failed.contains_key(key) {
            return;
        }
        let _ = self.preload_image(key);
    }

    /// Error of the last failed load of `key`, until it is retried or the cache cleared.
    pub fn failure(&self, key: &str) -> Option<IconError> {
        self.state.lock().failed.get(key).cloned()
    }

    /// Non-blocking lookup of a loaded icon.
    pub fn get_cached_image(&self, key: &str) -> Option<Arc<Icon>> {
        self.state.lock().ready.get(key).cloned()
    }

    /// Seeds the cache with an already decoded icon, e.g. one bundled with the host.
    pub fn insert(&self, icon: Icon) {
        let mut state = self.state.lock();
        state.in_flight.remove(icon.key());
        state.failed.remove(icon.key());
        state.ready.insert(icon.key().to_string(), Arc::new(icon));
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.state.lock().in_flight.contains_key(key)
    }

    /// Drops every cached icon. Loads still in flight resolve but are not cached.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.ready.clear();
        state.in_flight.clear();
        state.failed.clear();
        state.generation += 1;
    }

    fn load(&self, key: String, generation: u64) -> IconFuture {
        let source = Arc::clone(&self.source);
        let state = Arc::downgrade(&self.state);
        async move {
            let res = source
                .fetch(&key)
                .and_then(|bytes| Icon::decode(&key, &bytes))
                .map(Arc::new);

            if let Some(state) = state.upgrade() {
                let mut state = state.lock();
                if state.generation == generation {
                    state.in_flight.remove(&key);
                    match &res {
                        Ok(icon) => {
                            debug!("icon '{key}' loaded");
                            state.ready.insert(key.clone(), Arc::clone(icon));
                        }
                        Err(err) => {
                            warn!("{err}");
                            state.failed.insert(key.clone(), err.clone());
                        }
                    }
                }
            }
            res
        }
        .boxed()
        .shared()
    }
}
