//! Preview cache — bounded, per-job LRU of rendered artifacts keyed by a
//! content fingerprint.
//!
//! The fingerprint is SHA-256 over the fully resolved render input (template
//! name + the verbatim serialized document), so identical content never
//! renders twice and any edit produces a new key. The lock is never held
//! across the renderer await.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::ResumeDocument;

/// Entries kept per job. The 26th distinct fingerprint evicts the
/// least-recently-used of the previous 25.
pub const CACHE_CAPACITY: usize = 25;

/// The consumed document-rendering engine. Errors on unknown templates or
/// malformed documents.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        template_name: &str,
        document: &ResumeDocument,
    ) -> Result<Vec<u8>, AppError>;
}

/// Hex SHA-256 over the resolved render input.
pub fn fingerprint(template_name: &str, document: &ResumeDocument) -> Result<String, AppError> {
    let serialized = document.to_stored_json()?;
    let mut hasher = Sha256::new();
    hasher.update(template_name.as_bytes());
    hasher.update([0u8]); // separator so (template, doc) pairs cannot collide
    hasher.update(serialized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

pub struct PreviewCache {
    renderer: Arc<dyn Renderer>,
    jobs: Mutex<HashMap<Uuid, LruCache<String, Arc<Vec<u8>>>>>,
}

impl PreviewCache {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        PreviewCache {
            renderer,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached artifact for `(template, document)` or renders it.
    /// A hit promotes the entry to most-recently-used; a miss renders,
    /// inserts, and evicts the LRU entry beyond capacity.
    pub async fn get_or_render(
        &self,
        job_id: Uuid,
        document: &ResumeDocument,
        template_name: &str,
    ) -> Result<Arc<Vec<u8>>, AppError> {
        let key = fingerprint(template_name, document)?;

        {
            let mut jobs = self.jobs.lock().expect("preview cache poisoned");
            if let Some(cache) = jobs.get_mut(&job_id) {
                if let Some(artifact) = cache.get(&key) {
                    debug!("Preview cache hit for job {job_id} ({key})");
                    return Ok(Arc::clone(artifact));
                }
            }
        }

        debug!("Preview cache miss for job {job_id} ({key}), rendering");
        let artifact = Arc::new(self.renderer.render(template_name, document).await?);

        let mut jobs = self.jobs.lock().expect("preview cache poisoned");
        let cache = jobs.entry(job_id).or_insert_with(|| {
            LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).expect("nonzero capacity"))
        });
        // put evicts the LRU entry when the cache is at capacity
        cache.put(key, Arc::clone(&artifact));

        Ok(artifact)
    }

    /// Drops every entry for a job. Called when the interactive context
    /// switches jobs so stale previews cannot leak across.
    pub fn clear(&self, job_id: Uuid) {
        let mut jobs = self.jobs.lock().expect("preview cache poisoned");
        jobs.remove(&job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::models::document::IdentityBlock;

    struct CountingRenderer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Renderer for CountingRenderer {
        async fn render(
            &self,
            template_name: &str,
            document: &ResumeDocument,
        ) -> Result<Vec<u8>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{template_name}:{}", document.summary).into_bytes())
        }
    }

    fn doc(summary: &str) -> ResumeDocument {
        ResumeDocument {
            identity: IdentityBlock {
                name: "Ada".into(),
                title: "Engineer".into(),
                email: "ada@example.com".into(),
                phone: None,
                location: None,
                links: vec![],
            },
            summary: summary.into(),
            experiences: vec![],
            education: vec![],
            certifications: vec![],
            skills: vec![],
        }
    }

    fn cache() -> (Arc<CountingRenderer>, PreviewCache) {
        let renderer = Arc::new(CountingRenderer {
            calls: AtomicUsize::new(0),
        });
        let cache = PreviewCache::new(renderer.clone());
        (renderer, cache)
    }

    #[tokio::test]
    async fn test_identical_calls_render_once() {
        let (renderer, cache) = cache();
        let job = Uuid::new_v4();
        let d = doc("same content");

        let a = cache.get_or_render(job, &d, "classic").await.unwrap();
        let b = cache.get_or_render(job, &d, "classic").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_template_is_part_of_the_key() {
        let (renderer, cache) = cache();
        let job = Uuid::new_v4();
        let d = doc("same content");

        cache.get_or_render(job, &d, "classic").await.unwrap();
        cache.get_or_render(job, &d, "modern").await.unwrap();

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let (renderer, cache) = cache();
        let job = Uuid::new_v4();

        for i in 0..CACHE_CAPACITY {
            cache
                .get_or_render(job, &doc(&format!("v{i}")), "classic")
                .await
                .unwrap();
        }
        assert_eq!(renderer.calls.load(Ordering::SeqCst), CACHE_CAPACITY);

        // Touch v0 so v1 becomes the LRU entry.
        cache.get_or_render(job, &doc("v0"), "classic").await.unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), CACHE_CAPACITY);

        // 26th distinct fingerprint evicts v1.
        cache.get_or_render(job, &doc("v25"), "classic").await.unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), CACHE_CAPACITY + 1);

        // v0 survived; v1 is a miss again.
        cache.get_or_render(job, &doc("v0"), "classic").await.unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), CACHE_CAPACITY + 1);
        cache.get_or_render(job, &doc("v1"), "classic").await.unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), CACHE_CAPACITY + 2);
    }

    #[tokio::test]
    async fn test_jobs_are_isolated_and_clearable() {
        let (renderer, cache) = cache();
        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();
        let d = doc("shared");

        cache.get_or_render(job_a, &d, "classic").await.unwrap();
        cache.get_or_render(job_b, &d, "classic").await.unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);

        cache.clear(job_a);
        cache.get_or_render(job_a, &d, "classic").await.unwrap();
        cache.get_or_render(job_b, &d, "classic").await.unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
    }
}
