pub mod dispatch;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::AppConfig;

/// The resolved upstream model for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTarget<'a> {
    pub upstream_model: &'a str,
    /// `false` when the requested id had no table entry and is passed through.
    pub mapped: bool,
}

/// One entry of the public model listing.
#[derive(Debug, Clone)]
pub struct ListedModel {
    pub id: Arc<str>,
    pub upstream_model: Arc<str>,
    pub owned_by: Arc<str>,
}

/// Read-only table from public model ids to upstream model ids.
///
/// Unknown ids are never rejected: they resolve to themselves so callers can
/// address upstream models directly.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    model_index: FxHashMap<Arc<str>, usize>,
    listed: Vec<ListedModel>,
}

impl ModelRouter {
    /// Build a `ModelRouter` from the application configuration.
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        let mut model_index = FxHashMap::default();
        let mut listed = Vec::with_capacity(config.models.len());

        for (public, upstream) in &config.models {
            let id: Arc<str> = Arc::from(public.trim());
            let upstream_model: Arc<str> = Arc::from(upstream.trim());
            let owned_by = Arc::from(owned_by_for(&upstream_model));
            model_index.insert(Arc::clone(&id), listed.len());
            listed.push(ListedModel {
                id,
                upstream_model,
                owned_by,
            });
        }

        Self {
            model_index,
            listed,
        }
    }

    /// Resolve a requested model id, falling back to the id itself.
    #[must_use]
    pub fn resolve<'a>(&'a self, requested: &'a str) -> RouteTarget<'a> {
        match self.model_index.get(requested) {
            Some(&idx) => RouteTarget {
                upstream_model: &self.listed[idx].upstream_model,
                mapped: true,
            },
            None => RouteTarget {
                upstream_model: requested,
                mapped: false,
            },
        }
    }

    /// Models in listing order (sorted by public id).
    #[must_use]
    pub fn listed_models(&self) -> &[ListedModel] {
        &self.listed
    }

    #[must_use]
    pub fn known_model_count(&self) -> usize {
        self.listed.len()
    }
}

/// Vendor prefix of an upstream model id (`deepseek-ai/deepseek-r1` -> `deepseek-ai`).
fn owned_by_for(upstream_model: &str) -> &str {
    match upstream_model.split_once('/') {
        Some((vendor, _)) if !vendor.is_empty() => vendor,
        _ => "system",
    }
}
