//! Registration of feature providers by id.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::ProviderError;

/// Anything registered in a [`FeatureProviderRegistry`].
pub trait FeatureProvider: Send + Sync {
	/// Stable id, unique within one registry.
	fn provider_id(&self) -> &str;
}

/// Providers for one editor feature, kept in registration order.
///
/// Thread-safe; can be shared across async tasks via `Arc`.
pub struct FeatureProviderRegistry<P: ?Sized> {
	providers: RwLock<IndexMap<String, Arc<P>>>,
}

impl<P: ?Sized> Default for FeatureProviderRegistry<P> {
	fn default() -> Self {
		Self {
			providers: RwLock::new(IndexMap::new()),
		}
	}
}

impl<P: ?Sized + FeatureProvider> FeatureProviderRegistry<P> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `provider` under its id.
	///
	/// Returns true when the id was new. A provider registered again under
	/// the same id replaces the old one and keeps its position.
	pub fn register(&self, provider: Arc<P>) -> bool {
		let id = provider.provider_id().to_string();
		let replaced = self.providers.write().insert(id.clone(), provider).is_some();
		if replaced {
			tracing::debug!(provider = %id, "replaced feature provider");
		} else {
			tracing::debug!(provider = %id, "registered feature provider");
		}
		!replaced
	}

	pub fn unregister(&self, id: &str) -> Result<Arc<P>, ProviderError> {
		let removed = self.providers.write().shift_remove(id);
		removed.ok_or_else(|| ProviderError::NotRegistered(id.to_string()))
	}

	pub fn get(&self, id: &str) -> Option<Arc<P>> {
		self.providers.read().get(id).cloned()
	}

	/// Snapshot of every provider in registration order.
	pub fn providers(&self) -> Vec<Arc<P>> {
		self.providers.read().values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.providers.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.providers.read().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	struct Named(&'static str, u32);

	impl FeatureProvider for Named {
		fn provider_id(&self) -> &str {
			self.0
		}
	}

	fn ids(registry: &FeatureProviderRegistry<Named>) -> Vec<(&'static str, u32)> {
		registry.providers().iter().map(|p| (p.0, p.1)).collect()
	}

	#[test]
	fn register_reports_new_ids() {
		let registry = FeatureProviderRegistry::new();
		assert!(registry.register(Arc::new(Named("a", 1))));
		assert!(registry.register(Arc::new(Named("b", 1))));
		assert!(!registry.register(Arc::new(Named("a", 2))));
		assert_eq!(ids(&registry), vec![("a", 2), ("b", 1)]);
	}

	#[test]
	fn unregister_unknown_id_fails() {
		let registry = FeatureProviderRegistry::<Named>::new();
		assert!(matches!(registry.unregister("missing"), Err(ProviderError::NotRegistered(id)) if id == "missing"));
	}

	#[test]
	fn unregister_keeps_remaining_order() {
		let registry = FeatureProviderRegistry::new();
		for id in ["a", "b", "c"] {
			registry.register(Arc::new(Named(id, 0)));
		}
		let removed = registry.unregister("b").expect("registered");
		assert_eq!(removed.0, "b");
		assert_eq!(ids(&registry), vec![("a", 0), ("c", 0)]);
		assert!(registry.get("b").is_none());
		assert_eq!(registry.len(), 2);
	}

	#[test]
	fn works_with_trait_objects() {
		let registry = FeatureProviderRegistry::<dyn FeatureProvider>::new();
		assert!(registry.is_empty());
		registry.register(Arc::new(Named("dyn", 0)));
		assert_eq!(registry.get("dyn").map(|p| p.provider_id().to_string()), Some("dyn".to_string()));
	}
}
