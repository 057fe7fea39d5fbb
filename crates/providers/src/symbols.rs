use std::sync::Arc;

use async_trait::async_trait;
use lsp_types::{Range, SymbolKind};
use serde::Deserialize;

use crate::editor::ScriptFile;
use crate::registry::{FeatureProvider, FeatureProviderRegistry};
use crate::script::ScriptFeatureProvider;

/// A symbol found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolReference {
	pub name: String,
	pub kind: SymbolKind,
	pub range: Range,
	#[serde(default)]
	pub container_name: Option<String>,
}

#[async_trait]
pub trait DocumentSymbolProvider: FeatureProvider {
	async fn provide_document_symbols(&self, file: &ScriptFile) -> Vec<SymbolReference>;
}

#[async_trait]
impl DocumentSymbolProvider for ScriptFeatureProvider<SymbolReference> {
	async fn provide_document_symbols(&self, file: &ScriptFile) -> Vec<SymbolReference> {
		self.invoke(file).await
	}
}

/// Document symbols from every registered provider.
#[derive(Default)]
pub struct DocumentSymbolService {
	registry: FeatureProviderRegistry<dyn DocumentSymbolProvider>,
}

impl DocumentSymbolService {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn registry(&self) -> &FeatureProviderRegistry<dyn DocumentSymbolProvider> {
		&self.registry
	}

	pub fn register(&self, provider: Arc<dyn DocumentSymbolProvider>) -> bool {
		self.registry.register(provider)
	}

	/// Concatenates each provider's symbols in registration order.
	pub async fn provide_document_symbols(&self, file: &ScriptFile) -> Vec<SymbolReference> {
		let mut symbols = Vec::new();
		for provider in self.registry.providers() {
			let found = provider.provide_document_symbols(file).await;
			tracing::trace!(provider = provider.provider_id(), count = found.len(), "document symbols");
			symbols.extend(found);
		}
		symbols
	}
}
