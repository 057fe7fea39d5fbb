use std::sync::Arc;

use async_trait::async_trait;
use lsp_types::CodeLens;

use crate::ProviderError;
use crate::editor::ScriptFile;
use crate::registry::{FeatureProvider, FeatureProviderRegistry};
use crate::script::ScriptFeatureProvider;

#[async_trait]
pub trait CodeLensProvider: FeatureProvider {
	async fn provide_code_lenses(&self, file: &ScriptFile) -> Vec<CodeLens>;

	/// Fills in a lens produced by this provider. Returns it unchanged by
	/// default.
	async fn resolve_code_lens(&self, lens: CodeLens, _file: &ScriptFile) -> CodeLens {
		lens
	}
}

#[async_trait]
impl CodeLensProvider for ScriptFeatureProvider<CodeLens> {
	async fn provide_code_lenses(&self, file: &ScriptFile) -> Vec<CodeLens> {
		self.invoke(file).await
	}
}

/// A lens tagged with the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvidedCodeLens {
	pub provider_id: String,
	pub lens: CodeLens,
}

/// Code lenses from every registered provider.
#[derive(Default)]
pub struct CodeLensService {
	registry: FeatureProviderRegistry<dyn CodeLensProvider>,
}

impl CodeLensService {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn registry(&self) -> &FeatureProviderRegistry<dyn CodeLensProvider> {
		&self.registry
	}

	pub fn register(&self, provider: Arc<dyn CodeLensProvider>) -> bool {
		self.registry.register(provider)
	}

	/// Concatenates each provider's lenses in registration order.
	pub async fn provide_code_lenses(&self, file: &ScriptFile) -> Vec<ProvidedCodeLens> {
		let mut lenses = Vec::new();
		for provider in self.registry.providers() {
			let provider_id = provider.provider_id().to_string();
			let found = provider.provide_code_lenses(file).await;
			tracing::trace!(provider = %provider_id, count = found.len(), "code lenses");
			lenses.extend(found.into_iter().map(|lens| ProvidedCodeLens {
				provider_id: provider_id.clone(),
				lens,
			}));
		}
		lenses
	}

	/// Hands `lens` back to the provider that produced it.
	pub async fn resolve_code_lens(&self, lens: ProvidedCodeLens, file: &ScriptFile) -> Result<CodeLens, ProviderError> {
		let provider = self
			.registry
			.get(&lens.provider_id)
			.ok_or_else(|| ProviderError::NotRegistered(lens.provider_id.clone()))?;
		Ok(provider.resolve_code_lens(lens.lens, file).await)
	}
}
