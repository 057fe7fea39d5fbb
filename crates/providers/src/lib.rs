//! Editor feature providers.
//!
//! Providers are registered per feature in a [`FeatureProviderRegistry`].
//! Script-backed providers run on the dedicated background runspace with a
//! [`ReadOnlyEditorObject`] bound as `$editor`, and decode their output into
//! typed results such as [`SymbolReference`] or [`lsp_types::CodeLens`].

mod code_lens;
mod editor;
mod error;
mod registry;
mod script;
mod symbols;

pub use code_lens::{CodeLensProvider, CodeLensService, ProvidedCodeLens};
pub use editor::{EditorWindow, ReadOnlyEditorObject, ScriptFile};
pub use error::ProviderError;
pub use registry::{FeatureProvider, FeatureProviderRegistry};
pub use script::{EDITOR_VARIABLE, ScriptFeatureProvider};
pub use symbols::{DocumentSymbolProvider, DocumentSymbolService, SymbolReference};
