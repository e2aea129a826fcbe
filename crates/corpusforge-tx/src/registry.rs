//! Extractor registry: resolves a [`DataSourceDescriptor`]'s
//! [`ExtractorKind`] to a boxed transform at process start, instead of
//! dispatching on a string at call time.

use std::collections::HashMap;
use std::sync::Arc;

use corpusforge_core::config::ExtractorKind;
use corpusforge_core::stage::Transform;
use corpusforge_core::types::RawRecord;

use crate::extract::{CirrusSearchExtractor, XmlPageExtractor};

pub type ExtractorRegistry = HashMap<ExtractorKind, Arc<dyn Transform<RawRecord, String>>>;

/// Builds the registry once, at process start.
pub fn build_extractor_registry() -> ExtractorRegistry {
    let mut registry: ExtractorRegistry = HashMap::new();
    registry.insert(ExtractorKind::CirrusSearch, Arc::new(CirrusSearchExtractor));
    registry.insert(ExtractorKind::XmlPage, Arc::new(XmlPageExtractor));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_both_extractors() {
        let registry = build_extractor_registry();
        assert!(registry.contains_key(&ExtractorKind::CirrusSearch));
        assert!(registry.contains_key(&ExtractorKind::XmlPage));
    }
}
