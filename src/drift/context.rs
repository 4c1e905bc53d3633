use crate::analyzer::QuerySchemaExtractor;
use crate::config::ValidationConfig;

/// Everything a diff needs besides the two states.
#[derive(Debug, Clone, Default)]
pub struct DiffContext {
    pub validation: ValidationConfig,
    pub extractor: QuerySchemaExtractor,
}

impl DiffContext {
    pub fn new(validation: ValidationConfig) -> Self {
        Self {
            validation,
            extractor: QuerySchemaExtractor::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: QuerySchemaExtractor) -> Self {
        self.extractor = extractor;
        self
    }
}
