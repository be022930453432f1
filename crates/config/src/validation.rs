use crate::ConfigResult;

/// Trait for configuration validation (implemented by every model section)
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}
