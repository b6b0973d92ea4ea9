//! Closed registry of step types.
//!
//! Documents refer to step implementations through string addresses of the
//! form `namespace:TypeName`. The registry maps each address to a
//! constructor; every address a document uses must resolve at composite
//! construction time, never at run time.

use crate::errors::{ComposeError, ComposeResult};
use crate::step::{Step, StepConfig};
use crate::types::TypeRegistry;
use std::collections::HashMap;
use std::fmt;

/// Address of a step type, e.g. `local:CompareResults`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepAddress {
    pub namespace: String,
    pub type_name: String,
}

impl StepAddress {
    pub fn new(namespace: &str, type_name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            type_name: type_name.to_string(),
        }
    }

    /// An address in the `local` namespace.
    pub fn local(type_name: &str) -> Self {
        Self::new("local", type_name)
    }

    /// Parse an address string of the form `namespace:TypeName`.
    pub fn parse(address: &str) -> ComposeResult<Self> {
        match address.split_once(':') {
            Some((namespace, type_name)) if !namespace.is_empty() && !type_name.is_empty() => {
                Ok(Self::new(namespace, type_name))
            }
            _ => Err(ComposeError::MalformedAddress(address.to_string())),
        }
    }
}

impl fmt::Display for StepAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.type_name)
    }
}

/// Constructor for a step type.
///
/// Implementations validate the configuration and fail fast with
/// [`ComposeError::Configuration`] on a bad one.
pub type StepConstructor = fn(&StepConfig, &TypeRegistry) -> ComposeResult<Box<dyn Step>>;

/// Mapping from step addresses to constructors.
#[derive(Default)]
pub struct StepRegistry {
    constructors: HashMap<StepAddress, StepConstructor>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any previous one at this address.
    pub fn register(&mut self, address: StepAddress, constructor: StepConstructor) {
        self.constructors.insert(address, constructor);
    }

    pub fn contains(&self, address: &StepAddress) -> bool {
        self.constructors.contains_key(address)
    }

    /// Registered addresses in sorted order.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> =
            self.constructors.keys().map(StepAddress::to_string).collect();
        addresses.sort();
        addresses
    }

    /// Instantiate a step from a string address and raw configuration.
    pub fn create(
        &self,
        address: &str,
        config: &StepConfig,
        types: &TypeRegistry,
    ) -> ComposeResult<Box<dyn Step>> {
        let parsed = StepAddress::parse(address)?;
        let constructor = self
            .constructors
            .get(&parsed)
            .ok_or_else(|| ComposeError::UnknownStepAddress(address.to_string()))?;
        constructor(config, types)
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("addresses", &self.addresses())
            .finish()
    }
}

/// The pair of registries a composite is built against.
#[derive(Debug, Default)]
pub struct Core {
    pub types: TypeRegistry,
    pub steps: StepRegistry,
}

impl Core {
    pub fn new(types: TypeRegistry, steps: StepRegistry) -> Self {
        Self { types, steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_addresses() {
        let address = StepAddress::parse("local:CompareResults").unwrap();
        assert_eq!(address, StepAddress::local("CompareResults"));
        assert_eq!(address.to_string(), "local:CompareResults");

        for bad in ["", "local", ":X", "local:", "::"] {
            assert!(
                matches!(
                    StepAddress::parse(bad),
                    Err(ComposeError::MalformedAddress(_))
                ),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn unresolved_address_is_an_error() {
        let registry = StepRegistry::new();
        let types = TypeRegistry::standard();
        let err = registry
            .create("local:Nowhere", &StepConfig::new(), &types)
            .unwrap_err();
        assert!(matches!(err, ComposeError::UnknownStepAddress(_)));
    }
}
