//! Ordered catalogue of tenant schema migrations.
//!
//! The registry is append-only across releases: steps are never edited or
//! renumbered, only added at the end. It is built once at startup and shared
//! by reference.

use std::collections::HashSet;

use crate::error::RegistryError;

/// One numbered unit of schema change.
///
/// Each entry of `operations` is a single SQL statement. Statements run in
/// order inside one transaction; a batch containing more than one statement in
/// a single entry is rejected by the database at apply time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStep {
    pub version: u32,
    pub name: &'static str,
    pub operations: &'static [&'static str],
}

impl MigrationStep {
    pub const fn new(
        version: u32,
        name: &'static str,
        operations: &'static [&'static str],
    ) -> Self {
        Self {
            version,
            name,
            operations,
        }
    }
}

/// Validated, immutable list of steps in ascending version order.
#[derive(Debug, Clone)]
pub struct MigrationRegistry {
    steps: Vec<MigrationStep>,
}

impl MigrationRegistry {
    /// Build a registry, checking that versions run 1..=N without gaps or
    /// duplicates and that every step carries a name and at least one
    /// non-blank statement.
    ///
    /// Steps may be given in any order; they are sorted by version.
    pub fn new(steps: impl IntoIterator<Item = MigrationStep>) -> Result<Self, RegistryError> {
        let mut steps: Vec<MigrationStep> = steps.into_iter().collect();
        if steps.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.version) {
                return Err(RegistryError::Duplicate(step.version));
            }
        }

        steps.sort_by_key(|step| step.version);

        for (expected, step) in (1u32..).zip(&steps) {
            if step.version != expected {
                return Err(RegistryError::Gap {
                    expected,
                    found: step.version,
                });
            }
            if step.name.trim().is_empty() {
                return Err(RegistryError::EmptyName {
                    version: step.version,
                });
            }
            if step.operations.is_empty() {
                return Err(RegistryError::EmptyOperations {
                    version: step.version,
                });
            }
            if let Some(index) = step.operations.iter().position(|op| op.trim().is_empty()) {
                return Err(RegistryError::BlankOperation {
                    version: step.version,
                    index,
                });
            }
        }

        Ok(Self { steps })
    }

    /// Steps with `version > from`, ascending.
    pub fn pending(&self, from: u32) -> &[MigrationStep] {
        let start = (from as usize).min(self.steps.len());
        &self.steps[start..]
    }

    /// Highest version in the registry.
    pub fn latest(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn get(&self, version: u32) -> Option<&MigrationStep> {
        version
            .checked_sub(1)
            .and_then(|index| self.steps.get(index as usize))
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }
}
