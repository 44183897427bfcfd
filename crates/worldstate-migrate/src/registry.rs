use tracing::debug;

use crate::step::MigrationStep;

/// Error building a [`MigrationRegistry`].
///
/// These are configuration errors: the process must refuse to start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A version is missing, duplicated, or out of place.
    #[error(
        "migrations must be in order and not skip a version: \
         the migration at position {position} has version {found}"
    )]
    OutOfSequence { position: usize, found: u32 },
    /// The declared last migration version does not match the step list.
    #[error(
        "the last migration version is declared as {declared}, \
         but the registered steps end at {actual}"
    )]
    LastVersionMismatch { declared: u32, actual: u32 },
    /// No steps were registered at all.
    #[error("no migrations registered, but the last migration version is declared as {declared}")]
    Empty { declared: u32 },
}

/// The validated, ordered set of migration steps.
///
/// Steps are listed explicitly by the application and checked once at
/// startup:
///
/// - after sorting, the step at position `i` has version `i`;
/// - the last version equals the declared `last_migration_version`.
pub struct MigrationRegistry<C: Sync> {
    steps: Vec<Box<dyn MigrationStep<C>>>,
}

impl<C: Sync> MigrationRegistry<C> {
    /// Sort and validate `steps`.
    pub fn build(
        mut steps: Vec<Box<dyn MigrationStep<C>>>,
        last_migration_version: u32,
    ) -> Result<Self, RegistryError> {
        steps.sort_by_key(|step| step.version());

        for (position, step) in steps.iter().enumerate() {
            if usize::try_from(step.version()).ok() != Some(position) {
                return Err(RegistryError::OutOfSequence {
                    position,
                    found: step.version(),
                });
            }
        }

        let Some(last) = steps.last() else {
            return Err(RegistryError::Empty {
                declared: last_migration_version,
            });
        };

        let actual = last.version();
        if actual != last_migration_version {
            return Err(RegistryError::LastVersionMismatch {
                declared: last_migration_version,
                actual,
            });
        }

        debug!(count = steps.len(), last_version = actual, "migration registry validated");
        Ok(Self { steps })
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always `false` for a built registry.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Version of the newest step.
    pub fn last_version(&self) -> u32 {
        self.steps.last().map_or(0, |step| step.version())
    }

    /// Versions of all steps, ascending.
    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.steps.iter().map(|step| step.version())
    }

    /// All steps, ascending by version.
    pub fn steps(&self) -> impl Iterator<Item = &dyn MigrationStep<C>> {
        self.steps.iter().map(|step| step.as_ref())
    }

    /// Steps with `version >= from_version`, ascending.
    pub fn steps_from(&self, from_version: u32) -> impl Iterator<Item = &dyn MigrationStep<C>> {
        // Versions equal positions, so skipping by count is exact.
        let skip = usize::try_from(from_version).unwrap_or(usize::MAX);
        self.steps.iter().skip(skip).map(|step| step.as_ref())
    }

    /// Number of steps a run starting at `from_version` would apply.
    pub fn pending_count(&self, from_version: u32) -> usize {
        self.steps_from(from_version).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{FnStep, StepError};
    use worldstate_tree::Document;

    fn noop(doc: Document, _: &()) -> Result<Document, StepError> {
        Ok(doc)
    }

    fn steps(versions: &[u32]) -> Vec<Box<dyn MigrationStep<()>>> {
        versions
            .iter()
            .map(|&v| Box::new(FnStep::new(v, "noop", noop)) as Box<dyn MigrationStep<()>>)
            .collect()
    }

    #[test]
    fn contiguous_versions_with_matching_constant_build() {
        let registry = MigrationRegistry::build(steps(&[0, 1, 2]), 2).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.last_version(), 2);
        assert!(!registry.is_empty());
    }

    #[test]
    fn steps_are_sorted_by_version() {
        let registry = MigrationRegistry::build(steps(&[2, 0, 1]), 2).unwrap();
        assert_eq!(registry.versions().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn gap_is_rejected() {
        let err = MigrationRegistry::build(steps(&[0, 2]), 2).err().unwrap();
        assert_eq!(
            err,
            RegistryError::OutOfSequence {
                position: 1,
                found: 2
            }
        );
    }

    #[test]
    fn duplicate_is_rejected() {
        let err = MigrationRegistry::build(steps(&[0, 0, 1]), 2).err().unwrap();
        assert_eq!(
            err,
            RegistryError::OutOfSequence {
                position: 1,
                found: 0
            }
        );
    }

    #[test]
    fn missing_first_version_is_rejected() {
        let err = MigrationRegistry::build(steps(&[1, 2]), 2).err().unwrap();
        assert_eq!(
            err,
            RegistryError::OutOfSequence {
                position: 0,
                found: 1
            }
        );
    }

    #[test]
    fn constant_mismatch_is_rejected() {
        let err = MigrationRegistry::build(steps(&[0, 1, 2]), 1).err().unwrap();
        assert_eq!(
            err,
            RegistryError::LastVersionMismatch {
                declared: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn empty_registry_is_rejected() {
        let err = MigrationRegistry::build(steps(&[]), 0).err().unwrap();
        assert_eq!(err, RegistryError::Empty { declared: 0 });
    }

    #[test]
    fn steps_from_selects_tail() {
        let registry = MigrationRegistry::build(steps(&[0, 1, 2, 3]), 3).unwrap();
        let tail: Vec<u32> = registry.steps_from(2).map(|s| s.version()).collect();
        assert_eq!(tail, vec![2, 3]);
        assert_eq!(registry.pending_count(0), 4);
        assert_eq!(registry.pending_count(4), 0);
        assert_eq!(registry.pending_count(10), 0);
    }
}
