//! Session scopes and the mutual-exclusion predicate.

use dg_core::error::DomainError;
use dg_game::domain::config::ScopePolicy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a session runs. Ranked Location > Region > Game-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// No region or location.
    Game,
    /// A whole region.
    Region {
        /// The region.
        region_id: Uuid,
    },
    /// One location, inside its region.
    Location {
        /// The location's region.
        region_id: Uuid,
        /// The location.
        location_id: Uuid,
    },
}

impl Scope {
    /// Rebuilds a scope from stored columns.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a location without a region.
    pub fn from_parts(
        region_id: Option<Uuid>,
        location_id: Option<Uuid>,
    ) -> Result<Self, DomainError> {
        match (region_id, location_id) {
            (None, None) => Ok(Scope::Game),
            (Some(region_id), None) => Ok(Scope::Region { region_id }),
            (Some(region_id), Some(location_id)) => Ok(Scope::Location {
                region_id,
                location_id,
            }),
            (None, Some(location_id)) => Err(DomainError::Validation(format!(
                "location {location_id} given without its region"
            ))),
        }
    }

    /// The region column for storage.
    #[must_use]
    pub fn region_id(&self) -> Option<Uuid> {
        match self {
            Scope::Game => None,
            Scope::Region { region_id } | Scope::Location { region_id, .. } => Some(*region_id),
        }
    }

    /// The location column for storage.
    #[must_use]
    pub fn location_id(&self) -> Option<Uuid> {
        match self {
            Scope::Location { location_id, .. } => Some(*location_id),
            _ => None,
        }
    }

    /// Returns `true` if two holding sessions with these scopes may not coexist.
    #[must_use]
    pub fn conflicts_with(&self, other: &Scope, policy: ScopePolicy) -> bool {
        match (self, other) {
            (Scope::Game, Scope::Game) => true,
            (Scope::Region { region_id: a }, Scope::Region { region_id: b }) => a == b,
            (
                Scope::Location { location_id: a, .. },
                Scope::Location { location_id: b, .. },
            ) => a == b,
            (Scope::Region { region_id }, Scope::Location { region_id: parent, .. })
            | (Scope::Location { region_id: parent, .. }, Scope::Region { region_id }) => {
                policy == ScopePolicy::Strict && region_id == parent
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: Uuid) -> Scope {
        Scope::Region { region_id: id }
    }

    fn location(region_id: Uuid, location_id: Uuid) -> Scope {
        Scope::Location {
            region_id,
            location_id,
        }
    }

    #[test]
    fn test_same_location_conflicts() {
        let (r, l) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(location(r, l).conflicts_with(&location(r, l), ScopePolicy::Strict));
        assert!(location(r, l).conflicts_with(&location(r, l), ScopePolicy::IndependentLocations));
    }

    #[test]
    fn test_distinct_locations_are_independent() {
        let r = Uuid::new_v4();
        let a = location(r, Uuid::new_v4());
        let b = location(r, Uuid::new_v4());
        assert!(!a.conflicts_with(&b, ScopePolicy::Strict));
    }

    #[test]
    fn test_region_conflicts_with_itself_and_its_locations_under_strict() {
        let r = Uuid::new_v4();
        let inner = location(r, Uuid::new_v4());
        let outer = location(Uuid::new_v4(), Uuid::new_v4());

        assert!(region(r).conflicts_with(&region(r), ScopePolicy::Strict));
        assert!(region(r).conflicts_with(&inner, ScopePolicy::Strict));
        assert!(inner.conflicts_with(&region(r), ScopePolicy::Strict));
        assert!(!region(r).conflicts_with(&outer, ScopePolicy::Strict));
        assert!(!region(r).conflicts_with(&region(Uuid::new_v4()), ScopePolicy::Strict));
    }

    #[test]
    fn test_independent_locations_policy_lets_region_and_location_coexist() {
        let r = Uuid::new_v4();
        let inner = location(r, Uuid::new_v4());
        assert!(!region(r).conflicts_with(&inner, ScopePolicy::IndependentLocations));
        assert!(region(r).conflicts_with(&region(r), ScopePolicy::IndependentLocations));
    }

    #[test]
    fn test_game_wide_scope_only_conflicts_with_game_wide() {
        let r = Uuid::new_v4();
        assert!(Scope::Game.conflicts_with(&Scope::Game, ScopePolicy::Strict));
        assert!(!Scope::Game.conflicts_with(&region(r), ScopePolicy::Strict));
        assert!(!location(r, Uuid::new_v4()).conflicts_with(&Scope::Game, ScopePolicy::Strict));
    }

    #[test]
    fn test_from_parts() {
        let (r, l) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(Scope::from_parts(None, None).unwrap(), Scope::Game);
        assert_eq!(Scope::from_parts(Some(r), None).unwrap(), region(r));
        let scope = Scope::from_parts(Some(r), Some(l)).unwrap();
        assert_eq!(scope.location_id(), Some(l));
        assert_eq!(scope.region_id(), Some(r));
        assert!(Scope::from_parts(None, Some(l)).is_err());
    }
}
