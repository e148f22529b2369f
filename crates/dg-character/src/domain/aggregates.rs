//! Patient and Ghost aggregates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dg_core::color::{Cmyk, SoulColor};
use dg_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commands::{CreateGhost, CreatePatient, NewAbility};
use super::economy::Buff;

/// Personality archives keyed by color.
pub type Archives = BTreeMap<SoulColor, String>;

/// A human character played by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Patient identifier.
    pub id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// The user who plays this patient.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional gender.
    pub gender: Option<String>,
    /// Optional age.
    pub age: Option<i32>,
    /// Optional social identity.
    pub identity: Option<String>,
    /// Optional portrait.
    pub portrait_url: Option<String>,
    /// The patient's soul color.
    pub soul_color: SoulColor,
    /// All personality archives. Only the soul-color entry is ever disclosed.
    pub archives: Archives,
    /// Optional ideal projection.
    pub ideal_projection: Option<String>,
    /// Current region, if positioned.
    pub current_region_id: Option<Uuid>,
    /// Current location, if positioned.
    pub current_location_id: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// The publicly disclosed part of a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapFile {
    /// Patient identifier.
    pub patient_id: Uuid,
    /// Display name.
    pub name: String,
    /// Soul color.
    pub soul_color: SoulColor,
    /// Archives restricted to the soul-color entry.
    pub revealed_archive: Archives,
}

impl Patient {
    /// Builds a patient from a creation command.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is blank.
    pub fn create(id: Uuid, command: &CreatePatient, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if command.name.trim().is_empty() {
            return Err(DomainError::Validation("patient name must not be empty".to_owned()));
        }
        Ok(Self {
            id,
            game_id: command.game_id,
            user_id: command.user_id,
            name: command.name.trim().to_owned(),
            gender: command.gender.clone(),
            age: command.age,
            identity: command.identity.clone(),
            portrait_url: command.portrait_url.clone(),
            soul_color: command.soul_color,
            archives: command.archives.clone(),
            ideal_projection: command.ideal_projection.clone(),
            current_region_id: command.current_region_id,
            current_location_id: command.current_location_id,
            created_at: now,
        })
    }

    /// Returns the SWAP file: name, soul color, and the own-color archive only.
    #[must_use]
    pub fn swap_file(&self) -> SwapFile {
        let revealed_archive = self
            .archives
            .get(&self.soul_color)
            .map(|text| BTreeMap::from([(self.soul_color, text.clone())]))
            .unwrap_or_default();
        SwapFile {
            patient_id: self.id,
            name: self.name.clone(),
            soul_color: self.soul_color,
            revealed_archive,
        }
    }

    /// Moves the patient. A location carries its own region.
    pub fn move_to(&mut self, region_id: Option<Uuid>, location_id: Option<Uuid>) {
        self.current_region_id = region_id;
        self.current_location_id = location_id;
    }
}

/// A print ability carried by a ghost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintAbility {
    /// Ability identifier.
    pub id: Uuid,
    /// The ghost currently holding the ability.
    pub ghost_id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// The ability's color.
    pub color: SoulColor,
    /// Remaining uses.
    pub ability_count: i32,
}

impl PrintAbility {
    fn from_new(ghost_id: Uuid, ability: &NewAbility) -> Result<Self, DomainError> {
        if ability.name.trim().is_empty() {
            return Err(DomainError::Validation("ability name must not be empty".to_owned()));
        }
        if ability.ability_count < 0 {
            return Err(DomainError::Validation(format!(
                "ability_count must not be negative (got {})",
                ability.ability_count
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            ghost_id,
            name: ability.name.trim().to_owned(),
            description: ability.description.clone(),
            color: ability.color,
            ability_count: ability.ability_count,
        })
    }

    /// Consumes one use.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` when no uses remain.
    pub fn spend(&mut self) -> Result<(), DomainError> {
        if self.ability_count <= 0 {
            return Err(DomainError::InvalidState(format!(
                "ability {} has no uses left",
                self.id
            )));
        }
        self.ability_count -= 1;
        Ok(())
    }
}

/// Snapshot of the origin patient taken when the ghost was created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginSnapshot {
    /// Origin name.
    pub name: Option<String>,
    /// Origin identity.
    pub identity: Option<String>,
    /// Origin soul color.
    pub soul_color: Option<SoulColor>,
    /// Origin ideal projection.
    pub ideal_projection: Option<String>,
    /// Origin archives.
    pub archives: Archives,
}

impl OriginSnapshot {
    fn of(patient: &Patient) -> Self {
        Self {
            name: Some(patient.name.clone()),
            identity: patient.identity.clone(),
            soul_color: Some(patient.soul_color),
            ideal_projection: patient.ideal_projection.clone(),
            archives: patient.archives.clone(),
        }
    }
}

/// Starting HP/MP used when a ghost is created without explicit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VitalDefaults {
    /// Default HP and HP maximum.
    pub hp: i32,
    /// Default MP and MP maximum.
    pub mp: i32,
}

/// The entity inhabiting a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ghost {
    /// Ghost identifier.
    pub id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// The patient the ghost inhabits now. Unique across ghosts.
    pub current_patient_id: Option<Uuid>,
    /// The patient the ghost came from. Unique across ghosts.
    pub origin_patient_id: Option<Uuid>,
    /// The user who created the ghost.
    pub creator_user_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Optional appearance.
    pub appearance: Option<String>,
    /// Optional personality.
    pub personality: Option<String>,
    /// Attribute vector.
    pub cmyk: Cmyk,
    /// Current HP.
    pub hp: i32,
    /// Maximum HP.
    pub hp_max: i32,
    /// Current MP.
    pub mp: i32,
    /// Maximum MP.
    pub mp_max: i32,
    /// Origin snapshot. Immutable after creation.
    pub origin: OriginSnapshot,
    /// Per-color archive unlock flags.
    pub archive_unlock: BTreeMap<SoulColor, bool>,
    /// Whether the origin name is revealed.
    pub origin_name_unlocked: bool,
    /// Whether the origin identity is revealed.
    pub origin_identity_unlocked: bool,
    /// Abilities held.
    pub abilities: Vec<PrintAbility>,
    /// Active buffs.
    pub buffs: Vec<Buff>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Ghost {
    /// Builds a ghost from a creation command.
    ///
    /// `origin` must be the patient named by `origin_patient_id`, if any.
    /// The soul color comes from the command or else from the origin.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no soul color can be determined,
    /// the name is blank, or the vitals are inconsistent.
    pub fn create(
        id: Uuid,
        command: &CreateGhost,
        origin: Option<&Patient>,
        defaults: VitalDefaults,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if command.name.trim().is_empty() {
            return Err(DomainError::Validation("ghost name must not be empty".to_owned()));
        }
        let soul_color = command
            .soul_color
            .or_else(|| origin.map(|p| p.soul_color))
            .ok_or_else(|| {
                DomainError::Validation(
                    "soul_color is required when the ghost has no origin patient".to_owned(),
                )
            })?;

        let hp_max = command.hp_max.unwrap_or(defaults.hp);
        let hp = command.hp.unwrap_or(hp_max);
        let mp_max = command.mp_max.unwrap_or(defaults.mp);
        let mp = command.mp.unwrap_or(mp_max);
        if hp_max <= 0 || !(0..=hp_max).contains(&hp) {
            return Err(DomainError::Validation(format!(
                "hp must be between 0 and a positive hp_max (got {hp}/{hp_max})"
            )));
        }
        if mp_max < 0 || !(0..=mp_max).contains(&mp) {
            return Err(DomainError::Validation(format!(
                "mp must be between 0 and mp_max (got {mp}/{mp_max})"
            )));
        }

        let abilities = command
            .abilities
            .iter()
            .map(|a| PrintAbility::from_new(id, a))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            game_id: command.game_id,
            current_patient_id: command.current_patient_id,
            origin_patient_id: command.origin_patient_id,
            creator_user_id: command.creator_user_id,
            name: command.name.trim().to_owned(),
            appearance: command.appearance.clone(),
            personality: command.personality.clone(),
            cmyk: command.cmyk.unwrap_or_else(|| Cmyk::from_soul_color(soul_color)),
            hp,
            hp_max,
            mp,
            mp_max,
            origin: origin.map(OriginSnapshot::of).unwrap_or_default(),
            archive_unlock: SoulColor::ALL.iter().map(|c| (*c, false)).collect(),
            origin_name_unlocked: false,
            origin_identity_unlocked: false,
            abilities,
            buffs: Vec::new(),
            created_at: now,
        })
    }

    /// Returns the ghost's value in one CMYK channel.
    #[must_use]
    pub fn channel(&self, color: SoulColor) -> i32 {
        self.cmyk.get(color)
    }

    /// Applies damage and returns HP afterwards. HP never drops below zero.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        self.hp = self.hp.saturating_sub(amount.max(0)).max(0);
        self.hp
    }

    /// Reveals the origin archive for `color`. Returns `false` if it was
    /// already revealed.
    pub fn unlock_archive(&mut self, color: SoulColor) -> bool {
        let flag = self.archive_unlock.entry(color).or_insert(false);
        let changed = !*flag;
        *flag = true;
        changed
    }

    /// Reveals the origin name. Returns `false` if it was already revealed.
    pub fn unlock_origin_name(&mut self) -> bool {
        let changed = !self.origin_name_unlocked;
        self.origin_name_unlocked = true;
        changed
    }

    /// Reveals the origin identity. Returns `false` if it was already revealed.
    pub fn unlock_origin_identity(&mut self) -> bool {
        let changed = !self.origin_identity_unlocked;
        self.origin_identity_unlocked = true;
        changed
    }

    /// Looks up a held ability.
    #[must_use]
    pub fn ability(&self, ability_id: Uuid) -> Option<&PrintAbility> {
        self.abilities.iter().find(|a| a.id == ability_id)
    }

    /// Looks up a held ability mutably.
    pub fn ability_mut(&mut self, ability_id: Uuid) -> Option<&mut PrintAbility> {
        self.abilities.iter_mut().find(|a| a.id == ability_id)
    }

    /// Removes a held ability so it can be handed to another ghost.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the ghost does not hold it.
    pub fn release_ability(&mut self, ability_id: Uuid) -> Result<PrintAbility, DomainError> {
        let index = self
            .abilities
            .iter()
            .position(|a| a.id == ability_id)
            .ok_or_else(|| DomainError::not_found("print_ability", ability_id))?;
        Ok(self.abilities.remove(index))
    }

    /// Takes ownership of an ability released by another ghost.
    pub fn receive_ability(&mut self, mut ability: PrintAbility) {
        ability.ghost_id = self.id;
        self.abilities.push(ability);
    }

    /// Attaches a buff.
    pub fn add_buff(&mut self, buff: Buff) {
        self.buffs.push(buff);
    }

    /// Returns the player-facing view, with locked origin fields hidden.
    #[must_use]
    pub fn view(&self) -> GhostView {
        let origin_archives = self
            .origin
            .archives
            .iter()
            .filter(|(color, _)| self.archive_unlock.get(color).copied().unwrap_or(false))
            .map(|(color, text)| (*color, text.clone()))
            .collect();
        GhostView {
            id: self.id,
            name: self.name.clone(),
            appearance: self.appearance.clone(),
            personality: self.personality.clone(),
            current_patient_id: self.current_patient_id,
            cmyk: self.cmyk,
            hp: self.hp,
            hp_max: self.hp_max,
            mp: self.mp,
            mp_max: self.mp_max,
            origin_soul_color: self.origin.soul_color,
            origin_name: self
                .origin_name_unlocked
                .then(|| self.origin.name.clone())
                .flatten(),
            origin_identity: self
                .origin_identity_unlocked
                .then(|| self.origin.identity.clone())
                .flatten(),
            origin_archives,
            archive_unlock: self.archive_unlock.clone(),
            abilities: self.abilities.clone(),
            buffs: self.buffs.clone(),
        }
    }
}

/// A ghost as shown to players.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GhostView {
    /// Ghost identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Appearance.
    pub appearance: Option<String>,
    /// Personality.
    pub personality: Option<String>,
    /// The patient the ghost inhabits.
    pub current_patient_id: Option<Uuid>,
    /// Attribute vector.
    pub cmyk: Cmyk,
    /// Current HP.
    pub hp: i32,
    /// Maximum HP.
    pub hp_max: i32,
    /// Current MP.
    pub mp: i32,
    /// Maximum MP.
    pub mp_max: i32,
    /// Origin soul color.
    pub origin_soul_color: Option<SoulColor>,
    /// Origin name, once unlocked.
    pub origin_name: Option<String>,
    /// Origin identity, once unlocked.
    pub origin_identity: Option<String>,
    /// Unlocked origin archives.
    pub origin_archives: Archives,
    /// Per-color unlock flags.
    pub archive_unlock: BTreeMap<SoulColor, bool>,
    /// Abilities held.
    #[serde(rename = "print_abilities")]
    pub abilities: Vec<PrintAbility>,
    /// Active buffs.
    pub buffs: Vec<Buff>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_test_support::fixed_now;

    const DEFAULTS: VitalDefaults = VitalDefaults { hp: 10, mp: 5 };

    fn create_patient_command(soul_color: SoulColor) -> CreatePatient {
        CreatePatient {
            correlation_id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Iris".to_owned(),
            gender: None,
            age: Some(27),
            identity: Some("night-shift nurse".to_owned()),
            portrait_url: None,
            soul_color,
            archives: BTreeMap::from([
                (SoulColor::C, "a".to_owned()),
                (SoulColor::M, "b".to_owned()),
            ]),
            ideal_projection: None,
            current_region_id: None,
            current_location_id: None,
        }
    }

    fn create_ghost_command(game_id: Uuid, origin_patient_id: Option<Uuid>) -> CreateGhost {
        CreateGhost {
            correlation_id: Uuid::new_v4(),
            game_id,
            creator_user_id: None,
            name: "Echo".to_owned(),
            appearance: None,
            personality: None,
            current_patient_id: None,
            origin_patient_id,
            soul_color: None,
            cmyk: None,
            hp: None,
            hp_max: None,
            mp: None,
            mp_max: None,
            abilities: vec![NewAbility {
                name: "Static".to_owned(),
                description: None,
                color: SoulColor::C,
                ability_count: 1,
            }],
        }
    }

    fn patient(soul_color: SoulColor) -> Patient {
        Patient::create(Uuid::new_v4(), &create_patient_command(soul_color), fixed_now()).unwrap()
    }

    #[test]
    fn test_swap_file_discloses_only_own_color() {
        // Arrange
        let patient = patient(SoulColor::C);

        // Act
        let swap = patient.swap_file();

        // Assert
        assert_eq!(swap.revealed_archive.get(&SoulColor::C).map(String::as_str), Some("a"));
        assert!(!swap.revealed_archive.contains_key(&SoulColor::M));
        assert_eq!(swap.revealed_archive.len(), 1);
        assert_eq!(patient.archives.len(), 2);
    }

    #[test]
    fn test_swap_file_is_empty_when_own_color_missing() {
        let patient = patient(SoulColor::Y);
        assert!(patient.swap_file().revealed_archive.is_empty());
    }

    #[test]
    fn test_blank_patient_name_is_rejected() {
        let mut command = create_patient_command(SoulColor::C);
        command.name = "   ".to_owned();
        assert!(matches!(
            Patient::create(Uuid::new_v4(), &command, fixed_now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_ghost_defaults_from_origin_soul_color() {
        // Arrange
        let origin = patient(SoulColor::C);
        let command = create_ghost_command(origin.game_id, Some(origin.id));

        // Act
        let ghost = Ghost::create(Uuid::new_v4(), &command, Some(&origin), DEFAULTS, fixed_now())
            .unwrap();

        // Assert
        assert_eq!(ghost.cmyk, Cmyk { c: 1, m: 0, y: 0, k: 0 });
        assert_eq!(ghost.hp, ghost.hp_max);
        assert_eq!(ghost.hp_max, 10);
        assert_eq!(ghost.mp, 5);
        assert_eq!(ghost.origin.name.as_deref(), Some("Iris"));
        assert_eq!(ghost.abilities.len(), 1);
        assert_eq!(ghost.abilities[0].ghost_id, ghost.id);
        assert!(ghost.archive_unlock.values().all(|unlocked| !unlocked));
    }

    #[test]
    fn test_ghost_without_origin_needs_soul_color() {
        let command = create_ghost_command(Uuid::new_v4(), None);
        assert!(matches!(
            Ghost::create(Uuid::new_v4(), &command, None, DEFAULTS, fixed_now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_ghost_explicit_vitals_and_cmyk_override() {
        let mut command = create_ghost_command(Uuid::new_v4(), None);
        command.soul_color = Some(SoulColor::K);
        command.cmyk = Some(Cmyk { c: 0, m: 2, y: 0, k: 3 });
        command.hp_max = Some(12);
        command.hp = Some(7);

        let ghost = Ghost::create(Uuid::new_v4(), &command, None, DEFAULTS, fixed_now()).unwrap();

        assert_eq!(ghost.cmyk.k, 3);
        assert_eq!((ghost.hp, ghost.hp_max), (7, 12));
    }

    #[test]
    fn test_ghost_hp_above_max_is_rejected() {
        let mut command = create_ghost_command(Uuid::new_v4(), None);
        command.soul_color = Some(SoulColor::C);
        command.hp_max = Some(5);
        command.hp = Some(6);
        assert!(Ghost::create(Uuid::new_v4(), &command, None, DEFAULTS, fixed_now()).is_err());
    }

    #[test]
    fn test_damage_floors_at_zero() {
        let origin = patient(SoulColor::M);
        let command = create_ghost_command(origin.game_id, Some(origin.id));
        let mut ghost =
            Ghost::create(Uuid::new_v4(), &command, Some(&origin), DEFAULTS, fixed_now()).unwrap();

        assert_eq!(ghost.take_damage(3), 7);
        assert_eq!(ghost.take_damage(50), 0);
        assert_eq!(ghost.take_damage(-4), 0);
    }

    #[test]
    fn test_unlocks_only_move_forward_and_drive_the_view() {
        // Arrange
        let origin = patient(SoulColor::C);
        let command = create_ghost_command(origin.game_id, Some(origin.id));
        let mut ghost =
            Ghost::create(Uuid::new_v4(), &command, Some(&origin), DEFAULTS, fixed_now()).unwrap();
        let hidden = ghost.view();

        // Act
        let first = ghost.unlock_archive(SoulColor::M);
        let second = ghost.unlock_archive(SoulColor::M);
        ghost.unlock_origin_name();

        // Assert
        assert!(hidden.origin_name.is_none());
        assert!(hidden.origin_archives.is_empty());
        assert!(first);
        assert!(!second);
        let view = ghost.view();
        assert_eq!(view.origin_name.as_deref(), Some("Iris"));
        assert!(view.origin_identity.is_none());
        assert_eq!(view.origin_archives.get(&SoulColor::M).map(String::as_str), Some("b"));
        assert!(!view.origin_archives.contains_key(&SoulColor::C));
    }

    #[test]
    fn test_ability_spend_and_transfer() {
        let origin = patient(SoulColor::C);
        let command = create_ghost_command(origin.game_id, Some(origin.id));
        let mut giver =
            Ghost::create(Uuid::new_v4(), &command, Some(&origin), DEFAULTS, fixed_now()).unwrap();
        let mut receiver_command = create_ghost_command(origin.game_id, None);
        receiver_command.soul_color = Some(SoulColor::Y);
        receiver_command.abilities.clear();
        let mut receiver =
            Ghost::create(Uuid::new_v4(), &receiver_command, None, DEFAULTS, fixed_now()).unwrap();
        let ability_id = giver.abilities[0].id;

        let ability = giver.release_ability(ability_id).unwrap();
        receiver.receive_ability(ability);

        assert!(giver.ability(ability_id).is_none());
        let receiver_id = receiver.id;
        let moved = receiver.ability_mut(ability_id).unwrap();
        assert_eq!(moved.ghost_id, receiver_id);
        moved.spend().unwrap();
        assert!(matches!(moved.spend(), Err(DomainError::InvalidState(_))));
        assert!(matches!(
            giver.release_ability(ability_id),
            Err(DomainError::NotFound { .. })
        ));
    }
}
