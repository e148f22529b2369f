//! Handlers for events that roll dice: checks, attacks, and DM-defined
//! event checks.

use dg_character::domain::aggregates::Ghost;
use dg_core::error::DomainError;
use dg_rules::DiceExpression;
use dg_session::domain::event_definition::{EventAbilityUsage, EventDefinition};
use serde_json::json;
use uuid::Uuid;

use super::context::{EventContext, Outcome};
use crate::domain::events::{Attack, EventCheck, EventClose, EventDefine, SkillCheck};

fn ensure_in_play(ctx: &EventContext<'_>, attempted: &'static str) -> Result<(), DomainError> {
    ctx.game.ensure_active(attempted)?;
    ctx.session()?.ensure_active(attempted)
}

async fn acting_ghost(
    ctx: &mut EventContext<'_>,
    ghost_id: Option<Uuid>,
) -> Result<Option<Ghost>, DomainError> {
    if let Some(ghost_id) = ghost_id {
        let ghost = ctx.load_ghost(ghost_id).await?;
        ctx.require_ghost_controller(&ghost).await?;
        return Ok(Some(ghost));
    }
    match ctx.player.as_ref().and_then(|p| p.active_patient_id) {
        Some(patient_id) => ctx.uow.find_ghost_by_patient(patient_id).await,
        None => Ok(None),
    }
}

/// `skill_check`: rolls the game's dice, plus the acting ghost's channel
/// when a color is named, against the supplied difficulty.
pub(crate) async fn skill_check(
    ctx: &mut EventContext<'_>,
    payload: SkillCheck,
) -> Result<Outcome, DomainError> {
    ensure_in_play(ctx, "skill_check")?;
    let ghost = match payload.color {
        Some(_) => acting_ghost(ctx, payload.ghost_id).await?,
        None => None,
    };
    let bonus = match (payload.color, ghost.as_ref()) {
        (Some(color), Some(ghost)) => ghost.channel(color),
        _ => 0,
    };

    let dice = ctx.game_dice()?;
    let check = ctx.check(&dice, bonus, payload.difficulty)?;

    Ok(Outcome::new(json!({
        "roll_total": check.roll.total,
        "check_success": check.success,
        "difficulty": check.difficulty,
        "modifier": check.roll.modifier,
        "expression": check.roll.expression,
        "color": payload.color,
        "ghost_id": ghost.as_ref().map(|g| g.id),
        "context": payload.context,
    }))
    .with_rolls(check.roll.rolls))
}

/// `attack`: a hit roll against the difficulty, then damage to the target.
pub(crate) async fn attack(
    ctx: &mut EventContext<'_>,
    payload: Attack,
) -> Result<Outcome, DomainError> {
    ensure_in_play(ctx, "attack")?;
    if payload.attacker_ghost_id == payload.target_ghost_id {
        return Err(DomainError::Validation("a ghost cannot attack itself".to_owned()));
    }
    let damage_dice = payload
        .damage
        .as_deref()
        .map(DiceExpression::parse)
        .transpose()?;
    let attacker = ctx.load_ghost(payload.attacker_ghost_id).await?;
    ctx.require_ghost_controller(&attacker).await?;
    let mut target = ctx.load_ghost(payload.target_ghost_id).await?;
    if target.hp == 0 {
        return Err(DomainError::InvalidState(format!(
            "ghost {} has no HP left",
            target.id
        )));
    }

    let bonus = payload.color_used.map_or(0, |color| attacker.channel(color));
    let difficulty = payload.difficulty.unwrap_or(ctx.config.attack_difficulty);
    let dice = ctx.game_dice()?;
    let check = ctx.check(&dice, bonus, difficulty)?;
    let mut rolls = check.roll.rolls.clone();

    let damage = if check.success {
        let amount = match damage_dice {
            Some(expression) => {
                let damage_roll = ctx.roll(&expression)?;
                rolls.extend(damage_roll.rolls);
                damage_roll.total.max(0)
            }
            None => ctx.config.attack_damage,
        };
        target.take_damage(amount);
        ctx.uow.save_ghost(&target).await?;
        Some(amount)
    } else {
        None
    };

    Ok(Outcome::new(json!({
        "hit": check.success,
        "roll_total": check.roll.total,
        "difficulty": difficulty,
        "damage": damage,
        "attacker_ghost_id": attacker.id,
        "target_ghost_id": target.id,
        "color_used": payload.color_used,
        "target_hp_after": target.hp,
    }))
    .with_rolls(rolls))
}

/// `event_define`: the target total is given, or rolled from the expression.
pub(crate) async fn event_define(
    ctx: &mut EventContext<'_>,
    payload: EventDefine,
) -> Result<Outcome, DomainError> {
    ctx.session()?.ensure_active("define an event in")?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(DomainError::Validation("event name must not be empty".to_owned()));
    }
    let expression = DiceExpression::parse(&payload.expression)?;
    let (target_roll_total, target_roll_detail) = match payload.target_roll_total {
        Some(total) => (total, None),
        None => {
            let target = ctx.roll(&expression)?;
            (target.total, Some(target.rolls))
        }
    };

    let definition = EventDefinition {
        id: Uuid::new_v4(),
        session_id: ctx.session()?.id,
        game_id: ctx.game.id,
        name: name.to_owned(),
        expression: expression.to_string(),
        color_restriction: payload.color_restriction,
        target_roll_total,
        target_roll_detail: target_roll_detail.clone(),
        is_active: true,
        created_by: Some(ctx.actor_id),
        created_at: ctx.now,
    };
    ctx.uow.insert_event_definition(&definition).await?;

    let outcome = Outcome::new(json!({
        "event_def_id": definition.id,
        "name": definition.name,
        "expression": definition.expression,
        "color_restriction": definition.color_restriction,
        "target_roll_total": definition.target_roll_total,
    }));
    Ok(match target_roll_detail {
        Some(rolls) => outcome.with_rolls(rolls),
        None => outcome,
    })
}

async fn session_event(
    ctx: &mut EventContext<'_>,
    event_def_id: Uuid,
) -> Result<EventDefinition, DomainError> {
    let session_id = ctx.session()?.id;
    ctx.uow
        .find_event_definition(event_def_id)
        .await?
        .filter(|d| d.session_id == session_id)
        .ok_or_else(|| DomainError::not_found("event_definition", event_def_id))
}

/// `event_check`: spends one use of a ghost's ability on an open event and
/// rolls the game's dice plus the ghost's channel for the ability color.
pub(crate) async fn event_check(
    ctx: &mut EventContext<'_>,
    payload: EventCheck,
) -> Result<Outcome, DomainError> {
    ensure_in_play(ctx, "event_check")?;
    let definition = session_event(ctx, payload.event_def_id).await?;
    let mut ghost = ctx.load_ghost(payload.ghost_id).await?;
    ctx.require_ghost_controller(&ghost).await?;

    let ghost_id = ghost.id;
    let ability = ghost.ability_mut(payload.ability_id).ok_or_else(|| {
        DomainError::Validation(format!(
            "ability {} does not belong to ghost {ghost_id}",
            payload.ability_id
        ))
    })?;
    definition.admit(ability.color)?;
    ability.spend()?;
    let color = ability.color;
    let ability_count_after = ability.ability_count;

    ctx.uow
        .insert_ability_usage(&EventAbilityUsage {
            id: Uuid::new_v4(),
            event_def_id: definition.id,
            ghost_id,
            ability_id: payload.ability_id,
            used_at: ctx.now,
        })
        .await?;
    ctx.uow.save_ghost(&ghost).await?;

    let dice = ctx.game_dice()?;
    let check = ctx.check(&dice, ghost.channel(color), definition.target_roll_total)?;

    Ok(Outcome::new(json!({
        "event_def_id": definition.id,
        "event_name": definition.name,
        "ghost_id": ghost_id,
        "ability_id": payload.ability_id,
        "color": color,
        "roll_total": check.roll.total,
        "target_roll_total": definition.target_roll_total,
        "check_success": check.success,
        "ability_count_after": ability_count_after,
    }))
    .with_rolls(check.roll.rolls))
}

/// `event_close`.
pub(crate) async fn event_close(
    ctx: &mut EventContext<'_>,
    payload: EventClose,
) -> Result<Outcome, DomainError> {
    let mut definition = session_event(ctx, payload.event_def_id).await?;
    definition.close()?;
    ctx.uow.update_event_definition(&definition).await?;
    Ok(Outcome::new(json!({
        "event_def_id": definition.id,
        "is_active": definition.is_active,
    })))
}
