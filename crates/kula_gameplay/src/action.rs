//! Actions
//!
//! Every action is a reflected scope whose class has an update function
//! registered with the [`World`]. Actions read their parameters from
//! their own prescribed attributes and resolve targets by searching up
//! the scope tree.

use kula_data::{Field, Reflected, ScopeId, Signature};
use kula_parse::Expression;

use crate::environment::ScopeEnvironment;
use crate::error::{GameplayError, Result};
use crate::world::World;

/// Key of the nested action table in lists, reactions and game objects
pub const ACTIONS_KEY: &str = "Actions";
pub const THEN_KEY: &str = "Then";
pub const ELSE_KEY: &str = "Else";

/// Base of every action: a name
#[derive(Debug, Clone, Default)]
pub struct Action {
    pub name: Field<String>,
}

impl Reflected for Action {
    const TYPE_NAME: &'static str = "Action";

    fn signatures() -> Vec<Signature> {
        vec![Signature::field("Name", 1, |a: &Action| &a.name)]
    }
}

/// Runs the actions in its `Actions` table in order
#[derive(Debug, Clone, Default)]
pub struct ActionList {
    pub action: Action,
}

impl Reflected for ActionList {
    const TYPE_NAME: &'static str = "ActionList";

    fn signatures() -> Vec<Signature> {
        vec![Signature::table(ACTIONS_KEY)]
    }

    fn base(&self) -> Option<&dyn kula_data::Attributed> {
        Some(&self.action)
    }
}

/// Adds `Step` to the integer or float named by `Target`
///
/// Integer targets receive the step truncated toward zero.
#[derive(Debug, Clone)]
pub struct ActionIncrement {
    pub action: Action,
    pub target: Field<String>,
    pub step: Field<f32>,
}

impl Default for ActionIncrement {
    fn default() -> Self {
        Self {
            action: Action::default(),
            target: Field::default(),
            step: Field::new(1.0),
        }
    }
}

impl Reflected for ActionIncrement {
    const TYPE_NAME: &'static str = "ActionIncrement";

    fn signatures() -> Vec<Signature> {
        vec![
            Signature::field("Target", 1, |a: &ActionIncrement| &a.target),
            Signature::field("Step", 1, |a: &ActionIncrement| &a.step),
        ]
    }

    fn base(&self) -> Option<&dyn kula_data::Attributed> {
        Some(&self.action)
    }
}

/// Runs `Then` when `Condition` evaluates truthy, `Else` otherwise
///
/// `Condition` holds a compiled expression; a bare variable name works too.
#[derive(Debug, Clone, Default)]
pub struct ActionListIf {
    pub action: Action,
    pub condition: Field<String>,
}

impl Reflected for ActionListIf {
    const TYPE_NAME: &'static str = "ActionListIf";

    fn signatures() -> Vec<Signature> {
        vec![
            Signature::field("Condition", 1, |a: &ActionListIf| &a.condition),
            Signature::table(THEN_KEY),
            Signature::table(ELSE_KEY),
        ]
    }

    fn base(&self) -> Option<&dyn kula_data::Attributed> {
        Some(&self.action)
    }
}

/// Evaluates `Expression` for its assignments
#[derive(Debug, Clone, Default)]
pub struct ActionExpression {
    pub action: Action,
    pub expression: Field<String>,
}

impl Reflected for ActionExpression {
    const TYPE_NAME: &'static str = "ActionExpression";

    fn signatures() -> Vec<Signature> {
        vec![Signature::field("Expression", 1, |a: &ActionExpression| &a.expression)]
    }

    fn base(&self) -> Option<&dyn kula_data::Attributed> {
        Some(&self.action)
    }
}

/// Borrow the reflected object of `id` as a `T`
pub(crate) fn object<T: Reflected>(world: &World, id: ScopeId) -> Result<&T> {
    world
        .arena()
        .object_as::<T>(id)
        .ok_or_else(|| GameplayError::WrongClass(id.to_string(), T::TYPE_NAME))
}

/// Evaluate compiled expression text from `id`'s point of view
pub(crate) fn evaluate(world: &mut World, id: ScopeId, rpn: &str) -> Result<kula_parse::Operand> {
    let expression = Expression::from_rpn(rpn)?;
    let mut env = ScopeEnvironment::new(world.arena_mut(), id);
    Ok(expression.evaluate(&mut env)?)
}

pub(crate) fn update_list(world: &mut World, id: ScopeId) -> Result<()> {
    world.run_actions(id, ACTIONS_KEY)
}

pub(crate) fn update_increment(world: &mut World, id: ScopeId) -> Result<()> {
    let (target, step) = {
        let increment = object::<ActionIncrement>(world, id)?;
        (increment.target.get(), increment.step.get())
    };

    let (owner, datum) = world
        .arena()
        .search(id, &target)
        .ok_or_else(|| GameplayError::UnknownTarget(target.clone()))?;
    let ty = datum.datum_type();

    let datum = world.arena_mut().at_mut(owner, &target)?;
    match ty {
        kula_data::DatumType::Integer => {
            let value = datum.get_int(0)?;
            datum.set(0, value.wrapping_add(step as i32))?;
        }
        kula_data::DatumType::Float => {
            let value = datum.get_float(0)?;
            datum.set(0, value + step)?;
        }
        other => {
            return Err(kula_core::Error::type_mismatch("Integer or Float", other).into());
        }
    }
    Ok(())
}

pub(crate) fn update_list_if(world: &mut World, id: ScopeId) -> Result<()> {
    let condition = object::<ActionListIf>(world, id)?.condition.get();
    let branch = if evaluate(world, id, &condition)?.is_truthy() {
        THEN_KEY
    } else {
        ELSE_KEY
    };
    log::trace!("Condition `{}` of {} took {}", condition, id, branch);
    world.run_actions(id, branch)
}

pub(crate) fn update_expression(world: &mut World, id: ScopeId) -> Result<()> {
    let text = object::<ActionExpression>(world, id)?.expression.get();
    evaluate(world, id, &text)?;
    Ok(())
}
