//! Core opcode handlers.
//!
//! Handlers decode their operand payload through the bounds-checked
//! cursor and act on the database, spatial index, or command buffer.
//! A stale handle or wrong register tag makes the handler a no-op; only
//! a malformed payload surfaces an error (which halts the flow).

use flow_bytecode::{
    ApplyBurningOp, ApplyForceOp, AreaDamageOp, Cursor, EndForEachOp, ForEachTargetOp, JumpOp,
    ModifyAttributeOp, MoveForwardOp, MoveToOp, Opcode, PlayAnimationOp, QueryNearbyOp,
    Result as BytecodeResult, SetDamageOp, SpawnEntityOp, WaitSecondsOp, WatchOp,
};
use flow_db::{Attribute, UnitHandle};
use glam::Vec3;
use tracing::debug;

use crate::command::Command;
use crate::register::Register;
use crate::registry::OpcodeRegistry;
use crate::vm::{ExecContext, FlowVm, WaitKind};

/// Damage is never reduced below this by defense.
const MIN_DAMAGE: f32 = 1.0;
/// Area damage never falls below this fraction of its base.
const AREA_DAMAGE_FLOOR: f32 = 0.3;

/// Install every core opcode handler into a registry.
pub fn install_core(registry: &mut OpcodeRegistry) {
    registry.register(Opcode::END, op_end);
    registry.register(Opcode::JUMP, op_jump);
    registry.register(Opcode::PLAY_ANIMATION, op_play_animation);
    registry.register(Opcode::WAIT_SECONDS, op_wait_seconds);
    registry.register(Opcode::WAIT_UNTIL_DESTROYED, op_wait_until_destroyed);
    registry.register(Opcode::WAIT_UNTIL_COLLISION, op_wait_until_collision);
    registry.register(Opcode::WAIT_UNTIL_ARRIVAL, op_wait_until_arrival);
    registry.register(Opcode::WAIT_UNTIL_SIGNAL, op_wait_until_signal);
    registry.register(Opcode::MOVE_TO, op_move_to);
    registry.register(Opcode::MOVE_FORWARD, op_move_forward);
    registry.register(Opcode::STOP, op_stop);
    registry.register(Opcode::APPLY_FORCE, op_apply_force);
    registry.register(Opcode::SPAWN_ENTITY, op_spawn_entity);
    registry.register(Opcode::DESTROY_ENTITY, op_destroy_entity);
    registry.register(Opcode::SET_DAMAGE, op_set_damage);
    registry.register(Opcode::AREA_DAMAGE, op_area_damage);
    registry.register(Opcode::APPLY_BURNING, op_apply_burning);
    registry.register(Opcode::MODIFY_ATTRIBUTE, op_modify_attribute);
    registry.register(Opcode::QUERY_NEARBY, op_query_nearby);
    registry.register(Opcode::FOR_EACH_TARGET, op_for_each_target);
    registry.register(Opcode::END_FOR_EACH, op_end_for_each);
}

/// A register interpreted as a point: either a vector, or a live unit
/// whose position is looked up.
fn position_in_register(ctx: &ExecContext<'_>, vm: &FlowVm, index: u8) -> Option<Vec3> {
    match vm.register(index)? {
        Register::Vector(v) => Some(*v),
        Register::Unit(handle) if ctx.db.is_valid(*handle) => Some(ctx.db.location(*handle)),
        _ => None,
    }
}

/// A register interpreted as a live unit handle.
fn live_unit_in_register(ctx: &ExecContext<'_>, vm: &FlowVm, index: u8) -> Option<UnitHandle> {
    let handle = vm.register(index)?.as_unit()?;
    ctx.db.is_valid(handle).then_some(handle)
}

/// Flat-defense damage: `max(amount - defense, 1.0)` off health.
fn apply_damage(ctx: &mut ExecContext<'_>, target: UnitHandle, amount: f32) {
    let defense = ctx
        .db
        .attrs(target)
        .map_or(0.0, |attrs| attrs.get(Attribute::Defense));
    let dealt = (amount - defense).max(MIN_DAMAGE);
    ctx.db.modify_attribute(target, Attribute::Health, -dealt);
}

fn op_end(
    _ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    _cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    vm.halt();
    Ok(())
}

fn op_jump(
    _ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = JumpOp::decode(cursor)?;
    let target = vm.instruction_start() as i64 + i64::from(op.offset);
    if target < 0 {
        debug!(offset = op.offset, "jump before program start; halting");
        vm.halt();
    } else {
        // A target past the end halts naturally in the decode loop.
        vm.request_jump(target as usize);
    }
    Ok(())
}

fn op_play_animation(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = PlayAnimationOp::decode(cursor)?;
    let owner = vm.owner_unit();
    if ctx.db.is_valid(owner) {
        ctx.commands.push(Command::PlayAnimation {
            unit: owner,
            name: op.name.to_owned(),
        });
    }
    Ok(())
}

fn op_wait_seconds(
    _ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = WaitSecondsOp::decode(cursor)?;
    if op.seconds > 0.0 {
        vm.block_on_timer(op.seconds);
    }
    Ok(())
}

fn block_on_watched(ctx: &ExecContext<'_>, vm: &mut FlowVm, register: u8, kind: WaitKind) {
    // Nothing to watch: a wait on a missing or dead unit is a no-op.
    if let Some(handle) = live_unit_in_register(ctx, vm, register) {
        let position = ctx.db.location(handle);
        vm.block_on_handle(register, kind, position);
    }
}

fn op_wait_until_destroyed(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = WatchOp::decode(cursor)?;
    block_on_watched(ctx, vm, op.register, WaitKind::Destroyed);
    Ok(())
}

fn op_wait_until_collision(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = WatchOp::decode(cursor)?;
    block_on_watched(ctx, vm, op.register, WaitKind::Collision);
    Ok(())
}

fn op_wait_until_arrival(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = WatchOp::decode(cursor)?;
    block_on_watched(ctx, vm, op.register, WaitKind::Arrival);
    Ok(())
}

fn op_wait_until_signal(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = WatchOp::decode(cursor)?;
    block_on_watched(ctx, vm, op.register, WaitKind::Signal);
    Ok(())
}

fn op_move_to(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = MoveToOp::decode(cursor)?;
    let owner = vm.owner_unit();
    if !ctx.db.is_valid(owner) {
        return Ok(());
    }
    if let Some(dest) = position_in_register(ctx, vm, op.dest_register) {
        ctx.commands.push(Command::MoveTo {
            unit: owner,
            dest,
            speed: op.speed,
        });
    }
    Ok(())
}

fn op_move_forward(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = MoveForwardOp::decode(cursor)?;
    if let Some(unit) = live_unit_in_register(ctx, vm, op.unit_register) {
        ctx.commands.push(Command::MoveForward {
            unit,
            speed: op.speed,
        });
    }
    Ok(())
}

fn op_stop(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    _cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let owner = vm.owner_unit();
    if ctx.db.is_valid(owner) {
        ctx.commands.push(Command::StopMovement { unit: owner });
    }
    Ok(())
}

fn op_apply_force(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = ApplyForceOp::decode(cursor)?;
    if let Some(unit) = live_unit_in_register(ctx, vm, op.unit_register) {
        ctx.commands.push(Command::ApplyForce {
            unit,
            force: op.force,
        });
    }
    Ok(())
}

fn op_spawn_entity(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = SpawnEntityOp::decode(cursor)?;
    let owner = vm.owner_unit();
    let Some(player) = ctx.db.owner(owner) else {
        return Ok(());
    };
    let position = ctx.db.location(owner);
    let yaw = ctx.db.rotation(owner);

    let spawned = ctx.db.alloc_unit(player, position, yaw);
    ctx.spatial.insert(spawned, position);
    vm.set_register(op.out_register, Register::Unit(spawned));
    ctx.commands.push(Command::SpawnVisual {
        unit: spawned,
        tag: op.tag.to_owned(),
    });
    Ok(())
}

fn op_destroy_entity(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = WatchOp::decode(cursor)?;
    if let Some(unit) = live_unit_in_register(ctx, vm, op.register) {
        ctx.spatial.remove(unit);
        ctx.db.free_unit(unit);
        ctx.commands.push(Command::DespawnVisual { unit });
    }
    Ok(())
}

fn op_set_damage(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = SetDamageOp::decode(cursor)?;
    if let Some(target) = live_unit_in_register(ctx, vm, op.target_register) {
        apply_damage(ctx, target, op.amount);
    }
    Ok(())
}

fn op_area_damage(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = AreaDamageOp::decode(cursor)?;
    let Some(center) = position_in_register(ctx, vm, op.center_register) else {
        return Ok(());
    };
    let Some(target) = live_unit_in_register(ctx, vm, op.target_register) else {
        return Ok(());
    };
    let distance = ctx.db.location(target).distance(center);
    let falloff = if op.radius > 0.0 {
        (1.0 - distance / op.radius).max(AREA_DAMAGE_FLOOR)
    } else {
        1.0
    };
    apply_damage(ctx, target, op.base * falloff);
    Ok(())
}

fn op_apply_burning(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = ApplyBurningOp::decode(cursor)?;
    if let Some(unit) = live_unit_in_register(ctx, vm, op.target_register) {
        ctx.commands.push(Command::ApplyBurning {
            unit,
            damage_per_second: op.damage_per_second,
            duration: op.duration,
        });
    }
    Ok(())
}

fn op_modify_attribute(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = ModifyAttributeOp::decode(cursor)?;
    let Some(attribute) = Attribute::from_u8(op.attribute) else {
        debug!(attribute = op.attribute, "unknown attribute byte");
        return Ok(());
    };
    if let Some(target) = live_unit_in_register(ctx, vm, op.target_register) {
        ctx.db.modify_attribute(target, attribute, op.delta);
    }
    Ok(())
}

fn op_query_nearby(
    ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = QueryNearbyOp::decode(cursor)?;
    let Some(center) = position_in_register(ctx, vm, op.center_register) else {
        vm.set_register(op.out_register, Register::UnitList(Vec::new()));
        return Ok(());
    };
    let mut found = Vec::new();
    ctx.spatial.query_sphere(center, op.radius, &mut found);
    // Stale grid entries are dropped; the distance superset stays.
    found.retain(|&handle| ctx.db.is_valid(handle));
    vm.set_register(op.out_register, Register::UnitList(found));
    Ok(())
}

fn op_for_each_target(
    _ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = ForEachTargetOp::decode(cursor)?;
    let skip_to = vm.instruction_start() as i64 + i64::from(op.end_offset);

    let current = vm
        .register(op.list_register)
        .and_then(Register::as_unit_list)
        .and_then(|list| list.get(vm.loop_index()).copied());

    match current {
        Some(handle) => {
            vm.set_register(op.iterator_register, Register::Unit(handle));
        }
        None => {
            // List exhausted (or not a list): leave the loop.
            vm.reset_loop();
            if skip_to >= 0 {
                vm.request_jump(skip_to as usize);
            } else {
                vm.halt();
            }
        }
    }
    Ok(())
}

fn op_end_for_each(
    _ctx: &mut ExecContext<'_>,
    vm: &mut FlowVm,
    cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    let op = EndForEachOp::decode(cursor)?;
    vm.advance_loop();
    let back = vm.instruction_start() as i64 - i64::from(op.start_offset);
    if back < 0 {
        debug!(start_offset = op.start_offset, "loop back-jump before program start");
        vm.halt();
    } else {
        vm.request_jump(back as usize);
    }
    Ok(())
}
