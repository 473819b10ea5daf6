//! Fluent bytecode compiler.
//!
//! One method per opcode; each appends a header plus operand payload and
//! returns the builder for chaining. Errors (oversized strings, loop
//! misuse) are latched and surfaced by `finish`, so authoring code chains
//! freely without per-call `?`.

use glam::Vec3;

use crate::cursor::Writer;
use crate::error::{BytecodeError, Result};
use crate::instruction::InstructionHeader;
use crate::opcode::Opcode;
use crate::operand::{
    ApplyBurningOp, ApplyForceOp, AreaDamageOp, EndForEachOp, ForEachTargetOp, JumpOp,
    ModifyAttributeOp, MoveForwardOp, MoveToOp, PlayAnimationOp, QueryNearbyOp, SetDamageOp,
    SpawnEntityOp, WaitSecondsOp, WatchOp,
};

/// Builds one flow program as a byte stream.
///
/// A single `ForEachTarget` may be open at a time: the builder keeps one
/// pending patch slot, not a stack. Opening a second loop or closing a
/// loop that is not open is an error reported by
/// [`ProgramBuilder::finish`].
pub struct ProgramBuilder {
    writer: Writer,
    /// Header offset of the open `ForEachTarget`, if any.
    open_loop: Option<usize>,
    instruction_count: usize,
    /// First error hit while chaining; checked at finish.
    error: Option<BytecodeError>,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    /// Start with a fresh buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: Writer::new(),
            open_loop: None,
            instruction_count: 0,
            error: None,
        }
    }

    /// Start over a recycled compilation buffer.
    #[must_use]
    pub fn with_buffer(buffer: Vec<u8>) -> Self {
        Self {
            writer: Writer::with_buffer(buffer),
            open_loop: None,
            instruction_count: 0,
            error: None,
        }
    }

    /// Instructions emitted so far.
    #[must_use]
    pub const fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    /// Bytes emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    /// Whether nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    fn emit(&mut self, opcode: Opcode, data_size: u16, payload: impl FnOnce(&mut Writer)) {
        InstructionHeader::new(opcode, data_size).encode(&mut self.writer);
        payload(&mut self.writer);
        self.instruction_count += 1;
    }

    /// Play an animation on the owner unit.
    pub fn play_animation(&mut self, name: &str) -> &mut Self {
        let op = PlayAnimationOp { name };
        if name.len() > crate::cursor::MAX_STRING_LEN {
            self.latch(BytecodeError::StringTooLong {
                len: name.len(),
                max: crate::cursor::MAX_STRING_LEN,
            });
            return self;
        }
        self.emit(Opcode::PLAY_ANIMATION, op.size(), |w| {
            // length checked above
            let _ = op.encode(w);
        });
        self
    }

    /// Suspend the flow for a duration.
    pub fn wait_seconds(&mut self, seconds: f32) -> &mut Self {
        self.emit(Opcode::WAIT_SECONDS, WaitSecondsOp::SIZE, |w| {
            WaitSecondsOp { seconds }.encode(w);
        });
        self
    }

    /// Suspend until the unit in `register` is destroyed.
    pub fn wait_until_destroyed(&mut self, register: u8) -> &mut Self {
        self.emit(Opcode::WAIT_UNTIL_DESTROYED, WatchOp::SIZE, |w| {
            WatchOp { register }.encode(w);
        });
        self
    }

    /// Suspend until the unit in `register` collides or is destroyed.
    pub fn wait_until_collision(&mut self, register: u8) -> &mut Self {
        self.emit(Opcode::WAIT_UNTIL_COLLISION, WatchOp::SIZE, |w| {
            WatchOp { register }.encode(w);
        });
        self
    }

    /// Suspend until the unit in `register` arrives or is destroyed.
    pub fn wait_until_arrival(&mut self, register: u8) -> &mut Self {
        self.emit(Opcode::WAIT_UNTIL_ARRIVAL, WatchOp::SIZE, |w| {
            WatchOp { register }.encode(w);
        });
        self
    }

    /// Suspend until a host signal is raised for the unit in `register`.
    pub fn wait_until_signal(&mut self, register: u8) -> &mut Self {
        self.emit(Opcode::WAIT_UNTIL_SIGNAL, WatchOp::SIZE, |w| {
            WatchOp { register }.encode(w);
        });
        self
    }

    /// Move the owner unit toward the position in `dest_register`.
    pub fn move_to(&mut self, dest_register: u8, speed: f32) -> &mut Self {
        self.emit(Opcode::MOVE_TO, MoveToOp::SIZE, |w| {
            MoveToOp {
                dest_register,
                speed,
            }
            .encode(w);
        });
        self
    }

    /// Move the unit in `unit_register` along its facing.
    pub fn move_forward(&mut self, unit_register: u8, speed: f32) -> &mut Self {
        self.emit(Opcode::MOVE_FORWARD, MoveForwardOp::SIZE, |w| {
            MoveForwardOp {
                unit_register,
                speed,
            }
            .encode(w);
        });
        self
    }

    /// Stop the owner unit's movement.
    pub fn stop(&mut self) -> &mut Self {
        self.emit(Opcode::STOP, 0, |_| {});
        self
    }

    /// Apply an impulse to the unit in `unit_register`.
    pub fn apply_force(&mut self, unit_register: u8, force: Vec3) -> &mut Self {
        self.emit(Opcode::APPLY_FORCE, ApplyForceOp::SIZE, |w| {
            ApplyForceOp {
                unit_register,
                force,
            }
            .encode(w);
        });
        self
    }

    /// Spawn a unit for `tag`, storing its handle in `out_register`.
    pub fn spawn_entity(&mut self, tag: &str, out_register: u8) -> &mut Self {
        if tag.len() > crate::cursor::MAX_STRING_LEN {
            self.latch(BytecodeError::StringTooLong {
                len: tag.len(),
                max: crate::cursor::MAX_STRING_LEN,
            });
            return self;
        }
        let op = SpawnEntityOp { tag, out_register };
        self.emit(Opcode::SPAWN_ENTITY, op.size(), |w| {
            let _ = op.encode(w);
        });
        self
    }

    /// Free the unit in `register`.
    pub fn destroy_entity(&mut self, register: u8) -> &mut Self {
        self.emit(Opcode::DESTROY_ENTITY, WatchOp::SIZE, |w| {
            WatchOp { register }.encode(w);
        });
        self
    }

    /// Direct damage on the unit in `target_register`.
    pub fn set_damage(&mut self, target_register: u8, amount: f32) -> &mut Self {
        self.emit(Opcode::SET_DAMAGE, SetDamageOp::SIZE, |w| {
            SetDamageOp {
                target_register,
                amount,
            }
            .encode(w);
        });
        self
    }

    /// Area damage with linear falloff from the point in `center_register`.
    pub fn area_damage(
        &mut self,
        center_register: u8,
        target_register: u8,
        base: f32,
        radius: f32,
    ) -> &mut Self {
        self.emit(Opcode::AREA_DAMAGE, AreaDamageOp::SIZE, |w| {
            AreaDamageOp {
                center_register,
                target_register,
                base,
                radius,
            }
            .encode(w);
        });
        self
    }

    /// Damage-over-time burn on the unit in `target_register`.
    pub fn apply_burning(
        &mut self,
        target_register: u8,
        damage_per_second: f32,
        duration: f32,
    ) -> &mut Self {
        self.emit(Opcode::APPLY_BURNING, ApplyBurningOp::SIZE, |w| {
            ApplyBurningOp {
                target_register,
                damage_per_second,
                duration,
            }
            .encode(w);
        });
        self
    }

    /// Raw attribute delta on the unit in `target_register`.
    pub fn modify_attribute(&mut self, target_register: u8, attribute: u8, delta: f32) -> &mut Self {
        self.emit(Opcode::MODIFY_ATTRIBUTE, ModifyAttributeOp::SIZE, |w| {
            ModifyAttributeOp {
                target_register,
                attribute,
                delta,
            }
            .encode(w);
        });
        self
    }

    /// Sphere query around the point in `center_register` into
    /// `out_register` as a unit list.
    pub fn query_nearby(&mut self, center_register: u8, out_register: u8, radius: f32) -> &mut Self {
        self.emit(Opcode::QUERY_NEARBY, QueryNearbyOp::SIZE, |w| {
            QueryNearbyOp {
                center_register,
                out_register,
                radius,
            }
            .encode(w);
        });
        self
    }

    /// Open iteration over the unit list in `list_register`, placing each
    /// element into `iterator_register`.
    ///
    /// Emits `end_offset = 0`; [`ProgramBuilder::end_for_each`] patches it
    /// in place once the loop body is known.
    pub fn for_each_target(&mut self, list_register: u8, iterator_register: u8) -> &mut Self {
        if self.open_loop.is_some() {
            self.latch(BytecodeError::NestedLoop);
            return self;
        }
        let header_offset = self.writer.len();
        self.emit(Opcode::FOR_EACH_TARGET, ForEachTargetOp::SIZE, |w| {
            ForEachTargetOp {
                list_register,
                iterator_register,
                end_offset: 0,
            }
            .encode(w);
        });
        self.open_loop = Some(header_offset);
        self
    }

    /// Close the open loop, back-filling the `ForEachTarget` end offset.
    pub fn end_for_each(&mut self) -> &mut Self {
        let Some(loop_start) = self.open_loop.take() else {
            self.latch(BytecodeError::UnmatchedLoopEnd);
            return self;
        };
        let end_header = self.writer.len();
        self.emit(Opcode::END_FOR_EACH, EndForEachOp::SIZE, |w| {
            EndForEachOp {
                start_offset: (end_header - loop_start) as i32,
            }
            .encode(w);
        });
        // end_offset = distance from the ForEachTarget header to just
        // past the EndForEach instruction.
        let end_offset = (self.writer.len() - loop_start) as i32;
        let field = loop_start + InstructionHeader::SIZE + ForEachTargetOp::END_OFFSET_FIELD;
        if let Err(err) = self.writer.patch_i32(field, end_offset) {
            self.latch(err);
        }
        self
    }

    /// Unconditional jump by a signed byte offset relative to the jump's
    /// own header.
    pub fn jump(&mut self, offset: i32) -> &mut Self {
        self.emit(Opcode::JUMP, JumpOp::SIZE, |w| {
            JumpOp { offset }.encode(w);
        });
        self
    }

    /// Halt the flow.
    pub fn end(&mut self) -> &mut Self {
        self.emit(Opcode::END, 0, |_| {});
        self
    }

    /// Append a module-defined instruction with an opaque operand payload.
    ///
    /// Core opcodes have typed methods above; modules that claim a range
    /// from the dispatch registry emit their instructions through here.
    pub fn raw(&mut self, opcode: Opcode, payload: &[u8]) -> &mut Self {
        let Ok(data_size) = u16::try_from(payload.len()) else {
            self.latch(BytecodeError::PayloadTooLarge(payload.len()));
            return self;
        };
        self.emit(opcode, data_size, |w| w.write_bytes(payload));
        self
    }

    /// Finish the program, returning the raw byte stream.
    ///
    /// Fails if any chained call latched an error or a loop is still open.
    pub fn finish(self) -> Result<Vec<u8>> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.open_loop.is_some() {
            return Err(BytecodeError::UnclosedLoop);
        }
        Ok(self.writer.into_bytes())
    }

    fn latch(&mut self, error: BytecodeError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cursor::Cursor;

    use super::*;

    #[test]
    fn test_simple_chain() {
        let mut builder = ProgramBuilder::new();
        builder.play_animation("cast").wait_seconds(1.0).end();
        assert_eq!(builder.instruction_count(), 3);

        let bytes = builder.finish().unwrap();
        let mut cursor = Cursor::new(&bytes);

        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.opcode, Opcode::PLAY_ANIMATION);
        let anim = PlayAnimationOp::decode(&mut cursor).unwrap();
        assert_eq!(anim.name, "cast");

        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.opcode, Opcode::WAIT_SECONDS);
        assert_eq!(WaitSecondsOp::decode(&mut cursor).unwrap().seconds, 1.0);

        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.opcode, Opcode::END);
        assert_eq!(header.data_size, 0);
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_loop_patch_offsets() {
        let mut builder = ProgramBuilder::new();
        builder
            .query_nearby(0, 2, 300.0)
            .for_each_target(2, 3)
            .set_damage(3, 50.0)
            .end_for_each()
            .end();
        let bytes = builder.finish().unwrap();

        // Walk to the ForEachTarget instruction.
        let mut cursor = Cursor::new(&bytes);
        let query = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(query.opcode, Opcode::QUERY_NEARBY);
        cursor.skip(query.data_size as usize).unwrap();

        let loop_start = cursor.position();
        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.opcode, Opcode::FOR_EACH_TARGET);
        let for_each = ForEachTargetOp::decode(&mut cursor).unwrap();

        // Body: one SetDamage instruction.
        let body = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(body.opcode, Opcode::SET_DAMAGE);
        cursor.skip(body.data_size as usize).unwrap();

        let end_header = cursor.position();
        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.opcode, Opcode::END_FOR_EACH);
        let end_op = EndForEachOp::decode(&mut cursor).unwrap();
        let past_end = cursor.position();

        // end_offset spans the ForEachTarget header through just past
        // EndForEach; start_offset points back to the loop header.
        assert_eq!(for_each.end_offset as usize, past_end - loop_start);
        assert_eq!(end_op.start_offset as usize, end_header - loop_start);
    }

    #[test]
    fn test_nested_loop_rejected() {
        let mut builder = ProgramBuilder::new();
        builder
            .for_each_target(0, 1)
            .for_each_target(2, 3)
            .end_for_each()
            .end_for_each();
        assert!(matches!(
            builder.finish(),
            Err(BytecodeError::NestedLoop)
        ));
    }

    #[test]
    fn test_unmatched_end_rejected() {
        let mut builder = ProgramBuilder::new();
        builder.end_for_each();
        assert!(matches!(
            builder.finish(),
            Err(BytecodeError::UnmatchedLoopEnd)
        ));
    }

    #[test]
    fn test_unclosed_loop_rejected() {
        let mut builder = ProgramBuilder::new();
        builder.for_each_target(0, 1).set_damage(1, 5.0);
        assert!(matches!(builder.finish(), Err(BytecodeError::UnclosedLoop)));
    }

    #[test]
    fn test_max_length_string_fits_size_field() {
        let name = "x".repeat(crate::cursor::MAX_STRING_LEN);
        let mut builder = ProgramBuilder::new();
        builder.play_animation(&name).end();
        let bytes = builder.finish().unwrap();

        let mut cursor = Cursor::new(&bytes);
        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.data_size as usize, 2 + name.len());
        assert_eq!(PlayAnimationOp::decode(&mut cursor).unwrap().name, name);
    }

    #[test]
    fn test_max_length_spawn_tag_fits_size_field() {
        // The spawn payload adds a register byte on top of the length
        // prefix, so a maximum-length tag lands exactly on u16::MAX.
        let tag = "t".repeat(crate::cursor::MAX_STRING_LEN);
        let mut builder = ProgramBuilder::new();
        builder.spawn_entity(&tag, 2).end();
        let bytes = builder.finish().unwrap();

        let mut cursor = Cursor::new(&bytes);
        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.data_size, u16::MAX);
        let op = SpawnEntityOp::decode(&mut cursor).unwrap();
        assert_eq!(op.tag.len(), tag.len());
        assert_eq!(op.out_register, 2);
    }

    #[test]
    fn test_oversized_string_latched() {
        let name = "x".repeat(crate::cursor::MAX_STRING_LEN + 1);
        let mut builder = ProgramBuilder::new();
        builder.play_animation(&name).end();
        assert!(matches!(
            builder.finish(),
            Err(BytecodeError::StringTooLong { .. })
        ));
    }

    #[test]
    fn test_raw_module_instruction() {
        let mut builder = ProgramBuilder::new();
        builder.raw(Opcode(0x40), &[7, 8, 9]).end();
        let bytes = builder.finish().unwrap();

        let mut cursor = Cursor::new(&bytes);
        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.opcode, Opcode(0x40));
        assert_eq!(header.data_size, 3);
        cursor.skip(3).unwrap();
        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.opcode, Opcode::END);
    }

    #[test]
    fn test_raw_payload_too_large() {
        let payload = vec![0u8; u16::MAX as usize + 1];
        let mut builder = ProgramBuilder::new();
        builder.raw(Opcode(0x40), &payload);
        assert!(matches!(
            builder.finish(),
            Err(BytecodeError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_recycled_buffer_cleared() {
        let mut builder = ProgramBuilder::new();
        builder.end();
        let first = builder.finish().unwrap();

        let mut builder = ProgramBuilder::with_buffer(first);
        builder.wait_seconds(2.0).end();
        let bytes = builder.finish().unwrap();

        let mut cursor = Cursor::new(&bytes);
        let header = InstructionHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.opcode, Opcode::WAIT_SECONDS);
    }
}
