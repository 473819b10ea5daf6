//! Operand payload layouts, one struct per opcode that carries data.
//!
//! Layouts are exact: the header's `data_size` equals the encoded size
//! of the operand struct. Register references are byte indices into the
//! VM's register file.

use glam::Vec3;

use crate::cursor::{Cursor, Writer};
use crate::error::Result;

/// `WaitSeconds`: suspend for a duration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaitSecondsOp {
    pub seconds: f32,
}

impl WaitSecondsOp {
    pub const SIZE: u16 = 4;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_f32(self.seconds);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            seconds: cursor.read_f32()?,
        })
    }
}

/// Shared layout for the wait-until family and `DestroyEntity`:
/// a single register holding the watched unit handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchOp {
    pub register: u8,
}

impl WatchOp {
    pub const SIZE: u16 = 1;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.register);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            register: cursor.read_u8()?,
        })
    }
}

/// `PlayAnimation`: animation name played on the owner unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayAnimationOp<'a> {
    pub name: &'a str,
}

impl<'a> PlayAnimationOp<'a> {
    #[must_use]
    pub fn size(&self) -> u16 {
        2 + self.name.len() as u16
    }

    pub fn encode(&self, writer: &mut Writer) -> Result<()> {
        writer.write_str(self.name)
    }

    pub fn decode(cursor: &mut Cursor<'a>) -> Result<Self> {
        Ok(Self {
            name: cursor.read_str()?,
        })
    }
}

/// `MoveTo`: move the owner unit toward the position in a register.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveToOp {
    pub dest_register: u8,
    pub speed: f32,
}

impl MoveToOp {
    pub const SIZE: u16 = 5;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.dest_register);
        writer.write_f32(self.speed);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            dest_register: cursor.read_u8()?,
            speed: cursor.read_f32()?,
        })
    }
}

/// `MoveForward`: move a unit along its facing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveForwardOp {
    /// Register holding the moving unit; the spawned projectile, usually.
    pub unit_register: u8,
    pub speed: f32,
}

impl MoveForwardOp {
    pub const SIZE: u16 = 5;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.unit_register);
        writer.write_f32(self.speed);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            unit_register: cursor.read_u8()?,
            speed: cursor.read_f32()?,
        })
    }
}

/// `ApplyForce`: impulse applied to the unit in a register.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApplyForceOp {
    pub unit_register: u8,
    pub force: Vec3,
}

impl ApplyForceOp {
    pub const SIZE: u16 = 13;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.unit_register);
        writer.write_vec3(self.force);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            unit_register: cursor.read_u8()?,
            force: cursor.read_vec3()?,
        })
    }
}

/// `SpawnEntity`: allocate a unit for `tag` and store its handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnEntityOp<'a> {
    pub tag: &'a str,
    pub out_register: u8,
}

impl<'a> SpawnEntityOp<'a> {
    #[must_use]
    pub fn size(&self) -> u16 {
        2 + self.tag.len() as u16 + 1
    }

    pub fn encode(&self, writer: &mut Writer) -> Result<()> {
        writer.write_str(self.tag)?;
        writer.write_u8(self.out_register);
        Ok(())
    }

    pub fn decode(cursor: &mut Cursor<'a>) -> Result<Self> {
        Ok(Self {
            tag: cursor.read_str()?,
            out_register: cursor.read_u8()?,
        })
    }
}

/// `SetDamage`: direct damage, reduced by flat defense, floored at 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetDamageOp {
    pub target_register: u8,
    pub amount: f32,
}

impl SetDamageOp {
    pub const SIZE: u16 = 5;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.target_register);
        writer.write_f32(self.amount);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            target_register: cursor.read_u8()?,
            amount: cursor.read_f32()?,
        })
    }
}

/// `AreaDamage`: base damage with linear falloff from a center point,
/// floored at 30% of base.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaDamageOp {
    pub center_register: u8,
    pub target_register: u8,
    pub base: f32,
    pub radius: f32,
}

impl AreaDamageOp {
    pub const SIZE: u16 = 10;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.center_register);
        writer.write_u8(self.target_register);
        writer.write_f32(self.base);
        writer.write_f32(self.radius);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            center_register: cursor.read_u8()?,
            target_register: cursor.read_u8()?,
            base: cursor.read_f32()?,
            radius: cursor.read_f32()?,
        })
    }
}

/// `ApplyBurning`: damage-over-time burn on the target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApplyBurningOp {
    pub target_register: u8,
    pub damage_per_second: f32,
    pub duration: f32,
}

impl ApplyBurningOp {
    pub const SIZE: u16 = 9;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.target_register);
        writer.write_f32(self.damage_per_second);
        writer.write_f32(self.duration);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            target_register: cursor.read_u8()?,
            damage_per_second: cursor.read_f32()?,
            duration: cursor.read_f32()?,
        })
    }
}

/// `ModifyAttribute`: raw delta on one attribute of the target.
/// The attribute byte matches `flow_db::Attribute` discriminants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModifyAttributeOp {
    pub target_register: u8,
    pub attribute: u8,
    pub delta: f32,
}

impl ModifyAttributeOp {
    pub const SIZE: u16 = 6;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.target_register);
        writer.write_u8(self.attribute);
        writer.write_f32(self.delta);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            target_register: cursor.read_u8()?,
            attribute: cursor.read_u8()?,
            delta: cursor.read_f32()?,
        })
    }
}

/// `QueryNearby`: spatial sphere query into a unit-list register.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryNearbyOp {
    pub center_register: u8,
    pub out_register: u8,
    pub radius: f32,
}

impl QueryNearbyOp {
    pub const SIZE: u16 = 6;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.center_register);
        writer.write_u8(self.out_register);
        writer.write_f32(self.radius);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            center_register: cursor.read_u8()?,
            out_register: cursor.read_u8()?,
            radius: cursor.read_f32()?,
        })
    }
}

/// `ForEachTarget`: iterate a unit-list register.
///
/// `end_offset` is the byte distance from this instruction's header to
/// just past the matching `EndForEach`; it is emitted as zero and
/// patched in place when the loop closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForEachTargetOp {
    pub list_register: u8,
    pub iterator_register: u8,
    pub end_offset: i32,
}

impl ForEachTargetOp {
    pub const SIZE: u16 = 6;
    /// Byte offset of `end_offset` within the payload.
    pub const END_OFFSET_FIELD: usize = 2;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.list_register);
        writer.write_u8(self.iterator_register);
        writer.write_i32(self.end_offset);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            list_register: cursor.read_u8()?,
            iterator_register: cursor.read_u8()?,
            end_offset: cursor.read_i32()?,
        })
    }
}

/// `EndForEach`: close the open loop.
///
/// `start_offset` is the byte distance from this instruction's header
/// back to the matching `ForEachTarget` header (always positive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndForEachOp {
    pub start_offset: i32,
}

impl EndForEachOp {
    pub const SIZE: u16 = 4;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_i32(self.start_offset);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            start_offset: cursor.read_i32()?,
        })
    }
}

/// `Jump`: signed byte offset relative to this instruction's header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JumpOp {
    pub offset: i32,
}

impl JumpOp {
    pub const SIZE: u16 = 4;

    pub fn encode(&self, writer: &mut Writer) {
        writer.write_i32(self.offset);
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            offset: cursor.read_i32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_sizes_match_encoding() {
        let mut writer = Writer::new();
        WaitSecondsOp { seconds: 1.0 }.encode(&mut writer);
        assert_eq!(writer.len(), WaitSecondsOp::SIZE as usize);

        let mut writer = Writer::new();
        AreaDamageOp {
            center_register: 0,
            target_register: 1,
            base: 50.0,
            radius: 300.0,
        }
        .encode(&mut writer);
        assert_eq!(writer.len(), AreaDamageOp::SIZE as usize);

        let mut writer = Writer::new();
        ForEachTargetOp {
            list_register: 2,
            iterator_register: 3,
            end_offset: 0,
        }
        .encode(&mut writer);
        assert_eq!(writer.len(), ForEachTargetOp::SIZE as usize);
    }

    #[test]
    fn test_spawn_entity_roundtrip() {
        let op = SpawnEntityOp {
            tag: "projectile.fireball",
            out_register: 3,
        };
        let mut writer = Writer::new();
        op.encode(&mut writer).unwrap();
        assert_eq!(writer.len(), op.size() as usize);

        let bytes = writer.into_bytes();
        let mut cursor = Cursor::new(&bytes);
        let decoded = SpawnEntityOp::decode(&mut cursor).unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn test_modify_attribute_roundtrip() {
        let op = ModifyAttributeOp {
            target_register: 1,
            attribute: 0,
            delta: -150.0,
        };
        let mut writer = Writer::new();
        op.encode(&mut writer);

        let bytes = writer.into_bytes();
        let decoded = ModifyAttributeOp::decode(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(decoded, op);
    }
}
