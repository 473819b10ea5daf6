//! Gameplay attributes stored per unit and per player.

/// The attributes every unit and player carries.
///
/// Used as a direct index into an [`AttributeSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Attribute {
    Health = 0,
    MaxHealth = 1,
    Mana = 2,
    MaxMana = 3,
    AttackPower = 4,
    Defense = 5,
    MoveSpeed = 6,
}

impl Attribute {
    /// Number of attributes.
    pub const COUNT: usize = 7;

    /// Decode an attribute from its wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Health),
            1 => Some(Self::MaxHealth),
            2 => Some(Self::Mana),
            3 => Some(Self::MaxMana),
            4 => Some(Self::AttackPower),
            5 => Some(Self::Defense),
            6 => Some(Self::MoveSpeed),
            _ => None,
        }
    }
}

/// A fixed-size set of attribute values.
///
/// Writes to [`Attribute::Health`] are clamped into `[0, MaxHealth]`;
/// everything else is stored as given.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AttributeSet {
    values: [f32; Attribute::COUNT],
}

impl AttributeSet {
    /// Create a set with every attribute at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: [0.0; Attribute::COUNT],
        }
    }

    /// Read an attribute.
    #[must_use]
    pub const fn get(&self, attribute: Attribute) -> f32 {
        self.values[attribute as usize]
    }

    /// Write an attribute, clamping health into `[0, MaxHealth]`.
    pub fn set(&mut self, attribute: Attribute, value: f32) {
        let value = if matches!(attribute, Attribute::Health) {
            value.clamp(0.0, self.get(Attribute::MaxHealth))
        } else {
            value
        };
        self.values[attribute as usize] = value;
    }

    /// Add a delta to an attribute, with the same health clamping as
    /// [`AttributeSet::set`].
    pub fn modify(&mut self, attribute: Attribute, delta: f32) {
        self.set(attribute, self.get(attribute) + delta);
    }
}
