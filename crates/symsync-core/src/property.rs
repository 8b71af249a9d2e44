//! The replicable property enumeration
//!
//! Every property of a scene object that the sync engine replicates has one
//! variant here. The set is fixed at compile time; bucket assignment lives in
//! the state crate's registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::SyncError;

macro_rules! properties {
    ($($variant:ident => $name:literal,)*) => {
        /// A replicable object property
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Property {
            $($variant,)*
            /// Pseudo-property: the whole object changed, re-send everything
            FullUpdate,
            /// Pseudo-property: no property
            None,
        }

        impl Property {
            /// All real (non-pseudo) properties, in declaration order
            pub const ALL: &'static [Property] = &[$(Property::$variant,)*];

            /// Wire and configuration name
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Property::$variant => $name,)*
                    Property::FullUpdate => "FullUpdate",
                    Property::None => "None",
                }
            }

            fn from_name(name: &str) -> Option<Property> {
                match name {
                    $($name => Some(Property::$variant),)*
                    "FullUpdate" => Some(Property::FullUpdate),
                    "None" => Some(Property::None),
                    _ => None,
                }
            }
        }
    };
}

properties! {
    AggregateScriptEvents => "AggregateScriptEvents",
    AllowedDrop => "AllowedDrop",
    AngularVelocity => "AngularVelocity",
    AttachedAvatar => "AttachedAvatar",
    AttachedPos => "AttachedPos",
    AttachmentPoint => "AttachmentPoint",
    BaseMask => "BaseMask",
    Buoyancy => "Buoyancy",
    Category => "Category",
    ClickAction => "ClickAction",
    CollidingGround => "CollidingGround",
    CollisionSound => "CollisionSound",
    CollisionSoundVolume => "CollisionSoundVolume",
    Color => "Color",
    CreationDate => "CreationDate",
    CreatorData => "CreatorData",
    CreatorId => "CreatorID",
    Description => "Description",
    EveryoneMask => "EveryoneMask",
    Flags => "Flags",
    Flying => "Flying",
    FolderId => "FolderID",
    Force => "Force",
    GroupId => "GroupID",
    GroupMask => "GroupMask",
    GroupPosition => "GroupPosition",
    InventorySerial => "InventorySerial",
    IsAttachment => "IsAttachment",
    IsColliding => "IsColliding",
    IsPhysical => "IsPhysical",
    IsSelected => "IsSelected",
    Kinematic => "Kinematic",
    LastOwnerId => "LastOwnerID",
    LinkNum => "LinkNum",
    Material => "Material",
    MediaUrl => "MediaUrl",
    Name => "Name",
    NextOwnerMask => "NextOwnerMask",
    ObjectSaleType => "ObjectSaleType",
    OffsetPosition => "OffsetPosition",
    Orientation => "Orientation",
    OwnerId => "OwnerID",
    OwnerMask => "OwnerMask",
    OwnershipCost => "OwnershipCost",
    PaAcceleration => "PA_Acceleration",
    ParticleSystem => "ParticleSystem",
    PassTouches => "PassTouches",
    Position => "Position",
    RotationOffset => "RotationOffset",
    RotationalVelocity => "RotationalVelocity",
    SalePrice => "SalePrice",
    Scale => "Scale",
    ScriptAccessPin => "ScriptAccessPin",
    Shape => "Shape",
    SitName => "SitName",
    SitTargetOrientation => "SitTargetOrientation",
    SitTargetOrientationLl => "SitTargetOrientationLL",
    SitTargetPosition => "SitTargetPosition",
    SitTargetPositionLl => "SitTargetPositionLL",
    Size => "Size",
    SopAcceleration => "SOP_Acceleration",
    Sound => "Sound",
    TaskInventory => "TaskInventory",
    Text => "Text",
    TextureAnimation => "TextureAnimation",
    Torque => "Torque",
    TouchName => "TouchName",
    UpdateFlag => "UpdateFlag",
    Velocity => "Velocity",
}

impl Property {
    /// Pseudo-properties are never stored or bucketed
    #[inline]
    pub fn is_pseudo(self) -> bool {
        matches!(self, Property::FullUpdate | Property::None)
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Property {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Property::from_name(s).ok_or_else(|| SyncError::UnknownProperty(s.to_string()))
    }
}

impl Serialize for Property {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Property {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_property_names_are_unique() {
        let names: HashSet<&str> = Property::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(names.len(), Property::ALL.len());
    }

    #[test]
    fn test_property_name_parse() {
        for p in Property::ALL {
            assert_eq!(p.as_str().parse::<Property>().unwrap(), *p);
        }
        assert_eq!("PA_Acceleration".parse::<Property>().unwrap(), Property::PaAcceleration);
        assert!("Bogus".parse::<Property>().is_err());
    }

    #[test]
    fn test_pseudo_properties_excluded_from_all() {
        assert!(!Property::ALL.contains(&Property::FullUpdate));
        assert!(!Property::ALL.contains(&Property::None));
        assert!(Property::FullUpdate.is_pseudo());
        assert!(!Property::Position.is_pseudo());
    }

    #[test]
    fn test_property_serde_uses_wire_name() {
        let json = serde_json::to_string(&Property::CreatorId).unwrap();
        assert_eq!(json, "\"CreatorID\"");
        let back: Property = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Property::CreatorId);
    }
}
