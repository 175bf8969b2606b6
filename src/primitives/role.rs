// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use bincode::{Decode, Encode};

/// Long-lived role a node joins the network with.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone, Copy, Hash)]
pub enum StaticRole {
    Virtual,
    LightMaterial,
    HeavyMaterial,
}

/// Per-pulse role assigned deterministically by the coordinator.
#[derive(Debug, PartialEq, Eq, Encode, Decode, Clone, Copy, Hash)]
pub enum DynamicRole {
    VirtualExecutor,
    VirtualValidator,
    LightExecutor,
    LightValidator,
    HeavyExecutor,
}

impl DynamicRole {
    /// Static role whose active nodes are candidates for this dynamic role.
    #[must_use]
    pub fn static_role(&self) -> StaticRole {
        match self {
            Self::VirtualExecutor | Self::VirtualValidator => StaticRole::Virtual,
            Self::LightExecutor | Self::LightValidator => StaticRole::LightMaterial,
            Self::HeavyExecutor => StaticRole::HeavyMaterial,
        }
    }

    /// Number of nodes selected for this role at each pulse.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        match self {
            Self::VirtualExecutor | Self::LightExecutor | Self::HeavyExecutor => 1,
            Self::VirtualValidator | Self::LightValidator => 3,
        }
    }

    /// Stable tag mixed into the role-selection seed.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Self::VirtualExecutor => 0,
            Self::VirtualValidator => 1,
            Self::LightExecutor => 2,
            Self::LightValidator => 3,
            Self::HeavyExecutor => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executors_select_one_validators_three() {
        assert_eq!(DynamicRole::LightExecutor.candidate_count(), 1);
        assert_eq!(DynamicRole::HeavyExecutor.candidate_count(), 1);
        assert_eq!(DynamicRole::LightValidator.candidate_count(), 3);
    }

    #[test]
    fn static_role_mapping() {
        assert_eq!(
            DynamicRole::LightExecutor.static_role(),
            StaticRole::LightMaterial
        );
        assert_eq!(
            DynamicRole::HeavyExecutor.static_role(),
            StaticRole::HeavyMaterial
        );
    }
}
