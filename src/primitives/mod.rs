// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

mod hash;
mod id;
mod role;

pub use crate::primitives::hash::*;
pub use crate::primitives::id::*;
pub use crate::primitives::role::*;
