//! Member profile as seen by the ordering service.

use serde::{Deserialize, Serialize};

use super::MemberId;

/// A member's profile.
///
/// Profiles are created and edited elsewhere; ordering only requires that one
/// exists and snapshots the name and phone onto each order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    /// Identity the profile belongs to.
    pub member_id: MemberId,
    /// Display name.
    pub full_name: String,
    /// Verified contact phone.
    pub phone: String,
}
