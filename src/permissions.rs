//! Permission tiers derived from `nick!user@host` identities.
//!
//! Authorization compares the nick only. The user and host parts are ignored,
//! so anyone able to take an admin's nick inherits their tier. Networks with
//! nick registration services make this workable; hostmask matching would be
//! the stronger scheme.

use crate::config::NetworkConfig;

/// Integer permission level. Higher is more privileged.
pub type Tier = u8;

/// Unauthenticated callers.
pub const PUBLIC: Tier = 0;
/// Nicks listed in `admins`.
pub const ADMIN: Tier = 10;
/// Nicks listed in `superadmins`. The maximum tier.
pub const SUPERADMIN: Tier = 20;

/// Access requirement declared by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Available to everyone, regardless of `minperms`.
    Public,
    /// Requires at least this tier and is subject to the `minperms` gate.
    Tier(Tier),
}

/// Parses the nick from `nick!user@host`.
///
/// Identities without a `!` are returned unchanged.
pub fn nick_of(identity: &str) -> &str {
    match identity.split_once('!') {
        Some((nick, _)) => nick,
        None => identity,
    }
}

/// Returns the permission tier of an identity on the given network.
pub fn tier_of(identity: &str, network: &NetworkConfig) -> Tier {
    let nick = nick_of(identity);
    if network.superadmins.iter().any(|n| n == nick) {
        SUPERADMIN
    } else if network.admins.iter().any(|n| n == nick) {
        ADMIN
    } else {
        PUBLIC
    }
}

/// Whether a caller at `caller` tier may invoke a module declaring `access`.
///
/// A non-zero `minperms` dampens every tier-gated module for callers below
/// it, which always includes tier 0.
pub fn may_invoke(access: Access, caller: Tier, minperms: Tier) -> bool {
    match access {
        Access::Public => true,
        Access::Tier(required) => caller >= required && (minperms == 0 || caller >= minperms),
    }
}
