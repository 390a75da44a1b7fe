//! Resolution of reservation ACL entries to system accounts.
use std::fmt::{Display, Formatter};

use nix::unistd::{Group, User};
use serde::{Deserialize, Serialize};

/// A user account that exists on the system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub name: String,
    pub uid: u32,
}

/// A group that exists on the system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    pub name: String,
    pub gid: u32,
}

impl Display for UserRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl Display for GroupRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Maps ACL names to accounts.
///
/// Reservations routinely reference accounts that were deleted since the reservation was
/// created, so a name that does not resolve is reported as `None` rather than as an error.
pub trait IdentityResolver {
    fn resolve_user(&self, name: &str) -> Option<UserRef>;
    fn resolve_group(&self, name: &str) -> Option<GroupRef>;
}

/// Resolves names through the system user and group databases.
#[derive(Default)]
pub struct SystemIdentityResolver;

impl IdentityResolver for SystemIdentityResolver {
    fn resolve_user(&self, name: &str) -> Option<UserRef> {
        match User::from_name(name) {
            Ok(Some(user)) => Some(UserRef {
                name: user.name,
                uid: user.uid.as_raw(),
            }),
            Ok(None) => None,
            Err(error) => {
                log::debug!("Cannot look up user {name}: {error}");
                None
            }
        }
    }

    fn resolve_group(&self, name: &str) -> Option<GroupRef> {
        match Group::from_name(name) {
            Ok(Some(group)) => Some(GroupRef {
                name: group.name,
                gid: group.gid.as_raw(),
            }),
            Ok(None) => None,
            Err(error) => {
                log::debug!("Cannot look up group {name}: {error}");
                None
            }
        }
    }
}
