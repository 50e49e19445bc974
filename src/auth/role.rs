// Role and permission matrix.
//
// The closed role set and its strict hierarchy are plain Rust; the
// per-method permission matrix is a `HashMap<String, Role>` seeded from
// compiled-in defaults and overridden by `security.permissions` from
// configuration. The defaults exist so the service is usable before an
// operator has written that file out.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Operator,
    Admin,
}
impl Role {
    pub fn satisfies(
        self,
        required: Role,
    ) -> bool {
        self >= required
    }
}
impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Self::Viewer),
            "operator" => Ok(Self::Operator),
            "admin" => Ok(Self::Admin),
            other => Err(anyhow::anyhow!("unknown role: {other:?}")),
        }
    }
}

const VIEWER_DEFAULTS: &[&str] = &[
    "ping",
    "authenticate",
    "get_camera_list",
    "get_camera_status",
    "get_camera_capabilities",
    "get_system_status",
    "list_recordings",
    "list_snapshots",
    "subscribe_events",
    "unsubscribe_events",
    "get_subscription_stats",
];
const OPERATOR_DEFAULTS: &[&str] = &[
    "start_recording",
    "stop_recording",
    "take_snapshot",
    "start_streaming",
    "stop_streaming",
    "add_external_stream",
    "remove_external_stream",
];
const ADMIN_DEFAULTS: &[&str] = &[
    "get_metrics",
    "get_status",
    "get_server_info",
    "get_storage_info",
    "delete_snapshot",
    "delete_recording",
    "set_retention_policy",
    "cleanup_old_files",
];

#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    required: HashMap<String, Role>,
}
impl PermissionMatrix {
    /// `overrides` is `security.permissions` from configuration; it takes
    /// precedence over the compiled-in defaults method by method.
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        let mut required = HashMap::new();
        for method in VIEWER_DEFAULTS {
            required.insert((*method).to_owned(), Role::Viewer);
        }
        for method in OPERATOR_DEFAULTS {
            required.insert((*method).to_owned(), Role::Operator);
        }
        for method in ADMIN_DEFAULTS {
            required.insert((*method).to_owned(), Role::Admin);
        }
        for (method, role) in overrides {
            if let Ok(role) = role.parse() {
                required.insert(method.clone(), role);
            } else {
                log::warn!("ignoring security.permissions[{method}]: unknown role {role:?}");
            }
        }
        Self { required }
    }

    /// `None` means the method is unknown to the matrix; dispatch treats
    /// that as `not_found`, not a permission grant.
    pub fn required_role(
        &self,
        method: &str,
    ) -> Option<Role> {
        self.required.get(method).copied()
    }
}

#[cfg(test)]
mod test_role {
    use super::*;

    #[test]
    fn hierarchy_is_strict() {
        assert!(Role::Admin.satisfies(Role::Operator));
        assert!(Role::Operator.satisfies(Role::Viewer));
        assert!(!Role::Viewer.satisfies(Role::Operator));
    }

    #[test]
    fn default_matrix_covers_every_built_in_method() {
        let matrix = PermissionMatrix::new(&HashMap::new());
        assert_eq!(matrix.required_role("ping"), Some(Role::Viewer));
        assert_eq!(matrix.required_role("start_recording"), Some(Role::Operator));
        assert_eq!(matrix.required_role("get_metrics"), Some(Role::Admin));
        assert_eq!(matrix.required_role("no_such_method"), None);
    }

    #[test]
    fn config_override_takes_precedence() {
        let mut overrides = HashMap::new();
        overrides.insert("ping".to_owned(), "admin".to_owned());
        let matrix = PermissionMatrix::new(&overrides);
        assert_eq!(matrix.required_role("ping"), Some(Role::Admin));
    }
}
