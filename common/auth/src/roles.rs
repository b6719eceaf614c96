pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_FACULTY: &str = "faculty";
pub const ROLE_STUDENT: &str = "student";
pub const ROLE_STAFF: &str = "staff";
pub const ROLE_PARENT: &str = "parent";

/// Distinct from `admin`, which scopes to one tenant. A platform admin may
/// cross tenant boundaries, and only via the audited `X-Acting-Tenant`
/// path — rare, and flagged every time it's used.
pub const ROLE_PLATFORM_ADMIN: &str = "platform_admin";

/// Coarse roles the identity provider hands us. Fine-grained rights are a
/// policy-store decision, not something encoded here.
pub const KNOWN_ROLES: &[&str] =
    &[ROLE_ADMIN, ROLE_FACULTY, ROLE_STUDENT, ROLE_STAFF, ROLE_PARENT, ROLE_PLATFORM_ADMIN];
