//! Role-based access decisions.
//!
//! Every "may this user see that" question goes through [`User::has_capability`]
//! so the superuser override and role sets are defined in exactly one place.

use serde::Serialize;

use crate::db::User;
use crate::entities::users::Role;

/// What a protected endpoint requires of the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Authenticated,
    SupportOrAdmin,
    Admin,
}

impl User {
    /// Superusers pass every check regardless of role.
    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        if self.is_superuser {
            return true;
        }

        match capability {
            Capability::Authenticated => true,
            Capability::SupportOrAdmin => matches!(self.role, Role::Admin | Role::Support),
            Capability::Admin => self.role == Role::Admin,
        }
    }
}

/// Outcome of checking a (possibly absent) user against a capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No identity could be resolved.
    Unauthenticated,
    /// Identity resolved, role insufficient.
    Forbidden,
}

#[must_use]
pub fn decide(user: Option<&User>, capability: Capability) -> Decision {
    match user {
        None => Decision::Unauthenticated,
        Some(user) if user.has_capability(capability) => Decision::Allow,
        Some(_) => Decision::Forbidden,
    }
}

/// Role landing pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    Admin,
    Support,
    Customer,
}

impl Panel {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Admin => "/accounts/admin-panel/",
            Self::Support => "/accounts/support-panel/",
            Self::Customer => "/accounts/customer-panel/",
        }
    }

    /// Name used in `?redirect=` hints.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Admin => "admin-panel",
            Self::Support => "support-panel",
            Self::Customer => "customer-panel",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "admin-panel" => Some(Self::Admin),
            "support-panel" => Some(Self::Support),
            "customer-panel" => Some(Self::Customer),
            _ => None,
        }
    }

    #[must_use]
    pub const fn required_capability(self) -> Capability {
        match self {
            Self::Admin => Capability::Admin,
            Self::Support => Capability::SupportOrAdmin,
            Self::Customer => Capability::Authenticated,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Admin => "Admin Panel",
            Self::Support => "Support Panel",
            Self::Customer => "Customer Panel",
        }
    }
}

/// Default landing panel for a user's role.
#[must_use]
pub fn landing_panel(user: &User) -> Panel {
    if user.has_capability(Capability::Admin) {
        Panel::Admin
    } else if user.role == Role::Support {
        Panel::Support
    } else {
        Panel::Customer
    }
}

/// Honour a `?redirect=` preference only when the user may see that panel,
/// otherwise fall back to the role landing panel.
#[must_use]
pub fn redirect_target(user: &User, preferred: Option<&str>) -> Panel {
    preferred
        .and_then(Panel::from_name)
        .filter(|panel| user.has_capability(panel.required_capability()))
        .unwrap_or_else(|| landing_panel(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role, is_superuser: bool) -> User {
        User {
            id: 7,
            username: "u".to_string(),
            email: "u@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            role,
            is_staff: false,
            is_superuser,
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn capability_matrix() {
        let customer = user(Role::Customer, false);
        let support = user(Role::Support, false);
        let admin = user(Role::Admin, false);

        assert!(customer.has_capability(Capability::Authenticated));
        assert!(!customer.has_capability(Capability::SupportOrAdmin));
        assert!(!customer.has_capability(Capability::Admin));

        assert!(support.has_capability(Capability::SupportOrAdmin));
        assert!(!support.has_capability(Capability::Admin));

        assert!(admin.has_capability(Capability::SupportOrAdmin));
        assert!(admin.has_capability(Capability::Admin));
    }

    #[test]
    fn superuser_overrides_role() {
        let odd = user(Role::Customer, true);
        assert!(odd.has_capability(Capability::Admin));
        assert_eq!(landing_panel(&odd), Panel::Admin);
    }

    #[test]
    fn staff_flag_does_not_grant_anything() {
        let mut staff_customer = user(Role::Customer, false);
        staff_customer.is_staff = true;
        assert!(!staff_customer.has_capability(Capability::SupportOrAdmin));
    }

    #[test]
    fn decide_distinguishes_missing_from_insufficient() {
        let customer = user(Role::Customer, false);
        assert_eq!(decide(None, Capability::Authenticated), Decision::Unauthenticated);
        assert_eq!(decide(Some(&customer), Capability::Admin), Decision::Forbidden);
        assert_eq!(decide(Some(&customer), Capability::Authenticated), Decision::Allow);
    }

    #[test]
    fn landing_panels_follow_role() {
        assert_eq!(landing_panel(&user(Role::Admin, false)), Panel::Admin);
        assert_eq!(landing_panel(&user(Role::Support, false)), Panel::Support);
        assert_eq!(landing_panel(&user(Role::Customer, false)), Panel::Customer);
    }

    #[test]
    fn redirect_preference_is_only_honoured_when_allowed() {
        let customer = user(Role::Customer, false);
        let support = user(Role::Support, false);
        let admin = user(Role::Admin, false);

        assert_eq!(redirect_target(&customer, Some("admin-panel")), Panel::Customer);
        assert_eq!(redirect_target(&support, Some("admin-panel")), Panel::Support);
        assert_eq!(redirect_target(&admin, Some("customer-panel")), Panel::Customer);
        assert_eq!(redirect_target(&admin, Some("support-panel")), Panel::Support);
        assert_eq!(redirect_target(&admin, Some("nonsense")), Panel::Admin);
        assert_eq!(redirect_target(&support, None), Panel::Support);
    }

    #[test]
    fn panel_names_round_trip() {
        for panel in [Panel::Admin, Panel::Support, Panel::Customer] {
            assert_eq!(Panel::from_name(panel.name()), Some(panel));
        }
    }
}
