//! Route guard: decides what a view may show for the current auth state.

use crate::auth::{AuthState, Role};

/// What a view needs before it renders its content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    Professor,
}

/// Outcome of checking a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Render,
    /// Session not restored yet; show a neutral placeholder
    Waiting,
    RedirectToLogin,
    /// Logged in without the needed role; show a notice, do not redirect
    AccessDenied,
}

pub fn check(state: AuthState, requirement: Requirement) -> Decision {
    match (requirement, state) {
        (Requirement::Public, _) => Decision::Render,
        (_, AuthState::Loading) => Decision::Waiting,
        (_, AuthState::Unauthenticated) => Decision::RedirectToLogin,
        (Requirement::Authenticated, AuthState::Authenticated(_)) => Decision::Render,
        (Requirement::Professor, AuthState::Authenticated(Role::Professor)) => Decision::Render,
        (Requirement::Professor, AuthState::Authenticated(Role::Student)) => Decision::AccessDenied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [AuthState; 4] = [
        AuthState::Loading,
        AuthState::Unauthenticated,
        AuthState::Authenticated(Role::Student),
        AuthState::Authenticated(Role::Professor),
    ];

    #[test]
    fn test_public_always_renders() {
        for state in STATES {
            assert_eq!(check(state, Requirement::Public), Decision::Render);
        }
    }

    #[test]
    fn test_loading_waits_instead_of_redirecting() {
        assert_eq!(check(AuthState::Loading, Requirement::Authenticated), Decision::Waiting);
        assert_eq!(check(AuthState::Loading, Requirement::Professor), Decision::Waiting);
    }

    #[test]
    fn test_unauthenticated_redirects() {
        assert_eq!(
            check(AuthState::Unauthenticated, Requirement::Authenticated),
            Decision::RedirectToLogin
        );
        assert_eq!(
            check(AuthState::Unauthenticated, Requirement::Professor),
            Decision::RedirectToLogin
        );
    }

    #[test]
    fn test_authenticated_renders() {
        assert_eq!(
            check(AuthState::Authenticated(Role::Student), Requirement::Authenticated),
            Decision::Render
        );
        assert_eq!(
            check(AuthState::Authenticated(Role::Professor), Requirement::Professor),
            Decision::Render
        );
    }

    #[test]
    fn test_student_denied_on_professor_route() {
        assert_eq!(
            check(AuthState::Authenticated(Role::Student), Requirement::Professor),
            Decision::AccessDenied
        );
    }
}
