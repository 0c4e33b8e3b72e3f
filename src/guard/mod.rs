use crate::session::Session;

/// Standard Result type for guards
/// Ok(()) means allowed
/// Err(GuardError) means denied
pub type GuardResult = Result<(), GuardError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// An authorization declaration on a controller or handler method.
///
/// An empty role list means "authenticated, any role".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorization {
    roles: Vec<String>,
}

impl Authorization {
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn restricts_roles(&self) -> bool {
        !self.roles.is_empty()
    }

    /// Checks one declaration against the session.
    pub fn check(&self, session: &Session) -> GuardResult {
        if !session.is_authenticated() {
            return Err(GuardError::Unauthorized(
                "User not authenticated".to_string(),
            ));
        }

        if self.restricts_roles() {
            let role = session.role();
            let allowed = role
                .as_deref()
                .is_some_and(|role| self.roles.iter().any(|r| r == role));
            if !allowed {
                return Err(GuardError::Forbidden(format!(
                    "role {} is not one of [{}]",
                    role.as_deref().map(String::as_str).unwrap_or("<none>"),
                    self.roles.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Evaluates controller-level then method-level declarations. Both apply
/// when present; none means unrestricted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    pub fn check(
        &self,
        controller: Option<&Authorization>,
        method: Option<&Authorization>,
        session: &Session,
    ) -> GuardResult {
        for authorization in [controller, method].into_iter().flatten() {
            authorization.check(session)?;
        }
        Ok(())
    }
}
