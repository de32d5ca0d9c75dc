use std::fmt;

/// Login identity for one AKSes account.
///
/// With `plain_password` set, the password is run through the activation
/// exchange before login; otherwise it is sent as-is and must already be in
/// the derived form the login endpoint expects.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub plain_password: bool,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            plain_password: false,
        }
    }

    pub fn with_plain_password(mut self, plain_password: bool) -> Self {
        self.plain_password = plain_password;
        self
    }

    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("plain_password", &self.plain_password)
            .finish()
    }
}
