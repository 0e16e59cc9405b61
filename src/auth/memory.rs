//! In-process identity provider.

use super::{Credential, IdentityProvider};
use crate::error::{Result, WalletError};
use crate::types::{UserData, UserId};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Minimum password length accepted on sign-up.
const MIN_PASSWORD_LEN: usize = 6;

/// Length of generated user ids.
const USER_ID_LEN: usize = 28;

struct EmailUser {
    password_hash: String,
    profile: UserData,
}

#[derive(Default)]
struct Inner {
    email_users: HashMap<String, EmailUser>,
    /// Third-party tokens that exchange successfully.
    tokens: HashMap<String, UserData>,
    current: Option<UserData>,
}

/// Identity provider that keeps users in memory.
///
/// Email users are stored with a salted password hash. Google and Facebook
/// tokens succeed only if registered with [`accept_token`](Self::accept_token).
#[derive(Default)]
pub struct MemoryIdentity {
    inner: Mutex<Inner>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an email/password user without signing in.
    pub fn register_email(&self, email: &str, password: &str, username: Option<&str>) -> UserData {
        let email = normalize_email(email);
        let profile = UserData {
            user_id: derive_user_id(&email),
            username: username.map(str::to_string),
            profile_picture_url: None,
        };
        self.inner.lock().email_users.insert(
            email,
            EmailUser {
                password_hash: hash_password(&profile.user_id, password),
                profile: profile.clone(),
            },
        );
        profile
    }

    /// Make a third-party token sign in as `user_id`.
    pub fn accept_token(&self, token: &str, user_id: UserId, username: Option<&str>) {
        self.inner.lock().tokens.insert(
            token.to_string(),
            UserData {
                user_id,
                username: username.map(str::to_string),
                profile_picture_url: None,
            },
        );
    }
}

impl IdentityProvider for MemoryIdentity {
    fn sign_in(&self, credential: &Credential) -> Result<UserData> {
        let mut inner = self.inner.lock();
        let user = match credential {
            Credential::Google { id_token: token } | Credential::Facebook { access_token: token } => inner
                .tokens
                .get(token)
                .cloned()
                .ok_or_else(|| WalletError::Auth("the supplied auth credential is malformed or has expired".into()))?,
            Credential::EmailPassword { email, password } => {
                let stored = inner
                    .email_users
                    .get(&normalize_email(email))
                    .ok_or_else(|| WalletError::Auth("there is no user record corresponding to this identifier".into()))?;
                if stored.password_hash != hash_password(&stored.profile.user_id, password) {
                    return Err(WalletError::Auth("the password is invalid".into()));
                }
                stored.profile.clone()
            }
        };
        inner.current = Some(user.clone());
        Ok(user)
    }

    fn create_user(&self, email: &str, password: &str) -> Result<UserData> {
        if !email.contains('@') {
            return Err(WalletError::Auth("the email address is badly formatted".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(WalletError::Auth(format!(
                "password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.inner.lock().email_users.contains_key(&normalize_email(email)) {
            return Err(WalletError::Auth(
                "the email address is already in use by another account".into(),
            ));
        }

        let profile = self.register_email(email, password, None);
        self.inner.lock().current = Some(profile.clone());
        Ok(profile)
    }

    fn current_user(&self) -> Option<UserData> {
        self.inner.lock().current.clone()
    }

    fn sign_out(&self) -> Result<()> {
        self.inner.lock().current = None;
        Ok(())
    }

    fn delete_user(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let user = inner.current.take().ok_or(WalletError::NotSignedIn)?;
        inner.email_users.retain(|_, u| u.profile.user_id != user.user_id);
        inner.tokens.retain(|_, u| u.user_id != user.user_id);
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn derive_user_id(email: &str) -> UserId {
    let mut id = hex::encode(Sha256::digest(email.as_bytes()));
    id.truncate(USER_ID_LEN);
    UserId(id)
}

fn hash_password(user_id: &UserId, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_case_insensitive() {
        let identity = MemoryIdentity::new();
        let registered = identity.register_email("Ana@Example.com", "hunter2", None);

        let user = identity
            .sign_in(&Credential::EmailPassword {
                email: " ana@example.COM ".into(),
                password: "hunter2".into(),
            })
            .unwrap();
        assert_eq!(user.user_id, registered.user_id);
        assert_eq!(user.user_id.as_str().len(), USER_ID_LEN);
    }

    #[test]
    fn test_create_user_rules() {
        let identity = MemoryIdentity::new();
        assert!(identity.create_user("not-an-email", "secret1").is_err());
        assert!(identity.create_user("a@b.c", "short").is_err());

        identity.create_user("a@b.c", "secret1").unwrap();
        assert!(matches!(
            identity.create_user("A@B.C", "secret1"),
            Err(WalletError::Auth(_))
        ));
    }

    #[test]
    fn test_delete_requires_current_user() {
        let identity = MemoryIdentity::new();
        assert!(matches!(identity.delete_user(), Err(WalletError::NotSignedIn)));
    }
}
