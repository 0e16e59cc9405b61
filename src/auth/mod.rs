//! Identity layer: sign-in providers and the client that wraps them.
//!
//! Providers are selected by the caller through [`Credential`]; every
//! provider yields the same [`UserData`]. All client operations return an
//! [`AuthResult`] pair instead of an error so failures can be shown to the
//! user as text.

mod memory;

pub use memory::MemoryIdentity;

use crate::error::{Result, WalletError};
use crate::types::UserData;
use serde::{Deserialize, Serialize};

/// Sign-in method chosen by the user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum Credential {
    /// ID token from Google one-tap sign-in.
    Google { id_token: String },
    /// Access token from Facebook login.
    Facebook { access_token: String },
    EmailPassword { email: String, password: String },
}

impl Credential {
    pub fn provider_name(&self) -> &'static str {
        match self {
            Credential::Google { .. } => "google",
            Credential::Facebook { .. } => "facebook",
            Credential::EmailPassword { .. } => "password",
        }
    }
}

// Keep secrets out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::EmailPassword { email, .. } => f
                .debug_struct("EmailPassword")
                .field("email", email)
                .finish_non_exhaustive(),
            other => write!(f, "{}(..)", other.provider_name()),
        }
    }
}

/// Outcome of an identity operation: data on success, message on failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthResult<T> {
    pub data: Option<T>,
    pub error_message: Option<String>,
}

impl<T> AuthResult<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }

    /// Convert back into a `Result`.
    pub fn into_result(self) -> Result<T> {
        match (self.data, self.error_message) {
            (Some(data), _) => Ok(data),
            (None, message) => Err(WalletError::Auth(
                message.unwrap_or_else(|| "unknown authentication error".into()),
            )),
        }
    }
}

impl<T> From<Result<T>> for AuthResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

/// Result of a sign-in or sign-up attempt.
pub type SignInResult = AuthResult<UserData>;

/// Black-box identity service.
pub trait IdentityProvider: Send + Sync {
    /// Exchange a credential for a signed-in user.
    fn sign_in(&self, credential: &Credential) -> Result<UserData>;

    /// Register a new email/password user and sign them in.
    fn create_user(&self, email: &str, password: &str) -> Result<UserData>;

    fn current_user(&self) -> Option<UserData>;

    fn sign_out(&self) -> Result<()>;

    /// Delete the signed-in identity.
    fn delete_user(&self) -> Result<()>;
}

/// Identity client used by the application.
pub struct AuthClient<P> {
    provider: P,
}

impl<P: IdentityProvider> AuthClient<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn signed_in_user(&self) -> Option<UserData> {
        self.provider.current_user()
    }

    pub fn sign_in(&self, credential: &Credential) -> SignInResult {
        let result = self.provider.sign_in(credential);
        match &result {
            Ok(user) => tracing::info!(provider = credential.provider_name(), user = %user.user_id, "signed in"),
            Err(e) => tracing::warn!(provider = credential.provider_name(), error = %e, "sign-in failed"),
        }
        result.into()
    }

    pub fn sign_in_with_email(&self, email: &str, password: &str) -> SignInResult {
        self.sign_in(&Credential::EmailPassword {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    /// Register with email and password. The password must be non-empty
    /// and match its confirmation.
    pub fn sign_up_with_email(&self, email: &str, password: &str, repeat: &str) -> SignInResult {
        if let Err(e) = validate_sign_up(email, password, repeat) {
            return SignInResult::failure(e.to_string());
        }
        let result = self.provider.create_user(email.trim(), password);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "sign-up failed");
        }
        result.into()
    }

    pub fn sign_out(&self) -> AuthResult<()> {
        let result = self.provider.sign_out();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "sign-out failed");
        }
        result.into()
    }

    /// Delete the signed-in identity. Stored data is removed separately.
    pub fn delete_account(&self) -> AuthResult<()> {
        let result = self.provider.delete_user();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "identity deletion failed");
        }
        result.into()
    }
}

fn validate_sign_up(email: &str, password: &str, repeat: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(WalletError::Validation("email must not be empty".into()));
    }
    if password.is_empty() {
        return Err(WalletError::Validation("password must not be empty".into()));
    }
    if password != repeat {
        return Err(WalletError::Validation("passwords do not match".into()));
    }
    Ok(())
}

/// Sign-in screen state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    pub is_sign_in_successful: bool,
    pub sign_in_error: Option<String>,
}

impl AuthState {
    pub fn on_sign_in_result(&mut self, result: &SignInResult) {
        self.is_sign_in_successful = result.data.is_some();
        self.sign_in_error = result.error_message.clone();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
