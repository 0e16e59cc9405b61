//! Ties a signed-in identity to a wallet over the shared database.

use crate::auth::{AuthClient, AuthResult, IdentityProvider};
use crate::docstore::DocumentDb;
use crate::error::{Result, WalletError};
use crate::repository::Repository;
use crate::types::UserData;
use crate::wallet::{Wallet, WalletConfig};
use std::sync::Arc;

/// A signed-in user with an open wallet.
pub struct Session<P: IdentityProvider> {
    auth: Arc<AuthClient<P>>,
    user: UserData,
    wallet: Wallet,
}

impl<P: IdentityProvider> Session<P> {
    /// Open a wallet for the currently signed-in user.
    pub fn start(
        auth: Arc<AuthClient<P>>,
        db: Arc<dyn DocumentDb>,
        config: WalletConfig,
    ) -> Result<Self> {
        let user = auth.signed_in_user().ok_or(WalletError::NotSignedIn)?;
        let wallet = Wallet::open(Repository::new(db, user.user_id.clone()), config)?;
        Ok(Self { auth, user, wallet })
    }

    pub fn user(&self) -> &UserData {
        &self.user
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Close the wallet, then sign out.
    pub fn sign_out(self) -> AuthResult<()> {
        self.wallet.close();
        self.auth.sign_out()
    }

    /// Remove the user's stored data, then the identity itself.
    ///
    /// The identity is deleted even if removing the data fails; the data
    /// failure is reported in that case.
    pub fn delete_account(self) -> AuthResult<()> {
        let data_error = self.wallet.purge_user_data().err().map(|e| e.to_string());
        self.wallet.close();

        let result = self.auth.delete_account();
        match data_error {
            Some(message) if result.error_message.is_none() => {
                tracing::warn!(user = %self.user.user_id, %message, "identity deleted but data removal failed");
                AuthResult::failure(message)
            }
            _ => result,
        }
    }
}
