use tracing::{debug, info};
use wallet_pairing_transport::wire::{
    BalanceResponse, ConnectWalletRequest, ConnectWalletResponse, LinkChallengeResponse,
};
use wallet_pairing_transport::{format_address, validate_solana_address};

use crate::authority::{HttpAuthority, error_detail};
use crate::error::AuthorityError;

impl HttpAuthority {
    pub async fn wallet_balance(&self, user_id: &str) -> Result<BalanceResponse, AuthorityError> {
        let url = self.urls().balance(user_id)?;
        debug!(%url, "authority GET");

        let response = self.client().get(url).send().await?;
        if !response.status().is_success() {
            return Err(AuthorityError::RequestFailed(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    /// Message the wallet must sign to link `public_key` directly.
    pub async fn generate_link_challenge(
        &self,
        public_key: &str,
    ) -> Result<String, AuthorityError> {
        validate_solana_address(public_key)?;

        let url = self.urls().generate_challenge(public_key)?;
        debug!(%url, "authority GET");
        let response = self.client().get(url).send().await?;
        if !response.status().is_success() {
            return Err(AuthorityError::RequestFailed(response.status().as_u16()));
        }

        let LinkChallengeResponse { success, message } = response.json().await?;
        message
            .filter(|message| success && !message.is_empty())
            .ok_or_else(|| AuthorityError::Rejected("failed to generate challenge".to_string()))
    }

    /// Links an address typed in by hand. The address shape is checked before
    /// any request is made.
    pub async fn link_address(
        &self,
        user_id: &str,
        address: &str,
    ) -> Result<ConnectWalletResponse, AuthorityError> {
        let linked = self
            .connect_wallet(&ConnectWalletRequest::manual_entry(user_id, address))
            .await?;
        info!(user_id, address = %format_address(address), "wallet linked manually");
        Ok(linked)
    }

    /// Links a wallet with a signature over a `generate_link_challenge` message.
    pub async fn link_signed_wallet(
        &self,
        user_id: &str,
        public_key: &str,
        signature: &str,
        message: &str,
    ) -> Result<ConnectWalletResponse, AuthorityError> {
        let linked = self
            .connect_wallet(&ConnectWalletRequest::signed(
                user_id, public_key, signature, message,
            ))
            .await?;
        info!(user_id, address = %format_address(public_key), "wallet linked by signature");
        Ok(linked)
    }

    pub async fn connect_wallet(
        &self,
        request: &ConnectWalletRequest,
    ) -> Result<ConnectWalletResponse, AuthorityError> {
        validate_solana_address(&request.public_key)?;

        let response = self
            .client()
            .post(self.urls().connect_wallet()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_detail(response)
                .await
                .unwrap_or_else(|| "failed to connect wallet".to_string());
            return Err(AuthorityError::Rejected(detail));
        }

        let linked: ConnectWalletResponse = response.json().await?;
        if !linked.success {
            return Err(AuthorityError::Rejected(
                linked
                    .message
                    .or(linked.error)
                    .unwrap_or_else(|| "failed to connect wallet".to_string()),
            ));
        }

        Ok(linked)
    }
}

#[must_use]
pub fn describe_balance(balance: &BalanceResponse) -> String {
    if !balance.has_wallet {
        return "no wallet linked".to_string();
    }

    let address = balance
        .wallet_address
        .as_deref()
        .map_or_else(|| "unknown address".to_string(), format_address);

    match balance.available_balance {
        Some(amount) => format!("{address}: {amount} SOL"),
        None => format!("{address}: balance unavailable"),
    }
}
