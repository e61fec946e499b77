//! Validation Authority.
//!
//! Dispatches a challenge to the right validator, enforces per-attempt
//! and per-validation timeouts, consults CAA on success, and reports
//! the outcome through the registration authority. Every call is
//! fire-and-forget from the caller's perspective: `update_validations`
//! spawns the work and returns immediately.

pub mod caa;
pub mod dns;
pub mod http;
pub mod jws;
pub mod tlssni;

use crate::collaborators::RegistrationAuthority;
use crate::config::VaConfig;
use crate::error::{CaError, Result};
use crate::types::{Authorization, CaaResult, ChallengeType, IdentifierType};
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use rsa::RsaPublicKey;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const VALIDATION_BUDGET: Duration = Duration::from_secs(10);

/// Orchestrates challenge validation and CAA lookups.
pub struct ValidationAuthority {
    config: VaConfig,
    client: reqwest::Client,
    resolver: TokioAsyncResolver,
    ra: Arc<dyn RegistrationAuthority>,
}

impl ValidationAuthority {
    /// Builds a validation authority from its configuration and
    /// registration-authority collaborator.
    pub fn new(config: VaConfig, ra: Arc<dyn RegistrationAuthority>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(1))
            .build()
            .map_err(|e| CaError::ServerInternal(e.to_string()))?;

        let addrs: Vec<SocketAddr> = config
            .dns_resolvers
            .iter()
            .map(|a| a.parse())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| CaError::ServerInternal(format!("invalid dns_resolvers entry: {e}")))?;
        if addrs.is_empty() {
            return Err(CaError::ServerInternal("no DNS resolvers configured".to_string()));
        }
        let group = NameServerConfigGroup::from_ips_clear(
            &addrs.iter().map(|a| a.ip()).collect::<Vec<_>>(),
            addrs[0].port(),
            true,
        );
        let resolver_config = ResolverConfig::from_parts(None, vec![], group);
        let resolver = TokioAsyncResolver::tokio(resolver_config, ResolverOpts::default());

        Ok(Self { config, client, resolver, ra })
    }

    /// §4.J: schedules validation of `authorization.challenges[challenge_index]`
    /// on a background task and returns immediately. The task never
    /// panics on attacker-controlled input and calls the registration
    /// authority's validation-update hook at most once - never for an
    /// out-of-range `challenge_index`, and otherwise exactly once, after
    /// the selected validator returns or times out.
    pub fn update_validations(
        self: &Arc<Self>,
        mut authorization: Authorization,
        challenge_index: usize,
        account_key: RsaPublicKey,
    ) {
        let va = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                VALIDATION_BUDGET,
                va.run_one(&authorization, challenge_index, &account_key),
            )
            .await
            .unwrap_or_else(|_| Err(CaError::Connection("validation attempt exceeded its time budget".to_string())));

            let Some(challenge) = authorization.challenges.get_mut(challenge_index) else {
                return;
            };

            match outcome {
                Ok(()) => challenge.mark_valid(),
                Err(e) => challenge.mark_invalid(e.class_name(), e.to_string()),
            }

            va.ra.on_validation_update(authorization).await;
        });
    }

    async fn run_one(
        &self,
        authorization: &Authorization,
        challenge_index: usize,
        account_key: &RsaPublicKey,
    ) -> Result<()> {
        let challenge = authorization
            .challenges
            .get(challenge_index)
            .ok_or_else(|| CaError::MalformedRequest("no such challenge index".to_string()))?;

        match challenge.kind {
            ChallengeType::SimpleHttp => {
                http::validate(
                    &self.client,
                    &self.resolver,
                    &self.config,
                    &authorization.identifier,
                    challenge,
                    account_key,
                )
                .await?
            }
            ChallengeType::Dvsni => {
                tlssni::validate(&self.resolver, &self.config, &authorization.identifier, challenge, account_key)
                    .await?
            }
            ChallengeType::Dns => dns::validate(&self.resolver, &authorization.identifier, challenge, account_key).await?,
        }

        if authorization.identifier.kind == IdentifierType::Dns {
            let caa = self.check_caa_records(&authorization.identifier.value).await?;
            if !caa.valid {
                return Err(CaError::Unauthorized("CAA records forbid issuance".to_string()));
            }
        }

        Ok(())
    }

    /// Public CAA entry point, independent of the dispatcher.
    pub async fn check_caa_records(&self, domain: &str) -> Result<CaaResult> {
        caa::check(&self.resolver, domain, &self.config.issuer_domain).await
    }
}
