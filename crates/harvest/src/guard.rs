//! Keeps the portal session logged in and parked on the tool page.

use syllabus_core::config::{Config, Credentials, PortalConfig, TimingConfig};
use syllabus_core::portal::{Locator, PortalSession, USERNAME_FIELD};
use syllabus_core::Result;
use tracing::{info, warn};

use crate::settle;

/// What a guard pass had to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardOutcome {
    pub reauthenticated: bool,
    pub renavigated: bool,
    /// Set when healing failed; the caller carries on regardless.
    pub error: Option<String>,
}

impl GuardOutcome {
    pub fn was_noop(&self) -> bool {
        !self.reauthenticated && !self.renavigated && self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SessionGuard {
    portal: PortalConfig,
    credentials: Credentials,
    timing: TimingConfig,
}

impl SessionGuard {
    pub fn new(config: &Config) -> Self {
        Self {
            portal: config.portal.clone(),
            credentials: config.credentials.clone(),
            timing: config.timing.clone(),
        }
    }

    pub fn semester_select(&self) -> Locator {
        Locator::id(&self.portal.semester_select_id)
    }

    /// Re-login and/or return to the tool page if needed. Never fails.
    pub async fn ensure<P>(&self, session: &mut P) -> GuardOutcome
    where
        P: PortalSession + ?Sized,
    {
        let mut outcome = GuardOutcome::default();
        if let Err(e) = self.heal(session, &mut outcome).await {
            warn!(error = %e, "Error in session check");
            outcome.error = Some(e.to_string());
        }
        outcome
    }

    async fn heal<P>(&self, session: &mut P, outcome: &mut GuardOutcome) -> Result<()>
    where
        P: PortalSession + ?Sized,
    {
        if self.on_login_page(session).await? {
            warn!("Session expired. Logging in again...");
            self.login(session).await?;
            outcome.reauthenticated = true;
        }

        if !session.exists(&self.semester_select()).await? {
            info!(url = %self.portal.tool_url, "Navigating to the course completion tool...");
            session.navigate(&self.portal.tool_url).await?;
            settle(self.timing.navigation_settle()).await;
            outcome.renavigated = true;

            if self.on_login_page(session).await? {
                warn!("Redirected to login. Logging in...");
                self.login(session).await?;
                outcome.reauthenticated = true;
            }
        }
        Ok(())
    }

    async fn on_login_page<P>(&self, session: &mut P) -> Result<bool>
    where
        P: PortalSession + ?Sized,
    {
        session.exists(&Locator::name(USERNAME_FIELD)).await
    }

    pub(crate) async fn login<P>(&self, session: &mut P) -> Result<()>
    where
        P: PortalSession + ?Sized,
    {
        session
            .authenticate(&self.credentials.username, &self.credentials.password)
            .await?;
        settle(self.timing.login_settle()).await;
        Ok(())
    }
}
