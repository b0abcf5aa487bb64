use syllabus_core::config::Config;
use syllabus_core::portal::{Locator, PortalSession, USERNAME_FIELD};
use syllabus_core::{Error, Result};
use tracing::{error, info};

use crate::guard::SessionGuard;
use crate::settle;

/// Log in from the portal's front page and follow the link to the tool.
///
/// A missing entry link is fatal: without it there is nothing to scan.
pub async fn open_tool<P>(session: &mut P, config: &Config, guard: &SessionGuard) -> Result<()>
where
    P: PortalSession + ?Sized,
{
    info!(url = %config.portal.login_url, "Opening portal");
    session.navigate(&config.portal.login_url).await?;
    settle(config.timing.page_load()).await;

    if session.exists(&Locator::name(USERNAME_FIELD)).await? {
        guard.login(session).await?;
    } else {
        info!("Already logged in");
    }

    let link_text = &config.portal.entry_link_text;
    let link = session
        .find_first(None, &Locator::partial_link_text(link_text))
        .await?;
    let Some(link) = link else {
        error!(link = %link_text, "Could not find the syllabi link");
        return Err(Error::EntryLinkNotFound(link_text.clone()));
    };
    session.click(&link).await?;
    settle(config.timing.navigation_settle()).await;
    Ok(())
}
