use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use model::entities::user;

use crate::config::MailConfig;
use crate::schemas::AppState;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct OutboundEmail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

/// Thin client for an HTTP mail provider.
///
/// The provider is reached over its JSON API; there is no SMTP involved.
/// Calls are only made from detached tasks or the explicit admin test
/// action, never from the consumption response path.
#[derive(Debug, Clone)]
pub struct Mailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        }
    }

    pub async fn send(
        &self,
        to: &[String],
        subject: &str,
        text: &str,
    ) -> Result<(), MailError> {
        let payload = OutboundEmail {
            from: &self.from,
            to,
            subject,
            text,
        };
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        debug!("Mail accepted by provider for {} recipient(s)", to.len());
        Ok(())
    }
}

/// Broadcast a consumption event to everyone who opted in.
///
/// Runs as a detached task: the consumption response never waits on the
/// mail transport, and any failure is captured in the runtime error ring
/// instead of reaching the drinker.
pub fn spawn_consumption_broadcast(state: AppState, actor: user::Model, current_stock: i32) {
    let Some(mailer) = state.mailer.clone() else {
        debug!("Mailer not configured; skipping consumption broadcast");
        return;
    };

    tokio::spawn(async move {
        let recipients = match user::Entity::find()
            .filter(user::Column::IsActive.eq(true))
            .filter(user::Column::NotifyOnConsumption.eq(true))
            .filter(user::Column::Id.ne(actor.id))
            .all(&state.db)
            .await
        {
            Ok(users) => users.into_iter().map(|u| u.email).collect::<Vec<_>>(),
            Err(db_error) => {
                warn!("Failed to load notification recipients: {}", db_error);
                state
                    .errors
                    .record("mailer", format!("recipient lookup failed: {db_error}"));
                return;
            }
        };

        if recipients.is_empty() {
            debug!("No opted-in recipients for consumption broadcast");
            return;
        }

        let subject = format!("{} took a coffee", actor.name);
        let text = format!(
            "{} ({}) just logged a coffee. {} cup(s) remain in stock.",
            actor.name, actor.email, current_stock
        );

        match mailer.send(&recipients, &subject, &text).await {
            Ok(()) => info!(
                "Consumption broadcast sent to {} recipient(s)",
                recipients.len()
            ),
            Err(mail_error) => {
                warn!("Consumption broadcast failed: {}", mail_error);
                state
                    .errors
                    .record("mailer", format!("consumption broadcast: {mail_error}"));
            }
        }
    });
}

/// Email every admin an approve and a reject link for a pending
/// registration. Detached like the consumption broadcast.
pub fn spawn_registration_notice(state: AppState, pending: user::Model) {
    let Some(mailer) = state.mailer.clone() else {
        debug!("Mailer not configured; skipping registration notice");
        return;
    };

    tokio::spawn(async move {
        let admins = match user::Entity::find()
            .filter(user::Column::IsActive.eq(true))
            .filter(user::Column::Role.eq(user::Role::Admin))
            .all(&state.db)
            .await
        {
            Ok(users) => users.into_iter().map(|u| u.email).collect::<Vec<_>>(),
            Err(db_error) => {
                warn!("Failed to load admin recipients: {}", db_error);
                state
                    .errors
                    .record("mailer", format!("admin lookup failed: {db_error}"));
                return;
            }
        };

        if admins.is_empty() {
            warn!("No active admins to notify about registration");
            return;
        }

        let token = match state.tokens.issue_registration_action(&pending) {
            Ok(token) => token,
            Err(e) => {
                state
                    .errors
                    .record("mailer", format!("action token mint failed: {e}"));
                return;
            }
        };

        let base = state.public_base_url.trim_end_matches('/');
        let subject = format!("Registration request from {}", pending.email);
        let text = format!(
            "{} ({}) asked to join the coffee counter.\n\n\
             Approve: {base}/api/auth/registration/approve?token={token}\n\
             Reject:  {base}/api/auth/registration/reject?token={token}\n\n\
             The links are valid for 48 hours.",
            pending.name, pending.email
        );

        if let Err(mail_error) = mailer.send(&admins, &subject, &text).await {
            warn!("Registration notice failed: {}", mail_error);
            state
                .errors
                .record("mailer", format!("registration notice: {mail_error}"));
        }
    });
}
