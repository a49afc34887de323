use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    error::AppError,
    models::{participant::Participant, trip::Trip},
};

/// Outbound confirmation emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Asks the owner of `trip` to confirm it.
    async fn send_trip_confirmation(&self, trip: &Trip) -> Result<(), AppError>;

    /// Sends every participant their own confirmation link. Stops at the
    /// first failed delivery.
    async fn send_participant_invites(
        &self,
        trip: &Trip,
        participants: &[Participant],
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    base_url: String,
}

impl SmtpMailer {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let from = config
            .mail_from
            .parse::<Mailbox>()
            .map_err(|err| AppError::Config(format!("invalid MAIL_FROM: {err}")))?;
        // Local relays such as mailpit accept plain connections only.
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .build();
        Ok(Self {
            transport,
            from,
            base_url: config.public_base_url.clone(),
        })
    }

    async fn deliver(&self, to: &str, subject: String, html: String) -> Result<(), AppError> {
        let to = to
            .trim()
            .parse::<Mailbox>()
            .map_err(|err| AppError::Mail(format!("invalid recipient {to}: {err}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|err| AppError::Mail(format!("failed to build email: {err}")))?;
        self.transport
            .send(message)
            .await
            .map_err(|err| AppError::Mail(format!("failed to send email: {err}")))?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_trip_confirmation(&self, trip: &Trip) -> Result<(), AppError> {
        let link = format!("{}/trips/{}/confirm", self.base_url, trip.id);
        let (starts, ends) = format_period(trip);
        let subject = format!("Confirm your trip to {} on {starts}", trip.destination);
        let html = render(
            &format!(
                "You asked to plan a trip to <strong>{}</strong> from <strong>{starts}</strong> to <strong>{ends}</strong>.",
                trip.destination
            ),
            "To confirm your trip, follow the link below:",
            &link,
        );
        self.deliver(&trip.owner_email, subject, html).await?;
        info!(trip_id = %trip.id, "trip confirmation sent to owner");
        Ok(())
    }

    async fn send_participant_invites(
        &self,
        trip: &Trip,
        participants: &[Participant],
    ) -> Result<(), AppError> {
        let (starts, ends) = format_period(trip);
        for participant in participants {
            let link = format!("{}/participants/{}/confirm", self.base_url, participant.id);
            let html = render(
                &format!(
                    "You were invited to a trip to <strong>{}</strong> from <strong>{starts}</strong> to <strong>{ends}</strong>.",
                    trip.destination
                ),
                "To confirm your presence, follow the link below:",
                &link,
            );
            self.deliver(&participant.email, "Confirm your trip".to_string(), html)
                .await?;
            debug!(participant_id = %participant.id, "participant invite sent");
        }
        info!(trip_id = %trip.id, count = participants.len(), "participant invites sent");
        Ok(())
    }
}

fn format_period(trip: &Trip) -> (String, String) {
    (
        trip.starts_at.format("%Y-%m-%d").to_string(),
        trip.ends_at.format("%Y-%m-%d").to_string(),
    )
}

fn render(intro: &str, call_to_action: &str, link: &str) -> String {
    format!(
        r#"<div style="font-family: sans-serif; font-size: 16px; line-height: 1.6;">
  <p>{intro}</p>
  <p>{call_to_action}</p>
  <p><a href="{link}">Confirm trip</a></p>
  <p>If you do not know what this email is about, just ignore it.</p>
</div>"#
    )
}
