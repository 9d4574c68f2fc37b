use crate::{
    config::AppConfig,
    entities::User,
    errors::ServiceError,
    services::{
        commerce::order_materializer::MaterializedLine,
        receipts::{render_receipt, Receipt},
    },
};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub attachment: Option<MailAttachment>,
}

#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), ServiceError>;
}

/// Delivers through an SMTP relay with STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        from: &str,
    ) -> Result<Self, ServiceError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| ServiceError::InternalError(format!("smtp relay {}: {}", host, e)))?
            .port(port);
        if let Some((user, pass)) = credentials {
            builder = builder.credentials(Credentials::new(user, pass));
        }
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| ServiceError::InternalError(format!("smtp from address: {}", e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), ServiceError> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|e| ServiceError::NotifierFailure(format!("bad recipient: {}", e)))?;

        let mut body = MultiPart::mixed().singlepart(SinglePart::plain(mail.text));
        if let Some(attachment) = mail.attachment {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| ServiceError::NotifierFailure(format!("content type: {}", e)))?;
            body = body.singlepart(Attachment::new(attachment.filename).body(attachment.bytes, content_type));
        }

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .multipart(body)
            .map_err(|e| ServiceError::NotifierFailure(format!("message build: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ServiceError::NotifierFailure(format!("smtp: {}", e)))?;
        Ok(())
    }
}

/// Used when no SMTP relay is configured; records the receipt in the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), ServiceError> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            attachment = mail.attachment.as_ref().map(|a| a.filename.as_str()),
            "SMTP not configured; receipt logged instead of sent"
        );
        Ok(())
    }
}

/// Picks the SMTP mailer when a host is configured.
pub fn mailer_from_config(config: &AppConfig) -> Result<Arc<dyn Mailer>, ServiceError> {
    match config.smtp_host.as_deref().filter(|h| !h.trim().is_empty()) {
        Some(host) => {
            let credentials = config
                .smtp_username
                .clone()
                .zip(config.smtp_password.clone());
            Ok(Arc::new(SmtpMailer::new(
                host,
                config.smtp_port,
                credentials,
                &config.smtp_from,
            )?))
        }
        None => Ok(Arc::new(LogMailer)),
    }
}

/// Emails a receipt after a sale. Best effort: failures are logged and dropped.
#[derive(Clone)]
pub struct OrderNotifier {
    db: Arc<DatabaseConnection>,
    mailer: Arc<dyn Mailer>,
}

impl OrderNotifier {
    pub fn new(db: Arc<DatabaseConnection>, mailer: Arc<dyn Mailer>) -> Self {
        Self { db, mailer }
    }

    #[instrument(skip(self, lines))]
    pub async fn notify(&self, user_id: i32, order_id: i32, total: Decimal, lines: &[MaterializedLine]) {
        match self.deliver(user_id, order_id, total, lines).await {
            Ok(()) => {
                counter!("storefront_notifier.sent", 1);
                info!("Receipt sent");
            }
            Err(err) => {
                counter!("storefront_notifier.failed", 1);
                warn!(error = %err, "Receipt not sent");
            }
        }
    }

    async fn deliver(
        &self,
        user_id: i32,
        order_id: i32,
        total: Decimal,
        lines: &[MaterializedLine],
    ) -> Result<(), ServiceError> {
        let user = User::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| ServiceError::NotifierFailure(format!("user lookup: {}", e)))?
            .ok_or_else(|| ServiceError::NotifierFailure(format!("user {} not found", user_id)))?;

        let to = user
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ServiceError::NotifierFailure(format!("user {} has no email", user_id)))?;

        let receipt: Receipt = render_receipt(order_id, &user.full_name, total, lines);
        let filename = receipt.attachment_name(order_id);
        self.mailer
            .send(OutgoingMail {
                to,
                subject: receipt.subject,
                text: receipt.text,
                attachment: Some(MailAttachment {
                    filename,
                    content_type: "application/pdf".to_string(),
                    bytes: receipt.pdf,
                }),
            })
            .await
    }
}
