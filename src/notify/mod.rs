//! Notification transports
//!
//! Email and push delivery for settlement outcomes. Both transports are
//! fire-and-forget: failures are logged and never propagate back into the
//! settlement pass that triggered them, and neither rolls back a confirmed
//! payment.

pub mod email;
pub mod push;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::NotifyArgs;
use crate::model::UserRegistry;

pub use email::EmailSender;
pub use push::PushSender;

const CLAIM_PAID_SUBJECT: &str = "Claim Paid";
const CLAIM_PAID_FROM: &str = "Blockchain Insurance";

/// Downstream notification hook for confirmed claimant-facing payments
#[async_trait]
pub trait ClaimNotifier: Send + Sync {
    /// Tell the policy owner their claim has paid out
    async fn notify_claim_paid(&self, claim_id: &str, policy_owner: &str);
}

/// Notifier resolving registry contact details and fanning out to the
/// configured transports
pub struct Notifier {
    registry: Arc<UserRegistry>,
    email: Option<EmailSender>,
    push: Option<PushSender>,
}

impl Notifier {
    pub fn from_args(args: &NotifyArgs, registry: Arc<UserRegistry>) -> Self {
        let email = args
            .email_url
            .as_ref()
            .map(|url| EmailSender::new(url, &args.email_from));
        if email.is_none() {
            info!("Email transport not configured, claim paid emails disabled");
        }

        let push = args
            .push_key
            .as_ref()
            .map(|key| PushSender::new(&args.push_url, key));
        if push.is_none() {
            info!("Push transport not configured, claim paid pushes disabled");
        }

        Self {
            registry,
            email,
            push,
        }
    }
}

#[async_trait]
impl ClaimNotifier for Notifier {
    async fn notify_claim_paid(&self, claim_id: &str, policy_owner: &str) {
        let body = format!("Your claim with id {} has been paid out", claim_id);

        match self.registry.email_for(policy_owner) {
            Some(address) => {
                if let Some(ref email) = self.email {
                    email
                        .send(
                            CLAIM_PAID_SUBJECT,
                            &body,
                            &[address.to_string()],
                            CLAIM_PAID_FROM,
                        )
                        .await;
                } else {
                    debug!(user = %policy_owner, "Email transport disabled, skipping claim paid email");
                }
            }
            None => {
                error!(user = %policy_owner, "Cannot get email address for user");
            }
        }

        if let Some(token) = self.registry.device_token_for(policy_owner) {
            if let Some(ref push) = self.push {
                push.send(token, CLAIM_PAID_SUBJECT, &body).await;
            }
        }
    }
}
