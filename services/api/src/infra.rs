use metrics_exporter_prometheus::PrometheusHandle;
use saga_recruit::config::NotificationConfig;
use saga_recruit::workflows::recruitment::{
    InMemoryRecruitmentStore, MailError, Mailer, OutboundEmail, RecruitmentService,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type AppService = RecruitmentService<InMemoryRecruitmentStore, OutboxMailer>;

/// Mail transport that records messages and logs them instead of talking to SMTP.
#[derive(Default, Clone)]
pub(crate) struct OutboxMailer {
    messages: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl Mailer for OutboxMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        let mut guard = self
            .messages
            .lock()
            .map_err(|_| MailError::Transport("outbox mutex poisoned".to_string()))?;
        info!(
            from = %email.from,
            to = %email.recipient,
            subject = %email.subject,
            "email queued in outbox"
        );
        guard.push(email.clone());
        Ok(())
    }
}

impl OutboxMailer {
    pub(crate) fn messages(&self) -> Vec<OutboundEmail> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

pub(crate) fn build_service(settings: NotificationConfig) -> (Arc<AppService>, OutboxMailer) {
    let mailer = OutboxMailer::default();
    let service = Arc::new(RecruitmentService::new(
        Arc::new(InMemoryRecruitmentStore::new()),
        Arc::new(mailer.clone()),
        settings,
    ));
    (service, mailer)
}
