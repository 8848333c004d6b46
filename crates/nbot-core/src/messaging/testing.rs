//! In-memory `BotApi` used by unit tests across the crate.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{BotIdentity, MessageId, MessageRef, UserId},
    errors::{ApiError, Error},
    messaging::{port::BotApi, types::SendMessage},
    Result,
};

#[derive(Default)]
pub struct FakeApi {
    sent: Mutex<Vec<SendMessage>>,
    send_failures: Mutex<VecDeque<Error>>,
    send_attempts: AtomicUsize,
    answers: Mutex<Vec<(String, Option<String>)>>,
    get_me_calls: AtomicUsize,
    get_me_delay: Mutex<Option<Duration>>,
    webhook_calls: Mutex<Vec<bool>>,
    fail_webhook: Mutex<bool>,
}

impl FakeApi {
    pub fn fail_sends(&self, errors: impl IntoIterator<Item = Error>) {
        self.send_failures.lock().unwrap().extend(errors);
    }

    pub fn fail_webhook(&self) {
        *self.fail_webhook.lock().unwrap() = true;
    }

    pub fn delay_get_me(&self, delay: Duration) {
        *self.get_me_delay.lock().unwrap() = Some(delay);
    }

    pub fn sent(&self) -> Vec<SendMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn answers(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().unwrap().clone()
    }

    pub fn get_me_calls(&self) -> usize {
        self.get_me_calls.load(Ordering::SeqCst)
    }

    pub fn webhook_calls(&self) -> Vec<bool> {
        self.webhook_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BotApi for FakeApi {
    async fn get_me(&self) -> Result<BotIdentity> {
        self.get_me_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.get_me_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        Ok(BotIdentity {
            id: UserId(42),
            username: "nbot_test_bot".to_string(),
            is_bot: true,
        })
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        self.webhook_calls.lock().unwrap().push(drop_pending_updates);
        if *self.fail_webhook.lock().unwrap() {
            return Err(Error::Api(ApiError::Network("offline".to_string())));
        }
        Ok(())
    }

    async fn send_message(&self, msg: SendMessage) -> Result<MessageRef> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        let failure = self.send_failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(msg.clone());
        Ok(MessageRef {
            chat_id: msg.chat_id,
            message_id: MessageId(sent.len() as i32),
        })
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }
}
