use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use intake_core::config::WebhookMode;
use intake_core::webhook::{WebhookPayload, WebhookReceipt};
use intake_slack::api::{
    FileInfo, OutgoingMessage, PostedMessage, SlackApi, SlackApiError, UserInfo,
};
use intake_slack::background::BackgroundTasks;
use intake_slack::blocks::{Block, ModalView};
use intake_slack::commands::SlashCommandPayload;
use intake_slack::events::{
    Acknowledger, EventContext, EventDispatcher, HandlerResult, MessageEvent, SharedFile,
    SlackEnvelope, SlackEvent, ViewSubmissionEvent,
};
use intake_slack::form::{FieldValue, FormMetadata, SelectedOption, ViewState};
use intake_slack::submission::ChannelPolicy;
use intake_slack::webhook::{AutomationWebhook, WebhookError, WebhookForwarder};
use intake_slack::{intake_dispatcher, IntakeServices};

const THREAD_TS: &str = "1700000000.000100";

#[derive(Clone, Debug, PartialEq, Eq)]
enum ApiCall {
    OpenModal { trigger_id: String, metadata: Option<String>, acked: bool },
    PostMessage { message: OutgoingMessage, acked: bool },
    FileInfo { file_id: String, acked: bool },
    UserInfo { user_id: String, acked: bool },
}

/// Observes the acknowledger of whichever envelope is currently being handled.
#[derive(Default)]
struct AckWatch {
    current: Mutex<Option<Arc<Acknowledger>>>,
}

impl AckWatch {
    fn watch(&self, ack: Arc<Acknowledger>) {
        *self.current.lock().expect("watch lock") = Some(ack);
    }

    fn acked(&self) -> bool {
        self.current.lock().expect("watch lock").as_ref().is_some_and(|ack| ack.is_acknowledged())
    }
}

#[derive(Default)]
struct RecordingSlackApi {
    watch: Arc<AckWatch>,
    calls: Mutex<Vec<ApiCall>>,
    fail_summary_posts: bool,
    fail_user_info: bool,
    fail_file_info: bool,
}

impl RecordingSlackApi {
    fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn posts(&self) -> Vec<OutgoingMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::PostMessage { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl SlackApi for RecordingSlackApi {
    async fn open_modal(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.record(ApiCall::OpenModal {
            trigger_id: trigger_id.to_owned(),
            metadata: view.private_metadata.clone(),
            acked: self.watch.acked(),
        });
        Ok(())
    }

    async fn post_message(
        &self,
        message: &OutgoingMessage,
    ) -> Result<PostedMessage, SlackApiError> {
        self.record(ApiCall::PostMessage { message: message.clone(), acked: self.watch.acked() });
        if message.thread_ts.is_none() && self.fail_summary_posts {
            return Err(SlackApiError::Api {
                method: "chat.postMessage",
                code: "channel_not_found".to_owned(),
            });
        }
        let ts = message.thread_ts.clone().unwrap_or_else(|| THREAD_TS.to_owned());
        Ok(PostedMessage { channel: message.channel.clone(), ts })
    }

    async fn file_info(&self, file_id: &str) -> Result<FileInfo, SlackApiError> {
        self.record(ApiCall::FileInfo { file_id: file_id.to_owned(), acked: self.watch.acked() });
        if self.fail_file_info {
            return Err(SlackApiError::Api { method: "files.info", code: "file_not_found".to_owned() });
        }
        Ok(FileInfo {
            id: file_id.to_owned(),
            name: "contract.pdf".to_owned(),
            download_url: format!("https://files.slack.com/files-pri/T1-{file_id}/download/contract.pdf"),
        })
    }

    async fn user_info(&self, user_id: &str) -> Result<UserInfo, SlackApiError> {
        self.record(ApiCall::UserInfo { user_id: user_id.to_owned(), acked: self.watch.acked() });
        if self.fail_user_info {
            return Err(SlackApiError::Api { method: "users.info", code: "missing_scope".to_owned() });
        }
        Ok(UserInfo { id: user_id.to_owned(), display_name: "alice".to_owned() })
    }
}

#[derive(Default)]
struct RecordingWebhook {
    watch: Arc<AckWatch>,
    payloads: Mutex<Vec<(WebhookPayload, bool)>>,
    folder_url: Option<String>,
    fail: bool,
}

impl RecordingWebhook {
    fn payloads(&self) -> Vec<WebhookPayload> {
        self.payloads.lock().expect("payload lock").iter().map(|(payload, _)| payload.clone()).collect()
    }

    fn all_acked(&self) -> bool {
        self.payloads.lock().expect("payload lock").iter().all(|(_, acked)| *acked)
    }
}

#[async_trait]
impl AutomationWebhook for RecordingWebhook {
    async fn forward(&self, payload: &WebhookPayload) -> Result<WebhookReceipt, WebhookError> {
        self.payloads.lock().expect("payload lock").push((payload.clone(), self.watch.acked()));
        if self.fail {
            return Err(WebhookError::Status { status: 500 });
        }
        Ok(WebhookReceipt { folder_url: self.folder_url.clone() })
    }
}

struct Harness {
    watch: Arc<AckWatch>,
    api: Arc<RecordingSlackApi>,
    webhook: Option<Arc<RecordingWebhook>>,
    forwarder: WebhookForwarder,
    background: BackgroundTasks,
    dispatcher: EventDispatcher,
}

impl Harness {
    fn build(
        api: RecordingSlackApi,
        webhook: Option<RecordingWebhook>,
        mode: WebhookMode,
        channels: ChannelPolicy,
    ) -> Self {
        let watch = Arc::new(AckWatch::default());
        let api = Arc::new(RecordingSlackApi { watch: Arc::clone(&watch), ..api });
        let webhook = webhook
            .map(|webhook| Arc::new(RecordingWebhook { watch: Arc::clone(&watch), ..webhook }));
        let background = BackgroundTasks::new();

        let forwarder = WebhookForwarder::new(
            webhook.clone().map(|webhook| webhook as Arc<dyn AutomationWebhook>),
            mode,
            background.clone(),
        );
        let services =
            IntakeServices::new(api.clone(), forwarder.clone()).with_channels(channels);
        let dispatcher = intake_dispatcher(&services);

        Self { watch, api, webhook, forwarder, background, dispatcher }
    }

    fn standard() -> Self {
        Self::build(
            RecordingSlackApi::default(),
            Some(RecordingWebhook::default()),
            WebhookMode::Await,
            legal_channel(),
        )
    }

    async fn deliver(&self, event: SlackEvent) -> HandlerResult {
        let (ack, _receiver) = Acknowledger::new();
        let ack = Arc::new(ack);
        self.watch.watch(Arc::clone(&ack));
        let envelope = SlackEnvelope { envelope_id: "env-test".to_owned(), event };
        let ctx = EventContext::new("env-test", Arc::clone(&ack));

        let result = self.dispatcher.dispatch(&envelope, &ctx).await.expect("dispatch");
        assert!(ack.is_acknowledged(), "every envelope must be acknowledged");
        result
    }

    fn webhook_payloads(&self) -> Vec<WebhookPayload> {
        self.webhook.as_ref().map(|webhook| webhook.payloads()).unwrap_or_default()
    }
}

fn legal_channel() -> ChannelPolicy {
    ChannelPolicy::new(Some("C-LEGAL".to_owned()), None)
}

fn slash_command(channel_id: &str) -> SlackEvent {
    SlackEvent::SlashCommand(SlashCommandPayload {
        command: "/legal".to_owned(),
        text: "please help".to_owned(),
        channel_id: channel_id.to_owned(),
        user_id: "U-ALICE".to_owned(),
        user_name: Some("alice".to_owned()),
        trigger_id: "trigger-1".to_owned(),
        response_url: None,
    })
}

fn text_field(value: &str) -> FieldValue {
    FieldValue {
        kind: Some("plain_text_input".to_owned()),
        value: Some(value.to_owned()),
        selected_option: None,
    }
}

fn submission(metadata: Option<String>) -> SlackEvent {
    let mut state: ViewState = HashMap::new();
    state.insert(
        "type_block".to_owned(),
        HashMap::from([(
            "request_type".to_owned(),
            FieldValue {
                kind: Some("static_select".to_owned()),
                value: None,
                selected_option: Some(SelectedOption { value: "Procurement".to_owned() }),
            },
        )]),
    );
    state.insert(
        "counterparty_block".to_owned(),
        HashMap::from([("counterparty_input".to_owned(), text_field("Acme Corp"))]),
    );
    state.insert(
        "description_block".to_owned(),
        HashMap::from([("description_input".to_owned(), text_field("NDA review"))]),
    );

    SlackEvent::ViewSubmission(ViewSubmissionEvent {
        callback_id: "legal_request_form".to_owned(),
        user_id: "U-ALICE".to_owned(),
        user_name: Some("alice.payload".to_owned()),
        private_metadata: metadata,
        state,
    })
}

fn file_share(thread_ts: Option<&str>) -> SlackEvent {
    SlackEvent::Message(MessageEvent {
        channel_id: "C-LEGAL".to_owned(),
        user_id: Some("U-BOB".to_owned()),
        subtype: Some("file_share".to_owned()),
        thread_ts: thread_ts.map(str::to_owned),
        files: vec![SharedFile { id: "F-CONTRACT".to_owned(), name: Some("contract.pdf".to_owned()) }],
    })
}

fn section_text(message: &OutgoingMessage) -> &str {
    match message.template.blocks.first() {
        Some(Block::Section { text, .. }) => text.text(),
        _ => "",
    }
}

#[tokio::test]
async fn command_acknowledges_before_opening_modal_with_invoking_channel() {
    let harness = Harness::standard();

    let result = harness.deliver(slash_command("C-GENERAL")).await;

    assert_eq!(result, HandlerResult::Processed);
    let calls = harness.api.calls();
    assert_eq!(calls.len(), 1);
    let ApiCall::OpenModal { trigger_id, metadata, acked } = &calls[0] else {
        panic!("expected views.open, got {calls:?}");
    };
    assert_eq!(trigger_id, "trigger-1");
    assert!(*acked, "modal must open after the ack");
    assert_eq!(
        FormMetadata::decode(metadata.as_deref()).channel_id.as_deref(),
        Some("C-GENERAL")
    );
}

#[tokio::test]
async fn other_commands_are_acknowledged_but_not_handled() {
    let harness = Harness::standard();
    let SlackEvent::SlashCommand(mut payload) = slash_command("C-GENERAL") else {
        unreachable!();
    };
    payload.command = "/quote".to_owned();

    let (ack, _receiver) = Acknowledger::new();
    let ctx = EventContext::new("env-quote", Arc::new(ack));
    let envelope =
        SlackEnvelope { envelope_id: "env-quote".to_owned(), event: SlackEvent::SlashCommand(payload) };
    let result = harness.dispatcher.dispatch(&envelope, &ctx).await;

    assert!(result.is_err());
    assert!(ctx.ack.is_acknowledged());
    assert!(harness.api.calls().is_empty());
}

#[tokio::test]
async fn submission_posts_summary_forwards_and_confirms_in_thread() {
    let harness = Harness::standard();

    harness.deliver(submission(None)).await;

    let posts = harness.api.posts();
    assert_eq!(posts.len(), 2);

    let summary = &posts[0];
    assert_eq!(summary.channel, "C-LEGAL");
    assert_eq!(summary.thread_ts, None);
    assert_eq!(summary.template.fallback_text, "🧾 New Legal Request Submitted by alice");
    let body = section_text(summary);
    assert!(body.contains("• *Type:* Procurement"));
    assert!(body.contains("• *Counterparty:* Acme Corp"));
    assert!(body.contains("• *Description:* NDA review"));

    let payloads = harness.webhook_payloads();
    assert_eq!(payloads.len(), 1);
    let WebhookPayload::NewRequest {
        request_type, counterparty, description, submitted_by, channel, thread_ts, timestamp,
    } = &payloads[0]
    else {
        panic!("expected new_request payload");
    };
    assert_eq!(request_type, "Procurement");
    assert_eq!(counterparty, "Acme Corp");
    assert_eq!(description, "NDA review");
    assert_eq!(submitted_by, "alice");
    assert_eq!(channel, "C-LEGAL");
    assert_eq!(thread_ts, THREAD_TS);
    assert!(timestamp.is_some());

    let confirmation = &posts[1];
    assert_eq!(confirmation.channel, "C-LEGAL");
    assert_eq!(confirmation.thread_ts.as_deref(), Some(THREAD_TS));
    assert_eq!(
        confirmation.template.fallback_text,
        "✅ Request recorded successfully. Please attach all relevant documents in this thread."
    );

    assert!(harness.api.calls().iter().all(|call| match call {
        ApiCall::OpenModal { acked, .. }
        | ApiCall::PostMessage { acked, .. }
        | ApiCall::FileInfo { acked, .. }
        | ApiCall::UserInfo { acked, .. } => *acked,
    }));
    assert!(harness.webhook.as_ref().is_some_and(|webhook| webhook.all_acked()));
}

#[tokio::test]
async fn confirmation_includes_folder_link_from_webhook() {
    let harness = Harness::build(
        RecordingSlackApi::default(),
        Some(RecordingWebhook {
            folder_url: Some("https://drive.google.com/drive/folders/abc".to_owned()),
            ..RecordingWebhook::default()
        }),
        WebhookMode::Await,
        legal_channel(),
    );

    harness.deliver(submission(None)).await;

    let posts = harness.api.posts();
    assert!(posts[1]
        .template
        .fallback_text
        .ends_with("\n📁 Folder: https://drive.google.com/drive/folders/abc"));
}

#[tokio::test]
async fn submission_without_configured_channel_uses_invoking_channel() {
    let harness = Harness::build(
        RecordingSlackApi::default(),
        Some(RecordingWebhook::default()),
        WebhookMode::Await,
        ChannelPolicy::default(),
    );

    harness.deliver(submission(Some(FormMetadata::for_channel("C-GENERAL").encode()))).await;

    assert_eq!(harness.api.posts()[0].channel, "C-GENERAL");
}

#[tokio::test]
async fn submission_with_no_known_channel_is_skipped() {
    let harness = Harness::build(
        RecordingSlackApi::default(),
        Some(RecordingWebhook::default()),
        WebhookMode::Await,
        ChannelPolicy::default(),
    );

    let result = harness.deliver(submission(None)).await;

    assert!(matches!(result, HandlerResult::Skipped(_)));
    assert!(harness.api.posts().is_empty());
    assert!(harness.webhook_payloads().is_empty());
}

#[tokio::test]
async fn unset_webhook_still_posts_summary_and_confirmation() {
    let harness =
        Harness::build(RecordingSlackApi::default(), None, WebhookMode::Await, legal_channel());

    harness.deliver(submission(None)).await;

    let posts = harness.api.posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[1].thread_ts.as_deref(), Some(THREAD_TS));
    assert_eq!(harness.forwarder.skipped_count(), 1);
}

#[tokio::test]
async fn summary_escapes_markup_but_webhook_gets_raw_values() {
    let harness = Harness::standard();
    let SlackEvent::ViewSubmission(mut event) = submission(None) else {
        unreachable!();
    };
    event.state.insert(
        "counterparty_block".to_owned(),
        HashMap::from([("counterparty_input".to_owned(), text_field("<!channel>"))]),
    );
    event.state.insert(
        "description_block".to_owned(),
        HashMap::from([("description_input".to_owned(), text_field("  see <https://x.test|terms>\n"))]),
    );

    harness.deliver(SlackEvent::ViewSubmission(event)).await;

    let body = section_text(&harness.api.posts()[0]).to_owned();
    assert!(body.contains("• *Counterparty:* &lt;!channel&gt;"));
    assert!(body.contains("• *Description:*   see &lt;https://x.test|terms&gt;\n"));

    let payloads = harness.webhook_payloads();
    let WebhookPayload::NewRequest { counterparty, description, .. } = &payloads[0] else {
        panic!("expected new_request payload");
    };
    assert_eq!(counterparty, "<!channel>");
    assert_eq!(description, "  see <https://x.test|terms>\n");
}

#[tokio::test]
async fn failed_summary_post_skips_webhook_and_confirmation() {
    let harness = Harness::build(
        RecordingSlackApi { fail_summary_posts: true, ..RecordingSlackApi::default() },
        Some(RecordingWebhook::default()),
        WebhookMode::Await,
        legal_channel(),
    );

    harness.deliver(submission(None)).await;

    assert_eq!(harness.api.posts().len(), 1);
    assert!(harness.webhook_payloads().is_empty());
}

#[tokio::test]
async fn failed_webhook_on_submission_still_confirms() {
    let harness = Harness::build(
        RecordingSlackApi::default(),
        Some(RecordingWebhook { fail: true, ..RecordingWebhook::default() }),
        WebhookMode::Await,
        legal_channel(),
    );

    harness.deliver(submission(None)).await;

    let posts = harness.api.posts();
    assert_eq!(posts.len(), 2);
    assert!(!posts[1].template.fallback_text.contains("Folder"));
}

#[tokio::test]
async fn user_lookup_failure_falls_back_to_payload_username() {
    let harness = Harness::build(
        RecordingSlackApi { fail_user_info: true, ..RecordingSlackApi::default() },
        Some(RecordingWebhook::default()),
        WebhookMode::Await,
        legal_channel(),
    );

    harness.deliver(submission(None)).await;

    assert_eq!(
        harness.api.posts()[0].template.fallback_text,
        "🧾 New Legal Request Submitted by alice.payload"
    );
}

#[tokio::test]
async fn duplicate_submissions_are_processed_independently() {
    let harness = Harness::standard();

    harness.deliver(submission(None)).await;
    harness.deliver(submission(None)).await;

    let summaries =
        harness.api.posts().into_iter().filter(|post| post.thread_ts.is_none()).count();
    assert_eq!(summaries, 2);
    assert_eq!(harness.webhook_payloads().len(), 2);
}

#[tokio::test]
async fn threaded_file_is_relayed_and_confirmed() {
    let harness = Harness::standard();

    let result = harness.deliver(file_share(Some(THREAD_TS))).await;

    assert_eq!(result, HandlerResult::Processed);
    assert_eq!(
        harness.webhook_payloads(),
        vec![WebhookPayload::FileUpload {
            channel: "C-LEGAL".to_owned(),
            thread_ts: THREAD_TS.to_owned(),
            file_name: "contract.pdf".to_owned(),
            file_url: "https://files.slack.com/files-pri/T1-F-CONTRACT/download/contract.pdf"
                .to_owned(),
        }]
    );
    let posts = harness.api.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].thread_ts.as_deref(), Some(THREAD_TS));
    assert_eq!(
        posts[0].template.fallback_text,
        "📎 File *contract.pdf* uploaded and saved successfully."
    );
}

#[tokio::test]
async fn top_level_file_share_is_ignored() {
    let harness = Harness::standard();

    let result = harness.deliver(file_share(None)).await;

    assert_eq!(result, HandlerResult::Ignored);
    assert!(harness.api.calls().is_empty());
    assert!(harness.webhook_payloads().is_empty());
}

#[tokio::test]
async fn file_lookup_failure_stops_relay() {
    let harness = Harness::build(
        RecordingSlackApi { fail_file_info: true, ..RecordingSlackApi::default() },
        Some(RecordingWebhook::default()),
        WebhookMode::Await,
        legal_channel(),
    );

    harness.deliver(file_share(Some(THREAD_TS))).await;

    assert!(harness.webhook_payloads().is_empty());
    assert!(harness.api.posts().is_empty());
}

#[tokio::test]
async fn failed_webhook_on_attachment_skips_confirmation() {
    let harness = Harness::build(
        RecordingSlackApi::default(),
        Some(RecordingWebhook { fail: true, ..RecordingWebhook::default() }),
        WebhookMode::Await,
        legal_channel(),
    );

    harness.deliver(file_share(Some(THREAD_TS))).await;

    assert_eq!(harness.webhook_payloads().len(), 1);
    assert!(harness.api.posts().is_empty());
}

#[tokio::test]
async fn unset_webhook_still_confirms_attachment() {
    let harness =
        Harness::build(RecordingSlackApi::default(), None, WebhookMode::Await, legal_channel());

    harness.deliver(file_share(Some(THREAD_TS))).await;

    assert_eq!(harness.api.posts().len(), 1);
    assert_eq!(harness.forwarder.skipped_count(), 1);
}

#[tokio::test]
async fn detached_webhook_failures_are_logged_by_scheduler() {
    let harness = Harness::build(
        RecordingSlackApi::default(),
        Some(RecordingWebhook { fail: true, ..RecordingWebhook::default() }),
        WebhookMode::Detached,
        legal_channel(),
    );

    harness.deliver(submission(None)).await;
    harness.background.wait_idle().await;

    assert_eq!(harness.webhook_payloads().len(), 1);
    assert_eq!(harness.background.failure_count(), 1);
    assert_eq!(harness.api.posts().len(), 2);
}
