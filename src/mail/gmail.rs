// The `gmail` module implements `MailService` on top of the Gmail REST API.

use super::decoder::encode_body;
use super::{MailService, MailServiceError, MessageBody, MessagePart, Query};
use crate::utils::context_hub::ContextHub;
use crate::utils::google_auth::{AuthError, GmailHubType};
use async_trait::async_trait;
use base64::Engine;
use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use google_gmail1::api::{self, Scope};
use std::io::Cursor;
use tracing::{debug, info};

const USER_ID: &str = "me";

const RAW_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Gmail-backed mail service.
#[derive(Clone)]
pub struct GmailMailService {
    hub: GmailHubType,
}

impl GmailMailService {
    pub fn new(hub: GmailHubType) -> Self {
        Self { hub }
    }

    /// Registers the read and send scopes with `ctx` and authorizes.
    pub async fn connect(ctx: &ContextHub) -> Result<Self, AuthError> {
        ctx.add_scope(Scope::Readonly);
        ctx.add_scope(Scope::Send);
        Ok(Self::new(ctx.get_hub().await?))
    }
}

#[async_trait]
impl MailService for GmailMailService {
    async fn list_messages(
        &self,
        query: &Query,
        max_results: u32,
    ) -> Result<Vec<String>, MailServiceError> {
        let q = query.to_string();
        debug!(query = %q, max_results, "Listing messages");
        let (_response, list) = self
            .hub
            .users()
            .messages_list(USER_ID)
            .q(&q)
            .max_results(max_results)
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .map_err(classify)?;

        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| message.id)
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<MessagePart, MailServiceError> {
        debug!(message_id = %id, "Fetching message");
        let (_response, message) = self
            .hub
            .users()
            .messages_get(USER_ID, id)
            .format("full")
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .map_err(classify)?;

        Ok(message.payload.map(convert_part).unwrap_or_default())
    }

    async fn send_message(&self, raw: &str) -> Result<(), MailServiceError> {
        let bytes = RAW_ENGINE
            .decode(raw)
            .map_err(|e| MailServiceError::Permanent(format!("Invalid raw message: {e}")))?;
        let mime_type = "message/rfc822"
            .parse()
            .map_err(|_| MailServiceError::Permanent("Invalid upload MIME type".to_string()))?;

        let (_response, sent) = self
            .hub
            .users()
            .messages_send(api::Message::default(), USER_ID)
            .add_scope(Scope::Send)
            .upload(Cursor::new(bytes), mime_type)
            .await
            .map_err(classify)?;

        info!(message_id = ?sent.id, "Message sent");
        Ok(())
    }
}

/// Gmail hands bodies over already decoded; re-encode them so the decoder
/// sees the same base64url form the REST API uses on the wire.
fn convert_part(part: api::MessagePart) -> MessagePart {
    MessagePart {
        mime_type: part.mime_type.unwrap_or_default(),
        body: part.body.map(|body| MessageBody {
            data: body.data.map(|bytes| encode_body(&bytes)),
        }),
        parts: part
            .parts
            .map(|parts| parts.into_iter().map(convert_part).collect()),
    }
}

fn is_transient_status(code: u16) -> bool {
    code == 429 || (500..600).contains(&code)
}

fn classify(error: google_gmail1::Error) -> MailServiceError {
    use google_gmail1::Error;

    match error {
        Error::HttpError(e) => MailServiceError::Transient(e.to_string()),
        Error::Io(e) => MailServiceError::Transient(e.to_string()),
        Error::Failure(response) => {
            let status = response.status();
            if is_transient_status(status.as_u16()) {
                MailServiceError::Transient(format!("HTTP {status}"))
            } else {
                MailServiceError::Permanent(format!("HTTP {status}"))
            }
        }
        Error::BadRequest(body) => {
            let code = body["error"]["code"].as_u64().unwrap_or(400);
            if u16::try_from(code).is_ok_and(is_transient_status) {
                MailServiceError::Transient(body.to_string())
            } else {
                MailServiceError::Permanent(body.to_string())
            }
        }
        Error::MissingToken(e) => MailServiceError::Auth(AuthError::Token(e.to_string())),
        other => MailServiceError::Permanent(other.to_string()),
    }
}
