use super::decoder::encode_body;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OutgoingError {
    #[error("Recipient is empty")]
    EmptyRecipient,
    #[error("Header {0} must not contain line breaks")]
    LineBreakInHeader(&'static str),
}

/// A plain-text email about to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    to: String,
    subject: String,
    body: String,
}

impl OutgoingMessage {
    /// Validates the header values. Line breaks are rejected so a recipient
    /// or subject cannot smuggle extra headers into the message.
    pub fn new(to: &str, subject: &str, body: &str) -> Result<Self, OutgoingError> {
        let to = to.trim();
        if to.is_empty() {
            return Err(OutgoingError::EmptyRecipient);
        }
        if to.contains(['\r', '\n']) {
            return Err(OutgoingError::LineBreakInHeader("To"));
        }
        if subject.contains(['\r', '\n']) {
            return Err(OutgoingError::LineBreakInHeader("Subject"));
        }
        Ok(Self {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        })
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    /// Renders the RFC 5322 message: a single `text/plain` UTF-8 part.
    pub fn to_mime(&self) -> String {
        let body = self.body.replace("\r\n", "\n").replace('\n', "\r\n");
        format!(
            "Content-Type: text/plain; charset=\"utf-8\"\r\n\
             MIME-Version: 1.0\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             To: {}\r\n\
             Subject: {}\r\n\
             \r\n\
             {}",
            self.to,
            encode_header(&self.subject),
            body
        )
    }

    /// The base64url form the mail service expects.
    pub fn encode(&self) -> String {
        encode_body(self.to_mime().as_bytes())
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;

    #[test]
    fn mime_contains_headers_and_body() {
        let message = OutgoingMessage::new("x@y.com", "S", "B").unwrap();
        let mime = message.to_mime();
        assert!(mime.contains("\r\nTo: x@y.com\r\n"));
        assert!(mime.contains("\r\nSubject: S\r\n"));
        assert!(mime.starts_with("Content-Type: text/plain; charset=\"utf-8\"\r\n"));
        assert!(mime.ends_with("\r\n\r\nB"));
    }

    #[test]
    fn encoded_form_round_trips_through_base64url() {
        let message = OutgoingMessage::new("x@y.com", "S", "line one\nline two").unwrap();
        let raw = URL_SAFE.decode(message.encode()).unwrap();
        let mime = String::from_utf8(raw).unwrap();
        assert_eq!(mime, message.to_mime());
        assert!(mime.ends_with("line one\r\nline two"));
    }

    #[test]
    fn non_ascii_subject_is_encoded_word() {
        let message = OutgoingMessage::new("x@y.com", "Café", "B").unwrap();
        assert!(message.to_mime().contains("Subject: =?utf-8?B?Q2Fmw6k=?="));
    }

    #[test]
    fn header_injection_is_rejected() {
        assert_eq!(
            OutgoingMessage::new("x@y.com\r\nBcc: evil@z.com", "S", "B"),
            Err(OutgoingError::LineBreakInHeader("To"))
        );
        assert_eq!(
            OutgoingMessage::new("x@y.com", "S\nBcc: evil@z.com", "B"),
            Err(OutgoingError::LineBreakInHeader("Subject"))
        );
        assert_eq!(
            OutgoingMessage::new("  ", "S", "B"),
            Err(OutgoingError::EmptyRecipient)
        );
    }
}
