//! Message models returned by the mailbox service.

use serde::{Deserialize, Serialize};

use crate::expiry::format_file_size;

/// Entry of a mailbox listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Service-assigned message id.
    pub id: u64,
    /// Sender.
    #[serde(default)]
    pub from: String,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Receive date as sent by the service (`YYYY-MM-DD HH:MM:SS`).
    #[serde(default)]
    pub date: String,
}

/// Attachment metadata of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    /// File name, used as the `file` parameter of a download.
    pub filename: String,
    /// MIME type.
    #[serde(default)]
    pub content_type: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

impl AttachmentInfo {
    /// Size rendered for display, e.g. `1.5 KB`.
    #[must_use]
    pub fn display_size(&self) -> String {
        format_file_size(self.size)
    }
}

/// A full message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetail {
    /// Service-assigned message id.
    pub id: u64,
    /// Sender.
    #[serde(default)]
    pub from: String,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Receive date.
    #[serde(default)]
    pub date: String,
    /// Attachments, if any.
    #[serde(default)]
    pub attachments: Vec<AttachmentInfo>,
    /// Body as the service chose to render it.
    #[serde(default)]
    pub body: String,
    /// Plain-text body.
    #[serde(default)]
    pub text_body: String,
    /// HTML body.
    #[serde(default)]
    pub html_body: String,
}

impl MessageDetail {
    /// Best plain-text rendition available.
    #[must_use]
    pub fn text(&self) -> &str {
        [&self.text_body, &self.body, &self.html_body]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .map_or("", String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_listing() {
        let json = r#"[
            {"id": 639, "from": "someone@example.com", "subject": "Some subject", "date": "2018-06-08 14:33:55"},
            {"id": 640, "from": "other@example.com", "subject": "Other", "date": "2018-06-08 14:40:55"}
        ]"#;
        let headers: Vec<MessageHeader> = serde_json::from_str(json).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].id, 639);
        assert_eq!(headers[1].subject, "Other");
    }

    #[test]
    fn test_parse_message_detail() {
        let json = r#"{
            "id": 639,
            "from": "someone@example.com",
            "subject": "Some subject",
            "date": "2018-06-08 14:33:55",
            "attachments": [
                {"filename": "iometer.pdf", "contentType": "application/pdf", "size": 47412}
            ],
            "body": "Some message body\n\n",
            "textBody": "Some message body\n\n",
            "htmlBody": ""
        }"#;
        let detail: MessageDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.attachments[0].filename, "iometer.pdf");
        assert_eq!(detail.attachments[0].content_type, "application/pdf");
        assert_eq!(detail.attachments[0].display_size(), "46.3 KB");
        assert_eq!(detail.text(), "Some message body\n\n");
    }

    #[test]
    fn test_text_falls_back_to_html() {
        let json = r#"{"id": 1, "htmlBody": "<p>hi</p>"}"#;
        let detail: MessageDetail = serde_json::from_str(json).unwrap();
        assert!(detail.attachments.is_empty());
        assert_eq!(detail.text(), "<p>hi</p>");
    }
}
