//! Notification entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Notification as produced by an upstream service and published to the log.
///
/// This is untrusted input: use [`NotificationRecord::decode`] to build one from
/// a raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Identity of the producing service.
    pub service: String,
    /// Notification payload.
    pub message: String,
    /// When the producer sent the notification, always UTC after decoding.
    pub sent_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn new(
        service: impl Into<String>,
        message: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            service: service.into(),
            message: message.into(),
            sent_at,
        }
    }

    /// Decode and validate a JSON payload.
    ///
    /// All three fields are required, unknown fields are ignored and `sentAt`
    /// may carry any offset; it is converted to UTC.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Err(Error::validation("record has no payload"));
        }

        let record: NotificationRecord = serde_json::from_slice(payload)?;
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            return Err(Error::validation("service must not be empty"));
        }
        Ok(())
    }
}

/// Persisted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub service: String,
    pub message: String,
    pub is_read: bool,
    pub sent_at: DateTime<Utc>,
    /// Set if and only if `is_read` is true.
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// A fresh, unread notification for `record`.
    pub fn unread(id: impl Into<String>, record: &NotificationRecord) -> Self {
        Self {
            id: id.into(),
            service: record.service.clone(),
            message: record.message.clone(),
            is_read: false,
            sent_at: record.sent_at,
            read_at: None,
        }
    }

    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        self.is_read = true;
        self.read_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_normalizes_offset_to_utc() {
        let payload =
            br#"{"service":"billing","message":"invoice ready","sentAt":"2026-02-04T12:00:00-03:00"}"#;
        let record = NotificationRecord::decode(payload).unwrap();

        assert_eq!(record.service, "billing");
        assert_eq!(
            record.sent_at,
            Utc.with_ymd_and_hms(2026, 2, 4, 15, 0, 0).unwrap()
        );
        assert_eq!(record.sent_at.to_rfc3339(), "2026-02-04T15:00:00+00:00");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let payload = br#"{"service":"a","message":"b","sentAt":"2026-01-01T00:00:00Z","priority":3}"#;
        assert!(NotificationRecord::decode(payload).is_ok());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let payload = br#"{"service":"a","message":"b"}"#;
        let err = NotificationRecord::decode(payload).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(NotificationRecord::decode(b"{not json").is_err());
        assert!(matches!(
            NotificationRecord::decode(b"").unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[test]
    fn test_decode_rejects_blank_service() {
        let payload = br#"{"service":"  ","message":"b","sentAt":"2026-01-01T00:00:00Z"}"#;
        assert!(matches!(
            NotificationRecord::decode(payload).unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[test]
    fn test_notification_json_uses_camel_case() {
        let record = NotificationRecord::new(
            "svc",
            "hello",
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        );
        let mut notification = Notification::unread("id-1", &record);
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["isRead"], false);
        assert!(json["readAt"].is_null());

        notification.mark_read(Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap());
        assert!(notification.is_read);
        assert!(notification.read_at.is_some());
    }
}
