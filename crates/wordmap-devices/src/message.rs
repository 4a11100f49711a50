//! Inbound bus messages.

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceResult};

/// Body name of a status request.
pub const SENSOR_REQUEST: &str = "sensor.request";

/// `command` value that asks for a full-state publish.
pub const REQUEST_COMMAND: &str = "request";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(default)]
    pub body_name: String,
    #[serde(default)]
    pub body: MessageBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub command_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// What an inbound message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Full-state publish; `None` means every device.
    Status { device: Option<String> },
    Command {
        device: String,
        command: String,
        current: Option<String>,
    },
}

impl InboundMessage {
    pub fn from_json(json: &str) -> DeviceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn command(
        device: impl Into<String>,
        command: impl Into<String>,
        current: Option<&str>,
    ) -> Self {
        Self {
            body_name: "control.basic".to_string(),
            body: MessageBody {
                device: Some(device.into()),
                command_type: Some(command.into()),
                current: current.map(|c| serde_json::Value::String(c.to_string())),
                ..Default::default()
            },
        }
    }

    pub fn status_request(device: Option<&str>) -> Self {
        Self {
            body_name: SENSOR_REQUEST.to_string(),
            body: MessageBody {
                device: device.map(str::to_string),
                command: Some(REQUEST_COMMAND.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn is_status_request(&self) -> bool {
        self.body_name == SENSOR_REQUEST && self.body.command.as_deref() == Some(REQUEST_COMMAND)
    }

    /// Route the message as a status request or a device command.
    pub fn request(&self) -> DeviceResult<Request> {
        if self.is_status_request() {
            return Ok(Request::Status {
                device: self.body.device.clone(),
            });
        }
        let device = self
            .body
            .device
            .clone()
            .ok_or_else(|| DeviceError::InvalidMessage("missing device".to_string()))?;
        let command = self
            .body
            .command_type
            .clone()
            .or_else(|| self.body.command.clone())
            .ok_or_else(|| {
                DeviceError::InvalidMessage(format!("missing command for device '{}'", device))
            })?;
        Ok(Request::Command {
            device,
            command,
            current: self.body.current.as_ref().map(field_text),
        })
    }

    /// `value` field as text, falling back to `current`.
    pub fn value_text(&self) -> Option<String> {
        self.body
            .value
            .as_ref()
            .or(self.body.current.as_ref())
            .map(field_text)
    }
}

/// Bus fields are usually strings; numbers and booleans are accepted too.
fn field_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_request() {
        let message = InboundMessage::from_json(
            r#"{"bodyName": "sensor.request", "body": {"command": "request", "device": "boiler"}}"#,
        )
        .unwrap();
        assert_eq!(
            message.request().unwrap(),
            Request::Status {
                device: Some("boiler".to_string())
            }
        );
        assert!(InboundMessage::status_request(None).is_status_request());
    }

    #[test]
    fn test_command_uses_type_field() {
        let message = InboundMessage::from_json(
            r#"{"bodyName": "control.basic", "body": {"device": "valve", "type": "set", "current": 50}}"#,
        )
        .unwrap();
        assert_eq!(
            message.request().unwrap(),
            Request::Command {
                device: "valve".to_string(),
                command: "set".to_string(),
                current: Some("50".to_string()),
            }
        );
    }

    #[test]
    fn test_command_field_fallback() {
        let message = InboundMessage::from_json(
            r#"{"bodyName": "control.basic", "body": {"device": "pump", "command": "on"}}"#,
        )
        .unwrap();
        assert!(matches!(
            message.request().unwrap(),
            Request::Command { ref command, current: None, .. } if command == "on"
        ));
    }

    #[test]
    fn test_missing_device_is_invalid() {
        let message = InboundMessage::from_json(r#"{"bodyName": "control.basic", "body": {}}"#).unwrap();
        let err = message.request().unwrap_err();
        assert!(err.is_ignorable());
    }

    #[test]
    fn test_value_text() {
        let message = InboundMessage::from_json(
            r#"{"body": {"device": "W3", "value": true}}"#,
        )
        .unwrap();
        assert_eq!(message.value_text().as_deref(), Some("true"));
    }
}
