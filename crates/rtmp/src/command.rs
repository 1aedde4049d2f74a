use std::collections::HashMap;

use rml_rtmp::messages::{MessagePayload, RtmpMessage};
use rml_rtmp::rml_amf0::Amf0Value;
use rml_rtmp::time::RtmpTimestamp;

use crate::error::RtmpError;

/// An AMF0 command message: name, transaction id, command object, arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpCommand {
    pub name: String,
    pub transaction_id: f64,
    /// `Null` or an `Object`.
    pub command_object: Amf0Value,
    pub args: Vec<Amf0Value>,
}

impl RtmpCommand {
    pub fn new(name: impl Into<String>, transaction_id: f64) -> Self {
        Self {
            name: name.into(),
            transaction_id,
            command_object: Amf0Value::Null,
            args: Vec::new(),
        }
    }

    pub fn connect(tx_id: f64, app: &str, tc_url: &str, flash_ver: &str) -> Self {
        Self::new("connect", tx_id)
            .object("app", string(app))
            .object("type", string("nonprivate"))
            .object("flashVer", string(flash_ver))
            .object("tcUrl", string(tc_url))
    }

    pub fn release_stream(tx_id: f64, stream_name: &str) -> Self {
        Self::new("releaseStream", tx_id).arg(string(stream_name))
    }

    pub fn fc_publish(tx_id: f64, stream_name: &str) -> Self {
        Self::new("FCPublish", tx_id).arg(string(stream_name))
    }

    pub fn create_stream(tx_id: f64) -> Self {
        Self::new("createStream", tx_id)
    }

    pub fn publish(tx_id: f64, stream_name: &str) -> Self {
        Self::new("publish", tx_id)
            .arg(string(stream_name))
            .arg(string("live"))
    }

    pub fn fc_unpublish(tx_id: f64, stream_name: &str) -> Self {
        Self::new("FCUnpublish", tx_id).arg(string(stream_name))
    }

    pub fn delete_stream(tx_id: f64, stream_id: u32) -> Self {
        Self::new("deleteStream", tx_id).arg(Amf0Value::Number(stream_id as f64))
    }

    pub fn object(mut self, key: &str, value: Amf0Value) -> Self {
        match &mut self.command_object {
            Amf0Value::Object(properties) => {
                properties.insert(key.to_string(), value);
            }
            other => *other = Amf0Value::Object(HashMap::from([(key.to_string(), value)])),
        }
        self
    }

    pub fn arg(mut self, value: Amf0Value) -> Self {
        self.args.push(value);
        self
    }

    /// Serializes the command as a message on `stream_id`.
    pub fn to_payload(&self, stream_id: u32) -> Result<MessagePayload, RtmpError> {
        let payload = RtmpMessage::from(self.clone())
            .into_message_payload(RtmpTimestamp::new(0), stream_id)?;
        Ok(payload)
    }

    /// Extracts the command from a decoded message, if it is one.
    pub fn from_message(message: RtmpMessage) -> Option<Self> {
        match message {
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => Some(Self {
                name: command_name,
                transaction_id,
                command_object,
                args: additional_arguments,
            }),
            _ => None,
        }
    }

    pub fn is_result(&self) -> bool {
        self.name == "_result"
    }

    pub fn is_error(&self) -> bool {
        self.name == "_error"
    }

    /// The `code` of the first info object argument, as carried by `_result`,
    /// `_error` and `onStatus`.
    pub fn status_code(&self) -> Option<&str> {
        self.info_field("code")
    }

    /// The `level` of the info object: `status`, `warning` or `error`.
    pub fn status_level(&self) -> Option<&str> {
        self.info_field("level")
    }

    /// First numeric argument; `createStream` replies carry the stream id here.
    pub fn first_number(&self) -> Option<f64> {
        self.args.iter().find_map(|arg| match arg {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        })
    }

    fn info_field(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            Amf0Value::Object(properties) => match properties.get(key) {
                Some(Amf0Value::Utf8String(value)) => Some(value.as_str()),
                _ => None,
            },
            _ => None,
        })
    }
}

impl From<RtmpCommand> for RtmpMessage {
    fn from(command: RtmpCommand) -> Self {
        RtmpMessage::Amf0Command {
            command_name: command.name,
            transaction_id: command.transaction_id,
            command_object: command.command_object,
            additional_arguments: command.args,
        }
    }
}

pub fn string(value: &str) -> Amf0Value {
    Amf0Value::Utf8String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(command: &RtmpCommand) -> RtmpCommand {
        let payload = command.to_payload(1).unwrap();
        assert_eq!(payload.type_id, 20);
        assert_eq!(payload.message_stream_id, 1);
        RtmpCommand::from_message(payload.to_rtmp_message().unwrap()).unwrap()
    }

    #[test]
    fn connect_carries_app_and_tc_url() {
        let cmd = RtmpCommand::connect(1.0, "live", "rtmp://host/live", "FMLE/3.0");
        let payload = cmd.to_payload(0).unwrap();
        // AMF0 string "connect", then number 1.0.
        assert_eq!(
            &payload.data[..10],
            &[0x02, 0x00, 0x07, b'c', b'o', b'n', b'n', b'e', b'c', b't']
        );
        assert_eq!(payload.data[10], 0x00);
        assert_eq!(&payload.data[11..19], &1.0f64.to_be_bytes());

        let decoded = round_trip(&cmd);
        assert_eq!(decoded, cmd);
        let Amf0Value::Object(properties) = &decoded.command_object else {
            panic!("connect needs a command object");
        };
        assert_eq!(properties.get("tcUrl"), Some(&string("rtmp://host/live")));
        assert_eq!(properties.get("app"), Some(&string("live")));
    }

    #[test]
    fn publish_has_null_object_and_two_args() {
        let decoded = round_trip(&RtmpCommand::publish(5.0, "key"));
        assert_eq!(decoded.name, "publish");
        assert_eq!(decoded.transaction_id, 5.0);
        assert_eq!(decoded.command_object, Amf0Value::Null);
        assert_eq!(decoded.args, vec![string("key"), string("live")]);
    }

    #[test]
    fn reads_status_fields_from_server_reply() {
        let info = HashMap::from([
            ("level".to_string(), string("status")),
            ("code".to_string(), string("NetStream.Publish.Start")),
        ]);
        let reply = round_trip(&RtmpCommand::new("onStatus", 0.0).arg(Amf0Value::Object(info)));
        assert_eq!(reply.status_code(), Some("NetStream.Publish.Start"));
        assert_eq!(reply.status_level(), Some("status"));
        assert!(!reply.is_result());

        let result = round_trip(&RtmpCommand::new("_result", 4.0).arg(Amf0Value::Number(1.0)));
        assert!(result.is_result());
        assert_eq!(result.first_number(), Some(1.0));
        assert_eq!(result.status_code(), None);
    }

    #[test]
    fn non_command_messages_are_not_commands() {
        assert_eq!(
            RtmpCommand::from_message(RtmpMessage::SetChunkSize { size: 4096 }),
            None
        );
    }
}
