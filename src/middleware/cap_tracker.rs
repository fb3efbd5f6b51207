use tracing::debug;

use super::{Downstream, Middleware, Upstream};
use crate::caps::{parse_cap_list, Capabilities, Capability, NegotiationVersion};
use crate::message::Message;

/// Records capability negotiation in the connection stores.
///
/// Downstream `CAP LS`, `ACK`, `NEW` and `DEL` replies update the
/// network's [`Capabilities`]; an upstream `CAP LS <version>` records the
/// client's negotiation version, and a 3.2 client has `cap-notify`
/// enabled implicitly. Envelopes always pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapTracker;

/// A parsed `CAP <target> <sub> [*] :<list>` reply.
struct CapReply<'a> {
    sub: String,
    continued: bool,
    list: &'a str,
}

fn cap_reply(message: &Message) -> Option<CapReply<'_>> {
    if !message.command.eq_ignore_ascii_case("CAP") || message.params.len() < 3 {
        return None;
    }
    Some(CapReply {
        sub: message.params[1].to_ascii_uppercase(),
        continued: message.params.len() > 3 && message.params[2] == "*",
        list: message.params.last().map(String::as_str).unwrap_or_default(),
    })
}

fn track_reply(caps: &Capabilities, reply: &CapReply<'_>) {
    let list = reply.list;
    match reply.sub.as_str() {
        "LS" => {
            // Only 3.2 servers attach values or split the list.
            if reply.continued || list.contains('=') {
                caps.set_version(NegotiationVersion::V302);
            }
            caps.support(parse_cap_list(list));
        }
        "NEW" => caps.support(parse_cap_list(list)),
        "DEL" => caps.del(list.split_whitespace()),
        "ACK" => {
            let mut enable = Vec::new();
            let mut disable = Vec::new();
            for name in list.split_whitespace() {
                match name.strip_prefix('-') {
                    Some(name) => disable.push(name),
                    None => enable.push((name.to_string(), caps.supported_value(name))),
                }
            }
            caps.disable(disable);
            caps.enable(enable);
        }
        _ => return,
    }
    debug!(sub = %reply.sub, list, "tracked capability reply");
}

impl Middleware for CapTracker {
    fn name(&self) -> &'static str {
        "cap-tracker"
    }

    fn process_upstream(&self, envelope: Upstream) -> Vec<Upstream> {
        let message = &envelope.message;
        if message.command.eq_ignore_ascii_case("CAP")
            && message
                .param(0)
                .is_some_and(|sub| sub.eq_ignore_ascii_case("LS"))
        {
            let version = message
                .param(1)
                .and_then(|v| v.parse().ok())
                .map(NegotiationVersion::from_number)
                .unwrap_or_default();
            let caps = envelope.client.capabilities();
            caps.set_version(version);
            if version == NegotiationVersion::V302 {
                caps.enable([(Capability::CapNotify, "")]);
            }
        }
        vec![envelope]
    }

    fn process_downstream(&self, envelope: Downstream) -> Vec<Downstream> {
        if let Some(reply) = cap_reply(&envelope.message) {
            track_reply(envelope.network.capabilities(), &reply);
        }
        vec![envelope]
    }
}
