//! Integration tests for message parsing and composition
//!
//! These tests verify that messages can be parsed from strings and then
//! composed back to equivalent strings, ensuring round-trip compatibility.

use bounce::{Message, MessageParseError};

fn round_trip(original: &str) -> (Message, Message) {
    let message: Message = original
        .parse()
        .unwrap_or_else(|e| panic!("Failed to parse '{}': {}", original, e));
    let serialized = message.to_line();
    let reparsed: Message = serialized
        .parse()
        .unwrap_or_else(|e| panic!("Failed to reparse '{}': {}", serialized, e));
    (message, reparsed)
}

#[test]
fn test_message_round_trip_simple() {
    let (message, reparsed) = round_trip("PING :irc.example.com");
    assert_eq!(message, reparsed);
    assert_eq!(reparsed.params, vec!["irc.example.com"]);
}

#[test]
fn test_message_round_trip_with_prefix() {
    let (message, reparsed) = round_trip(":nick!user@host PRIVMSG #channel :Hello, world!");
    assert_eq!(message, reparsed);
    assert_eq!(reparsed.prefix, "nick!user@host");
    assert_eq!(reparsed.source_nickname(), Some("nick"));
}

#[test]
fn test_message_round_trip_with_tags() {
    let (message, reparsed) = round_trip(
        "@time=2023-01-01T00:00:00.000Z;msgid=abc123 :nick!user@host PRIVMSG #channel :Tagged message",
    );
    assert_eq!(message, reparsed);
    assert_eq!(reparsed.tag_value("msgid"), Some("abc123"));
    assert!(reparsed.server_time().is_some());
}

#[test]
fn test_message_round_trip_numeric_response() {
    let (message, reparsed) = round_trip(":server 001 nickname :Welcome to the IRC Network");
    assert_eq!(message, reparsed);
    assert_eq!(reparsed.command, "001");
    assert_eq!(reparsed.params, vec!["nickname", "Welcome to the IRC Network"]);
}

#[test]
fn test_message_round_trip_complex_tags() {
    let (message, reparsed) = round_trip(
        "@batch=abc123;msgid=def456;time=2023-01-01T12:00:00Z;+custom=value :nick BATCH +abc123 chathistory #channel",
    );
    assert_eq!(message, reparsed);
    assert_eq!(reparsed.tag_value("+custom"), Some("value"));
}

#[test]
fn test_message_construction_and_parsing() {
    let message = Message::new("PRIVMSG", ["#test", "Integration test message"])
        .with_tag("time", "2023-01-01T00:00:00Z")
        .with_tag("msgid", "test123")
        .with_prefix("testbot!test@example.com");

    let parsed: Message = message
        .to_line()
        .parse()
        .expect("Failed to parse constructed message");

    assert_eq!(message, parsed);
}

#[test]
fn test_empty_trailing_parameter() {
    let (message, reparsed) = round_trip("PRIVMSG #channel :");
    assert_eq!(message, reparsed);
    assert_eq!(reparsed.params, vec!["#channel", ""]);
    assert_eq!(message.to_line(), "PRIVMSG #channel :\r\n");
}

#[test]
fn test_trailing_space_preserved() {
    let (message, reparsed) = round_trip("PRIVMSG #channel :a b c ");
    assert_eq!(message, reparsed);
    assert_eq!(reparsed.params, vec!["#channel", "a b c "]);
}

#[test]
fn test_special_characters_in_message() {
    let (message, reparsed) =
        round_trip(":nick!user@host PRIVMSG #channel :Message with ünícødé and émøjí 🎉");
    assert_eq!(message, reparsed);
}

#[test]
fn test_mode_command_round_trip() {
    let (message, reparsed) = round_trip(":server MODE #channel +o nick");
    assert_eq!(message, reparsed);
    assert_eq!(reparsed.params, vec!["#channel", "+o", "nick"]);
}

#[test]
fn test_join_command_variations() {
    for original in [
        "JOIN #channel",
        "JOIN #channel key",
        ":nick!user@host JOIN #channel",
        "JOIN #channel1,#channel2 key1,key2",
    ] {
        let (message, reparsed) = round_trip(original);
        assert_eq!(message, reparsed, "Round-trip failed for '{}'", original);
    }
}

#[test]
fn test_batch_messages() {
    for original in [
        "BATCH +abc123 chathistory #channel",
        "BATCH -abc123",
        "@batch=abc123 :server PRIVMSG #channel :Batched message",
    ] {
        let (message, reparsed) = round_trip(original);
        assert_eq!(message, reparsed, "Round-trip failed for '{}'", original);
    }
}

#[test]
fn test_cap_negotiation_lines() {
    for original in [
        "CAP LS 302",
        ":irc.example.org CAP * LS * :multi-prefix sasl=PLAIN,EXTERNAL",
        ":irc.example.org CAP nick ACK :server-time -batch",
        "CAP REQ :server-time batch",
        "CAP END",
    ] {
        let (message, reparsed) = round_trip(original);
        assert_eq!(message, reparsed, "Round-trip failed for '{}'", original);
    }
}

#[test]
fn test_registration_lines_compose_as_sent() {
    let user = Message::new("USER", ["bounce", "-", "-", "Bounce User"]);
    assert_eq!(user.to_line(), "USER bounce - - :Bounce User\r\n");

    let nick = Message::new("NICK", ["bouncer"]);
    assert_eq!(nick.to_line(), "NICK bouncer\r\n");
}

#[test]
fn test_param_starting_with_colon() {
    let message = Message::new("PRIVMSG", ["#channel", ":)"]);
    assert_eq!(message.to_line(), "PRIVMSG #channel ::)\r\n");

    let reparsed: Message = message.to_line().parse().unwrap();
    assert_eq!(reparsed.params, vec!["#channel", ":)"]);
}

#[test]
fn test_unparseable_lines() {
    assert_eq!("".parse::<Message>(), Err(MessageParseError::EmptyMessage));
    assert_eq!("   \r\n".parse::<Message>(), Err(MessageParseError::EmptyMessage));
    assert_eq!(
        "@a=b :prefix".parse::<Message>(),
        Err(MessageParseError::MissingCommand)
    );
    assert_eq!(
        "@a=b".parse::<Message>(),
        Err(MessageParseError::MissingCommand)
    );
}
