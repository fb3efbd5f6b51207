//! Benchmarks for IRC message parsing, composition and line decoding.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio_util::codec::Decoder;

use bounce::{IrcCodec, Message};

/// Simple PING message
const SIMPLE_MESSAGE: &str = "PING :irc.example.com";

/// Message with prefix
const PREFIX_MESSAGE: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

/// Message with IRCv3 tags
const TAGGED_MESSAGE: &str = "@time=2023-01-01T00:00:00.000Z;msgid=abc123;+example/tag=value :nick!user@host PRIVMSG #channel :Hello with tags!";

/// Tags that need unescaping
const ESCAPED_TAGS: &str = "@label=half\\sfive;note=a\\:b\\\\c;+draft/reply=parent-id :nick!user@host.example.com PRIVMSG #long-channel-name :This is a longer message with more content to parse";

/// Numeric response
const NUMERIC_RESPONSE: &str = ":irc.server.net 001 nickname :Welcome to the IRC Network nickname!user@host";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Parsing");

    for (name, line) in [
        ("simple_ping", SIMPLE_MESSAGE),
        ("with_prefix", PREFIX_MESSAGE),
        ("with_tags", TAGGED_MESSAGE),
        ("escaped_tags", ESCAPED_TAGS),
        ("numeric_response", NUMERIC_RESPONSE),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let msg: Message = black_box(line).parse().unwrap();
                black_box(msg)
            })
        });
    }

    group.finish();
}

fn benchmark_composition(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Composition");

    let simple: Message = SIMPLE_MESSAGE.parse().unwrap();
    let with_tags: Message = TAGGED_MESSAGE.parse().unwrap();
    let escaped: Message = ESCAPED_TAGS.parse().unwrap();

    group.bench_function("simple_ping", |b| {
        b.iter(|| black_box(black_box(&simple).to_line()))
    });

    group.bench_function("with_tags", |b| {
        b.iter(|| black_box(black_box(&with_tags).to_line()))
    });

    group.bench_function("escaped_tags", |b| {
        b.iter(|| black_box(black_box(&escaped).to_line()))
    });

    group.bench_function("constructed", |b| {
        b.iter(|| {
            let msg = Message::new("PRIVMSG", [black_box("#channel"), black_box("Hello there!")])
                .with_tag("time", "2023-01-01T12:00:00Z")
                .with_tag("msgid", "abc123")
                .with_prefix("nick!user@host");
            black_box(msg.to_line())
        })
    });

    group.finish();
}

fn benchmark_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("Codec");

    let mut stream = String::new();
    for line in [SIMPLE_MESSAGE, PREFIX_MESSAGE, TAGGED_MESSAGE, ESCAPED_TAGS] {
        stream.push_str(line);
        stream.push_str("\r\n");
    }

    for count in [1usize, 16, 128] {
        let input = stream.repeat(count);
        group.bench_with_input(BenchmarkId::new("decode_stream", count), &input, |b, input| {
            b.iter(|| {
                let mut codec = IrcCodec::new();
                let mut buf = BytesMut::from(input.as_str());
                let mut decoded = 0;
                while let Some(msg) = codec.decode(&mut buf).unwrap() {
                    black_box(msg);
                    decoded += 1;
                }
                black_box(decoded)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parsing,
    benchmark_composition,
    benchmark_codec,
);

criterion_main!(benches);
