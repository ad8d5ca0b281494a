use super::*;
use crate::database::{Document, DocumentMetadata, MessageRole};
use crate::generation::ChatRole;
use chrono::NaiveDateTime;

fn chunk(id: i64, content: &str, destination: Option<&str>, source: Option<&str>) -> ScoredDocument {
    ScoredDocument {
        document: Document {
            id,
            content: content.to_string(),
            embedding: Vec::new(),
            metadata: DocumentMetadata {
                destination: destination.map(str::to_string),
                source: source.map(str::to_string),
                ..DocumentMetadata::default()
            },
            created_at: NaiveDateTime::default(),
        },
        similarity: 0.9,
    }
}

fn message(id: i64, role: MessageRole, content: &str) -> SessionMessage {
    SessionMessage {
        id,
        session_id: "s".to_string(),
        role,
        content: content.to_string(),
        created_at: NaiveDateTime::default(),
    }
}

#[test]
fn no_chunks_short_circuits() {
    let assembler = ContextAssembler::new("system", 6);
    let history = vec![message(1, MessageRole::User, "hi")];
    assert_eq!(
        assembler.build_prompt(&[], &history, "Where is Lamu?"),
        Prompt::NoContext
    );
}

#[test]
fn renders_numbered_chunks_with_tags() {
    let chunks = vec![
        chunk(4, "Entry is $80.", Some("Masai Mara"), Some("kws.go.ke")),
        chunk(2, "Snorkel at Kisite.", None, None),
    ];

    assert_eq!(
        render_context(&chunks),
        "[1. Masai Mara | kws.go.ke]\nEntry is $80.\n\n[2. Kenya | unknown]\nSnorkel at Kisite."
    );
}

#[test]
fn prompt_layout() {
    let assembler = ContextAssembler::new("You are Tembo.", 6);
    let chunks = vec![chunk(1, "Entry is $80.", Some("Masai Mara"), Some("kws.go.ke"))];
    let history = vec![
        message(1, MessageRole::User, "Hello"),
        message(2, MessageRole::Assistant, "Karibu!"),
    ];

    let Prompt::Messages(messages) = assembler.build_prompt(&chunks, &history, "Fee?") else {
        panic!("expected messages");
    };

    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], ChatMessage::system("You are Tembo."));
    assert_eq!(messages[1], ChatMessage::user("Hello"));
    assert_eq!(messages[2], ChatMessage::assistant("Karibu!"));
    assert_eq!(messages[3].role, ChatRole::User);
    assert_eq!(
        messages[3].content,
        "CONTEXT (use only this to answer):\n---\n[1. Masai Mara | kws.go.ke]\nEntry is $80.\n---\n\nQUESTION: Fee?"
    );
}

#[test]
fn history_is_bounded_to_most_recent_window() {
    let assembler = ContextAssembler::new("system", 2);
    let chunks = vec![chunk(1, "content", None, None)];
    let history = vec![
        message(1, MessageRole::User, "one"),
        message(2, MessageRole::Assistant, "two"),
        message(3, MessageRole::User, "three"),
        message(4, MessageRole::Assistant, "four"),
    ];

    let Prompt::Messages(messages) = assembler.build_prompt(&chunks, &history, "q") else {
        panic!("expected messages");
    };

    let middle: Vec<&str> = messages[1..messages.len() - 1]
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(middle, vec!["three", "four"]);
}
