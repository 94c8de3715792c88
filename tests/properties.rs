//! Property tests for assembly, storage order and replay filtering.

use proptest::prelude::*;

use tailcast::{AssemblerConfig, FilterParams, LogHub, LogRecord, RecordAssembler, StreamId};

/// A logical record as it would be written by a producer.
#[derive(Debug, Clone)]
enum Group {
    Plain(String),
    Block { head: String, body: Vec<String> },
}

impl Group {
    fn render(&self) -> String {
        match self {
            Group::Plain(line) => line.clone(),
            Group::Block { head, body } => {
                let mut lines = vec![format!("{head} {{")];
                lines.extend(body.iter().map(|l| format!("  \"{l}\": [1, 2],")));
                lines.push("}".to_string());
                lines.join("\n")
            }
        }
    }
}

fn bracket_free_line() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 :=.]{0,24}"
}

fn group() -> impl Strategy<Value = Group> {
    prop_oneof![
        bracket_free_line().prop_map(Group::Plain),
        (
            bracket_free_line(),
            prop::collection::vec("[a-z]{1,8}", 0..5)
        )
            .prop_map(|(head, body)| Group::Block { head, body }),
    ]
}

proptest! {
    #[test]
    fn prop_balanced_groups_become_one_record_each(groups in prop::collection::vec(group(), 0..30)) {
        let rendered: Vec<String> = groups.iter().map(Group::render).collect();
        let mut input = rendered.join("\n");
        if !rendered.is_empty() {
            input.push('\n');
        }

        let assembled: Vec<_> = RecordAssembler::new(input.as_bytes(), AssemblerConfig::default())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        prop_assert_eq!(assembled.len(), groups.len());
        prop_assert!(assembled.iter().all(|a| !a.is_truncated()));

        let messages: Vec<String> = assembled.into_iter().map(|a| a.record.message).collect();
        prop_assert_eq!(messages, rendered);
    }

    #[test]
    fn prop_store_keeps_publish_order(messages in prop::collection::vec(bracket_free_line(), 0..60)) {
        let hub = LogHub::new();
        for message in &messages {
            hub.publish(LogRecord::new(message.clone())).unwrap();
        }

        let records = hub.store().records();
        prop_assert!(records.windows(2).all(|w| w[0].id < w[1].id));

        let stored: Vec<String> = records.iter().map(|r| r.message.clone()).collect();
        prop_assert_eq!(stored, messages);
    }

    #[test]
    fn prop_replay_is_filtered_subsequence(
        messages in prop::collection::vec("[a-d ]{0,10}", 0..60),
        query in "[a-d]{0,2}",
        skip in 0usize..60,
    ) {
        let hub = LogHub::new();
        for message in &messages {
            hub.publish(LogRecord::new(message.clone())).unwrap();
        }

        let mut params = FilterParams::new().with_query(query.clone());
        let skip = skip.min(messages.len());
        if skip > 0 {
            params = params.with_after_record(hub.store().records()[skip - 1].id);
        }

        let (_handle, history) = hub.join(StreamId::new("prop"), &params).unwrap();

        let replayed: Vec<&str> = history.iter().map(|r| r.message.as_str()).collect();
        let expected: Vec<&str> = messages[skip..]
            .iter()
            .map(String::as_str)
            .filter(|m| m.contains(query.as_str()))
            .collect();
        prop_assert_eq!(replayed, expected);
    }
}
