//! Server frame encoding read back through the client parser.

use proptest::prelude::*;
use sentinel_agent::FrameParser;
use sentinel_types::wire::{decode_payload, encode_changed_frame, terminate, Payload};
use sentinel_types::{Action, ChangedEvent, Resource, ResourceType};

fn resource_type() -> impl Strategy<Value = ResourceType> {
    prop::sample::select(ResourceType::ALL.to_vec())
}

fn action() -> impl Strategy<Value = Action> {
    prop::sample::select(vec![Action::Create, Action::Update, Action::Delete])
}

/// Feeds a wire chunk through the parser line by line.
fn parse_all(wire: &str) -> Vec<Payload> {
    let mut parser = FrameParser::new();
    wire.split('\n')
        .filter_map(|line| parser.push_line(line))
        .map(|event| decode_payload(&event.event_type, &event.data).unwrap())
        .collect()
}

proptest! {
    /// Property: every broadcast frame decodes back to the resource it carries.
    #[test]
    fn prop_changed_frame_roundtrip(
        project in "[a-z0-9-]{1,16}",
        id in "[a-zA-Z0-9_.-]{1,32}",
        group in proptest::option::of("[a-z]{1,8}"),
        kind in resource_type(),
        action in action(),
        data in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut resource = Resource::new(project, id, kind, data);
        if let Some(group) = group {
            resource = resource.with_group(group);
        }
        let event = ChangedEvent::new(action, resource);

        let wire = terminate(&encode_changed_frame(&event).unwrap());
        let payloads = parse_all(&wire);

        prop_assert_eq!(payloads.len(), 1);
        match payloads.into_iter().next().unwrap() {
            Payload::Changed(decoded) => {
                prop_assert_eq!(decoded.action, event.action);
                prop_assert_eq!(decoded.resource, event.resource);
            }
            other => prop_assert!(false, "unexpected payload {:?}", other),
        }
    }
}

#[test]
fn test_every_type_with_and_without_data() {
    let mut wire = String::new();
    let mut expected = Vec::new();

    for kind in ResourceType::ALL {
        for data in [Vec::new(), b"payload".to_vec()] {
            for group in [None, Some("g")] {
                let mut resource = Resource::new("proj-1", format!("{kind}"), kind, data.clone());
                if let Some(group) = group {
                    resource = resource.with_group(group);
                }
                let event = ChangedEvent::new(Action::Update, resource.clone());
                wire.push_str(&terminate(&encode_changed_frame(&event).unwrap()));
                expected.push(resource);
            }
        }
    }

    let decoded: Vec<Resource> = parse_all(&wire)
        .into_iter()
        .filter_map(Payload::into_resource)
        .collect();
    assert_eq!(decoded, expected);
}
