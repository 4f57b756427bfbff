use serde_json::{json, Value};

use blocsmith_core::field::FieldOptions;
use blocsmith_core::picker::PickerValue;
use blocsmith_core::schema::Schema;
use blocsmith_core::store::BlocOrderUpdate;
use blocsmith_core::{DataType, EditSession, EditableValue};

fn schema() -> Schema {
    serde_json::from_value(json!({
        "text_rules": {
            "HERO_TITLE": {"key": "hero.title"}
        },
        "bloc_rules": {
            "SERVICES_BLOC": {
                "bloc_title": "Services",
                "json_key": "SERVICES_BLOC",
                "text_fields": {
                    "TITLE": {"key": "title"},
                    "DESC": {"key": "desc", "is_duplicable": true}
                }
            }
        },
        "picker_rules": {
            "HOME_ANNOUNCEMENT": {
                "title": "Announcement",
                "json_key": "homeAnnouncement",
                "allowed_source_blocs": ["SERVICES_BLOC"]
            }
        }
    }))
    .unwrap()
}

fn document() -> Value {
    json!({
        "hero": {"title": "Welcome"},
        "homeAnnouncement": {"enabled": "false", "sourceBlocKey": "", "blocIndex": "0"},
        "SERVICES_BLOC": {"items": [
            {"order": 1, "title": "Design"},
            {"order": 2, "title": "Build"}
        ]}
    })
}

fn add_services_bloc(session: &mut EditSession) {
    let keys = [
        "SERVICES_BLOC.DESC.2.0".to_string(),
        "SERVICES_BLOC.DESC.2.1".to_string(),
    ];
    session
        .add_bloc_instance("SERVICES_BLOC", 2, keys.to_vec(), 3)
        .unwrap();

    for (field_index, key) in keys.iter().enumerate() {
        session
            .create_field(
                key,
                DataType::Text,
                FieldOptions {
                    part_of_bloc: true,
                    bloc_key: Some("SERVICES_BLOC".into()),
                    field_index: Some(field_index),
                    is_new: true,
                    ..FieldOptions::default()
                },
                None,
                Some(field_index as i64 + 1),
            )
            .unwrap();
        session
            .set_editable_value(key, EditableValue::Text(format!("text{field_index}")), true)
            .unwrap();
    }
}

#[test]
fn rollback_removes_a_session_created_bloc_entirely() {
    let mut session = EditSession::new(schema(), document());
    add_services_bloc(&mut session);
    assert!(session.has_unpublished_changes());

    session.rollback_to_initial();

    assert!(session.blocs().instance("SERVICES_BLOC", 2).is_none());
    assert!(session.fields().get("SERVICES_BLOC.DESC.2.0").is_none());
    assert!(session.fields().get("SERVICES_BLOC.DESC.2.1").is_none());
    assert!(!session.has_unpublished_changes());
}

#[test]
fn rollback_reverts_mixed_edits_across_all_three_stores() {
    let mut session = EditSession::new(schema(), document());

    session
        .set_editable_value("HERO_TITLE", EditableValue::Text("Bienvenue".into()), true)
        .unwrap();
    session
        .set_editable_value(
            "SERVICES_BLOC.TITLE.0",
            EditableValue::Text(String::new()),
            false,
        )
        .unwrap();
    session.update_bloc_orders(&[
        BlocOrderUpdate {
            bloc_key: "SERVICES_BLOC".into(),
            index: 0,
            order: 2,
        },
        BlocOrderUpdate {
            bloc_key: "SERVICES_BLOC".into(),
            index: 1,
            order: 1,
        },
    ]);
    session
        .set_picker_value(
            "HOME_ANNOUNCEMENT",
            PickerValue {
                enabled: true,
                source_bloc_key: "SERVICES_BLOC".into(),
                bloc_index: 1,
            },
        )
        .unwrap();
    assert!(session.has_unpublished_changes());

    session.rollback_to_initial();

    let hero = session.fields().get("HERO_TITLE").unwrap();
    assert_eq!(hero.current.value.as_text(), Some("Welcome"));
    assert!(hero.to_publish.is_none());

    let title = session.fields().get("SERVICES_BLOC.TITLE.0").unwrap();
    assert_eq!(title.current.value.as_text(), Some("Design"));
    assert!(!title.in_error);

    let first = session.blocs().instance("SERVICES_BLOC", 0).unwrap();
    assert_eq!(first.current.order, Some(1));
    assert!(first.to_publish.is_none());

    let picker = session.pickers().get("HOME_ANNOUNCEMENT").unwrap();
    assert!(!picker.current.enabled);
    assert!(picker.to_publish.is_none());

    assert!(!session.has_unpublished_changes());
}

#[test]
fn rollback_restores_a_deleted_published_bloc() {
    let mut session = EditSession::new(schema(), document());
    session
        .delete_bloc("SERVICES_BLOC", 0, &["TITLE".into()])
        .unwrap();
    assert!(session.blocs().instance("SERVICES_BLOC", 0).unwrap().is_deleted);
    assert!(session.fields().get("SERVICES_BLOC.TITLE.0").unwrap().is_deleted);

    session.rollback_to_initial();

    let instance = session.blocs().instance("SERVICES_BLOC", 0).unwrap();
    assert!(!instance.is_deleted);
    let field = session.fields().get("SERVICES_BLOC.TITLE.0").unwrap();
    assert!(!field.is_deleted);
    assert!(!session.has_unpublished_changes());
}
