use confmsg::cfg::{Body, EvalContext, Expression};
use confmsg::msg::{DynamicMessage, MsgValue, RawMode};
use confmsg::value::{Ty, Value};
use confmsg::decode_body;

mod common;

#[test]
fn empty_body_yields_empty_message() {
    let desc = common::with_string_attr();
    let body = Body::builder().build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    assert_eq!(msg, DynamicMessage::new(desc));
}

#[test]
fn string_attribute_decodes() {
    let desc = common::with_required_string_attr();
    let body = Body::builder()
        .attr("name", Value::string("Jackson"))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let name = desc.field_by_name("name").unwrap();
    assert_eq!(msg.get(name), MsgValue::string("Jackson"));
}

#[test]
fn bool_converts_to_string_implicitly() {
    let desc = common::with_required_string_attr();
    let body = Body::builder().attr("name", Value::Bool(true)).build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let name = desc.field_by_name("name").unwrap();
    assert_eq!(msg.get(name), MsgValue::string("true"));
}

#[test]
fn null_attribute_leaves_field_cleared() {
    let desc = common::with_string_attr();
    let body = Body::builder()
        .attr("name", Value::null(Ty::String))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    assert!(!msg.has(desc.field_by_name("name").unwrap()));
}

#[test]
fn null_required_attribute_is_diagnosed() {
    let desc = common::with_required_string_attr();
    let body = Body::builder()
        .attr("name", Value::null(Ty::String))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.has_errors());
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.summary, "Unsuitable attribute value");
    assert!(diag.detail.contains("must not be null"));
    assert!(!msg.has(desc.field_by_name("name").unwrap()));
}

#[test]
fn missing_required_attribute_is_diagnosed() {
    let desc = common::with_required_string_attr();
    let body = Body::builder().build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.has_errors());
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.summary, "Missing required argument");
    assert!(diag.subject.is_some());
    assert!(!msg.has(desc.field_by_name("name").unwrap()));
}

#[test]
fn out_of_range_integer_is_diagnosed() {
    let desc = common::with_number_attr_as_int32();
    let huge: num_bigint::BigInt =
        "314159265358979323846264338327950288419716939937510582097494459"
            .parse()
            .unwrap();
    let body = Body::builder().attr("num", Value::big(huge)).build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.has_errors());
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.summary, "Unsuitable attribute value");
    assert_eq!(
        diag.detail,
        "The value must be less than or equal to 2147483647."
    );
    assert!(diag.subject.is_some());
    assert!(!msg.has(desc.field_by_name("num").unwrap()));
}

#[test]
fn negative_out_of_range_integer_is_diagnosed() {
    let desc = common::with_number_attr_as_int32();
    let body = Body::builder()
        .attr("num", Value::int(-3_000_000_000))
        .build();

    let (_, diags) = decode_body(&body, &desc, None);
    assert!(diags.has_errors());
    assert_eq!(
        diags.iter().next().unwrap().detail,
        "The value must be greater than or equal to -2147483648."
    );
}

#[test]
fn non_integral_number_is_diagnosed() {
    let desc = common::with_number_attr_as_int32();
    let body = Body::builder()
        .attr("num", Value::float(3.14159265358979))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.has_errors());
    assert_eq!(
        diags.iter().next().unwrap().detail,
        "The value must be a whole number."
    );
    assert!(!msg.has(desc.field_by_name("num").unwrap()));
}

#[test]
fn in_range_integer_decodes() {
    let desc = common::with_number_attr_as_int32();
    let body = Body::builder().attr("num", Value::int(12)).build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    assert_eq!(
        msg.get(desc.field_by_name("num").unwrap()),
        MsgValue::I32(12)
    );
}

#[test]
fn number_constraint_over_string_field_keeps_precision() {
    let desc = common::with_number_attr_as_string();
    let digits = "314159265358979323846264338327950288419716939937510582097494459";
    let body = Body::builder()
        .attr("num", Value::big(digits.parse().unwrap()))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    assert_eq!(
        msg.get(desc.field_by_name("num").unwrap()),
        MsgValue::string(digits)
    );
}

#[test]
fn repeated_string_attribute_decodes_in_order() {
    let desc = common::with_string_list_attr();
    let body = Body::builder()
        .attr(
            "names",
            Value::tuple([
                Value::string("Jackson"),
                Value::string("Rufus"),
                Value::string("Agnes"),
            ]),
        )
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    assert_eq!(
        msg.get(desc.field_by_name("names").unwrap()),
        MsgValue::List(vec![
            MsgValue::string("Jackson"),
            MsgValue::string("Rufus"),
            MsgValue::string("Agnes"),
        ])
    );
}

#[test]
fn set_constraint_converges_duplicates() {
    let desc = common::with_string_set_attr();
    let body = Body::builder()
        .attr(
            "names",
            Value::tuple([
                Value::string("Jackson"),
                Value::string("Snakob"),
                Value::string("Rufus"),
                Value::string("Agnes"),
                Value::string("Jackson"),
            ]),
        )
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    // Dedup and alphabetization are artefacts of the round trip through
    // the canonically-ordered set.
    assert_eq!(
        msg.get(desc.field_by_name("names").unwrap()),
        MsgValue::List(vec![
            MsgValue::string("Agnes"),
            MsgValue::string("Jackson"),
            MsgValue::string("Rufus"),
            MsgValue::string("Snakob"),
        ])
    );
}

#[test]
fn map_attribute_decodes_entries() {
    let desc = common::with_string_map_attr();
    let body = Body::builder()
        .attr(
            "names",
            Value::object([
                ("Martin".to_string(), Value::string("Jackson")),
                ("Kay".to_string(), Value::string("Rufus")),
            ]),
        )
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let MsgValue::Map(entries) = msg.get(desc.field_by_name("names").unwrap()) else {
        panic!("expected map");
    };
    assert_eq!(entries.get("Martin"), Some(&MsgValue::string("Jackson")));
    assert_eq!(entries.get("Kay"), Some(&MsgValue::string("Rufus")));
}

#[test]
fn raw_json_attribute_stores_tagged_payload() {
    let desc = common::with_raw_dynamic_attr(RawMode::Json);
    let body = Body::builder().attr("raw", Value::int(2)).build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    assert_eq!(
        msg.get(desc.field_by_name("raw").unwrap()),
        MsgValue::Bytes(br#"{"value":2,"type":"number"}"#.to_vec())
    );
}

#[test]
fn raw_json_string_attribute_stores_tagged_payload() {
    let desc = common::with_raw_dynamic_attr(RawMode::Json);
    let body = Body::builder().attr("raw", Value::string("Hello")).build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    assert_eq!(
        msg.get(desc.field_by_name("raw").unwrap()),
        MsgValue::Bytes(br#"{"value":"Hello","type":"string"}"#.to_vec())
    );
}

#[test]
fn raw_null_leaves_field_cleared() {
    let desc = common::with_raw_dynamic_attr(RawMode::Json);
    let body = Body::builder()
        .attr("raw", Value::null(Ty::Dynamic))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    // Null stores the same way as omission: not at all.
    assert!(!msg.has(desc.field_by_name("raw").unwrap()));
}

#[test]
fn raw_messagepack_attribute_round_trips_through_codec() {
    let desc = common::with_raw_dynamic_attr(RawMode::MessagePack);
    let body = Body::builder().attr("raw", Value::string("Hello")).build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let raw = msg.get(desc.field_by_name("raw").unwrap());
    let bytes = raw.as_bytes().expect("bytes field");
    let decoded = confmsg::value::msgpack::unmarshal(bytes, &Ty::Dynamic).unwrap();
    assert_eq!(decoded, Value::string("Hello"));
}

#[test]
fn unknown_value_is_rejected_outside_raw_mode() {
    let desc = common::with_string_attr();
    let body = Body::builder()
        .attr("name", Value::unknown(Ty::String))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.has_errors());
    assert!(diags
        .iter()
        .next()
        .unwrap()
        .detail
        .contains("Unknown values are not allowed here"));
    assert!(!msg.has(desc.field_by_name("name").unwrap()));
}

#[test]
fn unknown_value_is_preserved_in_raw_messagepack() {
    let desc = common::with_raw_dynamic_attr(RawMode::MessagePack);
    let body = Body::builder()
        .attr("raw", Value::unknown(Ty::Dynamic))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let raw = msg.get(desc.field_by_name("raw").unwrap());
    let decoded =
        confmsg::value::msgpack::unmarshal(raw.as_bytes().unwrap(), &Ty::Dynamic).unwrap();
    assert_eq!(decoded, Value::unknown(Ty::Dynamic));
}

#[test]
fn variables_resolve_from_the_evaluation_context() {
    let desc = common::with_required_string_attr();
    let mut ctx = EvalContext::new();
    ctx.define("who", Value::string("Rufus"));
    let body = Body::builder()
        .attr_expr("name", Expression::variable("who"))
        .build();

    let (msg, diags) = decode_body(&body, &desc, Some(&ctx));
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    assert_eq!(
        msg.get(desc.field_by_name("name").unwrap()),
        MsgValue::string("Rufus")
    );
}

#[test]
fn unknown_variable_reports_and_skips_the_field() {
    let desc = common::with_string_attr();
    let body = Body::builder()
        .attr_expr("name", Expression::variable("nobody"))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.has_errors());
    assert_eq!(diags.iter().next().unwrap().summary, "Unknown variable");
    assert!(!msg.has(desc.field_by_name("name").unwrap()));
}

#[test]
fn unsupported_argument_is_diagnosed_but_rest_decodes() {
    let desc = common::with_string_attr();
    let body = Body::builder()
        .attr("name", Value::string("Jackson"))
        .attr("stray", Value::Bool(true))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.has_errors());
    assert_eq!(diags.iter().next().unwrap().summary, "Unsupported argument");
    assert_eq!(
        msg.get(desc.field_by_name("name").unwrap()),
        MsgValue::string("Jackson")
    );
}

#[test]
fn singleton_block_with_label_binds_label_and_attributes() {
    let child = common::with_one_block_label();
    let desc = common::nested_block_singleton(&child, "OneLabel");
    let body = Body::builder()
        .block(
            "doodad",
            &["Jackson"],
            Body::builder()
                .attr("nickname", Value::string("doofus"))
                .build(),
        )
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let MsgValue::Message(doodad) = msg.get(desc.field_by_name("doodad").unwrap()) else {
        panic!("expected nested message");
    };
    assert_eq!(
        doodad.get(child.field_by_name("name").unwrap()),
        MsgValue::string("Jackson")
    );
    assert_eq!(
        doodad.get(child.field_by_name("nickname").unwrap()),
        MsgValue::string("doofus")
    );
}

#[test]
fn duplicate_singleton_block_keeps_first_and_diagnoses_second() {
    let child = common::with_one_block_label();
    let desc = common::nested_block_singleton(&child, "OneLabel");
    let body = Body::builder()
        .block(
            "doodad",
            &["Jackson"],
            Body::builder()
                .attr("nickname", Value::string("doofus"))
                .build(),
        )
        .block(
            "doodad",
            &["Rufus"],
            Body::builder()
                .attr("nickname", Value::string("bigdog"))
                .build(),
        )
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.has_errors());
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.summary, "Duplicate doodad block");
    assert!(diag.detail.contains("Previous block declared at"));
    assert!(diag.subject.is_some());

    let MsgValue::Message(doodad) = msg.get(desc.field_by_name("doodad").unwrap()) else {
        panic!("expected nested message");
    };
    assert_eq!(
        doodad.get(child.field_by_name("name").unwrap()),
        MsgValue::string("Jackson")
    );
}

#[test]
fn repeated_blocks_decode_in_source_order() {
    let child = common::with_one_block_label();
    let desc = common::nested_block_repeated(&child, confmsg::msg::CollectionKind::List);
    let body = Body::builder()
        .block(
            "doodad",
            &["Snakob"],
            Body::builder()
                .attr("nickname", Value::string("Snekob"))
                .build(),
        )
        .block(
            "doodad",
            &["Jackson"],
            Body::builder()
                .attr("nickname", Value::string("doofus"))
                .build(),
        )
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let raw = msg.get(desc.field_by_name("doodad").unwrap());
    let items = raw.as_list().expect("repeated field");
    let names: Vec<String> = items
        .iter()
        .map(|item| {
            item.as_message()
                .unwrap()
                .get(child.field_by_name("name").unwrap())
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(names, ["Snakob", "Jackson"]);
}

#[test]
fn flatten_fills_nested_messages_from_one_body() {
    let desc = common::with_nested_flatten_string_attr();
    let body = Body::builder()
        .attr("name", Value::string("Snakob"))
        .attr("species", Value::string("snake"))
        .attr("breed", Value::string("ball"))
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");

    let outer_base = desc.field_by_name("base").unwrap();
    let MsgValue::Message(mid) = msg.get(outer_base) else {
        panic!("expected flattened message");
    };
    let mid_desc = mid.descriptor().clone();
    let MsgValue::Message(inner) = mid.get(mid_desc.field_by_name("base").unwrap()) else {
        panic!("expected doubly-flattened message");
    };

    assert_eq!(
        inner.get(inner.descriptor().clone().field_by_name("name").unwrap()),
        MsgValue::string("Snakob")
    );
    assert_eq!(
        mid.get(mid_desc.field_by_name("species").unwrap()),
        MsgValue::string("snake")
    );
    assert_eq!(
        msg.get(desc.field_by_name("breed").unwrap()),
        MsgValue::string("ball")
    );
}

#[test]
fn holder_attribute_packs_dynamic_values() {
    let desc = common::with_holder_attr();
    let body = Body::builder()
        .attr(
            "extra",
            Value::object([("pi".to_string(), Value::float(3.5))]),
        )
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let MsgValue::Message(holder) = msg.get(desc.field_by_name("extra").unwrap()) else {
        panic!("expected holder message");
    };
    let unpacked = confmsg::msg::well_known::from_value_message(&holder).unwrap();
    assert_eq!(
        unpacked,
        Value::object([("pi".to_string(), Value::float(3.5))])
    );
}

#[test]
fn holder_map_attribute_packs_each_entry() {
    let desc = common::with_holder_map_attr();
    let body = Body::builder()
        .attr(
            "extras",
            Value::object([
                ("a".to_string(), Value::int(1)),
                ("b".to_string(), Value::string("two")),
            ]),
        )
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let MsgValue::Map(entries) = msg.get(desc.field_by_name("extras").unwrap()) else {
        panic!("expected map of holders");
    };
    let a = entries.get("a").unwrap().as_message().unwrap();
    assert_eq!(
        confmsg::msg::well_known::from_value_message(a).unwrap(),
        Value::int(1)
    );
    let b = entries.get("b").unwrap().as_message().unwrap();
    assert_eq!(
        confmsg::msg::well_known::from_value_message(b).unwrap(),
        Value::string("two")
    );
}

#[test]
fn holder_list_attribute_packs_each_element() {
    let desc = common::with_holder_list_attr();
    let body = Body::builder()
        .attr(
            "extras",
            Value::tuple([Value::Bool(true), Value::int(7)]),
        )
        .build();

    let (msg, diags) = decode_body(&body, &desc, None);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let raw = msg.get(desc.field_by_name("extras").unwrap());
    let items = raw.as_list().expect("repeated holder field");
    assert_eq!(items.len(), 2);
    assert_eq!(
        confmsg::msg::well_known::from_value_message(items[0].as_message().unwrap()).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        confmsg::msg::well_known::from_value_message(items[1].as_message().unwrap()).unwrap(),
        Value::int(7)
    );
}
