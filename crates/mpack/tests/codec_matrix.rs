use mpack::{pack, unpack, Value};

fn map(entries: &[(&str, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| (Value::Str((*k).to_owned()), v.clone()))
            .collect(),
    )
}

#[test]
fn scalar_wire_matrix() {
    assert_eq!(pack(&Value::Nil).unwrap(), [0xc0]);
    assert_eq!(pack(&Value::Bool(false)).unwrap(), [0xc2]);
    assert_eq!(pack(&Value::Bool(true)).unwrap(), [0xc3]);
    assert_eq!(unpack(&[0xc0]).unwrap(), Value::Nil);
    assert_eq!(unpack(&[0xc2]).unwrap(), Value::Bool(false));
    assert_eq!(unpack(&[0xc3]).unwrap(), Value::Bool(true));
}

#[test]
fn integer_wire_matrix() {
    let cases: &[(i64, &[u8])] = &[
        (0, &[0x00]),
        (127, &[0x7f]),
        (128, &[0xcc, 0x80]),
        (255, &[0xcc, 0xff]),
        (256, &[0xcd, 0x01, 0x00]),
        (65535, &[0xcd, 0xff, 0xff]),
        (65536, &[0xce, 0x00, 0x01, 0x00, 0x00]),
        (-1, &[0xff]),
        (-32, &[0xe0]),
        (-33, &[0xd0, 0xdf]),
        (-128, &[0xd0, 0x80]),
        (-129, &[0xd1, 0xff, 0x7f]),
        (-32768, &[0xd1, 0x80, 0x00]),
        (-32769, &[0xd2, 0xff, 0xff, 0x7f, 0xff]),
    ];
    for (value, wire) in cases {
        let encoded = pack(&Value::Int(*value)).unwrap();
        assert_eq!(&encoded, wire, "encoding {value}");
        assert_eq!(unpack(wire).unwrap(), Value::Int(*value), "decoding {value}");
    }
}

#[test]
fn float_wire_matrix() {
    assert_eq!(
        pack(&Value::Float(1.0)).unwrap(),
        [0xcb, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0]
    );
    assert_eq!(unpack(&[0xcb, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0]).unwrap(), Value::Float(1.0));
    // float32 widens to f64 on decode.
    assert_eq!(unpack(&[0xca, 0x3f, 0xc0, 0, 0]).unwrap(), Value::Float(1.5));
}

#[test]
fn array_wire_matrix() {
    assert_eq!(pack(&Value::Array(vec![])).unwrap(), [0x90]);

    let arr15 = Value::Array((0..15).map(Value::Int).collect());
    let encoded = pack(&arr15).unwrap();
    assert_eq!(
        encoded,
        [0x9f, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e]
    );
    assert_eq!(unpack(&encoded).unwrap(), arr15);

    let arr16 = Value::Array((0..16).map(Value::Int).collect());
    let encoded = pack(&arr16).unwrap();
    assert_eq!(
        encoded,
        [
            0xdc, 0x00, 0x10, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
            0x0f
        ]
    );
    assert_eq!(unpack(&encoded).unwrap(), arr16);
}

#[test]
fn map_wire_matrix() {
    assert_eq!(pack(&Value::Map(vec![])).unwrap(), [0x80]);
    let one = Value::Map(vec![(Value::Int(1), Value::Int(1))]);
    assert_eq!(pack(&one).unwrap(), [0x81, 0x01, 0x01]);
    assert_eq!(unpack(&[0x81, 0x01, 0x01]).unwrap(), one);

    let map16 = Value::Map((0..16).map(|i| (Value::Int(i), Value::Int(i))).collect());
    let encoded = pack(&map16).unwrap();
    assert_eq!(&encoded[..3], &[0xde, 0x00, 0x10]);
    assert_eq!(unpack(&encoded).unwrap(), map16);
}

#[test]
fn width_minimality_for_integers() {
    let widths: &[(i64, usize)] = &[
        (0, 1),
        (127, 1),
        (128, 2),
        (255, 2),
        (256, 3),
        (65535, 3),
        (65536, 5),
        (u32::MAX as i64, 5),
        (u32::MAX as i64 + 1, 9),
        (i64::MAX, 9),
        (-1, 1),
        (-32, 1),
        (-33, 2),
        (-128, 2),
        (-129, 3),
        (-32768, 3),
        (-32769, 5),
        (i32::MIN as i64, 5),
        (i32::MIN as i64 - 1, 9),
        (i64::MIN, 9),
    ];
    for (value, len) in widths {
        assert_eq!(
            pack(&Value::Int(*value)).unwrap().len(),
            *len,
            "width of {value}"
        );
    }
}

#[test]
fn width_minimality_for_lengths() {
    let str_widths: &[(usize, usize)] = &[(0, 1), (31, 1), (32, 2), (255, 2), (256, 3), (65535, 3), (65536, 5)];
    for (len, header) in str_widths {
        let encoded = pack(&Value::Str("a".repeat(*len))).unwrap();
        assert_eq!(encoded.len(), header + len, "string of length {len}");
    }

    let bin_widths: &[(usize, usize)] = &[(0, 2), (255, 2), (256, 3), (65535, 3), (65536, 5)];
    for (len, header) in bin_widths {
        let encoded = pack(&Value::Bin(vec![0u8; *len])).unwrap();
        assert_eq!(encoded.len(), header + len, "binary of length {len}");
    }

    let arr_widths: &[(usize, usize)] = &[(0, 1), (15, 1), (16, 3), (65535, 3), (65536, 5)];
    for (len, header) in arr_widths {
        let encoded = pack(&Value::Array(vec![Value::Nil; *len])).unwrap();
        assert_eq!(encoded.len(), header + len, "array of length {len}");
    }

    let map_widths: &[(usize, usize)] = &[(0, 1), (15, 1), (16, 3)];
    for (len, header) in map_widths {
        let entries = (0..*len).map(|_| (Value::Nil, Value::Nil)).collect();
        let encoded = pack(&Value::Map(entries)).unwrap();
        assert_eq!(encoded.len(), header + 2 * len, "map of length {len}");
    }
}

#[test]
fn structured_roundtrip_corpus() {
    let values = vec![
        Value::Nil,
        Value::Bool(true),
        Value::Bool(false),
        Value::Int(0),
        Value::Int(-4_807_526_976),
        Value::Int(i64::MIN),
        Value::Int(i64::MAX),
        Value::UInt(u64::MAX),
        Value::Float(3_456.123_456_789_022_4),
        Value::Float(f64::INFINITY),
        Value::Str(String::new()),
        Value::Str("héllo wörld".into()),
        Value::Str("a".repeat(300)),
        Value::Bin(vec![]),
        Value::Bin((0..=255).collect()),
        Value::Array(vec![]),
        Value::Array(vec![
            Value::Int(1),
            Value::Array(vec![Value::Int(2)]),
            map(&[("k", Value::Bool(true))]),
        ]),
        map(&[
            ("foo", Value::Str("bar".into())),
            ("nested", map(&[("deep", Value::Array(vec![Value::Nil]))])),
        ]),
        // Duplicate keys survive the wire.
        Value::Map(vec![
            (Value::Str("k".into()), Value::Int(1)),
            (Value::Str("k".into()), Value::Int(2)),
        ]),
        // Non-string keys are legal.
        Value::Map(vec![
            (Value::Int(-1), Value::Int(1)),
            (Value::Array(vec![Value::Int(0)]), Value::Nil),
        ]),
    ];
    for value in values {
        let encoded = pack(&value).unwrap();
        let decoded = unpack(&encoded).unwrap();
        assert_eq!(decoded, value, "roundtrip for {value:?}");
    }
}

#[test]
fn decode_normalizes_json_fixture() {
    // Fixtures stated as JSON decode to the matching value tree.
    let json = serde_json::json!({
        "id": 42,
        "name": "probe",
        "readings": [1.5, -2.0],
        "active": true,
        "meta": null,
    });
    let value = Value::from(json);
    let encoded = pack(&value).unwrap();
    assert_eq!(unpack(&encoded).unwrap(), value);
}
