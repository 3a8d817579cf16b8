use bitlite::benc::{self, Element, ParseError};
use std::collections::BTreeMap;

#[test]
fn test_sorted_input_reencodes_identically() {
    let inputs: [&[u8]; 6] = [
        b"i0e",
        b"i-42e",
        b"0:",
        b"le",
        b"d3:bar4:spam3:fooi42ee",
        b"d8:announce9:http://x/4:infod6:lengthi3e4:name1:a12:piece lengthi1e6:pieces0:e5:otherll1:ai1eeee",
    ];
    for input in inputs {
        let decoded = benc::decode(input).unwrap();
        assert_eq!(input, benc::encode(&decoded).as_slice(), "{}", String::from_utf8_lossy(input));
    }
}

#[test]
fn test_integer_extremes_survive_encoding() {
    for n in [i64::MIN, -1, 0, 1, i64::MAX] {
        let encoded = benc::encode(&Element::Integer(n));
        assert_eq!(format!("i{n}e").as_bytes(), encoded.as_slice());
        assert_eq!(Element::Integer(n), benc::decode(&encoded).unwrap());
    }
}

#[test]
fn test_unsorted_keys_are_reencoded_sorted() {
    let decoded = benc::decode(b"d1:bi2e1:ai1ee").unwrap();
    assert_eq!(b"d1:ai1e1:bi2ee".as_slice(), decoded.to_bytes().as_slice());
}

#[test]
fn test_built_dictionary_encodes_in_key_order() {
    let mut dict = BTreeMap::new();
    dict.insert(b"zebra".to_vec(), Element::from("z"));
    dict.insert(b"apple".to_vec(), Element::from(1i64));
    dict.insert(b"Mango".to_vec(), Element::from(vec![Element::from(b"\x00\xff".as_slice())]));
    assert_eq!(
        b"d5:Mangol2:\x00\xffe5:applei1e5:zebra1:ze".as_slice(),
        Element::from(dict).to_bytes().as_slice()
    );
}

#[test]
fn test_malformed_input_is_rejected() {
    assert!(matches!(benc::decode(b"i12"), Err(ParseError::NoIntegerEnd(0))));
    assert!(matches!(benc::decode(b"d3:foo"), Err(ParseError::EmptySource(6))));
    assert!(benc::decode(b"").is_err());
    assert!(benc::decode(b"5:abc").is_err());
    assert!(benc::decode(b"li1e").is_err());
    assert!(benc::decode(b"di1ei2ee").is_err());
    assert!(benc::decode(b"x").is_err());
}

#[test]
fn test_accessors_report_type_mismatch() {
    let list = benc::decode(b"l4:spami7ee").unwrap();
    assert!(list.is_list());
    let items = list.as_list().unwrap();
    assert_eq!(b"spam".as_slice(), items[0].as_bytes().unwrap());
    assert_eq!(7, items[1].as_int().unwrap());

    let err = items[0].as_int().unwrap_err();
    assert_eq!("expected integer, found byte string", err.to_string());
    assert!(list.as_dict().is_err());
}

#[test]
fn test_display_renders_nested_tree() {
    let decoded = benc::decode(b"d4:spaml1:ai1eee").unwrap();
    assert_eq!(
        "dict:\n  key: spam\n    list:\n      string: a\n      int: 1\n",
        decoded.to_string()
    );
}
