use clinic_relay::signature::{compute_signature, verify};
use std::collections::HashMap;

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

const URL: &str = "https://clinic.example.com/api/whatsapp/incoming";

#[test]
fn test_known_vector_simple() {
    // Independently computed with the provider's published algorithm.
    let sig = compute_signature("secret", URL, &params(&[("A", "1"), ("B", "2")]));
    assert_eq!(sig, "/EosHDM1ZhYbnGujeYw3FkuWKFs=");
}

#[test]
fn test_known_vector_query_string_url() {
    let p = params(&[
        ("CallSid", "CA1234567890ABCDE"),
        ("Caller", "+12349013030"),
        ("Digits", "1234"),
        ("From", "+12349013030"),
        ("To", "+18005551212"),
    ]);
    let sig = compute_signature("12345", "https://mycompany.com/myapp.php?foo=1&CA=2", &p);
    assert_eq!(sig, "CbHSer7drbZyoDPewpyCwe+dFfw=");
}

#[test]
fn test_verify_roundtrip() {
    let p = params(&[("From", "whatsapp:+15551234567"), ("Body", "Hello")]);
    let sig = compute_signature("token", URL, &p);
    assert!(verify("token", &sig, URL, &p));
}

#[test]
fn test_verify_rejects_mutated_url() {
    let p = params(&[("From", "whatsapp:+15551234567")]);
    let sig = compute_signature("token", URL, &p);
    let mutated = format!("{}x", URL);
    assert!(!verify("token", &sig, &mutated, &p));
}

#[test]
fn test_verify_rejects_mutated_value() {
    let p = params(&[("Body", "Hello")]);
    let sig = compute_signature("token", URL, &p);
    assert!(!verify("token", &sig, URL, &params(&[("Body", "Hellp")])));
}

#[test]
fn test_verify_rejects_mutated_key() {
    let p = params(&[("Body", "Hello")]);
    let sig = compute_signature("token", URL, &p);
    assert!(!verify("token", &sig, URL, &params(&[("Bodz", "Hello")])));
}

#[test]
fn test_verify_rejects_wrong_secret() {
    let p = params(&[("Body", "Hello")]);
    let sig = compute_signature("token", URL, &p);
    assert!(!verify("tokeN", &sig, URL, &p));
}

#[test]
fn test_verify_rejects_mutated_signature() {
    let p = params(&[("Body", "Hello")]);
    let mut sig = compute_signature("token", URL, &p).into_bytes();
    sig[0] ^= 1;
    assert!(!verify("token", &String::from_utf8(sig).unwrap(), URL, &p));
}

#[test]
fn test_verify_rejects_empty_header() {
    let p = params(&[("Body", "Hello")]);
    assert!(!verify("token", "", URL, &p));
}

#[test]
fn test_insertion_order_is_irrelevant() {
    let mut forward = HashMap::new();
    for (k, v) in [("Alpha", "1"), ("Beta", "2"), ("Gamma", "3"), ("Delta", "4")] {
        forward.insert(k.to_string(), v.to_string());
    }
    let mut reverse = HashMap::new();
    for (k, v) in [("Delta", "4"), ("Gamma", "3"), ("Beta", "2"), ("Alpha", "1")] {
        reverse.insert(k.to_string(), v.to_string());
    }
    assert_eq!(
        compute_signature("token", URL, &forward),
        compute_signature("token", URL, &reverse)
    );
}

#[test]
fn test_sort_is_bytewise() {
    // Uppercase sorts before lowercase in byte order; a locale-aware sort
    // would produce a different concatenation.
    let p = params(&[("Zebra", "1"), ("apple", "2")]);
    let sig = compute_signature("token", URL, &p);
    let expected = compute_signature("token", URL, &params(&[("apple", "2"), ("Zebra", "1")]));
    assert_eq!(sig, expected);

    let concatenated_upper_first = {
        let p_single = params(&[("Zebra1apple", "2")]);
        // Same concatenated data "URL + Zebra1apple2" means same digest.
        compute_signature("token", URL, &p_single)
    };
    assert_eq!(sig, concatenated_upper_first);
}

#[test]
fn test_empty_params_signs_url_only() {
    let p = HashMap::new();
    let sig = compute_signature("token", URL, &p);
    assert!(!sig.is_empty());
    assert!(verify("token", &sig, URL, &p));
}
