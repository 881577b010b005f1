//! Message keys derived from both payload shapes

use tempinbox::inbound::message_id::derive_message_key;
use tempinbox::inbound::{normalize, Payload};

const LIMIT: usize = 64 * 1024;

fn form_key(body: &str) -> String {
    let payload = Payload::from_http(Some("application/x-www-form-urlencoded"), body.as_bytes(), None).unwrap();
    let message = normalize(&payload, LIMIT).unwrap();
    derive_message_key(message.recipient.as_deref().unwrap(), &message)
}

#[test]
fn test_form_and_mime_share_upstream_key() {
    let form = form_key("recipient=a%40x.com&Message-Id=%3Cshared%40y.com%3E&subject=Hi");

    let mime = "To: a@x.com\r\nMessage-ID: <shared@y.com>\r\nSubject: Hi\r\n\r\nhello\r\n";
    let payload = Payload::from_http(Some("message/rfc822"), mime.as_bytes(), None).unwrap();
    let message = normalize(&payload, LIMIT).unwrap();
    let raw = derive_message_key("a@x.com", &message);

    assert_eq!(form, "shared@y.com");
    assert_eq!(form, raw);
}

#[test]
fn test_content_keys_differ_by_content() {
    let first = form_key("recipient=a%40x.com&subject=Hi&body-plain=hello");
    let again = form_key("recipient=a%40x.com&subject=Hi&body-plain=hello");
    let other = form_key("recipient=a%40x.com&subject=Hi&body-plain=goodbye");

    assert_eq!(first, again);
    assert_ne!(first, other);
}

#[test]
fn test_hostile_message_id_is_path_safe() {
    let key = form_key("recipient=a%40x.com&Message-Id=..%2F..%2Fetc%2Fpasswd");
    assert!(!key.contains('/'));
    assert!(!key.chars().all(|c| c == '.'));
}
