use crate::address::AddressNormalizer;

/// **VALUE**: Verifies local and already-prefixed numbers normalize to the same address.
///
/// **WHY THIS MATTERS**: Callers send both forms. Two addresses for one phone would mean a
/// prefixed number gets the country code twice and the message goes nowhere.
///
/// **BUG THIS CATCHES**: Would catch the prefix being added unconditionally.
#[test]
fn given_local_and_prefixed_numbers_when_normalized_then_addresses_match() {
    let normalizer = AddressNormalizer::default();

    let local = normalizer.normalize("9876543210");
    let prefixed = normalizer.normalize("919876543210");

    assert_eq!(local, prefixed);
    assert_eq!(local.as_str(), "919876543210@c.us");
}

/// **VALUE**: Verifies formatting characters are stripped.
///
/// **BUG THIS CATCHES**: Would catch `+`, spaces or dashes leaking into the chat id.
#[test]
fn given_formatted_number_when_normalized_then_only_digits_remain() {
    let normalizer = AddressNormalizer::default();

    let address = normalizer.normalize("+91 (987) 654-3210");

    assert_eq!(address.as_str(), "919876543210@c.us");
}

/// **VALUE**: Verifies normalization is idempotent.
///
/// **WHY THIS MATTERS**: Addresses may pass through the normalizer more than once on their
/// way to the backend.
///
/// **BUG THIS CATCHES**: Would catch the domain's characters changing the digit string on
/// the second pass.
#[test]
fn given_normalized_address_when_normalized_again_then_unchanged() {
    let normalizer = AddressNormalizer::default();

    for raw in ["9876543210", "919876543210", "+1 555 0100", "", "abc"] {
        let once = normalizer.normalize(raw);
        let twice = normalizer.normalize(once.as_str());
        assert_eq!(once, twice, "not idempotent for {raw:?}");
    }
}

/// **VALUE**: Verifies malformed input still yields an address rather than failing.
///
/// **WHY THIS MATTERS**: The backend is the source of truth on validity; the normalizer
/// must not reject anything.
#[test]
fn given_input_without_digits_when_normalized_then_prefix_and_domain_only() {
    let normalizer = AddressNormalizer::default();

    assert_eq!(normalizer.normalize("not a number").as_str(), "91@c.us");
}

/// **VALUE**: Verifies a configured country code and domain are used.
#[test]
fn given_custom_country_code_when_normalized_then_custom_prefix_applied() {
    let normalizer = AddressNormalizer::new("44", "s.whatsapp.net");

    assert_eq!(
        normalizer.normalize("07700 900123").as_str(),
        "4407700900123@s.whatsapp.net"
    );
    assert_eq!(
        normalizer.normalize("447700900123").as_str(),
        "447700900123@s.whatsapp.net"
    );
}
