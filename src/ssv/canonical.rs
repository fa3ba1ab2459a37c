//! Reconstruction of the canonical signed message.
//!
//! The network signs the callback's query parameters minus `signature` and
//! `key_id`, sorted by name, joined as `name=value` pairs with `&`. The
//! reconstruction must decode each value exactly once, with the same
//! form-urlencoding rules the network applied when composing the message.

/// Parameters excluded from the signed message
const EXCLUDED: [&str; 2] = ["signature", "key_id"];

/// Rebuild the canonical message from the raw, originally-ordered query
/// string.
///
/// The result is independent of the order the parameters arrived in.
pub fn canonical_message(raw_query: &str) -> String {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(raw_query.as_bytes())
        .filter(|(name, _)| !EXCLUDED.contains(&name.as_ref()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    // Byte-wise, not locale-aware: this is the order the network signed in.
    pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    pairs
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorts_parameters_by_name() {
        let message = canonical_message("transaction_id=T1&ad_network=123&reward_item=GoldBars");
        assert_eq!(
            message,
            "ad_network=123&reward_item=GoldBars&transaction_id=T1"
        );
    }

    #[test]
    fn test_order_independent() {
        let forward = canonical_message("a=1&b=2&c=3");
        let shuffled = canonical_message("c=3&a=1&b=2");
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_excludes_signature_and_key_id() {
        let message = canonical_message("reward_item=GoldBars&signature=MEUCIQ&key_id=7");
        assert_eq!(message, "reward_item=GoldBars");
    }

    #[test]
    fn test_decodes_each_value_exactly_once() {
        // %26 must become a literal '&' inside the value, '+' a space, and
        // neither may be decoded a second time.
        let message = canonical_message("custom_data=a%26b%2520c&reward_item=bonus+round");
        assert_eq!(message, "custom_data=a&b%20c&reward_item=bonus round");
    }

    #[test]
    fn test_sorts_byte_wise_not_alphabetically() {
        // 'Z' (0x5a) sorts before 'a' (0x61) in byte order.
        let message = canonical_message("a=2&Z=1");
        assert_eq!(message, "Z=1&a=2");
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(canonical_message(""), "");
    }

    #[test]
    fn test_empty_values_are_kept() {
        let message = canonical_message("user_id=&transaction_id=T1");
        assert_eq!(message, "transaction_id=T1&user_id=");
    }
}
