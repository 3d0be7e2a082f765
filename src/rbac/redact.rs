//! Response-side field masking. Stored data is never touched.

use std::collections::BTreeSet;

use serde_json::Value;

/// Replacement used for masked content.
pub const FULL_MASK: &str = "***";

const KEPT_PREFIX: usize = 2;

/// Masks an e-mail address for display.
///
/// Keeps the first two characters of the local part, replaces the rest of the
/// local part with `***`, and leaves `@domain` intact:
/// `jane.doe@example.com` becomes `ja***@example.com`.
///
/// ```
/// use compliance_core::rbac::mask_email;
///
/// assert_eq!(mask_email("jane.doe@example.com"), "ja***@example.com");
/// ```
pub fn mask_email(email: &str) -> String {
    let (local, domain) = match email.rfind('@') {
        Some(at) => email.split_at(at),
        None => (email, ""),
    };
    let prefix: String = local.chars().take(KEPT_PREFIX).collect();
    format!("{}{}{}", prefix, FULL_MASK, domain)
}

fn mask_field(field: &str, value: &Value) -> Value {
    match (field, value) {
        (_, Value::Null) => Value::Null,
        ("email", Value::String(s)) => Value::String(mask_email(s)),
        _ => Value::String(FULL_MASK.to_string()),
    }
}

/// Masks the named fields in a record or in every record of a list.
///
/// Missing fields are ignored; `null` values stay `null`.
pub fn redact_value(value: &mut Value, fields: &BTreeSet<String>) {
    if fields.is_empty() {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                redact_value(item, fields);
            }
        }
        Value::Object(map) => {
            for field in fields {
                if let Some(v) = map.get_mut(field) {
                    *v = mask_field(field, v);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn masks_email_local_part() {
        assert_eq!(mask_email("jane.doe@example.com"), "ja***@example.com");
        assert_eq!(mask_email("ab@x.org"), "ab***@x.org");
    }

    #[test]
    fn short_local_part_is_still_masked() {
        assert_eq!(mask_email("a@x.org"), "a***@x.org");
    }

    #[test]
    fn value_without_at_sign_keeps_prefix_only() {
        assert_eq!(mask_email("not-an-email"), "no***");
    }

    #[test]
    fn multibyte_characters_are_not_split() {
        assert_eq!(mask_email("élodie@exemple.fr"), "él***@exemple.fr");
    }

    #[test]
    fn redacts_every_record_in_a_list() {
        let mut value = json!([
            {"id": "1", "email": "jane.doe@example.com", "phone": "555-0100"},
            {"id": "2", "email": "bob@example.com", "phone": null},
        ]);

        redact_value(&mut value, &fields(&["email", "phone"]));

        assert_eq!(value[0]["email"], "ja***@example.com");
        assert_eq!(value[0]["phone"], "***");
        assert_eq!(value[1]["email"], "bo***@example.com");
        assert!(value[1]["phone"].is_null());
        assert_eq!(value[0]["id"], "1");
    }

    #[test]
    fn empty_field_set_leaves_value_untouched() {
        let mut value = json!({"email": "jane.doe@example.com"});
        let before = value.clone();
        redact_value(&mut value, &BTreeSet::new());
        assert_eq!(value, before);
    }
}
