use std::collections::BTreeMap;

/// Replaces every `{{key}}` occurrence with its attribute value, for each
/// attribute that is present. Placeholders with no matching attribute are left
/// verbatim rather than blanked, so a template rendered against a sparse
/// recipient still shows what was not filled in.
pub fn personalize(text: &str, attrs: &BTreeMap<String, String>) -> String {
    let mut out = text.to_string();
    for (key, value) in attrs {
        let token = format!("{{{{{key}}}}}");
        if out.contains(&token) {
            out = out.replace(&token, value);
        }
    }
    out
}
