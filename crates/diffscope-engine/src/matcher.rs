//! Method matching between two revisions of one file.

use std::collections::HashMap;

use diffscope_core::{ChangedMethod, MethodChange, MethodKey, MethodRecord};

/// Report which of `new` are added or changed relative to `old`.
///
/// Methods are matched by name and parameter text. A key missing from `old`
/// is [`MethodChange::Added`]; a key present with a different fingerprint is
/// [`MethodChange::Modified`]; identical methods are omitted. Methods that
/// exist only in `old` are not reported. Output follows the order of `new`.
///
/// # Examples
///
/// ```
/// use diffscope_core::{MethodChange, MethodKey, MethodRecord};
/// use diffscope_engine::classify;
///
/// let rec = |name: &str, fp: &str| MethodRecord {
///     key: MethodKey::new(name, "()"),
///     fingerprint: fp.into(),
/// };
/// let old = vec![rec("keep", "1"), rec("edit", "2"), rec("gone", "3")];
/// let new = vec![rec("keep", "1"), rec("edit", "X"), rec("fresh", "4")];
///
/// let changed = classify(&old, &new);
/// assert_eq!(changed.len(), 2);
/// assert_eq!(changed[0].method.key.name, "edit");
/// assert_eq!(changed[0].change, MethodChange::Modified);
/// assert_eq!(changed[1].change, MethodChange::Added);
/// ```
pub fn classify(old: &[MethodRecord], new: &[MethodRecord]) -> Vec<ChangedMethod> {
    let mut by_key: HashMap<&MethodKey, &str> = HashMap::with_capacity(old.len());
    for method in old {
        by_key
            .entry(&method.key)
            .or_insert(method.fingerprint.as_str());
    }

    new.iter()
        .filter_map(|method| {
            let change = match by_key.get(&method.key) {
                None => MethodChange::Added,
                Some(fp) if *fp != method.fingerprint => MethodChange::Modified,
                Some(_) => return None,
            };
            Some(ChangedMethod {
                method: method.clone(),
                change,
            })
        })
        .collect()
}
