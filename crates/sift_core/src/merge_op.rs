//! Merge operators fold partial updates into one value.

use std::sync::Arc;

pub trait MergeOperator: Send + Sync {
    fn name(&self) -> &str;

    /// Fold `operands` (oldest first) onto `existing`. `None` means the
    /// reduction was rejected.
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[&[u8]]) -> Option<Vec<u8>>;
}

/// Values are ASCII signed decimal integers; the merge result is their sum.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddMerge;

fn parse_i64(b: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(b).ok()?.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    s.parse().ok()
}

impl MergeOperator for AddMerge {
    fn name(&self) -> &str { "add" }

    fn full_merge(&self, _key: &[u8], existing: Option<&[u8]>, operands: &[&[u8]]) -> Option<Vec<u8>> {
        let mut acc = match existing {
            Some(b) => parse_i64(b)?,
            None => 0,
        };
        for op in operands {
            acc = acc.checked_add(parse_i64(op)?)?;
        }
        Some(acc.to_string().into_bytes())
    }
}

/// Concatenates the base value and every operand.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendMerge;

impl MergeOperator for AppendMerge {
    fn name(&self) -> &str { "append" }

    fn full_merge(&self, _key: &[u8], existing: Option<&[u8]>, operands: &[&[u8]]) -> Option<Vec<u8>> {
        let mut out = existing.map(<[u8]>::to_vec).unwrap_or_default();
        for op in operands {
            out.extend_from_slice(op);
        }
        Some(out)
    }
}

/// Built-in operator by name.
pub fn builtin(name: &str) -> Option<Arc<dyn MergeOperator>> {
    match name {
        "add" => Some(Arc::new(AddMerge)),
        "append" => Some(Arc::new(AppendMerge)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sums_signed_decimals() {
        let m = AddMerge;
        assert_eq!(m.full_merge(b"k", None, &[b"+5"]), Some(b"5".to_vec()));
        assert_eq!(m.full_merge(b"k", Some(&b"10"[..]), &[&b"+5"[..], b"-3"]), Some(b"12".to_vec()));
        assert_eq!(m.full_merge(b"k", None, &[b"five"]), None);
        assert_eq!(m.full_merge(b"k", Some(&b"9223372036854775807"[..]), &[b"1"]), None);
    }

    #[test]
    fn append_concatenates() {
        let m = AppendMerge;
        assert_eq!(m.full_merge(b"k", Some(&b"ab"[..]), &[b"c", b"d"]), Some(b"abcd".to_vec()));
        assert_eq!(m.full_merge(b"k", None, &[b"x"]), Some(b"x".to_vec()));
    }

    #[test]
    fn builtin_lookup() {
        assert_eq!(builtin("add").map(|m| m.name().to_string()), Some("add".into()));
        assert!(builtin("append").is_some());
        assert!(builtin("nope").is_none());
    }
}
