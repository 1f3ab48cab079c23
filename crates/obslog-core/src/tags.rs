//! Tag normalization.
//!
//! Tags are lowercased on every write and every read-filter path, so the
//! stored and queried forms always compare equal. A normalized tag must be
//! a non-empty word of ASCII letters, digits and underscores.

use crate::error::{Error, Result};

/// Lowercase `tags` and validate the result.
///
/// Reports every offending tag (in sorted order), not just the first.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
  let normalized: Vec<String> =
    tags.iter().map(|tag| tag.to_ascii_lowercase()).collect();

  let mut bad: Vec<String> = normalized
    .iter()
    .filter(|tag| !is_valid_tag(tag))
    .cloned()
    .collect();
  if !bad.is_empty() {
    bad.sort();
    bad.dedup();
    return Err(Error::InvalidTags(bad));
  }
  Ok(normalized)
}

fn is_valid_tag(tag: &str) -> bool {
  !tag.is_empty()
    && tag
      .bytes()
      .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_lowercases() {
    let tags = vec!["Dome".to_owned(), "SEEING_0_7".to_owned()];
    assert_eq!(normalize_tags(&tags).unwrap(), vec![
      "dome".to_owned(),
      "seeing_0_7".to_owned()
    ]);
  }

  #[test]
  fn rejects_malformed_tags() {
    let tags = vec![
      "ok_tag".to_owned(),
      "not valid".to_owned(),
      "also=not=valid".to_owned(),
      "again?".to_owned(),
    ];
    let err = normalize_tags(&tags).unwrap_err();
    match err {
      Error::InvalidTags(bad) => {
        assert_eq!(bad, vec![
          "again?".to_owned(),
          "also=not=valid".to_owned(),
          "not valid".to_owned(),
        ]);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn rejects_empty_tag() {
    assert!(normalize_tags(&["".to_owned()]).is_err());
  }
}
