//! Argument syntax checks for collection names and partition tags.
//!
//! These run before any metadata or cache call; a failure here is always
//! `InvalidArgument`.

use crate::catalog::schema::PartitionTagSet;
use crate::core::error::{TesseraError, TesseraResult};

/// Maximum length of a collection name or partition tag.
pub const MAX_NAME_LENGTH: usize = 255;

/// Validate a collection name.
///
/// Names are non-empty, at most [`MAX_NAME_LENGTH`] characters, start with a
/// letter or underscore and contain only letters, digits and underscores.
pub fn validate_collection_name(name: &str) -> TesseraResult<()> {
    if name.is_empty() {
        return Err(TesseraError::invalid_argument(
            "collection name should not be empty",
        ));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(TesseraError::invalid_argument(format!(
            "invalid collection name {name:?}: length exceeds {MAX_NAME_LENGTH}"
        )));
    }

    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if first != '_' && !first.is_ascii_alphabetic() {
            return Err(TesseraError::invalid_argument(format!(
                "invalid collection name {name:?}: first character must be a letter or underscore"
            )));
        }
    }

    if let Some(bad) = chars.find(|c| *c != '_' && !c.is_ascii_alphanumeric()) {
        return Err(TesseraError::invalid_argument(format!(
            "invalid collection name {name:?}: character {bad:?} is not allowed"
        )));
    }

    Ok(())
}

/// Validate one partition tag, returning it trimmed.
pub fn validate_partition_tag(tag: &str) -> TesseraResult<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        return Err(TesseraError::invalid_argument(
            "partition tag should not be empty",
        ));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(TesseraError::invalid_argument(format!(
            "invalid partition tag {trimmed:?}: length exceeds {MAX_NAME_LENGTH}"
        )));
    }

    let mut chars = trimmed.chars();
    if let Some(first) = chars.next() {
        if first != '_' && !first.is_ascii_alphanumeric() {
            return Err(TesseraError::invalid_argument(format!(
                "invalid partition tag {trimmed:?}: first character must be a letter, digit or underscore"
            )));
        }
    }

    if let Some(bad) = chars.find(|c| !matches!(c, '_' | '-') && !c.is_ascii_alphanumeric()) {
        return Err(TesseraError::invalid_argument(format!(
            "invalid partition tag {trimmed:?}: character {bad:?} is not allowed"
        )));
    }

    Ok(trimmed.to_string())
}

/// Validate a request's partition tags and build the tag set.
pub fn validate_partition_tags<S: AsRef<str>>(tags: &[S]) -> TesseraResult<PartitionTagSet> {
    let mut checked = Vec::with_capacity(tags.len());
    for tag in tags {
        checked.push(validate_partition_tag(tag.as_ref())?);
    }
    Ok(PartitionTagSet::new(checked))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_names() {
        for name in ["c1", "_hidden", "Collection_2024", &"a".repeat(MAX_NAME_LENGTH)] {
            assert!(validate_collection_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_malformed_names() {
        let too_long = "a".repeat(MAX_NAME_LENGTH + 1);
        for name in ["", "1abc", "has space", "dash-name", "名字", too_long.as_str()] {
            let err = validate_collection_name(name).unwrap_err();
            assert!(matches!(err, TesseraError::InvalidArgument { .. }), "{name}");
        }
    }

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = validate_partition_tags(&[" p1 ", "2024-01", "p1"]).unwrap();
        assert_eq!(tags.tags(), &["p1", "2024-01"]);
    }

    #[test]
    fn blank_tag_is_invalid() {
        assert!(validate_partition_tags(&["p1", "   "]).is_err());
        assert!(validate_partition_tag("-lead").is_err());
        assert!(validate_partition_tag("a/b").is_err());
    }
}
