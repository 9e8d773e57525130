use core::fmt::Debug;
use std::fmt::Display;
use std::str::FromStr;

use crate::{GeneSigError, GeneSigResult};

/// The id of a GO term
///
/// Displayed as `GO:` followed by a zero-padded seven-digit accession.
///
/// # Examples
///
/// ```
/// use genesig::GoTermId;
///
/// let id = GoTermId::try_from("GO:0008150").unwrap();
/// assert_eq!(id.as_u32(), 8150);
/// assert_eq!(id.to_string(), "GO:0008150");
/// assert_eq!(GoTermId::from(8150u32), id);
///
/// assert!(GoTermId::try_from("HP:0008150").is_err());
/// assert!(GoTermId::try_from("GO:abc").is_err());
/// ```
#[derive(Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GoTermId {
    inner: u32,
}

impl GoTermId {
    pub fn as_u32(&self) -> u32 {
        self.inner
    }
}

impl TryFrom<&str> for GoTermId {
    type Error = GeneSigError;
    fn try_from(s: &str) -> GeneSigResult<Self> {
        let accession = s
            .strip_prefix("GO:")
            .ok_or_else(|| GeneSigError::InvalidInput(format!("'{s}' is not a GO term id")))?;
        Ok(GoTermId {
            inner: accession.parse::<u32>()?,
        })
    }
}

impl FromStr for GoTermId {
    type Err = GeneSigError;
    fn from_str(s: &str) -> GeneSigResult<Self> {
        GoTermId::try_from(s)
    }
}

impl From<u32> for GoTermId {
    fn from(inner: u32) -> Self {
        Self { inner }
    }
}

impl Debug for GoTermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoTermId({self})")
    }
}

impl Display for GoTermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GO:{:07}", self.inner)
    }
}

impl PartialEq<str> for GoTermId {
    fn eq(&self, other: &str) -> bool {
        GoTermId::try_from(other).map_or(false, |id| id == *self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compare_with_str() {
        let id = GoTermId::from(5575u32);
        assert!(id == *"GO:0005575");
        assert!(id != *"GO:0005576");
        assert!(id != *"foo");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            GoTermId::try_from("GO:12x"),
            Err(GeneSigError::ParseIntError)
        );
        assert!(matches!(
            GoTermId::try_from("0008150"),
            Err(GeneSigError::InvalidInput(_))
        ));
    }

    #[test]
    fn ordering() {
        let mut ids = vec![GoTermId::from(3u32), GoTermId::from(1u32), GoTermId::from(2u32)];
        ids.sort();
        assert_eq!(ids[0].to_string(), "GO:0000001");
    }
}
