use std::iter::repeat;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rocket::form::{self, FromFormField, ValueField};
use rocket::request::FromParam;

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(it))
}

/// `YYYY-MM-DD` path/query parameter. Rocket has no `FromParam` for
/// `chrono::NaiveDate`, so routes take this wrapper instead.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IsoDate(pub NaiveDate);

impl<'a> FromParam<'a> for IsoDate {
    type Error = chrono::ParseError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        NaiveDate::parse_from_str(param, "%Y-%m-%d").map(IsoDate)
    }
}

#[rocket::async_trait]
impl<'v> FromFormField<'v> for IsoDate {
    fn from_value(field: ValueField<'v>) -> form::Result<'v, Self> {
        NaiveDate::parse_from_str(field.value, "%Y-%m-%d")
            .map(IsoDate)
            .map_err(|_| form::Error::validation("expected an ISO date (YYYY-MM-DD)").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_dates_parse_from_path_segments() {
        let date = IsoDate::from_param("2024-04-08").unwrap();
        assert_eq!(date.0, NaiveDate::from_ymd_opt(2024, 4, 8).unwrap());
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(IsoDate::from_param("08-04-2024").is_err());
        assert!(IsoDate::from_param("not-a-date").is_err());
    }
}
