//! Column name normalisation.

use std::sync::LazyLock;

use regex::Regex;

/// Acronym followed by a capitalised word: `HTTPResponse` -> `HTTP_Response`.
static ACRONYM_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("valid acronym boundary regex")
});

/// Lowercase or digit followed by uppercase: `areaCode` -> `area_Code`.
static CAMEL_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"([a-z\d])([A-Z])").expect("valid camel boundary regex")
});

/// Runs of whitespace and hyphens.
static SEPARATOR_RUN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[\s\-]+").expect("valid separator regex")
});

/// Converts an arbitrary column label to `snake_case`.
///
/// Idempotent: a name that is already snake_case comes back unchanged.
///
/// # Examples
///
/// ```
/// use faostat_core::frame::to_snake_case;
///
/// assert_eq!(to_snake_case("Area Code"), "area_code");
/// assert_eq!(to_snake_case("ElementCode"), "element_code");
/// assert_eq!(to_snake_case("HTTPStatus"), "http_status");
/// assert_eq!(to_snake_case("year_code"), "year_code");
/// ```
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let name = ACRONYM_BOUNDARY.replace_all(name, "${1}_${2}");
    let name = CAMEL_BOUNDARY.replace_all(&name, "${1}_${2}");
    let name = SEPARATOR_RUN.replace_all(&name, "_");
    name.to_lowercase().trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_spaces_and_hyphens() {
        assert_eq!(to_snake_case("Area Code"), "area_code");
        assert_eq!(to_snake_case("Item  Code - CPC"), "item_code_cpc");
        assert_eq!(to_snake_case("Flag-Description"), "flag_description");
    }

    #[test]
    fn test_snake_case_camel_and_acronyms() {
        assert_eq!(to_snake_case("areaCode"), "area_code");
        assert_eq!(to_snake_case("DomainCode"), "domain_code");
        assert_eq!(to_snake_case("ISO3Code"), "iso3_code");
        assert_eq!(to_snake_case("M49Code"), "m49_code");
        assert_eq!(to_snake_case("CPCCode"), "cpc_code");
    }

    #[test]
    fn test_snake_case_strips_edge_underscores() {
        assert_eq!(to_snake_case(" Year "), "year");
        assert_eq!(to_snake_case("__Value__"), "value");
        assert_eq!(to_snake_case(""), "");
    }

    #[test]
    fn test_snake_case_is_idempotent() {
        for raw in ["Area Code", "ElementCode", "HTTPResponse", "Year", "unit", "Item Code (CPC)"] {
            let once = to_snake_case(raw);
            assert_eq!(to_snake_case(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_snake_case_keeps_other_punctuation() {
        assert_eq!(to_snake_case("Item Code (CPC)"), "item_code_(cpc)");
    }
}
